//! PostgreSQL store for the billing engine.

use async_trait::async_trait;
use chrono::NaiveDate;
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::models::{Invoice, Member, Plan, TaskKind, TaskRun};
use crate::services::metrics::DB_QUERY_DURATION;
use crate::store::{
    BillingStore, BillingUnitOfWork, InvoiceStore, MemberStore, PlanStore, TaskRunStore,
};

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "billing-engine"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }
}

fn map_insert_error(e: sqlx::Error) -> AppError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => AppError::Conflict(
            anyhow::anyhow!("An invoice already exists for this member and reference month"),
        ),
        _ => AppError::DatabaseError(anyhow::Error::new(e)),
    }
}

const INSERT_INVOICE_SQL: &str = r#"
    INSERT INTO invoices (invoice_id, member_id, plan_id, reference_month, amount_cents, due_date, payment_date, is_paid, delinquency_processed, next_invoice_generated, notes, created_utc, updated_utc)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
"#;

// The processing flags and the paid flag are monotonic at the SQL level:
// an update can set them, never clear them.
const UPDATE_INVOICE_SQL: &str = r#"
    UPDATE invoices
    SET plan_id = $2,
        amount_cents = $3,
        due_date = $4,
        payment_date = $5,
        is_paid = is_paid OR $6,
        delinquency_processed = delinquency_processed OR $7,
        next_invoice_generated = next_invoice_generated OR $8,
        notes = $9,
        updated_utc = NOW()
    WHERE invoice_id = $1
"#;

const SAVE_MEMBER_SQL: &str = r#"
    UPDATE members
    SET plan_id = $2,
        pending_plan_id = $3,
        updated_utc = NOW()
    WHERE member_id = $1
"#;

fn bind_insert_invoice<'q>(
    invoice: &'q Invoice,
) -> sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments> {
    sqlx::query(INSERT_INVOICE_SQL)
        .bind(invoice.invoice_id)
        .bind(invoice.member_id)
        .bind(invoice.plan_id)
        .bind(invoice.reference_month)
        .bind(invoice.amount_cents)
        .bind(invoice.due_date)
        .bind(invoice.payment_date)
        .bind(invoice.is_paid)
        .bind(invoice.delinquency_processed)
        .bind(invoice.next_invoice_generated)
        .bind(&invoice.notes)
        .bind(invoice.created_utc)
        .bind(invoice.updated_utc)
}

fn bind_update_invoice<'q>(
    invoice: &'q Invoice,
) -> sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments> {
    sqlx::query(UPDATE_INVOICE_SQL)
        .bind(invoice.invoice_id)
        .bind(invoice.plan_id)
        .bind(invoice.amount_cents)
        .bind(invoice.due_date)
        .bind(invoice.payment_date)
        .bind(invoice.is_paid)
        .bind(invoice.delinquency_processed)
        .bind(invoice.next_invoice_generated)
        .bind(&invoice.notes)
}

fn bind_save_member<'q>(
    member: &'q Member,
) -> sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments> {
    sqlx::query(SAVE_MEMBER_SQL)
        .bind(member.member_id)
        .bind(member.plan_id)
        .bind(member.pending_plan_id)
}

#[async_trait]
impl MemberStore for Database {
    #[instrument(skip(self))]
    async fn member_by_id(&self, member_id: Uuid) -> Result<Option<Member>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["member_by_id"])
            .start_timer();

        let member = sqlx::query_as::<_, Member>(
            r#"
            SELECT member_id, email, display_name, plan_id, pending_plan_id, created_utc, updated_utc
            FROM members
            WHERE member_id = $1
            "#,
        )
        .bind(member_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to fetch member: {}", e)))?;

        timer.observe_duration();
        Ok(member)
    }

    #[instrument(skip(self, member), fields(member_id = %member.member_id))]
    async fn save_member(&self, member: &Member) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["save_member"])
            .start_timer();

        bind_save_member(member)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to save member: {}", e))
            })?;

        timer.observe_duration();
        Ok(())
    }
}

#[async_trait]
impl PlanStore for Database {
    #[instrument(skip(self))]
    async fn plan_by_id(&self, plan_id: Uuid) -> Result<Option<Plan>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["plan_by_id"])
            .start_timer();

        let plan = sqlx::query_as::<_, Plan>(
            r#"
            SELECT plan_id, name, description, price_cents, is_active, created_utc, updated_utc
            FROM plans
            WHERE plan_id = $1
            "#,
        )
        .bind(plan_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to fetch plan: {}", e)))?;

        timer.observe_duration();
        Ok(plan)
    }
}

const INVOICE_COLUMNS: &str = "invoice_id, member_id, plan_id, reference_month, amount_cents, due_date, payment_date, is_paid, delinquency_processed, next_invoice_generated, notes, created_utc, updated_utc";

#[async_trait]
impl InvoiceStore for Database {
    #[instrument(skip(self))]
    async fn invoice_by_id(&self, invoice_id: Uuid) -> Result<Option<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["invoice_by_id"])
            .start_timer();

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            "SELECT {} FROM invoices WHERE invoice_id = $1",
            INVOICE_COLUMNS
        ))
        .bind(invoice_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to fetch invoice: {}", e)))?;

        timer.observe_duration();
        Ok(invoice)
    }

    #[instrument(skip(self))]
    async fn invoice_for_member_month(
        &self,
        member_id: Uuid,
        reference_month: NaiveDate,
    ) -> Result<Option<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["invoice_for_member_month"])
            .start_timer();

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            "SELECT {} FROM invoices WHERE member_id = $1 AND reference_month = $2",
            INVOICE_COLUMNS
        ))
        .bind(member_id)
        .bind(reference_month)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to fetch invoice: {}", e)))?;

        timer.observe_duration();
        Ok(invoice)
    }

    #[instrument(skip(self, invoice), fields(invoice_id = %invoice.invoice_id))]
    async fn insert_invoice(&self, invoice: &Invoice) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_invoice"])
            .start_timer();

        bind_insert_invoice(invoice)
            .execute(&self.pool)
            .await
            .map_err(map_insert_error)?;

        timer.observe_duration();
        info!(
            invoice_id = %invoice.invoice_id,
            member_id = %invoice.member_id,
            reference_month = %invoice.reference_month,
            "Invoice created"
        );
        Ok(())
    }

    #[instrument(skip(self, invoice), fields(invoice_id = %invoice.invoice_id))]
    async fn update_invoice(&self, invoice: &Invoice) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_invoice"])
            .start_timer();

        bind_update_invoice(invoice)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to update invoice: {}", e))
            })?;

        timer.observe_duration();
        Ok(())
    }

    #[instrument(skip(self))]
    async fn overdue_unprocessed(
        &self,
        today: NaiveDate,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["overdue_unprocessed"])
            .start_timer();

        let invoices = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            SELECT {}
            FROM invoices
            WHERE is_paid = FALSE
              AND delinquency_processed = FALSE
              AND due_date < $1
            ORDER BY due_date ASC, invoice_id ASC
            LIMIT $2 OFFSET $3
            "#,
            INVOICE_COLUMNS
        ))
        .bind(today)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to fetch overdue invoices: {}", e))
        })?;

        timer.observe_duration();
        Ok(invoices)
    }

    #[instrument(skip(self))]
    async fn paid_without_successor(
        &self,
        today: NaiveDate,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["paid_without_successor"])
            .start_timer();

        let invoices = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            SELECT {}
            FROM invoices
            WHERE is_paid = TRUE
              AND next_invoice_generated = FALSE
              AND due_date < $1
            ORDER BY due_date ASC, invoice_id ASC
            LIMIT $2 OFFSET $3
            "#,
            INVOICE_COLUMNS
        ))
        .bind(today)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to fetch paid invoices: {}", e))
        })?;

        timer.observe_duration();
        Ok(invoices)
    }

    #[instrument(skip(self))]
    async fn invoices_for_member(&self, member_id: Uuid) -> Result<Vec<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["invoices_for_member"])
            .start_timer();

        let invoices = sqlx::query_as::<_, Invoice>(&format!(
            "SELECT {} FROM invoices WHERE member_id = $1 ORDER BY reference_month DESC",
            INVOICE_COLUMNS
        ))
        .bind(member_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to fetch member invoices: {}", e))
        })?;

        timer.observe_duration();
        Ok(invoices)
    }

    #[instrument(skip(self))]
    async fn count_overdue_unpaid(&self, today: NaiveDate) -> Result<i64, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["count_overdue_unpaid"])
            .start_timer();

        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM invoices WHERE is_paid = FALSE AND due_date < $1",
        )
        .bind(today)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to count overdue invoices: {}", e))
        })?;

        timer.observe_duration();
        Ok(count)
    }
}

#[async_trait]
impl TaskRunStore for Database {
    #[instrument(skip(self))]
    async fn succeeded_on_day(&self, kind: TaskKind, day: NaiveDate) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["succeeded_on_day"])
            .start_timer();

        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM task_runs
                WHERE task_kind = $1 AND execution_day = $2 AND succeeded = TRUE
            )
            "#,
        )
        .bind(kind.as_str())
        .bind(day)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to check execution log: {}", e))
        })?;

        timer.observe_duration();
        Ok(exists)
    }

    #[instrument(skip(self))]
    async fn last_successful(&self, kind: TaskKind) -> Result<Option<TaskRun>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["last_successful"])
            .start_timer();

        let run = sqlx::query_as::<_, TaskRun>(
            r#"
            SELECT run_id, task_kind, succeeded, error_message, executed_at, execution_day
            FROM task_runs
            WHERE task_kind = $1 AND succeeded = TRUE
            ORDER BY executed_at DESC
            LIMIT 1
            "#,
        )
        .bind(kind.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to fetch last successful run: {}", e))
        })?;

        timer.observe_duration();
        Ok(run)
    }

    #[instrument(skip(self, run), fields(run_id = %run.run_id))]
    async fn save_run(&self, run: &TaskRun) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["save_run"])
            .start_timer();

        sqlx::query(
            r#"
            INSERT INTO task_runs (run_id, task_kind, succeeded, error_message, executed_at, execution_day)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (run_id) DO UPDATE
            SET succeeded = EXCLUDED.succeeded,
                error_message = EXCLUDED.error_message
            "#,
        )
        .bind(run.run_id)
        .bind(&run.task_kind)
        .bind(run.succeeded)
        .bind(&run.error_message)
        .bind(run.executed_at)
        .bind(run.execution_day)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to save task run: {}", e)))?;

        timer.observe_duration();
        Ok(())
    }

    #[instrument(skip(self))]
    async fn recent_runs(&self, kind: TaskKind, limit: i64) -> Result<Vec<TaskRun>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["recent_runs"])
            .start_timer();

        let runs = sqlx::query_as::<_, TaskRun>(
            r#"
            SELECT run_id, task_kind, succeeded, error_message, executed_at, execution_day
            FROM task_runs
            WHERE task_kind = $1
            ORDER BY executed_at DESC
            LIMIT $2
            "#,
        )
        .bind(kind.as_str())
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to fetch recent runs: {}", e))
        })?;

        timer.observe_duration();
        Ok(runs)
    }
}

#[async_trait]
impl BillingUnitOfWork for Database {
    #[instrument(skip(self, member, updated_invoice, new_invoice), fields(member_id = %member.member_id))]
    async fn commit_billing_mutation(
        &self,
        member: &Member,
        updated_invoice: Option<&Invoice>,
        new_invoice: Option<&Invoice>,
    ) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["commit_billing_mutation"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        bind_save_member(member)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to save member: {}", e))
            })?;

        if let Some(invoice) = updated_invoice {
            bind_update_invoice(invoice)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    AppError::DatabaseError(anyhow::anyhow!("Failed to update invoice: {}", e))
                })?;
        }

        if let Some(invoice) = new_invoice {
            bind_insert_invoice(invoice)
                .execute(&mut *tx)
                .await
                .map_err(map_insert_error)?;
        }

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();
        Ok(())
    }
}

#[async_trait]
impl BillingStore for Database {
    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["health_check"])
            .start_timer();

        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;

        timer.observe_duration();
        Ok(())
    }
}
