//! Persistence seams consumed by the billing engine.
//!
//! Member and plan rows are owned by the membership subsystem; the engine
//! reads them and writes only the two plan references on a member.
//! Invoices and task runs are owned by the engine.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::NaiveDate;
use service_core::error::AppError;
use uuid::Uuid;

use crate::models::{Invoice, Member, Plan, TaskKind, TaskRun};

pub use memory::InMemoryStore;
pub use postgres::Database;

#[async_trait]
pub trait MemberStore: Send + Sync {
    async fn member_by_id(&self, member_id: Uuid) -> Result<Option<Member>, AppError>;

    /// Persist a member's plan references.
    async fn save_member(&self, member: &Member) -> Result<(), AppError>;
}

#[async_trait]
pub trait PlanStore: Send + Sync {
    async fn plan_by_id(&self, plan_id: Uuid) -> Result<Option<Plan>, AppError>;
}

#[async_trait]
pub trait InvoiceStore: Send + Sync {
    async fn invoice_by_id(&self, invoice_id: Uuid) -> Result<Option<Invoice>, AppError>;

    async fn invoice_for_member_month(
        &self,
        member_id: Uuid,
        reference_month: NaiveDate,
    ) -> Result<Option<Invoice>, AppError>;

    /// Insert a new invoice. Returns `AppError::Conflict` when one already
    /// exists for the same member and reference month.
    async fn insert_invoice(&self, invoice: &Invoice) -> Result<(), AppError>;

    /// Update a mutable invoice row. The processing flags are monotonic:
    /// implementations never flip them back to false.
    async fn update_invoice(&self, invoice: &Invoice) -> Result<(), AppError>;

    /// Unpaid invoices past due and not yet delinquency-processed,
    /// ordered by due date ascending.
    async fn overdue_unprocessed(
        &self,
        today: NaiveDate,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Invoice>, AppError>;

    /// Paid invoices past due whose successor has not been generated,
    /// ordered by due date ascending.
    async fn paid_without_successor(
        &self,
        today: NaiveDate,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Invoice>, AppError>;

    /// All invoices of a member, newest reference month first.
    async fn invoices_for_member(&self, member_id: Uuid) -> Result<Vec<Invoice>, AppError>;

    async fn count_overdue_unpaid(&self, today: NaiveDate) -> Result<i64, AppError>;
}

#[async_trait]
pub trait TaskRunStore: Send + Sync {
    /// Whether a successful run of `kind` is recorded for `day`.
    async fn succeeded_on_day(&self, kind: TaskKind, day: NaiveDate) -> Result<bool, AppError>;

    /// Most recent successful run of `kind`, if any.
    async fn last_successful(&self, kind: TaskKind) -> Result<Option<TaskRun>, AppError>;

    /// Insert or update a run by id.
    async fn save_run(&self, run: &TaskRun) -> Result<(), AppError>;

    /// Most recent runs of `kind`, newest first.
    async fn recent_runs(&self, kind: TaskKind, limit: i64) -> Result<Vec<TaskRun>, AppError>;
}

#[async_trait]
pub trait BillingUnitOfWork: Send + Sync {
    /// Commit a member update, an optional invoice update and an optional
    /// new invoice as one atomic unit. On `AppError::Conflict` (duplicate
    /// invoice month) nothing is persisted.
    async fn commit_billing_mutation(
        &self,
        member: &Member,
        updated_invoice: Option<&Invoice>,
        new_invoice: Option<&Invoice>,
    ) -> Result<(), AppError>;
}

/// Everything the billing engine needs from persistence.
#[async_trait]
pub trait BillingStore:
    MemberStore + PlanStore + InvoiceStore + TaskRunStore + BillingUnitOfWork
{
    /// Cheap connectivity probe for liveness endpoints.
    async fn health_check(&self) -> Result<(), AppError>;
}
