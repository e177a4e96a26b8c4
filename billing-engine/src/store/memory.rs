//! In-memory store used by the engine's integration tests.
//!
//! Mirrors the Postgres store's observable behavior: the
//! (member, reference month) uniqueness constraint, monotonic processing
//! flags, and predicate ordering. All operations share one lock, so a
//! committed mutation is atomic like its transactional counterpart.

use async_trait::async_trait;
use chrono::NaiveDate;
use service_core::error::AppError;
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::models::{Invoice, Member, Plan, TaskKind, TaskRun};
use crate::store::{
    BillingStore, BillingUnitOfWork, InvoiceStore, MemberStore, PlanStore, TaskRunStore,
};

#[derive(Default)]
struct Inner {
    members: HashMap<Uuid, Member>,
    plans: HashMap<Uuid, Plan>,
    invoices: HashMap<Uuid, Invoice>,
    task_runs: HashMap<Uuid, TaskRun>,
}

impl Inner {
    fn has_invoice_for_month(&self, member_id: Uuid, reference_month: NaiveDate) -> bool {
        self.invoices
            .values()
            .any(|i| i.member_id == member_id && i.reference_month == reference_month)
    }

    fn apply_invoice_update(&mut self, invoice: &Invoice) {
        if let Some(existing) = self.invoices.get_mut(&invoice.invoice_id) {
            let mut updated = invoice.clone();
            // Monotonic flags, like the SQL update.
            updated.is_paid = existing.is_paid || invoice.is_paid;
            updated.delinquency_processed =
                existing.delinquency_processed || invoice.delinquency_processed;
            updated.next_invoice_generated =
                existing.next_invoice_generated || invoice.next_invoice_generated;
            *existing = updated;
        }
    }

    fn apply_member_update(&mut self, member: &Member) {
        if let Some(existing) = self.members.get_mut(&member.member_id) {
            existing.plan_id = member.plan_id;
            existing.pending_plan_id = member.pending_plan_id;
        }
    }

    fn insert_invoice_checked(&mut self, invoice: &Invoice) -> Result<(), AppError> {
        if self.has_invoice_for_month(invoice.member_id, invoice.reference_month) {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "An invoice already exists for this member and reference month"
            )));
        }
        self.invoices.insert(invoice.invoice_id, invoice.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a plan (plans are owned by the membership subsystem).
    pub async fn insert_plan(&self, plan: Plan) {
        self.inner.lock().await.plans.insert(plan.plan_id, plan);
    }

    /// Seed a member (members are owned by the membership subsystem).
    pub async fn insert_member(&self, member: Member) {
        self.inner
            .lock()
            .await
            .members
            .insert(member.member_id, member);
    }

    /// Number of stored invoices.
    pub async fn invoice_count(&self) -> usize {
        self.inner.lock().await.invoices.len()
    }

    /// Number of stored task runs.
    pub async fn task_run_count(&self) -> usize {
        self.inner.lock().await.task_runs.len()
    }
}

#[async_trait]
impl MemberStore for InMemoryStore {
    async fn member_by_id(&self, member_id: Uuid) -> Result<Option<Member>, AppError> {
        Ok(self.inner.lock().await.members.get(&member_id).cloned())
    }

    async fn save_member(&self, member: &Member) -> Result<(), AppError> {
        self.inner.lock().await.apply_member_update(member);
        Ok(())
    }
}

#[async_trait]
impl PlanStore for InMemoryStore {
    async fn plan_by_id(&self, plan_id: Uuid) -> Result<Option<Plan>, AppError> {
        Ok(self.inner.lock().await.plans.get(&plan_id).cloned())
    }
}

#[async_trait]
impl InvoiceStore for InMemoryStore {
    async fn invoice_by_id(&self, invoice_id: Uuid) -> Result<Option<Invoice>, AppError> {
        Ok(self.inner.lock().await.invoices.get(&invoice_id).cloned())
    }

    async fn invoice_for_member_month(
        &self,
        member_id: Uuid,
        reference_month: NaiveDate,
    ) -> Result<Option<Invoice>, AppError> {
        Ok(self
            .inner
            .lock()
            .await
            .invoices
            .values()
            .find(|i| i.member_id == member_id && i.reference_month == reference_month)
            .cloned())
    }

    async fn insert_invoice(&self, invoice: &Invoice) -> Result<(), AppError> {
        self.inner.lock().await.insert_invoice_checked(invoice)
    }

    async fn update_invoice(&self, invoice: &Invoice) -> Result<(), AppError> {
        self.inner.lock().await.apply_invoice_update(invoice);
        Ok(())
    }

    async fn overdue_unprocessed(
        &self,
        today: NaiveDate,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Invoice>, AppError> {
        let inner = self.inner.lock().await;
        let mut matching: Vec<Invoice> = inner
            .invoices
            .values()
            .filter(|i| !i.is_paid && !i.delinquency_processed && i.due_date < today)
            .cloned()
            .collect();
        matching.sort_by(|a, b| {
            a.due_date
                .cmp(&b.due_date)
                .then(a.invoice_id.cmp(&b.invoice_id))
        });
        Ok(matching
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn paid_without_successor(
        &self,
        today: NaiveDate,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Invoice>, AppError> {
        let inner = self.inner.lock().await;
        let mut matching: Vec<Invoice> = inner
            .invoices
            .values()
            .filter(|i| i.is_paid && !i.next_invoice_generated && i.due_date < today)
            .cloned()
            .collect();
        matching.sort_by(|a, b| {
            a.due_date
                .cmp(&b.due_date)
                .then(a.invoice_id.cmp(&b.invoice_id))
        });
        Ok(matching
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn invoices_for_member(&self, member_id: Uuid) -> Result<Vec<Invoice>, AppError> {
        let inner = self.inner.lock().await;
        let mut invoices: Vec<Invoice> = inner
            .invoices
            .values()
            .filter(|i| i.member_id == member_id)
            .cloned()
            .collect();
        invoices.sort_by(|a, b| b.reference_month.cmp(&a.reference_month));
        Ok(invoices)
    }

    async fn count_overdue_unpaid(&self, today: NaiveDate) -> Result<i64, AppError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .invoices
            .values()
            .filter(|i| !i.is_paid && i.due_date < today)
            .count() as i64)
    }
}

#[async_trait]
impl TaskRunStore for InMemoryStore {
    async fn succeeded_on_day(&self, kind: TaskKind, day: NaiveDate) -> Result<bool, AppError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .task_runs
            .values()
            .any(|r| r.task_kind == kind.as_str() && r.execution_day == day && r.succeeded))
    }

    async fn last_successful(&self, kind: TaskKind) -> Result<Option<TaskRun>, AppError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .task_runs
            .values()
            .filter(|r| r.task_kind == kind.as_str() && r.succeeded)
            .max_by_key(|r| r.executed_at)
            .cloned())
    }

    async fn save_run(&self, run: &TaskRun) -> Result<(), AppError> {
        self.inner
            .lock()
            .await
            .task_runs
            .insert(run.run_id, run.clone());
        Ok(())
    }

    async fn recent_runs(&self, kind: TaskKind, limit: i64) -> Result<Vec<TaskRun>, AppError> {
        let inner = self.inner.lock().await;
        let mut runs: Vec<TaskRun> = inner
            .task_runs
            .values()
            .filter(|r| r.task_kind == kind.as_str())
            .cloned()
            .collect();
        runs.sort_by(|a, b| b.executed_at.cmp(&a.executed_at));
        runs.truncate(limit as usize);
        Ok(runs)
    }
}

#[async_trait]
impl BillingUnitOfWork for InMemoryStore {
    async fn commit_billing_mutation(
        &self,
        member: &Member,
        updated_invoice: Option<&Invoice>,
        new_invoice: Option<&Invoice>,
    ) -> Result<(), AppError> {
        let mut inner = self.inner.lock().await;

        // Check the uniqueness constraint up front so a conflict leaves
        // nothing partially applied.
        if let Some(invoice) = new_invoice {
            if inner.has_invoice_for_month(invoice.member_id, invoice.reference_month) {
                return Err(AppError::Conflict(anyhow::anyhow!(
                    "An invoice already exists for this member and reference month"
                )));
            }
        }

        inner.apply_member_update(member);
        if let Some(invoice) = updated_invoice {
            inner.apply_invoice_update(invoice);
        }
        if let Some(invoice) = new_invoice {
            inner.invoices.insert(invoice.invoice_id, invoice.clone());
        }
        Ok(())
    }
}

#[async_trait]
impl BillingStore for InMemoryStore {
    async fn health_check(&self) -> Result<(), AppError> {
        Ok(())
    }
}
