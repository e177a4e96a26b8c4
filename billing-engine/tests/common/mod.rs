//! Test fixtures built on the in-memory store.

#![allow(dead_code)]

use billing_engine::engine::{BillingCycleOrchestrator, DelinquencyProcessor, InvoiceGenerator, JobScheduler};
use billing_engine::models::{Invoice, Member, Plan};
use billing_engine::services::{PaymentRecorder, PlanSelectionHandler};
use billing_engine::store::{BillingStore, InMemoryStore, InvoiceStore};
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

pub const BATCH_SIZE: i64 = 50;

/// UTC-3, the billing timezone used throughout the tests.
pub fn billing_zone() -> FixedOffset {
    FixedOffset::east_opt(-3 * 3600).expect("valid offset")
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

pub fn month(y: i32, m: u32) -> NaiveDate {
    date(y, m, 1)
}

/// UTC instant whose billing-zone calendar day equals `day` (midday local).
pub fn midday(day: NaiveDate) -> DateTime<Utc> {
    day.and_hms_opt(15, 0, 0).expect("valid time").and_utc()
}

pub struct TestHarness {
    pub store: Arc<InMemoryStore>,
    batch_size: i64,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_batch_size(BATCH_SIZE)
    }

    pub fn with_batch_size(batch_size: i64) -> Self {
        Self {
            store: Arc::new(InMemoryStore::new()),
            batch_size,
        }
    }

    pub fn dyn_store(&self) -> Arc<dyn BillingStore> {
        self.store.clone()
    }

    pub fn delinquency(&self) -> DelinquencyProcessor {
        DelinquencyProcessor::new(self.dyn_store(), self.batch_size)
    }

    pub fn generator(&self) -> InvoiceGenerator {
        InvoiceGenerator::new(self.dyn_store(), self.batch_size)
    }

    pub fn orchestrator(&self) -> BillingCycleOrchestrator {
        BillingCycleOrchestrator::new(self.dyn_store(), self.batch_size)
    }

    pub fn scheduler(&self) -> JobScheduler {
        JobScheduler::new(
            self.dyn_store(),
            self.orchestrator(),
            billing_zone(),
            Duration::from_secs(60),
        )
    }

    pub fn plan_selection(&self) -> PlanSelectionHandler {
        PlanSelectionHandler::new(self.dyn_store(), billing_zone())
    }

    pub fn payments(&self) -> PaymentRecorder {
        PaymentRecorder::new(self.dyn_store(), billing_zone())
    }

    /// Seed a plan.
    pub async fn plan(&self, name: &str, price_cents: i64, is_active: bool) -> Plan {
        let plan = Plan {
            plan_id: Uuid::new_v4(),
            name: name.to_string(),
            description: None,
            price_cents,
            is_active,
            created_utc: Utc::now(),
            updated_utc: Utc::now(),
        };
        self.store.insert_plan(plan.clone()).await;
        plan
    }

    /// Seed a member with a current plan.
    pub async fn member(&self, plan_id: Option<Uuid>) -> Member {
        self.member_with_plans(plan_id, None).await
    }

    /// Seed a member with both plan references.
    pub async fn member_with_plans(
        &self,
        plan_id: Option<Uuid>,
        pending_plan_id: Option<Uuid>,
    ) -> Member {
        let member_id = Uuid::new_v4();
        let member = Member {
            member_id,
            email: format!("member-{}@example.com", member_id),
            display_name: "Test Member".to_string(),
            plan_id,
            pending_plan_id,
            created_utc: Utc::now(),
            updated_utc: Utc::now(),
        };
        self.store.insert_member(member.clone()).await;
        member
    }

    /// Seed an unpaid invoice.
    pub async fn invoice(
        &self,
        member: &Member,
        plan: &Plan,
        reference_month: NaiveDate,
        due_date: NaiveDate,
    ) -> Invoice {
        let invoice = Invoice::new(
            member.member_id,
            plan,
            reference_month,
            due_date,
            Utc::now(),
        );
        self.store
            .insert_invoice(&invoice)
            .await
            .expect("seed invoice");
        invoice
    }

    /// Seed a paid invoice (payment date = due date).
    pub async fn paid_invoice(
        &self,
        member: &Member,
        plan: &Plan,
        reference_month: NaiveDate,
        due_date: NaiveDate,
    ) -> Invoice {
        let mut invoice = Invoice::new(
            member.member_id,
            plan,
            reference_month,
            due_date,
            Utc::now(),
        );
        invoice.is_paid = true;
        invoice.payment_date = Some(due_date);
        self.store
            .insert_invoice(&invoice)
            .await
            .expect("seed invoice");
        invoice
    }
}
