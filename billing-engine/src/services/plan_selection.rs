//! Member plan selection against in-flight billing state.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::Serialize;
use service_core::error::AppError;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::models::Invoice;
use crate::services::metrics::record_plan_selection;
use crate::store::{BillingStore, BillingUnitOfWork, InvoiceStore, MemberStore, PlanStore};
use crate::util::dates;

/// What a plan selection did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanSelectionOutcome {
    /// No invoice existed for the current month; one was created due today.
    AssignedImmediately,
    /// A previously requested change away from this plan was cancelled.
    PendingChangeCancelled,
    /// The already-generated successor invoice was repriced in place.
    SuccessorInvoiceUpdated,
    /// The change was deferred to the next billing boundary.
    DeferredToNextCycle,
}

impl PlanSelectionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanSelectionOutcome::AssignedImmediately => "assigned_immediately",
            PlanSelectionOutcome::PendingChangeCancelled => "pending_change_cancelled",
            PlanSelectionOutcome::SuccessorInvoiceUpdated => "successor_invoice_updated",
            PlanSelectionOutcome::DeferredToNextCycle => "deferred_to_next_cycle",
        }
    }
}

/// Applies a member's plan choice, deciding between immediate and
/// deferred activation based on the current billing state.
pub struct PlanSelectionHandler {
    store: Arc<dyn BillingStore>,
    billing_zone: FixedOffset,
}

impl PlanSelectionHandler {
    pub fn new(store: Arc<dyn BillingStore>, billing_zone: FixedOffset) -> Self {
        Self {
            store,
            billing_zone,
        }
    }

    /// Select `plan_id` for `member_id`, effective per the rules below.
    #[instrument(skip(self))]
    pub async fn select_plan(
        &self,
        member_id: Uuid,
        plan_id: Uuid,
    ) -> Result<PlanSelectionOutcome, AppError> {
        let now = Utc::now();
        let today = now.with_timezone(&self.billing_zone).date_naive();
        self.select_plan_at(member_id, plan_id, today, now).await
    }

    /// Rules, in order:
    /// 1. Inactive target plan is rejected.
    /// 2. Reselecting the current plan with nothing pending is a no-op error.
    /// 3. Reselecting the current plan with a pending change cancels it.
    /// 4. No invoice this month: assign immediately, invoice due today.
    /// 5. Successor invoice already generated and unpaid: reprice it in
    ///    place and record the change on the member for the next boundary.
    /// 6. Otherwise: record a pending plan for the next cycle boundary.
    pub async fn select_plan_at(
        &self,
        member_id: Uuid,
        plan_id: Uuid,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<PlanSelectionOutcome, AppError> {
        let mut member = self
            .store
            .member_by_id(member_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Member {} not found", member_id)))?;
        let plan = self
            .store
            .plan_by_id(plan_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Plan {} not found", plan_id)))?;

        if !plan.is_active {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Cannot select an inactive plan"
            )));
        }

        if member.plan_id == Some(plan.plan_id) {
            if member.pending_plan_id.is_none() {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "Member already has this plan"
                )));
            }
            member.pending_plan_id = None;
            self.store.save_member(&member).await?;
            info!(%member_id, plan = %plan.name, "Cancelled pending plan change");
            record_plan_selection(PlanSelectionOutcome::PendingChangeCancelled.as_str());
            return Ok(PlanSelectionOutcome::PendingChangeCancelled);
        }

        let current_month = dates::month_start(today);
        let current_invoice = self
            .store
            .invoice_for_member_month(member_id, current_month)
            .await?;

        let Some(current_invoice) = current_invoice else {
            // No billing this month yet: the change is immediate.
            let invoice = Invoice::new(member_id, &plan, current_month, today, now);
            member.plan_id = Some(plan.plan_id);
            member.pending_plan_id = None;
            self.store
                .commit_billing_mutation(&member, None, Some(&invoice))
                .await?;
            info!(
                %member_id,
                plan = %plan.name,
                due_date = %today,
                "Plan assigned immediately with a new invoice"
            );
            record_plan_selection(PlanSelectionOutcome::AssignedImmediately.as_str());
            return Ok(PlanSelectionOutcome::AssignedImmediately);
        };

        if current_invoice.next_invoice_generated {
            let next_month = dates::next_month(current_month);
            if let Some(mut successor) = self
                .store
                .invoice_for_member_month(member_id, next_month)
                .await?
            {
                if !successor.is_paid {
                    successor.plan_id = plan.plan_id;
                    successor.amount_cents = plan.price_cents;
                    // The member row must carry the change too, or the
                    // generator resolves the old plan at the boundary after
                    // the repriced invoice is paid.
                    member.pending_plan_id = Some(plan.plan_id);
                    self.store
                        .commit_billing_mutation(&member, Some(&successor), None)
                        .await?;
                    info!(
                        %member_id,
                        invoice_id = %successor.invoice_id,
                        plan = %plan.name,
                        "Repriced successor invoice in place"
                    );
                    record_plan_selection(PlanSelectionOutcome::SuccessorInvoiceUpdated.as_str());
                    return Ok(PlanSelectionOutcome::SuccessorInvoiceUpdated);
                }
            }
        }

        member.pending_plan_id = Some(plan.plan_id);
        self.store.save_member(&member).await?;
        info!(%member_id, plan = %plan.name, "Plan change deferred to the next cycle");
        record_plan_selection(PlanSelectionOutcome::DeferredToNextCycle.as_str());
        Ok(PlanSelectionOutcome::DeferredToNextCycle)
    }
}
