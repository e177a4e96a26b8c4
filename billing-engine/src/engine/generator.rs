//! Invoice generation: phase 2 of the billing cycle.

use chrono::{Datelike, NaiveDate, Utc};
use service_core::error::AppError;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::models::Invoice;
use crate::store::{BillingStore, BillingUnitOfWork, InvoiceStore, MemberStore, PlanStore};
use crate::util::dates;

enum GenerationOutcome {
    /// A successor invoice was created.
    Generated,
    /// The member already had an invoice for the next period; the source
    /// was closed out without creating one.
    AlreadyCovered,
    /// No successor could be produced; the row stays in the predicate.
    Skipped,
}

/// Scans paid invoices past due and creates the next period's invoice,
/// applying any pending plan change.
pub struct InvoiceGenerator {
    store: Arc<dyn BillingStore>,
    batch_size: i64,
}

impl InvoiceGenerator {
    pub fn new(store: Arc<dyn BillingStore>, batch_size: i64) -> Self {
        Self { store, batch_size }
    }

    /// Generate successor invoices for all eligible paid invoices,
    /// returning how many were created.
    #[instrument(skip(self))]
    pub async fn run(&self, today: NaiveDate) -> Result<u32, AppError> {
        info!(%today, "Starting invoice generation");

        let mut generated: u32 = 0;
        let mut skipped: i64 = 0;
        loop {
            let page = self
                .store
                .paid_without_successor(today, self.batch_size, skipped)
                .await?;
            let page_len = page.len();
            info!(count = page_len, "Processing paid invoices without a successor");

            for invoice in page {
                // Defensive re-check; the predicate already filters on due date.
                if invoice.due_date >= today {
                    skipped += 1;
                    continue;
                }
                match self.generate_next(&invoice, today).await? {
                    GenerationOutcome::Generated => generated += 1,
                    GenerationOutcome::AlreadyCovered => {}
                    GenerationOutcome::Skipped => skipped += 1,
                }
            }

            if (page_len as i64) < self.batch_size {
                break;
            }
        }

        info!(generated, "Finished invoice generation");
        Ok(generated)
    }

    async fn generate_next(
        &self,
        source: &Invoice,
        _today: NaiveDate,
    ) -> Result<GenerationOutcome, AppError> {
        let Some(mut member) = self.store.member_by_id(source.member_id).await? else {
            warn!(
                invoice_id = %source.invoice_id,
                member_id = %source.member_id,
                "Paid invoice references a missing member; skipping"
            );
            return Ok(GenerationOutcome::Skipped);
        };

        // A pending plan change wins over the current plan and is consumed.
        let (plan_id, consumes_pending) = match member.pending_plan_id {
            Some(pending) => (Some(pending), true),
            None => (member.plan_id, false),
        };
        let Some(plan_id) = plan_id else {
            debug!(
                member_id = %member.member_id,
                invoice_id = %source.invoice_id,
                "Member has no plan; no successor invoice"
            );
            return Ok(GenerationOutcome::Skipped);
        };
        let Some(plan) = self.store.plan_by_id(plan_id).await? else {
            warn!(member_id = %member.member_id, %plan_id, "Resolved plan does not exist; skipping");
            return Ok(GenerationOutcome::Skipped);
        };

        let next_month = dates::next_month(dates::month_start(source.reference_month));
        let due_date = dates::next_due_date(source.due_date.day(), source.reference_month);
        let successor = Invoice::new(member.member_id, &plan, next_month, due_date, Utc::now());

        let mut closed_source = source.clone();
        closed_source.next_invoice_generated = true;
        member.plan_id = Some(plan.plan_id);
        if consumes_pending {
            member.pending_plan_id = None;
        }

        match self
            .store
            .commit_billing_mutation(&member, Some(&closed_source), Some(&successor))
            .await
        {
            Ok(()) => {
                info!(
                    member_id = %member.member_id,
                    source_invoice = %source.invoice_id,
                    new_invoice = %successor.invoice_id,
                    reference_month = %next_month,
                    due_date = %due_date,
                    plan = %plan.name,
                    "Successor invoice generated"
                );
                Ok(GenerationOutcome::Generated)
            }
            Err(AppError::Conflict(_)) => {
                // The next period is already invoiced (e.g. an immediate
                // plan assignment happened after this invoice was paid).
                // Close out the source so it leaves the scan.
                warn!(
                    member_id = %member.member_id,
                    source_invoice = %source.invoice_id,
                    reference_month = %next_month,
                    "Next period already invoiced; closing out source invoice"
                );
                self.store
                    .commit_billing_mutation(&member, Some(&closed_source), None)
                    .await?;
                Ok(GenerationOutcome::AlreadyCovered)
            }
            Err(e) => Err(e),
        }
    }
}
