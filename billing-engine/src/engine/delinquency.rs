//! Delinquency processing: phase 1 of the billing cycle.

use chrono::NaiveDate;
use service_core::error::AppError;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::store::{BillingStore, BillingUnitOfWork, InvoiceStore, MemberStore};

/// Scans overdue unpaid invoices and revokes the member's subscription.
///
/// Marking an invoice delinquency-processed is irreversible; the member
/// loses both the current and the pending plan.
pub struct DelinquencyProcessor {
    store: Arc<dyn BillingStore>,
    batch_size: i64,
}

impl DelinquencyProcessor {
    pub fn new(store: Arc<dyn BillingStore>, batch_size: i64) -> Self {
        Self { store, batch_size }
    }

    /// Process all overdue unpaid invoices in pages, returning how many
    /// were marked delinquency-processed.
    ///
    /// The cursor is the query predicate itself: mutated rows drop out of
    /// the filter, and the offset advances only past rows deliberately
    /// left matching it.
    #[instrument(skip(self))]
    pub async fn run(&self, today: NaiveDate) -> Result<u32, AppError> {
        info!(%today, "Starting delinquency processing");

        let mut processed: u32 = 0;
        let mut skipped: i64 = 0;
        loop {
            let page = self
                .store
                .overdue_unprocessed(today, self.batch_size, skipped)
                .await?;
            let page_len = page.len();
            info!(count = page_len, "Processing overdue unpaid invoices");

            for invoice in page {
                // Re-read at the point of mutation: a payment may have been
                // recorded since the page was fetched.
                let Some(mut fresh) = self.store.invoice_by_id(invoice.invoice_id).await? else {
                    continue;
                };
                if fresh.is_paid {
                    // Paid in the meantime. Leave it unprocessed for the
                    // generator's normal review.
                    continue;
                }

                let Some(mut member) = self.store.member_by_id(fresh.member_id).await? else {
                    warn!(
                        invoice_id = %fresh.invoice_id,
                        member_id = %fresh.member_id,
                        "Overdue invoice references a missing member; skipping"
                    );
                    skipped += 1;
                    continue;
                };

                fresh.delinquency_processed = true;
                member.plan_id = None;
                member.pending_plan_id = None;
                self.store
                    .commit_billing_mutation(&member, Some(&fresh), None)
                    .await?;

                info!(
                    invoice_id = %fresh.invoice_id,
                    member_id = %member.member_id,
                    due_date = %fresh.due_date,
                    "Delinquency processed; member plan revoked"
                );
                processed += 1;
            }

            if (page_len as i64) < self.batch_size {
                break;
            }
        }

        info!(processed, "Finished delinquency processing");
        Ok(processed)
    }
}
