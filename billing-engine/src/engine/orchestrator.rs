//! Sequencing of the two billing-cycle phases.

use chrono::NaiveDate;
use serde::Serialize;
use service_core::error::AppError;
use std::sync::Arc;
use tracing::{info, instrument};

use crate::engine::{DelinquencyProcessor, InvoiceGenerator};
use crate::services::metrics::{record_delinquencies_processed, record_invoices_generated};
use crate::store::BillingStore;

/// Outcome of one full billing cycle.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct CycleReport {
    pub delinquencies_processed: u32,
    pub invoices_generated: u32,
}

/// Runs delinquency processing strictly before invoice generation.
///
/// The ordering is a hard requirement: a member whose invoice just became
/// overdue must lose the plan before the generator would otherwise roll
/// them into a new period. An error in either phase aborts the rest of
/// the cycle; per-invoice work already committed stays committed.
pub struct BillingCycleOrchestrator {
    delinquency: DelinquencyProcessor,
    generator: InvoiceGenerator,
}

impl BillingCycleOrchestrator {
    pub fn new(store: Arc<dyn BillingStore>, batch_size: i64) -> Self {
        Self {
            delinquency: DelinquencyProcessor::new(store.clone(), batch_size),
            generator: InvoiceGenerator::new(store, batch_size),
        }
    }

    #[instrument(skip(self))]
    pub async fn run_cycle(&self, today: NaiveDate) -> Result<CycleReport, AppError> {
        let delinquencies_processed = self.delinquency.run(today).await?;
        let invoices_generated = self.generator.run(today).await?;

        record_delinquencies_processed(delinquencies_processed as u64);
        record_invoices_generated(invoices_generated as u64);

        let report = CycleReport {
            delinquencies_processed,
            invoices_generated,
        };
        info!(
            delinquencies = report.delinquencies_processed,
            generated = report.invoices_generated,
            "Billing cycle completed"
        );
        Ok(report)
    }
}
