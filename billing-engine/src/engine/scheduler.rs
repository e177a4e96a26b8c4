//! Fixed-interval scheduler with a once-per-day idempotency guard.

use chrono::{DateTime, FixedOffset, Utc};
use service_core::error::AppError;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, instrument};

use crate::engine::BillingCycleOrchestrator;
use crate::models::{TaskKind, TaskRun};
use crate::services::metrics::{record_cycle_run, record_error};
use crate::store::{BillingStore, TaskRunStore};

const FORCED_RERUN_NOTE: &str =
    "Succeeded, but flipped to not-succeeded to allow a forced re-verification";

/// Drives the billing cycle on a timer.
///
/// At most one successful cycle per calendar day (in the billing
/// timezone); every execution is recorded in the task execution log, and
/// cycle errors are recorded rather than propagated.
pub struct JobScheduler {
    store: Arc<dyn BillingStore>,
    orchestrator: BillingCycleOrchestrator,
    billing_zone: FixedOffset,
    tick_interval: Duration,
}

impl JobScheduler {
    pub fn new(
        store: Arc<dyn BillingStore>,
        orchestrator: BillingCycleOrchestrator,
        billing_zone: FixedOffset,
        tick_interval: Duration,
    ) -> Self {
        Self {
            store,
            orchestrator,
            billing_zone,
            tick_interval,
        }
    }

    /// Run the fixed-interval loop until the task is dropped.
    pub async fn run(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            interval_secs = self.tick_interval.as_secs(),
            "Billing verification scheduler started"
        );
        loop {
            ticker.tick().await;
            self.run_once(Utc::now()).await;
        }
    }

    /// One scheduler tick at `now`: skip when today already has a
    /// successful run, otherwise execute the cycle and record the result.
    ///
    /// Cycle errors are swallowed here; the execution log is the only
    /// signal.
    #[instrument(skip(self))]
    pub async fn run_once(&self, now: DateTime<Utc>) {
        let today = now.with_timezone(&self.billing_zone).date_naive();

        let already_ran = match self
            .store
            .succeeded_on_day(TaskKind::MonthlyPlanVerification, today)
            .await
        {
            Ok(v) => v,
            Err(e) => {
                record_error("database", "daily_guard");
                error!(error = %e, "Could not consult the execution log; skipping tick");
                return;
            }
        };
        if already_ran {
            info!(%today, "Billing verification already succeeded today; skipping");
            return;
        }

        info!(%today, "Starting billing verification cycle");
        let mut run = TaskRun::new(TaskKind::MonthlyPlanVerification, now, today);
        match self.orchestrator.run_cycle(today).await {
            Ok(report) => {
                run.succeeded = true;
                record_cycle_run("scheduled", "success");
                info!(
                    delinquencies = report.delinquencies_processed,
                    generated = report.invoices_generated,
                    "Billing verification cycle succeeded"
                );
            }
            Err(e) => {
                run.set_error_message(&e.to_string());
                record_cycle_run("scheduled", "failure");
                record_error("cycle", "billing_verification");
                error!(error = %e, "Billing verification cycle failed");
            }
        }

        if let Err(e) = self.store.save_run(&run).await {
            record_error("database", "save_run");
            error!(error = %e, "Failed to record task execution");
        }
    }

    /// Administrative: guarantee one additional cycle execution.
    ///
    /// Flips the most recent successful run to not-succeeded so the daily
    /// guard no longer matches, then runs a normal tick. Each call causes
    /// at most one additional execution.
    #[instrument(skip(self))]
    pub async fn force_run(&self, now: DateTime<Utc>) -> Result<(), AppError> {
        if let Some(mut last) = self
            .store
            .last_successful(TaskKind::MonthlyPlanVerification)
            .await?
        {
            last.succeeded = false;
            last.set_error_message(FORCED_RERUN_NOTE);
            self.store.save_run(&last).await?;
            info!(run_id = %last.run_id, "Flipped last successful run for forced re-verification");
        }

        self.run_once(now).await;
        Ok(())
    }
}
