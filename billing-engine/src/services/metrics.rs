//! Prometheus metrics for the billing engine.

use once_cell::sync::Lazy;
use prometheus::{
    histogram_opts, opts, register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec,
    IntCounterVec, TextEncoder,
};
use std::sync::OnceLock;

/// Database query duration histogram
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        histogram_opts!(
            "billing_db_query_duration_seconds",
            "Database query duration"
        ),
        &["operation"]
    )
    .expect("Failed to register DB_QUERY_DURATION")
});

/// Billing cycle runs counter
pub static CYCLE_RUNS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Delinquencies processed counter
pub static DELINQUENCIES_PROCESSED_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Invoices generated counter
pub static INVOICES_GENERATED_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Plan selections counter
pub static PLAN_SELECTIONS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Payments recorded counter
pub static PAYMENTS_RECORDED_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Error counter for alerting
pub static ERRORS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Initialize all metrics. Call once at startup.
pub fn init_metrics() {
    CYCLE_RUNS_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!(
                "billing_cycle_runs_total",
                "Total billing verification cycle runs by trigger and status"
            ),
            &["trigger", "status"]
        )
        .expect("Failed to register CYCLE_RUNS_TOTAL")
    });

    DELINQUENCIES_PROCESSED_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!(
                "billing_delinquencies_processed_total",
                "Total invoices closed by delinquency processing"
            ),
            &["status"]
        )
        .expect("Failed to register DELINQUENCIES_PROCESSED_TOTAL")
    });

    INVOICES_GENERATED_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!(
                "billing_invoices_generated_total",
                "Total successor invoices created by the generator"
            ),
            &["status"]
        )
        .expect("Failed to register INVOICES_GENERATED_TOTAL")
    });

    PLAN_SELECTIONS_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!(
                "billing_plan_selections_total",
                "Total member plan selections by outcome"
            ),
            &["outcome"]
        )
        .expect("Failed to register PLAN_SELECTIONS_TOTAL")
    });

    PAYMENTS_RECORDED_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!(
                "billing_payments_recorded_total",
                "Total payments recorded by administrators"
            ),
            &["status"]
        )
        .expect("Failed to register PAYMENTS_RECORDED_TOTAL")
    });

    ERRORS_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!("billing_errors_total", "Total errors by type for alerting"),
            &["error_type", "operation"]
        )
        .expect("Failed to register ERRORS_TOTAL")
    });

    // Force initialization of lazy statics
    let _ = &*DB_QUERY_DURATION;
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .expect("Failed to encode metrics");
    String::from_utf8(buffer).expect("Failed to convert metrics to string")
}

/// Record a cycle run.
pub fn record_cycle_run(trigger: &str, status: &str) {
    if let Some(counter) = CYCLE_RUNS_TOTAL.get() {
        counter.with_label_values(&[trigger, status]).inc();
    }
}

/// Record processed delinquencies.
pub fn record_delinquencies_processed(count: u64) {
    if let Some(counter) = DELINQUENCIES_PROCESSED_TOTAL.get() {
        counter.with_label_values(&["processed"]).inc_by(count);
    }
}

/// Record generated invoices.
pub fn record_invoices_generated(count: u64) {
    if let Some(counter) = INVOICES_GENERATED_TOTAL.get() {
        counter.with_label_values(&["generated"]).inc_by(count);
    }
}

/// Record a plan selection outcome.
pub fn record_plan_selection(outcome: &str) {
    if let Some(counter) = PLAN_SELECTIONS_TOTAL.get() {
        counter.with_label_values(&[outcome]).inc();
    }
}

/// Record a recorded payment.
pub fn record_payment() {
    if let Some(counter) = PAYMENTS_RECORDED_TOTAL.get() {
        counter.with_label_values(&["recorded"]).inc();
    }
}

/// Record an error.
pub fn record_error(error_type: &str, operation: &str) {
    if let Some(counter) = ERRORS_TOTAL.get() {
        counter.with_label_values(&[error_type, operation]).inc();
    }
}
