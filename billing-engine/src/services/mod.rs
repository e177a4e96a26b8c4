//! Command services for the billing engine.

pub mod metrics;
pub mod payment;
pub mod plan_selection;

pub use metrics::{get_metrics, init_metrics};
pub use payment::PaymentRecorder;
pub use plan_selection::{PlanSelectionHandler, PlanSelectionOutcome};
