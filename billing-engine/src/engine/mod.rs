//! The billing-cycle engine: delinquency processing, invoice generation,
//! the orchestrator that sequences them, and the scheduler that drives it.

mod delinquency;
mod generator;
mod orchestrator;
mod scheduler;

pub use delinquency::DelinquencyProcessor;
pub use generator::InvoiceGenerator;
pub use orchestrator::{BillingCycleOrchestrator, CycleReport};
pub use scheduler::JobScheduler;
