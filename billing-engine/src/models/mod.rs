//! Domain models for the billing engine.

mod invoice;
mod member;
mod plan;
mod task_run;

pub use invoice::{Invoice, MAX_NOTES_LEN};
pub use member::Member;
pub use plan::Plan;
pub use task_run::{TaskKind, TaskRun, MAX_ERROR_MESSAGE_LEN};
