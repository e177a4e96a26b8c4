//! Task execution log model.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Maximum length of a recorded error message.
pub const MAX_ERROR_MESSAGE_LEN: usize = 1000;

/// Kind of scheduled task recorded in the execution log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    MonthlyPlanVerification,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::MonthlyPlanVerification => "monthly_plan_verification",
        }
    }
}

/// One scheduler tick that actually executed.
///
/// Used for idempotency and observability only; a task run never mutates
/// billing data.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TaskRun {
    pub run_id: Uuid,
    pub task_kind: String,
    pub succeeded: bool,
    pub error_message: Option<String>,
    pub executed_at: DateTime<Utc>,
    /// Calendar day of execution in the billing timezone.
    pub execution_day: NaiveDate,
}

impl TaskRun {
    pub fn new(kind: TaskKind, executed_at: DateTime<Utc>, execution_day: NaiveDate) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            task_kind: kind.as_str().to_string(),
            succeeded: false,
            error_message: None,
            executed_at,
            execution_day,
        }
    }

    /// Record an error message, truncated to the column limit.
    pub fn set_error_message(&mut self, message: &str) {
        let truncated = if message.chars().count() > MAX_ERROR_MESSAGE_LEN {
            message.chars().take(MAX_ERROR_MESSAGE_LEN).collect()
        } else {
            message.to_string()
        };
        self.error_message = Some(truncated);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_message_is_truncated() {
        let mut run = TaskRun::new(
            TaskKind::MonthlyPlanVerification,
            Utc::now(),
            NaiveDate::from_ymd_opt(2025, 3, 15).unwrap(),
        );

        run.set_error_message(&"e".repeat(2000));
        assert_eq!(
            run.error_message.as_ref().unwrap().chars().count(),
            MAX_ERROR_MESSAGE_LEN
        );

        run.set_error_message("short");
        assert_eq!(run.error_message.as_deref(), Some("short"));
    }
}
