//! Administrative handlers.

use axum::extract::{Path, Query, State};
use axum::{Json, response::IntoResponse};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use service_core::error::AppError;
use uuid::Uuid;

use crate::models::{TaskKind, TaskRun};
use crate::routes::AdminId;
use crate::startup::AppState;
use crate::store::{InvoiceStore, TaskRunStore};

/// `POST /api/admin/billing/force-verification`
///
/// Guarantees one additional billing cycle execution; the outcome lands
/// in the task execution log.
pub async fn force_verification(
    State(state): State<AppState>,
    AdminId(admin_id): AdminId,
) -> Result<impl IntoResponse, AppError> {
    tracing::info!(admin = %admin_id, "Forced billing re-verification requested");
    state.scheduler.force_run(Utc::now()).await?;
    Ok(Json(json!({ "status": "executed" })))
}

/// `POST /api/admin/invoices/:invoice_id/payment`
pub async fn record_payment(
    State(state): State<AppState>,
    AdminId(admin_id): AdminId,
    Path(invoice_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let invoice = state.payments.record_payment(invoice_id, &admin_id).await?;
    Ok(Json(invoice))
}

#[derive(Debug, Deserialize)]
pub struct TaskRunHistoryParams {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct TaskRunResponse {
    pub run_id: Uuid,
    pub task_kind: String,
    pub succeeded: bool,
    pub error_message: Option<String>,
    pub executed_at: chrono::DateTime<Utc>,
    pub execution_day: chrono::NaiveDate,
}

impl From<TaskRun> for TaskRunResponse {
    fn from(run: TaskRun) -> Self {
        Self {
            run_id: run.run_id,
            task_kind: run.task_kind,
            succeeded: run.succeeded,
            error_message: run.error_message,
            executed_at: run.executed_at,
            execution_day: run.execution_day,
        }
    }
}

/// `GET /api/admin/task-runs` — recent execution-log rows, newest first.
pub async fn task_run_history(
    State(state): State<AppState>,
    AdminId(_admin_id): AdminId,
    Query(params): Query<TaskRunHistoryParams>,
) -> Result<impl IntoResponse, AppError> {
    let limit = params.limit.unwrap_or(20).clamp(1, 200);
    let runs = state
        .store
        .recent_runs(TaskKind::MonthlyPlanVerification, limit)
        .await?;
    let response: Vec<TaskRunResponse> = runs.into_iter().map(TaskRunResponse::from).collect();
    Ok(Json(response))
}

/// `GET /api/admin/invoices/overdue-count`
pub async fn overdue_count(
    State(state): State<AppState>,
    AdminId(_admin_id): AdminId,
) -> Result<impl IntoResponse, AppError> {
    let today = Utc::now()
        .with_timezone(&state.config.billing_zone())
        .date_naive();
    let count = state.store.count_overdue_unpaid(today).await?;
    Ok(Json(json!({ "overdue_unpaid_invoices": count })))
}
