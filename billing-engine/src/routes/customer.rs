//! Member-facing handlers.

use axum::extract::State;
use axum::{Json, response::IntoResponse};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use uuid::Uuid;

use crate::models::Invoice;
use crate::routes::MemberId;
use crate::startup::AppState;
use crate::store::InvoiceStore;

#[derive(Debug, Deserialize)]
pub struct SelectPlanRequest {
    pub plan_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct SelectPlanResponse {
    pub outcome: crate::services::PlanSelectionOutcome,
}

/// `POST /api/customer/plan-selection`
pub async fn select_plan(
    State(state): State<AppState>,
    MemberId(member_id): MemberId,
    Json(request): Json<SelectPlanRequest>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = state
        .plan_selection
        .select_plan(member_id, request.plan_id)
        .await?;
    Ok(Json(SelectPlanResponse { outcome }))
}

/// Customer view of an invoice.
#[derive(Debug, Serialize)]
pub struct InvoiceResponse {
    pub invoice_id: Uuid,
    /// "YYYY-MM"
    pub reference_month: String,
    pub amount_cents: i64,
    pub due_date: NaiveDate,
    pub payment_date: Option<NaiveDate>,
    pub is_paid: bool,
}

impl From<Invoice> for InvoiceResponse {
    fn from(invoice: Invoice) -> Self {
        Self {
            invoice_id: invoice.invoice_id,
            reference_month: format!(
                "{:04}-{:02}",
                invoice.reference_month.year(),
                invoice.reference_month.month()
            ),
            amount_cents: invoice.amount_cents,
            due_date: invoice.due_date,
            payment_date: invoice.payment_date,
            is_paid: invoice.is_paid,
        }
    }
}

/// `GET /api/customer/invoices` — the caller's invoices, newest first.
pub async fn list_my_invoices(
    State(state): State<AppState>,
    MemberId(member_id): MemberId,
) -> Result<impl IntoResponse, AppError> {
    let invoices = state.store.invoices_for_member(member_id).await?;
    let response: Vec<InvoiceResponse> = invoices.into_iter().map(InvoiceResponse::from).collect();
    Ok(Json(response))
}
