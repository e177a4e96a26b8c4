//! HTTP surface: customer commands and administrative triggers.
//!
//! Authentication happens upstream; the gateway forwards the caller's
//! identity in headers, never in request parameters.

mod admin;
mod customer;
mod identity;

use axum::routing::{get, post};
use axum::Router;

use crate::startup::AppState;

pub use identity::{AdminId, MemberId};

pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/api/customer/plan-selection", post(customer::select_plan))
        .route("/api/customer/invoices", get(customer::list_my_invoices))
        .route(
            "/api/admin/billing/force-verification",
            post(admin::force_verification),
        )
        .route(
            "/api/admin/invoices/:invoice_id/payment",
            post(admin::record_payment),
        )
        .route("/api/admin/task-runs", get(admin::task_run_history))
        .route(
            "/api/admin/invoices/overdue-count",
            get(admin::overdue_count),
        )
}
