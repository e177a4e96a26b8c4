//! Application startup and lifecycle management.

use axum::{
    extract::State, http::StatusCode, middleware, response::IntoResponse, routing::get, Json,
    Router,
};
use serde_json::json;
use service_core::error::AppError;
use service_core::middleware::metrics::metrics_middleware;
use service_core::middleware::tracing::request_id_middleware;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::config::BillingConfig;
use crate::engine::{BillingCycleOrchestrator, JobScheduler};
use crate::routes;
use crate::services::{get_metrics, init_metrics, PaymentRecorder, PlanSelectionHandler};
use crate::store::{BillingStore, Database};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: BillingConfig,
    pub store: Arc<dyn BillingStore>,
    pub scheduler: Arc<JobScheduler>,
    pub plan_selection: Arc<PlanSelectionHandler>,
    pub payments: Arc<PaymentRecorder>,
}

/// Health check endpoint for Docker/K8s liveness probes.
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.health_check().await {
        Ok(_) => {
            tracing::debug!("Health check passed");
            (
                StatusCode::OK,
                Json(json!({
                    "status": "ok",
                    "service": "billing-engine",
                    "version": env!("CARGO_PKG_VERSION")
                })),
            )
        }
        Err(e) => {
            tracing::warn!(error = %e, "Health check failed - database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unhealthy",
                    "service": "billing-engine",
                    "error": e.to_string()
                })),
            )
        }
    }
}

/// Readiness check endpoint for K8s readiness probes.
async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.health_check().await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

/// Metrics endpoint for Prometheus scraping.
async fn metrics_handler() -> impl IntoResponse {
    let metrics = get_metrics();
    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        metrics,
    )
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application against PostgreSQL, running migrations.
    pub async fn build(config: BillingConfig) -> Result<Self, AppError> {
        init_metrics();

        let db = Database::new(
            &config.database.url,
            config.database.max_connections,
            config.database.min_connections,
        )
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to connect to PostgreSQL");
            e
        })?;

        db.run_migrations().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to run migrations");
            e
        })?;

        Self::with_store(config, Arc::new(db)).await
    }

    /// Wire the application around an already-built store.
    pub async fn with_store(
        config: BillingConfig,
        store: Arc<dyn BillingStore>,
    ) -> Result<Self, AppError> {
        let billing_zone = config.billing_zone();

        let orchestrator =
            BillingCycleOrchestrator::new(store.clone(), config.scheduler.batch_size);
        let scheduler = Arc::new(JobScheduler::new(
            store.clone(),
            orchestrator,
            billing_zone,
            Duration::from_secs(config.scheduler.tick_interval_secs),
        ));
        let plan_selection = Arc::new(PlanSelectionHandler::new(store.clone(), billing_zone));
        let payments = Arc::new(PaymentRecorder::new(store.clone(), billing_zone));

        let state = AppState {
            config: config.clone(),
            store,
            scheduler,
            plan_selection,
            payments,
        };

        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!(error = %e, addr = %addr, "Failed to bind HTTP listener");
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!(port = port, "Billing engine listener bound");

        Ok(Self {
            port,
            listener,
            state,
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Get a reference to the shared state.
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Run the scheduler and the HTTP server until stopped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let scheduler = self.state.scheduler.clone();
        tokio::spawn(async move {
            scheduler.run().await;
        });

        let router = Router::new()
            .route("/health", get(health_check))
            .route("/ready", get(readiness_check))
            .route("/metrics", get(metrics_handler))
            .merge(routes::api_router())
            .layer(TraceLayer::new_for_http())
            .layer(middleware::from_fn(metrics_middleware))
            .layer(middleware::from_fn(request_id_middleware))
            .with_state(self.state);

        tracing::info!(
            service = "billing-engine",
            version = env!("CARGO_PKG_VERSION"),
            "Service ready to accept connections"
        );

        axum::serve(self.listener, router).await
    }
}
