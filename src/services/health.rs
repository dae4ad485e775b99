//! Health and alert HTTP API
//!
//! Exposes the health report, Prometheus metrics and the alert store
//! (query and acknowledgement) for dashboards and scrapers.

use super::exposition::{self, HealthStatus};
use crate::domain::{MessageFilter, Severity};
use crate::supervisor::{DeviceRegistry, Supervisor};
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

/// Shared state for the HTTP API
pub struct ApiState {
    pub registry: Arc<DeviceRegistry>,
    /// Present when a supervisor loop drives the registry
    pub supervisor: Option<Arc<Supervisor>>,
}

impl ApiState {
    pub fn new(registry: Arc<DeviceRegistry>) -> Self {
        Self {
            registry,
            supervisor: None,
        }
    }

    pub fn with_supervisor(mut self, supervisor: Arc<Supervisor>) -> Self {
        self.supervisor = Some(supervisor);
        self
    }

    async fn poller_stats(&self) -> Option<crate::supervisor::PollerStats> {
        match self.supervisor {
            Some(ref supervisor) => Some(supervisor.stats().await),
            None => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct AckAllParams {
    severity: Option<Severity>,
}

/// Build the API router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/healthz", get(liveness_handler))
        .route("/metrics", get(metrics_handler))
        .route("/devices", get(devices_handler))
        .route("/devices/offline", get(offline_handler))
        .route("/alerts", get(alerts_handler))
        .route("/alerts/loki", get(loki_handler))
        .route("/alerts/ack-all", post(ack_all_handler))
        .route("/alerts/:id/ack", post(ack_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health API server
pub struct HealthServer {
    state: Arc<ApiState>,
    port: u16,
}

impl HealthServer {
    pub fn new(state: Arc<ApiState>, port: u16) -> Self {
        Self { state, port }
    }

    /// Serve until `shutdown` resolves
    pub async fn run<F>(&self, shutdown: F) -> crate::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = router(Arc::clone(&self.state));

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        info!("Starting health server on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| crate::DevwatchError::Internal(format!("Health server error: {}", e)))?;

        Ok(())
    }
}

/// Full health report
async fn health_handler(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    let report = exposition::health_report(&state.registry, state.poller_stats().await).await;
    let status_code = match report.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status_code, Json(report))
}

/// Liveness probe - is the process alive?
async fn liveness_handler() -> impl IntoResponse {
    StatusCode::OK
}

/// Prometheus metrics endpoint
async fn metrics_handler(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    let stats = state.poller_stats().await;
    let body = exposition::prometheus_text(&state.registry, stats.as_ref()).await;
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}

async fn devices_handler(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    Json(state.registry.summary().await)
}

async fn offline_handler(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    Json(state.registry.offline().await)
}

async fn alerts_handler(
    State(state): State<Arc<ApiState>>,
    Query(filter): Query<MessageFilter>,
) -> impl IntoResponse {
    Json(state.registry.alerts().query(&filter).await)
}

async fn loki_handler(
    State(state): State<Arc<ApiState>>,
    Query(filter): Query<MessageFilter>,
) -> impl IntoResponse {
    let body = exposition::loki_lines(state.registry.alerts(), &filter).await;
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/x-ndjson")],
        body,
    )
}

async fn ack_handler(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    if state.registry.alerts().acknowledge(&id).await {
        (StatusCode::OK, Json(json!({ "id": id, "acknowledged": true })))
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(json!({ "id": id, "acknowledged": false, "error": "message not found" })),
        )
    }
}

async fn ack_all_handler(
    State(state): State<Arc<ApiState>>,
    Query(params): Query<AckAllParams>,
) -> impl IntoResponse {
    let count = state.registry.alerts().acknowledge_all(params.severity).await;
    Json(json!({ "acknowledged": count }))
}
