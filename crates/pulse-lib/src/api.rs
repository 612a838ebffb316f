//! HTTP query surface over the latest published results
//!
//! Handlers only read: they clone the current results `Arc` and serialize it,
//! so a slow client never blocks the cycle task.

use crate::health::{ComponentStatus, HealthRegistry, HealthResponse};
use crate::orchestrator::SharedState;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info};

/// Service name reported by `/health`
pub const SERVICE_NAME: &str = "cloudpulse-ml";

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub health_registry: HealthRegistry,
    pub shared: SharedState,
}

impl AppState {
    pub fn new(health_registry: HealthRegistry, shared: SharedState) -> Self {
        Self {
            health_registry,
            shared,
        }
    }
}

#[derive(Serialize)]
struct ServiceHealth {
    service: &'static str,
    #[serde(flatten)]
    health: HealthResponse,
}

/// Liveness with component detail
///
/// Degraded upstreams still answer 200 since the last results stay servable;
/// 503 means the service itself stopped forecasting.
async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (
        status_code,
        Json(ServiceHealth {
            service: SERVICE_NAME,
            health,
        }),
    )
}

/// Readiness check response - returns 200 if ready, 503 if not ready
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

async fn forecasts(State(state): State<Arc<AppState>>) -> Json<Value> {
    let latest = state.shared.latest().await;

    match &latest.forecasts {
        Some(forecast) => Json(json!({
            "rows": forecast.rows,
            "backends": forecast.backends,
            "generated_at": latest.published_at,
        })),
        None => Json(json!({})),
    }
}

async fn anomalies(State(state): State<Arc<AppState>>) -> Json<Value> {
    let latest = state.shared.latest().await;
    Json(json!(latest.anomalies))
}

/// Most recent cached snapshot set as rows, `{}` before the first cycle
async fn latest_metrics(State(state): State<Arc<AppState>>) -> Json<Value> {
    match state.shared.latest_snapshots().await {
        Some(rows) => Json(json!(rows)),
        None => Json(json!({})),
    }
}

/// Prometheus metrics endpoint
async fn prometheus_metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!(error = %e, "Failed to encode Prometheus metrics");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            Vec::new(),
        );
    }

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        buffer,
    )
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/readyz", get(readyz))
        .route("/api/forecasts", get(forecasts))
        .route("/api/anomalies", get(anomalies))
        .route("/api/metrics", get(latest_metrics))
        .route("/metrics", get(prometheus_metrics))
        .with_state(state)
}

/// Start the API server
pub async fn serve(host: &str, port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("{}:{}", host, port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
