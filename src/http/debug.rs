//! Diagnostic endpoint served on the debug port.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use tower_http::trace::TraceLayer;

#[derive(Debug, Serialize)]
pub struct VersionInfo {
    pub name: &'static str,
    pub version: &'static str,
}

#[derive(Clone, Default)]
pub struct DebugState {
    pub metrics: Option<PrometheusHandle>,
}

pub fn router(state: DebugState) -> Router {
    Router::new()
        .route("/debug/version", get(version))
        .route("/debug/health", get(health))
        .route("/metrics", get(render_metrics))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn version() -> Json<VersionInfo> {
    Json(VersionInfo { name: env!("CARGO_PKG_NAME"), version: env!("CARGO_PKG_VERSION") })
}

async fn health() -> &'static str {
    "ok"
}

async fn render_metrics(State(state): State<DebugState>) -> String {
    state.metrics.as_ref().map(PrometheusHandle::render).unwrap_or_default()
}
