//! HTTP surface
//!
//! Application router: `GET /` renders the current pending-pod list,
//! `GET /check` is the liveness probe, everything else is 404. The metrics
//! scrape endpoint lives on its own router, bound to a separate port.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::get,
    Router,
};
use tower_http::trace::TraceLayer;

use crate::client::PendingPods;
use crate::telemetry::MonitorMetrics;

const PODS_TEMPLATE: &str = include_str!("../../templates/pods.html");
const TEMPLATE_NAME: &str = "pods";

/// Application state
pub struct AppState {
    pods: Arc<dyn PendingPods>,
    metrics: Arc<MonitorMetrics>,
    templates: handlebars::Handlebars<'static>,
}

impl AppState {
    pub fn new(
        pods: Arc<dyn PendingPods>,
        metrics: Arc<MonitorMetrics>,
    ) -> Result<Self, handlebars::TemplateError> {
        let mut templates = handlebars::Handlebars::new();
        templates.register_template_string(TEMPLATE_NAME, PODS_TEMPLATE)?;
        Ok(Self {
            pods,
            metrics,
            templates,
        })
    }
}

/// Create the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(render_pending))
        .route("/check", get(liveness))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Create the metrics scrape router (separate listener)
pub fn metrics_router(metrics: Arc<MonitorMetrics>) -> Router {
    Router::new()
        .route("/metrics", get(scrape))
        .with_state(metrics)
}

/// Render the pending-pod list
async fn render_pending(
    State(state): State<Arc<AppState>>,
) -> Result<Html<String>, (StatusCode, &'static str)> {
    let pods = state.pods.pending_pods().await.map_err(|error| {
        tracing::error!(%error, "error fetching pending pods");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Error fetching pending pods",
        )
    })?;

    state.metrics.set_pending(pods.len());

    let html = state
        .templates
        .render(
            TEMPLATE_NAME,
            &serde_json::json!({ "pods": pods, "count": pods.len() }),
        )
        .map_err(|error| {
            tracing::error!(%error, "error rendering template");
            (StatusCode::INTERNAL_SERVER_ERROR, "Error rendering template")
        })?;

    Ok(Html(html))
}

/// Liveness probe: fixed body, always 200
async fn liveness() -> impl IntoResponse {
    (StatusCode::OK, "200 OK")
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "404 page not found")
}

/// Prometheus text exposition
async fn scrape(State(metrics): State<Arc<MonitorMetrics>>) -> Result<String, StatusCode> {
    metrics.encode_text().map_err(|error| {
        tracing::error!(%error, "metrics encoding failed");
        StatusCode::INTERNAL_SERVER_ERROR
    })
}
