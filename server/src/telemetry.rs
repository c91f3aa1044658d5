//! Tracing subscriber setup and the Prometheus scrape router.

use axum::{Router, extract::State, http::StatusCode, routing::get};
use ridehail_runtime::metrics::MetricsServer;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info,ridehail=debug,sqlx=warn";

/// Install the global fmt subscriber, filtered by `RUST_LOG`.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Router serving `GET /metrics` from `metrics`.
pub fn metrics_router(metrics: Arc<MetricsServer>) -> Router {
    Router::new()
        .route("/metrics", get(render_metrics))
        .with_state(metrics)
}

#[allow(clippy::unused_async)]
async fn render_metrics(State(metrics): State<Arc<MetricsServer>>) -> (StatusCode, String) {
    match metrics.render() {
        Some(body) => (StatusCode::OK, body),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            "metrics recorder not installed".to_string(),
        ),
    }
}
