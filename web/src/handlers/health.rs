//! Liveness endpoint for load balancers and container health checks.

use axum::http::StatusCode;

/// Returns 200 OK while the process is serving requests.
///
/// Does not touch Postgres or the broker.
///
/// ```text
/// GET /health
/// ```
#[allow(clippy::unused_async)]
pub async fn health_check() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}
