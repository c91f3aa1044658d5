//! Route table.

use crate::handlers::{health, rides, users};
use crate::state::AppState;
use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

/// Build the application router with request tracing.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/users/register", post(users::register_user))
        .route("/drivers/:id/location", post(users::update_driver_location))
        .route("/rides/request", post(rides::request_ride))
        .route("/rides/find-driver/:ride_request_id", get(rides::find_driver))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
