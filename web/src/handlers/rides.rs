//! Ride requests and driver lookup.

use crate::error::AppError;
use crate::extractors::{ApiJson, ApiPath};
use crate::state::AppState;
use axum::{Json, extract::State, http::StatusCode};
use ridehail_core::model::{NewRideRequest, Ride, RideRequestId, User};

/// Request a ride and run it to completion.
///
/// ```text
/// POST /rides/request
/// {"rider_id": 1, "initial_latitude": 0.0, "initial_longitude": 0.0,
///  "final_latitude": 5.0, "final_longitude": 5.0}
/// ```
///
/// Responds with the completed ride.
///
/// # Errors
///
/// 404 when the rider is unknown or no driver is registered, 422 when the
/// requester is not a rider or a coordinate is out of range.
pub async fn request_ride(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<NewRideRequest>,
) -> Result<(StatusCode, Json<Ride>), AppError> {
    let ride = state.dispatcher.request_ride(request).await?;
    Ok((StatusCode::CREATED, Json(ride)))
}

/// Nearest driver to a stored request's pickup point.
///
/// ```text
/// GET /rides/find-driver/:ride_request_id
/// ```
///
/// # Errors
///
/// 404 when the request is unknown or no driver is registered.
pub async fn find_driver(
    State(state): State<AppState>,
    ApiPath(ride_request_id): ApiPath<i64>,
) -> Result<Json<User>, AppError> {
    let driver = state
        .dispatcher
        .find_nearest_driver_for_request(RideRequestId::new(ride_request_id))
        .await?;
    Ok(Json(driver))
}
