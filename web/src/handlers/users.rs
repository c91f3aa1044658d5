//! User registration and driver location updates.

use crate::error::AppError;
use crate::extractors::{ApiJson, ApiPath};
use crate::state::AppState;
use axum::{Json, extract::State, http::StatusCode};
use ridehail_core::geo::GeoPoint;
use ridehail_core::model::{NewUser, User, UserId};

/// Register a driver or rider.
///
/// ```text
/// POST /users/register
/// {"name": "Ada", "role": "driver", "latitude": 1.0, "longitude": 1.0}
/// ```
///
/// # Errors
///
/// 422 for an unknown role or out-of-range coordinates.
pub async fn register_user(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<NewUser>,
) -> Result<(StatusCode, Json<User>), AppError> {
    let user = state.dispatcher.register_user(input).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// Move a driver and publish the new position.
///
/// ```text
/// POST /drivers/:id/location
/// {"latitude": 5.0, "longitude": 5.0}
/// ```
///
/// # Errors
///
/// 404 for an unknown id, 422 if the user is not a driver or the
/// coordinates are out of range.
pub async fn update_driver_location(
    State(state): State<AppState>,
    ApiPath(driver_id): ApiPath<i64>,
    ApiJson(position): ApiJson<GeoPoint>,
) -> Result<Json<User>, AppError> {
    let user = state
        .dispatcher
        .update_driver_location(UserId::new(driver_id), position)
        .await?;
    Ok(Json(user))
}
