//! Entity store trait for users, ride requests, and rides.
//!
//! The store exclusively owns the persisted copies of every entity. Callers
//! receive owned values and write each mutation back explicitly; nothing is
//! shared by reference between a store and its callers.
//!
//! # Consistency
//!
//! Every mutation is atomic for the single entity it touches. There is no
//! cross-entity transaction: a caller running several operations in sequence
//! can observe (and leave behind) intermediate states.
//!
//! # Implementations
//!
//! - `PostgresEntityStore` (in `ridehail-postgres`): production implementation
//! - `InMemoryEntityStore` (in `ridehail-testing`): fast, deterministic testing

use crate::geo::GeoPoint;
use crate::model::{
    NewRide, NewRideRequest, NewUser, Ride, RideId, RideRequest, RideRequestId, RideStatus, User,
    UserId,
};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Boxed future returned by [`EntityStore`] methods.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Errors returned by entity store operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    /// No entity of this kind has the given id.
    #[error("{entity} {id} not found")]
    NotFound {
        /// Entity kind, e.g. `"user"`.
        entity: &'static str,
        /// The id that was looked up.
        id: i64,
    },

    /// The driver search ran over an empty set of drivers.
    #[error("no available drivers")]
    NoAvailableDriver,

    /// The requested status change would move a ride backwards or repeat a state.
    #[error("ride {id} cannot move from {from} to {to}")]
    InvalidTransition {
        /// Ride being updated.
        id: RideId,
        /// Current status.
        from: RideStatus,
        /// Requested status.
        to: RideStatus,
    },

    /// The backing database failed or returned malformed data.
    #[error("Database error: {0}")]
    Database(String),
}

impl StoreError {
    /// `NotFound` for a user id.
    #[must_use]
    pub const fn user_not_found(id: UserId) -> Self {
        Self::NotFound {
            entity: "user",
            id: id.get(),
        }
    }

    /// `NotFound` for a ride request id.
    #[must_use]
    pub const fn ride_request_not_found(id: RideRequestId) -> Self {
        Self::NotFound {
            entity: "ride request",
            id: id.get(),
        }
    }

    /// `NotFound` for a ride id.
    #[must_use]
    pub const fn ride_not_found(id: RideId) -> Self {
        Self::NotFound {
            entity: "ride",
            id: id.get(),
        }
    }
}

/// Pick the driver closest to `point`.
///
/// Ties on distance go to the driver with the lowest id, so the result never
/// depends on the order in which `drivers` is produced. Users whose role is
/// not driver are skipped. Returns the winner and its distance in kilometers.
#[must_use]
pub fn nearest_driver<'a, I>(point: GeoPoint, drivers: I) -> Option<(&'a User, f64)>
where
    I: IntoIterator<Item = &'a User>,
{
    drivers
        .into_iter()
        .filter(|user| user.is_driver())
        .map(|driver| (driver, point.distance_km(&driver.position())))
        .min_by(|(a, da), (b, db)| da.total_cmp(db).then_with(|| a.id.cmp(&b.id)))
}

/// Persistent keyed storage for [`User`], [`RideRequest`], and [`Ride`].
///
/// # Dyn Compatibility
///
/// Methods return boxed futures rather than using `async fn` so the store can
/// be shared as `Arc<dyn EntityStore>` between the dispatcher and request
/// handlers.
pub trait EntityStore: Send + Sync {
    /// Persist a new user and return it with its assigned id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the write fails.
    fn add_user(&self, user: NewUser) -> StoreFuture<'_, User>;

    /// Load a user.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if `id` is unknown.
    fn get_user(&self, id: UserId) -> StoreFuture<'_, User>;

    /// Overwrite a user's position and return the updated record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if `id` is unknown.
    fn update_user_location(&self, id: UserId, position: GeoPoint) -> StoreFuture<'_, User>;

    /// Persist a ride request and return it with its assigned id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the write fails.
    fn add_ride_request(&self, request: NewRideRequest) -> StoreFuture<'_, RideRequest>;

    /// Load a ride request.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if `id` is unknown.
    fn get_ride_request(&self, id: RideRequestId) -> StoreFuture<'_, RideRequest>;

    /// Persist a ride with status [`RideStatus::Ongoing`].
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the write fails.
    fn add_ride(&self, ride: NewRide) -> StoreFuture<'_, Ride>;

    /// Load a ride.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if `id` is unknown.
    fn get_ride(&self, id: RideId) -> StoreFuture<'_, Ride>;

    /// Move a ride to `status` and return the updated record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if `id` is unknown, or
    /// [`StoreError::InvalidTransition`] unless the current status may move
    /// to `status`.
    fn update_ride_status(&self, id: RideId, status: RideStatus) -> StoreFuture<'_, Ride>;

    /// All users with role driver, in ascending id order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the read fails.
    fn list_drivers(&self) -> StoreFuture<'_, Vec<User>>;

    /// The driver nearest to `point`; see [`nearest_driver`] for the tie-break.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NoAvailableDriver`] if no drivers are registered.
    fn find_nearest_driver(&self, point: GeoPoint) -> StoreFuture<'_, User> {
        Box::pin(async move {
            let drivers = self.list_drivers().await?;
            nearest_driver(point, &drivers)
                .map(|(driver, _)| driver.clone())
                .ok_or(StoreError::NoAvailableDriver)
        })
    }
}
