//! Ride dispatch: request, match, and complete.
//!
//! [`Dispatcher::request_ride`] runs one linear protocol per request:
//!
//! ```text
//! persist request ─► emit ride_request ─► find nearest driver ──(none)──► NoAvailableDriver
//!                                               │
//!                                               ▼
//!                                  persist ride (ongoing)
//!                                               │
//!                     driver → pickup ─► emit driver_location_update
//!                                               │
//!                     driver → dropoff ─► emit driver_location_update
//!                                               │
//!                                    rider → dropoff (no event)
//!                                               │
//!                           ride → completed ─► emit ride_completion
//! ```
//!
//! # Failure policy
//!
//! Storage and validation errors abort the protocol and are returned to the
//! caller. Publishing is fire-and-forget: every emission goes through
//! [`Dispatcher::publish_best_effort`], which logs a failed publish and lets
//! the protocol carry on. Neither kind of failure is retried, and nothing
//! already written is rolled back; a request whose match fails stays stored.
//!
//! # Concurrency
//!
//! Driver selection is a plain read. Two `request_ride` calls running at the
//! same time can both pick the same driver; there is no claim step.

use crate::event::{RIDE_EVENTS_TOPIC, RideEvent};
use crate::event_bus::EventBus;
use crate::geo::GeoPoint;
use crate::model::{NewRide, NewRideRequest, NewUser, Ride, RideRequestId, RideStatus, Role, User, UserId};
use crate::store::{EntityStore, StoreError};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors returned by [`Dispatcher`] operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DispatchError {
    /// The input was well-formed JSON but semantically invalid.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// An id in the input does not exist.
    #[error("{entity} {id} not found")]
    NotFound {
        /// Entity kind, e.g. `"ride request"`.
        entity: &'static str,
        /// The unknown id.
        id: i64,
    },

    /// No driver is registered.
    #[error("no available drivers")]
    NoAvailableDriver,

    /// The store refused a status change.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The entity store failed.
    #[error("Storage failure: {0}")]
    Storage(String),
}

impl DispatchError {
    /// Whether the caller, not the system, is at fault.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        !matches!(self, Self::Storage(_))
    }
}

impl From<StoreError> for DispatchError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound { entity, id } => Self::NotFound { entity, id },
            StoreError::NoAvailableDriver => Self::NoAvailableDriver,
            err @ StoreError::InvalidTransition { .. } => Self::Conflict(err.to_string()),
            StoreError::Database(reason) => Self::Storage(reason),
        }
    }
}

/// Matches riders to drivers and drives rides to completion.
///
/// Holds explicit handles to the entity store and the event bus; neither is
/// global. Cloning a `Dispatcher` shares both handles.
#[derive(Clone)]
pub struct Dispatcher {
    store: Arc<dyn EntityStore>,
    bus: Arc<dyn EventBus>,
    topic: String,
}

impl Dispatcher {
    /// Dispatcher publishing to [`RIDE_EVENTS_TOPIC`].
    #[must_use]
    pub fn new(store: Arc<dyn EntityStore>, bus: Arc<dyn EventBus>) -> Self {
        Self {
            store,
            bus,
            topic: RIDE_EVENTS_TOPIC.to_string(),
        }
    }

    /// Publish to `topic` instead of the default.
    #[must_use]
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = topic.into();
        self
    }

    /// Topic every event is published to.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// The underlying entity store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn EntityStore> {
        &self.store
    }

    /// Register a driver or rider.
    ///
    /// # Errors
    ///
    /// [`DispatchError::Validation`] for out-of-range coordinates,
    /// [`DispatchError::Storage`] if the write fails.
    pub async fn register_user(&self, user: NewUser) -> Result<User, DispatchError> {
        user.position().validate().map_err(DispatchError::Validation)?;

        let user = self.store.add_user(user).await?;
        info!(user_id = %user.id, role = %user.role, "User registered");
        Ok(user)
    }

    /// Record a driver's new position and broadcast it.
    ///
    /// # Errors
    ///
    /// [`DispatchError::Validation`] for out-of-range coordinates or if the
    /// user is not a driver, [`DispatchError::NotFound`] for an unknown id.
    pub async fn update_driver_location(
        &self,
        driver_id: UserId,
        position: GeoPoint,
    ) -> Result<User, DispatchError> {
        position.validate().map_err(DispatchError::Validation)?;

        let user = self.store.get_user(driver_id).await?;
        if !user.is_driver() {
            return Err(DispatchError::Validation(format!(
                "user {driver_id} is a {}, not a driver",
                user.role
            )));
        }

        self.relocate_driver(driver_id, position).await
    }

    /// Run the full request → match → complete protocol for one ride.
    ///
    /// Returns the ride in its final, `completed` state. On
    /// [`DispatchError::NoAvailableDriver`] the stored request and its
    /// `ride_request` event are left in place.
    ///
    /// # Errors
    ///
    /// [`DispatchError::Validation`] for bad coordinates or a requester who is
    /// not a rider, [`DispatchError::NotFound`] for an unknown rider,
    /// [`DispatchError::NoAvailableDriver`] when no driver is registered, and
    /// [`DispatchError::Storage`] if any write fails.
    pub async fn request_ride(&self, request: NewRideRequest) -> Result<Ride, DispatchError> {
        self.validate_request(&request).await?;

        let request = self.store.add_ride_request(request).await?;
        info!(
            ride_request_id = %request.id,
            rider_id = %request.rider_id,
            pickup = %request.pickup(),
            dropoff = %request.dropoff(),
            "Ride requested"
        );
        self.publish_best_effort(RideEvent::RideRequested(request.clone()))
            .await;

        let driver = match self.store.find_nearest_driver(request.pickup()).await {
            Ok(driver) => driver,
            Err(StoreError::NoAvailableDriver) => {
                warn!(ride_request_id = %request.id, "No available drivers for ride request");
                metrics::counter!("dispatch.rides.no_driver").increment(1);
                return Err(DispatchError::NoAvailableDriver);
            }
            Err(err) => return Err(err.into()),
        };
        info!(
            ride_request_id = %request.id,
            driver_id = %driver.id,
            distance_km = request.pickup().distance_km(&driver.position()),
            "Driver matched"
        );

        let ride = self
            .store
            .add_ride(NewRide::for_request(&request, driver.id))
            .await?;
        debug!(ride_id = %ride.id, status = %ride.status, "Ride created");

        self.relocate_driver(driver.id, request.pickup()).await?;
        // Trip simulation: the driver carries the rider straight to the dropoff.
        self.relocate_driver(driver.id, request.dropoff()).await?;

        // Rider moves are not broadcast.
        self.store
            .update_user_location(request.rider_id, request.dropoff())
            .await?;

        let ride = self
            .store
            .update_ride_status(ride.id, RideStatus::Completed)
            .await?;
        info!(ride_id = %ride.id, driver_id = %ride.driver_id, "Ride completed");
        metrics::counter!("dispatch.rides.completed").increment(1);

        self.publish_best_effort(RideEvent::RideCompleted(ride.clone()))
            .await;

        Ok(ride)
    }

    /// Re-run the driver search for a stored request without creating a ride.
    ///
    /// # Errors
    ///
    /// [`DispatchError::NotFound`] for an unknown request id,
    /// [`DispatchError::NoAvailableDriver`] when no driver is registered.
    pub async fn find_nearest_driver_for_request(
        &self,
        request_id: RideRequestId,
    ) -> Result<User, DispatchError> {
        let request = self.store.get_ride_request(request_id).await?;
        let driver = self.store.find_nearest_driver(request.pickup()).await?;

        info!(
            ride_request_id = %request_id,
            driver_id = %driver.id,
            distance_km = %format!("{:.2}", request.pickup().distance_km(&driver.position())),
            "Nearest driver found for ride request"
        );
        Ok(driver)
    }

    async fn validate_request(&self, request: &NewRideRequest) -> Result<(), DispatchError> {
        request
            .pickup()
            .validate()
            .map_err(|e| DispatchError::Validation(format!("pickup {e}")))?;
        request
            .dropoff()
            .validate()
            .map_err(|e| DispatchError::Validation(format!("dropoff {e}")))?;

        let rider = self.store.get_user(request.rider_id).await?;
        if rider.role != Role::Rider {
            return Err(DispatchError::Validation(format!(
                "user {} is a {}, not a rider",
                rider.id, rider.role
            )));
        }
        Ok(())
    }

    async fn relocate_driver(
        &self,
        driver_id: UserId,
        position: GeoPoint,
    ) -> Result<User, DispatchError> {
        let driver = self.store.update_user_location(driver_id, position).await?;
        debug!(driver_id = %driver.id, position = %position, "Driver location updated");
        self.publish_best_effort(RideEvent::DriverLocationUpdated(driver.clone()))
            .await;
        Ok(driver)
    }

    /// Publish `event` once, logging instead of returning any failure.
    ///
    /// This is the only place the dispatcher discards a publish result.
    async fn publish_best_effort(&self, event: RideEvent) {
        let event_type = event.event_type();
        let serialized = match event.to_serialized() {
            Ok(serialized) => serialized,
            Err(error) => {
                warn!(event_type, error = %error, "Failed to encode event, not publishing");
                metrics::counter!("dispatch.publish.failed", "event_type" => event_type)
                    .increment(1);
                return;
            }
        };

        debug!(event_type, topic = %self.topic, "Publishing event");
        if let Err(error) = self.bus.publish(&self.topic, &serialized).await {
            warn!(event_type, error = %error, "Failed to publish event");
            metrics::counter!("dispatch.publish.failed", "event_type" => event_type).increment(1);
        }
    }
}
