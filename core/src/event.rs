//! Domain events emitted by the dispatcher.
//!
//! Events travel on the bus as a [`SerializedEvent`]: a message key naming the
//! event type plus a JSON payload. The payload is the affected record itself
//! (the request, the driver, or the finished ride), so consumers outside Rust
//! can read it without a schema registry.
//!
//! # Example
//!
//! ```
//! use ridehail_core::event::{RideEvent, SerializedEvent};
//! use ridehail_core::geo::GeoPoint;
//! use ridehail_core::model::{NewRideRequest, RideRequestId, UserId};
//!
//! let request = NewRideRequest::new(UserId::new(1), GeoPoint::new(0.0, 0.0), GeoPoint::new(5.0, 5.0))
//!     .with_id(RideRequestId::new(10));
//! let event = RideEvent::RideRequested(request);
//!
//! let serialized = event.to_serialized().unwrap();
//! assert_eq!(serialized.event_type, "ride_request");
//! assert_eq!(RideEvent::from_serialized(&serialized).unwrap(), event);
//! ```

use crate::model::{Ride, RideRequest, User};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Default bus topic carrying every ride event.
pub const RIDE_EVENTS_TOPIC: &str = "ride-events";

/// Message key of [`RideEvent::RideRequested`].
pub const RIDE_REQUEST: &str = "ride_request";

/// Message key of [`RideEvent::DriverLocationUpdated`].
pub const DRIVER_LOCATION_UPDATE: &str = "driver_location_update";

/// Message key of [`RideEvent::RideCompleted`].
pub const RIDE_COMPLETION: &str = "ride_completion";

/// Error types for event encoding and decoding.
#[derive(Error, Debug)]
pub enum EventError {
    /// Failed to serialize event to bytes.
    #[error("Failed to serialize event: {0}")]
    SerializationError(String),

    /// Failed to deserialize event from bytes.
    #[error("Failed to deserialize event: {0}")]
    DeserializationError(String),

    /// Unknown event type encountered during deserialization.
    #[error("Unknown event type: {0}")]
    UnknownEventType(String),
}

/// An event as it travels on the bus.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializedEvent {
    /// Message key, e.g. `"ride_request"`.
    pub event_type: String,

    /// JSON-encoded payload.
    pub data: Vec<u8>,
}

impl SerializedEvent {
    /// Create a new serialized event.
    #[must_use]
    pub const fn new(event_type: String, data: Vec<u8>) -> Self {
        Self { event_type, data }
    }
}

impl fmt::Display for SerializedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SerializedEvent {{ type: {}, size: {} bytes }}",
            self.event_type,
            self.data.len()
        )
    }
}

/// Something that happened to a ride or a driver.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum RideEvent {
    /// A rider asked for a trip. Carries the stored request.
    RideRequested(RideRequest),
    /// A driver's recorded position changed. Carries the updated driver.
    DriverLocationUpdated(User),
    /// A ride reached `completed`. Carries the final ride record.
    RideCompleted(Ride),
}

impl RideEvent {
    /// Message key for this event.
    #[must_use]
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::RideRequested(_) => RIDE_REQUEST,
            Self::DriverLocationUpdated(_) => DRIVER_LOCATION_UPDATE,
            Self::RideCompleted(_) => RIDE_COMPLETION,
        }
    }

    /// Encode the payload as JSON under this event's key.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::SerializationError`] if JSON encoding fails.
    pub fn to_serialized(&self) -> Result<SerializedEvent, EventError> {
        let data = match self {
            Self::RideRequested(request) => serde_json::to_vec(request),
            Self::DriverLocationUpdated(driver) => serde_json::to_vec(driver),
            Self::RideCompleted(ride) => serde_json::to_vec(ride),
        }
        .map_err(|e| EventError::SerializationError(e.to_string()))?;

        Ok(SerializedEvent::new(self.event_type().to_string(), data))
    }

    /// Decode an event by its key.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::UnknownEventType`] for an unrecognized key and
    /// [`EventError::DeserializationError`] if the payload does not match it.
    pub fn from_serialized(event: &SerializedEvent) -> Result<Self, EventError> {
        let decode_err = |e: serde_json::Error| {
            EventError::DeserializationError(format!("{}: {e}", event.event_type))
        };
        match event.event_type.as_str() {
            RIDE_REQUEST => serde_json::from_slice(&event.data)
                .map(Self::RideRequested)
                .map_err(decode_err),
            DRIVER_LOCATION_UPDATE => serde_json::from_slice(&event.data)
                .map(Self::DriverLocationUpdated)
                .map_err(decode_err),
            RIDE_COMPLETION => serde_json::from_slice(&event.data)
                .map(Self::RideCompleted)
                .map_err(decode_err),
            other => Err(EventError::UnknownEventType(other.to_string())),
        }
    }
}
