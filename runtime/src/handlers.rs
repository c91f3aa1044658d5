//! Event handlers for the ride event consumer.
//!
//! [`EventHandler`] is the seam between [`EventConsumer`](crate::consumer::EventConsumer)
//! and application logic: the consumer owns subscription, reconnects, and
//! shutdown, and hands each received message to a handler.
//!
//! [`RideEventRouter`] is the handler the server runs. It routes on the
//! message key:
//!
//! | Key                      | Payload        | Action                 |
//! |--------------------------|----------------|------------------------|
//! | `ride_request`           | `RideRequest`  | log "processing ride request" |
//! | `driver_location_update` | `User`         | log "processing driver location update" |
//! | `ride_completion`        | `Ride`         | log "processing ride completion" |
//! | anything else            | ignored        | log "unknown message type" |

use async_trait::async_trait;
use ridehail_core::event::{EventError, RideEvent, SerializedEvent};
use tracing::{debug, info, warn};

/// Error type handlers return. Logged by the consumer, never fatal.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Handler for received messages.
///
/// Errors are logged and counted by the consumer, which then moves on to the
/// next message.
#[async_trait]
pub trait EventHandler: Send + Sync + 'static {
    /// Handle one message.
    ///
    /// # Errors
    ///
    /// Any failure to process the message, typically a payload that does not
    /// decode.
    async fn handle(&self, event: &SerializedEvent) -> Result<(), HandlerError>;
}

/// Routes ride events by key and logs them.
#[derive(Debug, Clone, Copy, Default)]
pub struct RideEventRouter;

impl RideEventRouter {
    /// Create a router.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Decode `event` if its key is one this router knows.
    ///
    /// Returns `Ok(None)` for unknown keys.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::DeserializationError`] if a known key carries a
    /// payload that does not decode.
    pub fn route(event: &SerializedEvent) -> Result<Option<RideEvent>, EventError> {
        match RideEvent::from_serialized(event) {
            Ok(decoded) => Ok(Some(decoded)),
            Err(EventError::UnknownEventType(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }
}

#[async_trait]
impl EventHandler for RideEventRouter {
    async fn handle(&self, event: &SerializedEvent) -> Result<(), HandlerError> {
        match Self::route(event)? {
            Some(RideEvent::RideRequested(request)) => {
                info!(
                    ride_request_id = %request.id,
                    rider_id = %request.rider_id,
                    pickup = %request.pickup(),
                    dropoff = %request.dropoff(),
                    "Processing ride request"
                );
            }
            Some(RideEvent::DriverLocationUpdated(driver)) => {
                info!(
                    driver_id = %driver.id,
                    position = %driver.position(),
                    "Processing driver location update"
                );
            }
            Some(RideEvent::RideCompleted(ride)) => {
                info!(
                    ride_id = %ride.id,
                    driver_id = %ride.driver_id,
                    status = %ride.status,
                    "Processing ride completion"
                );
            }
            None => {
                warn!(
                    event_type = %event.event_type,
                    size = event.data.len(),
                    "Unknown message type"
                );
                return Ok(());
            }
        }

        debug!(event_type = %event.event_type, "Event handled");
        Ok(())
    }
}
