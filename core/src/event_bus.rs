//! Event bus abstraction for broadcasting ride events.
//!
//! The dispatcher publishes to the bus after each state change it persists;
//! background consumers subscribe and route messages by key.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   Dispatcher    │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │  1. Write to    │
//! │  entity store   │◄─── Source of truth
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ 2. Publish to   │
//! │    Event Bus    │◄─── Fire-and-forget
//! └────────┬────────┘
//!          │
//!          ▼
//!   ┌─────────────┐
//!   │  Consumer   │
//!   └─────────────┘
//! ```
//!
//! # Key Principles
//!
//! - **Store first**: state is persisted before the corresponding event is published
//! - **No retries**: a publish is attempted once; the caller decides what a failure means
//! - **Ordered per producer**: one producer writes one ordered stream per topic partition
//!
//! # Implementations
//!
//! - `InMemoryEventBus` (in `ridehail-testing`): for tests
//! - `RedpandaEventBus` (in `ridehail-redpanda`): for production (Kafka-compatible)

use crate::event::SerializedEvent;
use futures::Stream;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors that can occur during event bus operations.
#[derive(Error, Debug, Clone)]
pub enum EventBusError {
    /// Failed to connect to the event bus
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Failed to publish an event to a topic
    #[error("Publish failed for topic '{topic}': {reason}")]
    PublishFailed {
        /// The topic that failed
        topic: String,
        /// The reason for failure
        reason: String,
    },

    /// Failed to subscribe to topics
    #[error("Subscription failed for topics {topics:?}: {reason}")]
    SubscriptionFailed {
        /// The topics that failed to subscribe
        topics: Vec<String>,
        /// The reason for failure
        reason: String,
    },

    /// Failed to decode a received message
    #[error("Deserialization failed: {0}")]
    DeserializationFailed(String),

    /// Network or transport error
    #[error("Transport error: {0}")]
    TransportError(String),
}

/// Stream of events from subscriptions.
///
/// Each item is either a received event or an error for a message that could
/// not be read. Errors do not end the stream.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<SerializedEvent, EventBusError>> + Send>>;

/// Trait for event bus implementations.
///
/// # Dyn Compatibility
///
/// This trait uses explicit `Pin<Box<dyn Future>>` returns instead of `async fn`
/// so it can be held as `Arc<dyn EventBus>` by the dispatcher and consumers.
pub trait EventBus: Send + Sync {
    /// Publish an event to a topic.
    ///
    /// A single attempt is made. Events published through the same bus
    /// instance to the same topic keep their relative order.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::PublishFailed`] if the broker rejects or
    /// never acknowledges the write.
    fn publish(
        &self,
        topic: &str,
        event: &SerializedEvent,
    ) -> Pin<Box<dyn Future<Output = Result<(), EventBusError>> + Send + '_>>;

    /// Subscribe to one or more topics and receive a stream of events.
    ///
    /// Dropping the returned stream ends the subscription and releases the
    /// underlying connection.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::SubscriptionFailed`] if subscription fails.
    fn subscribe(
        &self,
        topics: &[&str],
    ) -> Pin<Box<dyn Future<Output = Result<EventStream, EventBusError>> + Send + '_>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_failure_names_the_topic() {
        let error = EventBusError::PublishFailed {
            topic: "ride-events".to_string(),
            reason: "broker down".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Publish failed for topic 'ride-events': broker down"
        );
    }
}
