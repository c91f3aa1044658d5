//! Redpanda event bus for the ride-hailing backend.
//!
//! This crate provides [`RedpandaEventBus`], the production implementation of
//! the [`EventBus`] trait from `ridehail-core`. It speaks the Kafka protocol
//! through rdkafka, so any Kafka-compatible broker works.
//!
//! # Wire Format
//!
//! One ride event is one Kafka record:
//!
//! | Record part | Content                                                     |
//! |-------------|-------------------------------------------------------------|
//! | key         | event type: `ride_request`, `driver_location_update`, ...  |
//! | value       | JSON of the entity record (ride request, user, or ride)    |
//!
//! Consumers route on the key alone. A record without a UTF-8 key cannot be
//! routed and is surfaced as [`EventBusError::DeserializationFailed`].
//!
//! # Delivery Semantics
//!
//! **At-least-once delivery** with manual offset commits:
//! - Offsets are committed after the record reaches the subscriber's channel
//! - If the process crashes before commit, records are redelivered
//! - Ordering holds within a partition; records with the same key share one
//!
//! **Configuration options**:
//! - `consumer_group`: consumer group id (default: `rideshare-group`)
//! - `buffer_size`: records buffered per subscription (default: 1000)
//! - `auto_offset_reset`: where a new group starts reading (default: `latest`)
//!
//! # Example
//!
//! ```no_run
//! use ridehail_redpanda::RedpandaEventBus;
//! use ridehail_core::event_bus::EventBus;
//! use ridehail_core::event::{RIDE_EVENTS_TOPIC, SerializedEvent};
//! use futures::StreamExt;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let event_bus = RedpandaEventBus::new("localhost:9092")?;
//!
//! let event = SerializedEvent::new("ride_request".to_string(), br#"{"id":1}"#.to_vec());
//! event_bus.publish(RIDE_EVENTS_TOPIC, &event).await?;
//!
//! let mut stream = event_bus.subscribe(&[RIDE_EVENTS_TOPIC]).await?;
//! while let Some(result) = stream.next().await {
//!     match result {
//!         Ok(event) => println!("Received: {}", event.event_type),
//!         Err(e) => eprintln!("Error: {e}"),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use ridehail_core::event::SerializedEvent;
use ridehail_core::event_bus::{EventBus, EventBusError, EventStream};
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Consumer group used when none is configured.
pub const DEFAULT_CONSUMER_GROUP: &str = "rideshare-group";

const DEFAULT_BUFFER_SIZE: usize = 1000;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Kafka-compatible event bus.
///
/// Holds one producer for the life of the bus. Each call to
/// [`EventBus::subscribe`] creates its own consumer in the configured group,
/// owned by a background task that stops when the returned stream is dropped.
///
/// # Example
///
/// ```no_run
/// use ridehail_redpanda::RedpandaEventBus;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let event_bus = RedpandaEventBus::new("localhost:9092")?;
///
/// let event_bus = RedpandaEventBus::builder()
///     .brokers("localhost:9092,localhost:9093")
///     .producer_acks("all")
///     .consumer_group("rideshare-analytics")
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct RedpandaEventBus {
    producer: FutureProducer,
    brokers: String,
    timeout: Duration,
    consumer_group: String,
    buffer_size: usize,
    auto_offset_reset: String,
    active_subscriptions: Arc<AtomicUsize>,
}

/// Decrements the live-subscription count when a consumer task ends.
struct SubscriptionGuard(Arc<AtomicUsize>);

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl RedpandaEventBus {
    /// Create an event bus with default settings.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::ConnectionFailed`] if the producer cannot be
    /// created from the given broker list.
    pub fn new(brokers: &str) -> Result<Self, EventBusError> {
        Self::builder().brokers(brokers).build()
    }

    /// Create a new builder for configuring the event bus.
    #[must_use]
    pub fn builder() -> RedpandaEventBusBuilder {
        RedpandaEventBusBuilder::default()
    }

    /// Comma-separated broker addresses.
    #[must_use]
    pub fn brokers(&self) -> &str {
        &self.brokers
    }

    /// Consumer group every subscription joins.
    #[must_use]
    pub fn consumer_group(&self) -> &str {
        &self.consumer_group
    }

    /// Subscriptions whose Kafka consumer is still running.
    ///
    /// Drops back once a subscriber has dropped its stream and the background
    /// task has released the consumer.
    #[must_use]
    pub fn active_subscriptions(&self) -> usize {
        self.active_subscriptions.load(Ordering::SeqCst)
    }
}

/// Builder for configuring a [`RedpandaEventBus`].
#[derive(Default)]
pub struct RedpandaEventBusBuilder {
    brokers: Option<String>,
    producer_acks: Option<String>,
    compression: Option<String>,
    timeout: Option<Duration>,
    consumer_group: Option<String>,
    buffer_size: Option<usize>,
    auto_offset_reset: Option<String>,
}

impl RedpandaEventBusBuilder {
    /// Set the broker addresses, e.g. `"localhost:9092"`.
    #[must_use]
    pub fn brokers(mut self, brokers: impl Into<String>) -> Self {
        self.brokers = Some(brokers.into());
        self
    }

    /// Set the producer acknowledgment mode: `"0"`, `"1"`, or `"all"`.
    ///
    /// Default: `"1"`
    #[must_use]
    pub fn producer_acks(mut self, acks: impl Into<String>) -> Self {
        self.producer_acks = Some(acks.into());
        self
    }

    /// Set the compression codec: `"none"`, `"gzip"`, `"snappy"`, `"lz4"`, or `"zstd"`.
    ///
    /// Default: `"none"`
    #[must_use]
    pub fn compression(mut self, compression: impl Into<String>) -> Self {
        self.compression = Some(compression.into());
        self
    }

    /// Set the producer send timeout.
    ///
    /// Default: 5 seconds
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the consumer group id for subscriptions.
    ///
    /// Instances sharing a group split the topic's partitions between them.
    ///
    /// Default: [`DEFAULT_CONSUMER_GROUP`]
    #[must_use]
    pub fn consumer_group(mut self, consumer_group: impl Into<String>) -> Self {
        self.consumer_group = Some(consumer_group.into());
        self
    }

    /// Set how many records each subscription buffers in memory.
    ///
    /// Zero is raised to one.
    ///
    /// Default: 1000
    #[must_use]
    pub fn buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = Some(buffer_size.max(1));
        self
    }

    /// Set where a consumer group with no committed offset starts reading:
    /// `"earliest"`, `"latest"`, or `"error"`.
    ///
    /// Default: `"latest"`
    #[must_use]
    pub fn auto_offset_reset(mut self, policy: impl Into<String>) -> Self {
        self.auto_offset_reset = Some(policy.into());
        self
    }

    /// Build the [`RedpandaEventBus`].
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::ConnectionFailed`] if brokers are not set or
    /// the producer configuration is rejected.
    pub fn build(self) -> Result<RedpandaEventBus, EventBusError> {
        let brokers = self.brokers.ok_or_else(|| {
            EventBusError::ConnectionFailed("Brokers not configured".to_string())
        })?;
        let acks = self.producer_acks.as_deref().unwrap_or("1");
        let compression = self.compression.as_deref().unwrap_or("none");
        let timeout = self.timeout.unwrap_or(DEFAULT_TIMEOUT);

        let producer: FutureProducer = producer_config(&brokers, acks, compression, timeout)
            .create()
            .map_err(|e| {
                EventBusError::ConnectionFailed(format!("Failed to create producer: {e}"))
            })?;

        let bus = RedpandaEventBus {
            producer,
            brokers,
            timeout,
            consumer_group: self
                .consumer_group
                .unwrap_or_else(|| DEFAULT_CONSUMER_GROUP.to_string()),
            buffer_size: self.buffer_size.unwrap_or(DEFAULT_BUFFER_SIZE),
            auto_offset_reset: self
                .auto_offset_reset
                .unwrap_or_else(|| "latest".to_string()),
            active_subscriptions: Arc::new(AtomicUsize::new(0)),
        };

        tracing::info!(
            brokers = %bus.brokers,
            acks,
            compression,
            consumer_group = %bus.consumer_group,
            buffer_size = bus.buffer_size,
            auto_offset_reset = %bus.auto_offset_reset,
            "RedpandaEventBus created"
        );

        Ok(bus)
    }
}

/// Producer settings. The broker-side delivery timeout matches the publish
/// timeout so a send never outlives the wait for it.
fn producer_config(
    brokers: &str,
    acks: &str,
    compression: &str,
    timeout: Duration,
) -> ClientConfig {
    let mut config = ClientConfig::new();
    config
        .set("bootstrap.servers", brokers)
        .set("message.timeout.ms", timeout.as_millis().to_string())
        .set("acks", acks)
        .set("compression.type", compression);
    config
}

/// Rebuild a [`SerializedEvent`] from a record's key and value.
///
/// # Errors
///
/// Returns [`EventBusError::DeserializationFailed`] if the key is missing or
/// not UTF-8, or the value is missing.
pub fn decode_record(
    key: Option<&[u8]>,
    payload: Option<&[u8]>,
) -> Result<SerializedEvent, EventBusError> {
    let key = key.ok_or_else(|| {
        EventBusError::DeserializationFailed("Message has no key".to_string())
    })?;
    let event_type = std::str::from_utf8(key).map_err(|e| {
        EventBusError::DeserializationFailed(format!("Message key is not UTF-8: {e}"))
    })?;
    let payload = payload.ok_or_else(|| {
        EventBusError::DeserializationFailed("Message has no payload".to_string())
    })?;

    Ok(SerializedEvent::new(event_type.to_string(), payload.to_vec()))
}

impl EventBus for RedpandaEventBus {
    fn publish(
        &self,
        topic: &str,
        event: &SerializedEvent,
    ) -> Pin<Box<dyn Future<Output = Result<(), EventBusError>> + Send + '_>> {
        let topic = topic.to_string();
        let event = event.clone();
        let timeout = self.timeout;

        Box::pin(async move {
            let record = FutureRecord::to(&topic)
                .key(event.event_type.as_bytes())
                .payload(&event.data);

            match self.producer.send(record, Timeout::After(timeout)).await {
                Ok((partition, offset)) => {
                    tracing::debug!(
                        topic = %topic,
                        partition,
                        offset,
                        event_type = %event.event_type,
                        "Event published"
                    );
                    Ok(())
                }
                Err((kafka_error, _)) => {
                    tracing::error!(
                        topic = %topic,
                        event_type = %event.event_type,
                        error = %kafka_error,
                        "Failed to publish event"
                    );
                    Err(EventBusError::PublishFailed {
                        topic,
                        reason: kafka_error.to_string(),
                    })
                }
            }
        })
    }

    fn subscribe(
        &self,
        topics: &[&str],
    ) -> Pin<Box<dyn Future<Output = Result<EventStream, EventBusError>> + Send + '_>> {
        let topics: Vec<String> = topics.iter().map(|s| (*s).to_string()).collect();
        let brokers = self.brokers.clone();
        let consumer_group = self.consumer_group.clone();
        let buffer_size = self.buffer_size;
        let auto_offset_reset = self.auto_offset_reset.clone();

        Box::pin(async move {
            let consumer: StreamConsumer = ClientConfig::new()
                .set("bootstrap.servers", &brokers)
                .set("group.id", &consumer_group)
                .set("enable.auto.commit", "false")
                .set("auto.offset.reset", &auto_offset_reset)
                .set("session.timeout.ms", "6000")
                .set("enable.partition.eof", "false")
                .create()
                .map_err(|e| EventBusError::SubscriptionFailed {
                    topics: topics.clone(),
                    reason: format!("Failed to create consumer: {e}"),
                })?;

            let topic_refs: Vec<&str> = topics.iter().map(String::as_str).collect();
            consumer
                .subscribe(&topic_refs)
                .map_err(|e| EventBusError::SubscriptionFailed {
                    topics: topics.clone(),
                    reason: format!("Failed to subscribe to topics: {e}"),
                })?;

            tracing::info!(
                topics = ?topics,
                consumer_group = %consumer_group,
                buffer_size,
                auto_offset_reset = %auto_offset_reset,
                "Subscribed to topics"
            );

            let (tx, rx) = tokio::sync::mpsc::channel(buffer_size);
            self.active_subscriptions.fetch_add(1, Ordering::SeqCst);
            let guard = SubscriptionGuard(Arc::clone(&self.active_subscriptions));

            tokio::spawn(async move {
                use futures::StreamExt;
                use rdkafka::consumer::CommitMode;

                {
                    let mut stream = consumer.stream();

                    loop {
                        // A quiet topic never wakes `stream.next()`, so watch the
                        // receiver side as well.
                        let msg_result = tokio::select! {
                            () = tx.closed() => {
                                tracing::debug!("Subscriber dropped, stopping consumer task");
                                break;
                            }
                            next = stream.next() => match next {
                                Some(msg_result) => msg_result,
                                None => break,
                            },
                        };

                        match msg_result {
                            Ok(message) => {
                                let event_result = decode_record(message.key(), message.payload());
                                if let Ok(event) = &event_result {
                                    tracing::trace!(
                                        topic = message.topic(),
                                        partition = message.partition(),
                                        offset = message.offset(),
                                        event_type = %event.event_type,
                                        "Received event"
                                    );
                                }

                                // Commit only after the subscriber has the record.
                                if tx.send(event_result).await.is_err() {
                                    tracing::debug!("Subscriber dropped, stopping consumer task");
                                    break;
                                }

                                if let Err(e) = consumer.commit_message(&message, CommitMode::Async) {
                                    tracing::warn!(
                                        topic = message.topic(),
                                        partition = message.partition(),
                                        offset = message.offset(),
                                        error = %e,
                                        "Failed to commit offset (message may be redelivered)"
                                    );
                                }
                            }
                            Err(e) => {
                                let err = EventBusError::TransportError(format!(
                                    "Failed to receive message: {e}"
                                ));
                                if tx.send(Err(err)).await.is_err() {
                                    break;
                                }
                            }
                        }
                    }
                }

                drop(consumer);
                drop(guard);
                tracing::debug!("Consumer task exiting, group membership released");
            });

            let stream = async_stream::stream! {
                let mut rx = rx;
                while let Some(result) = rx.recv().await {
                    yield result;
                }
            };

            Ok(Box::pin(stream) as EventStream)
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn redpanda_event_bus_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<RedpandaEventBus>();
        assert_sync::<RedpandaEventBus>();
    }

    #[test]
    fn build_without_brokers_fails() {
        let result = RedpandaEventBus::builder().build();
        assert!(matches!(result, Err(EventBusError::ConnectionFailed(_))));
    }

    #[test]
    fn producer_delivery_timeout_follows_publish_timeout() {
        let config = producer_config("localhost:9092", "all", "lz4", Duration::from_millis(2500));
        assert_eq!(config.get("message.timeout.ms"), Some("2500"));
        assert_eq!(config.get("acks"), Some("all"));
    }

    #[test]
    fn decode_record_uses_key_as_event_type() {
        let event = decode_record(Some(b"ride_request"), Some(br#"{"id":1}"#)).unwrap();
        assert_eq!(event.event_type, "ride_request");
        assert_eq!(event.data, br#"{"id":1}"#.to_vec());
    }

    #[test]
    fn decode_record_rejects_missing_or_bad_parts() {
        assert!(matches!(
            decode_record(None, Some(b"{}")),
            Err(EventBusError::DeserializationFailed(_))
        ));
        assert!(matches!(
            decode_record(Some(&[0xff, 0xfe]), Some(b"{}")),
            Err(EventBusError::DeserializationFailed(_))
        ));
        assert!(matches!(
            decode_record(Some(b"ride_request"), None),
            Err(EventBusError::DeserializationFailed(_))
        ));
    }
}
