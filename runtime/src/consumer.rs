//! Event bus consumer with reconnection and bounded backoff.
//!
//! [`EventConsumer`] owns the subscribe-process-reconnect loop so handlers
//! only deal with single messages.
//!
//! # Pattern: Subscribe-Process-Reconnect Loop
//!
//! ```text
//! loop {
//!     subscribe ──(error)──► wait backoff, retry
//!         │
//!         ▼
//!     for each item:
//!         Ok(event)  → reset backoff, handler.handle(event)  (errors logged)
//!         Err(read)  → log, wait backoff
//!     stream ended   → wait backoff, resubscribe
//! }
//! ```
//!
//! Every wait and every read also listens on the shutdown channel. On
//! shutdown the subscription stream is dropped, which releases the underlying
//! broker consumer.
//!
//! # Example
//!
//! ```rust,ignore
//! use ridehail_runtime::{EventConsumer, RideEventRouter};
//!
//! let (shutdown_tx, shutdown_rx) = tokio::sync::broadcast::channel(1);
//!
//! let consumer = EventConsumer::builder()
//!     .name("ride-events")
//!     .topics(vec!["ride-events".to_string()])
//!     .event_bus(event_bus)
//!     .handler(Arc::new(RideEventRouter::new()))
//!     .shutdown(shutdown_rx)
//!     .build()?;
//!
//! let handle = consumer.spawn();
//! // ...
//! let _ = shutdown_tx.send(());
//! handle.await?;
//! ```

use crate::backoff::{Backoff, BackoffPolicy};
use crate::handlers::EventHandler;
use futures::StreamExt;
use ridehail_core::event_bus::{EventBus, EventStream};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Errors from building an [`EventConsumer`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConsumerError {
    /// A required builder field was not set.
    #[error("Missing required consumer setting: {0}")]
    MissingField(&'static str),
}

enum StreamOutcome {
    Ended,
    Shutdown,
}

/// Background consumer for one or more topics.
///
/// # Lifecycle
///
/// 1. Created via [`EventConsumer::builder`] or [`EventConsumer::new`]
/// 2. Spawned via [`EventConsumer::spawn`]
/// 3. Runs until the shutdown channel fires or closes
pub struct EventConsumer {
    name: String,
    topics: Vec<String>,
    event_bus: Arc<dyn EventBus>,
    handler: Arc<dyn EventHandler>,
    shutdown: broadcast::Receiver<()>,
    backoff: Backoff,
}

impl EventConsumer {
    /// Create a consumer with the default [`BackoffPolicy`].
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        topics: Vec<String>,
        event_bus: Arc<dyn EventBus>,
        handler: Arc<dyn EventHandler>,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            name: name.into(),
            topics,
            event_bus,
            handler,
            shutdown,
            backoff: Backoff::new(BackoffPolicy::default()),
        }
    }

    /// Create a builder for configuring a consumer.
    #[must_use]
    pub fn builder() -> EventConsumerBuilder {
        EventConsumerBuilder::default()
    }

    /// Replace the backoff policy.
    #[must_use]
    pub fn with_backoff(mut self, policy: BackoffPolicy) -> Self {
        self.backoff = Backoff::new(policy);
        self
    }

    /// Spawn the consumer as a background task.
    ///
    /// The task ends after a shutdown signal.
    #[must_use]
    pub fn spawn(mut self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    /// Run the loop on the current task until shutdown.
    pub async fn run(&mut self) {
        info!(consumer = %self.name, topics = ?self.topics, "Event consumer started");

        loop {
            let topics: Vec<&str> = self.topics.iter().map(String::as_str).collect();

            let subscribed = tokio::select! {
                _ = self.shutdown.recv() => {
                    info!(consumer = %self.name, "Event consumer received shutdown signal");
                    break;
                }
                result = self.event_bus.subscribe(&topics) => result,
            };

            match subscribed {
                Ok(mut stream) => {
                    info!(consumer = %self.name, topics = ?self.topics, "Subscribed to event bus");
                    match self.process_stream(&mut stream).await {
                        StreamOutcome::Shutdown => break,
                        StreamOutcome::Ended => {
                            warn!(consumer = %self.name, "Event stream ended, reconnecting");
                        }
                    }
                }
                Err(e) => {
                    error!(consumer = %self.name, error = %e, "Failed to subscribe to event bus");
                }
            }

            let delay = self.backoff.next_delay();
            if self.wait_or_shutdown(delay).await {
                break;
            }
        }

        info!(consumer = %self.name, "Event consumer stopped");
    }

    async fn process_stream(&mut self, stream: &mut EventStream) -> StreamOutcome {
        loop {
            let item = tokio::select! {
                _ = self.shutdown.recv() => {
                    info!(consumer = %self.name, "Event consumer received shutdown signal during processing");
                    return StreamOutcome::Shutdown;
                }
                item = stream.next() => item,
            };

            match item {
                Some(Ok(event)) => {
                    self.backoff.reset();
                    metrics::counter!(
                        "consumer.events.received",
                        "event_type" => event.event_type.clone()
                    )
                    .increment(1);
                    debug!(consumer = %self.name, event_type = %event.event_type, "Event received");

                    if let Err(e) = self.handler.handle(&event).await {
                        metrics::counter!("consumer.events.failed").increment(1);
                        error!(
                            consumer = %self.name,
                            event_type = %event.event_type,
                            error = %e,
                            "Failed to handle event"
                        );
                    }
                }
                Some(Err(e)) => {
                    metrics::counter!("consumer.events.failed").increment(1);
                    let delay = self.backoff.next_delay();
                    error!(
                        consumer = %self.name,
                        error = %e,
                        consecutive_failures = self.backoff.consecutive_failures(),
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "Error reading from event stream"
                    );
                    if self.wait_or_shutdown(delay).await {
                        return StreamOutcome::Shutdown;
                    }
                }
                None => return StreamOutcome::Ended,
            }
        }
    }

    /// Sleep for `delay`. Returns `true` if shutdown arrived first.
    async fn wait_or_shutdown(&mut self, delay: Duration) -> bool {
        tokio::select! {
            _ = self.shutdown.recv() => {
                info!(consumer = %self.name, "Event consumer received shutdown signal while waiting");
                true
            }
            () = tokio::time::sleep(delay) => false,
        }
    }
}

/// Builder for configuring an [`EventConsumer`].
#[derive(Default)]
pub struct EventConsumerBuilder {
    name: Option<String>,
    topics: Option<Vec<String>>,
    event_bus: Option<Arc<dyn EventBus>>,
    handler: Option<Arc<dyn EventHandler>>,
    shutdown: Option<broadcast::Receiver<()>>,
    backoff: Option<BackoffPolicy>,
}

impl EventConsumerBuilder {
    /// Set consumer name (for logging).
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set topics to subscribe to.
    #[must_use]
    pub fn topics(mut self, topics: Vec<String>) -> Self {
        self.topics = Some(topics);
        self
    }

    /// Set event bus instance.
    #[must_use]
    pub fn event_bus(mut self, event_bus: Arc<dyn EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Set event handler.
    #[must_use]
    pub fn handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Set shutdown signal receiver.
    #[must_use]
    pub fn shutdown(mut self, shutdown: broadcast::Receiver<()>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Set backoff policy (default: [`BackoffPolicy::default`]).
    #[must_use]
    pub fn backoff(mut self, policy: BackoffPolicy) -> Self {
        self.backoff = Some(policy);
        self
    }

    /// Build the [`EventConsumer`].
    ///
    /// # Errors
    ///
    /// Returns [`ConsumerError::MissingField`] if name, topics, event bus,
    /// handler, or shutdown receiver is not set.
    pub fn build(self) -> Result<EventConsumer, ConsumerError> {
        Ok(EventConsumer {
            name: self.name.ok_or(ConsumerError::MissingField("name"))?,
            topics: self.topics.ok_or(ConsumerError::MissingField("topics"))?,
            event_bus: self
                .event_bus
                .ok_or(ConsumerError::MissingField("event_bus"))?,
            handler: self.handler.ok_or(ConsumerError::MissingField("handler"))?,
            shutdown: self
                .shutdown
                .ok_or(ConsumerError::MissingField("shutdown"))?,
            backoff: Backoff::new(self.backoff.unwrap_or_default()),
        })
    }
}
