//! In-memory [`EventBus`] that records publishes and fans them out to subscribers.

use async_stream::stream;
use ridehail_core::event::SerializedEvent;
use ridehail_core::event_bus::{EventBus, EventBusError, EventStream};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;

type Delivery = (String, Result<SerializedEvent, EventBusError>);

const CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug)]
struct Inner {
    published: Mutex<Vec<(String, SerializedEvent)>>,
    sender: Mutex<broadcast::Sender<Delivery>>,
    fail_publishes: AtomicBool,
    failing_subscribes: AtomicUsize,
    subscribe_calls: AtomicUsize,
}

/// Event bus for tests.
///
/// Every successful publish is recorded in order and delivered to each live
/// subscription whose topics include the publish topic. Failure knobs let tests
/// drive the error paths of the dispatcher and the consumer.
///
/// Cloning shares the same bus.
#[derive(Clone, Debug)]
pub struct InMemoryEventBus {
    inner: Arc<Inner>,
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryEventBus {
    /// Create an empty bus with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                published: Mutex::new(Vec::new()),
                sender: Mutex::new(sender),
                fail_publishes: AtomicBool::new(false),
                failing_subscribes: AtomicUsize::new(0),
                subscribe_calls: AtomicUsize::new(0),
            }),
        }
    }

    /// Every successfully published `(topic, event)`, in publish order.
    #[must_use]
    pub fn published(&self) -> Vec<(String, SerializedEvent)> {
        lock(&self.inner.published).clone()
    }

    /// Event types of every successful publish, in publish order.
    #[must_use]
    pub fn published_types(&self) -> Vec<String> {
        lock(&self.inner.published)
            .iter()
            .map(|(_, event)| event.event_type.clone())
            .collect()
    }

    /// Make every subsequent publish fail (or succeed again).
    pub fn fail_publishes(&self, fail: bool) {
        self.inner.fail_publishes.store(fail, Ordering::SeqCst);
    }

    /// Make the next `count` calls to `subscribe` fail.
    pub fn fail_next_subscribes(&self, count: usize) {
        self.inner.failing_subscribes.store(count, Ordering::SeqCst);
    }

    /// How many times `subscribe` has been called, failed calls included.
    #[must_use]
    pub fn subscribe_calls(&self) -> usize {
        self.inner.subscribe_calls.load(Ordering::SeqCst)
    }

    /// Deliver an error item on `topic` to every live subscription.
    pub fn inject_error(&self, topic: &str, error: EventBusError) {
        // No receivers is not an error for a test bus.
        let _ = lock(&self.inner.sender).send((topic.to_string(), Err(error)));
    }

    /// End every live subscription stream, as a broker disconnect would.
    ///
    /// Later calls to `subscribe` work normally.
    pub fn disconnect_subscribers(&self) {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        *lock(&self.inner.sender) = sender;
    }
}

impl EventBus for InMemoryEventBus {
    fn publish(
        &self,
        topic: &str,
        event: &SerializedEvent,
    ) -> Pin<Box<dyn Future<Output = Result<(), EventBusError>> + Send + '_>> {
        let topic = topic.to_string();
        let event = event.clone();

        Box::pin(async move {
            if self.inner.fail_publishes.load(Ordering::SeqCst) {
                return Err(EventBusError::PublishFailed {
                    topic,
                    reason: "publish failure injected".to_string(),
                });
            }

            lock(&self.inner.published).push((topic.clone(), event.clone()));
            let _ = lock(&self.inner.sender).send((topic, Ok(event)));
            Ok(())
        })
    }

    fn subscribe(
        &self,
        topics: &[&str],
    ) -> Pin<Box<dyn Future<Output = Result<EventStream, EventBusError>> + Send + '_>> {
        let topics: Vec<String> = topics.iter().map(|t| (*t).to_string()).collect();

        Box::pin(async move {
            let should_fail = self
                .inner
                .failing_subscribes
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if should_fail {
                self.inner.subscribe_calls.fetch_add(1, Ordering::SeqCst);
                return Err(EventBusError::SubscriptionFailed {
                    topics,
                    reason: "subscribe failure injected".to_string(),
                });
            }

            // The receiver must exist before the count moves.
            let mut receiver = lock(&self.inner.sender).subscribe();
            self.inner.subscribe_calls.fetch_add(1, Ordering::SeqCst);
            let stream = stream! {
                loop {
                    match receiver.recv().await {
                        Ok((topic, item)) if topics.contains(&topic) => yield item,
                        Ok(_) => {}
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "In-memory subscriber lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            };

            Ok(Box::pin(stream) as EventStream)
        })
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
