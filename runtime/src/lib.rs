//! # Ridehail Runtime
//!
//! Background machinery for the ride-hailing backend:
//!
//! - [`consumer`]: the subscribe-process-reconnect loop over an `EventBus`
//! - [`handlers`]: the [`EventHandler`] seam and the [`RideEventRouter`]
//! - [`backoff`]: bounded exponential backoff for read errors and reconnects
//! - [`metrics`]: Prometheus recorder installation and metric descriptions

pub mod backoff;
pub mod consumer;
pub mod handlers;
pub mod metrics;

pub use backoff::{Backoff, BackoffPolicy};
pub use consumer::{ConsumerError, EventConsumer, EventConsumerBuilder};
pub use handlers::{EventHandler, HandlerError, RideEventRouter};
