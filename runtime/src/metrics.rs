//! Prometheus metrics for the dispatcher, the entity store, and the consumer.
//!
//! Counters are recorded where the work happens, through the `metrics`
//! facade. This module installs the Prometheus recorder and describes every
//! counter so the scrape output is self-documenting. Dots in metric names
//! become underscores in the Prometheus output.
//!
//! # Example
//!
//! ```rust,no_run
//! use ridehail_runtime::metrics::MetricsServer;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//!
//! // Serve `server.render()` at http://0.0.0.0:9090/metrics
//! # Ok(())
//! # }
//! ```

use metrics::describe_counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use thiserror::Error;

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus recorder plus the address it should be served on.
pub struct MetricsServer {
    addr: SocketAddr,
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Create a new metrics server for `addr` (e.g. `0.0.0.0:9090`).
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr, handle: None }
    }

    /// Install the global Prometheus recorder.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::Install`] if the recorder cannot be installed.
    /// A recorder that is already installed (for example by another test) is
    /// logged and tolerated; [`MetricsServer::render`] then returns `None`.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        match PrometheusBuilder::new().install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                describe_metrics();
                tracing::info!(
                    addr = %self.addr,
                    "Metrics recorder installed - scrape at http://{}/metrics",
                    self.addr
                );
                Ok(())
            }
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            }
        }
    }

    /// Address the metrics endpoint should listen on.
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get the recorder handle for rendering.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus text format.
    ///
    /// Returns `None` if this server did not install the recorder.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

fn describe_metrics() {
    // Dispatcher
    describe_counter!(
        "dispatch.rides.completed",
        "Rides driven from request to completed"
    );
    describe_counter!(
        "dispatch.rides.no_driver",
        "Ride requests that found no available driver"
    );
    describe_counter!(
        "dispatch.publish.failed",
        "Events the dispatcher failed to encode or publish"
    );

    // Entity store
    describe_counter!("store.errors", "Failed database operations, by operation");

    // Consumer
    describe_counter!(
        "consumer.events.received",
        "Events read from the bus, by event type"
    );
    describe_counter!(
        "consumer.events.failed",
        "Stream read errors and handler failures"
    );
}
