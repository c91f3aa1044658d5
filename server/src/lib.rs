//! Ride dispatch server: configuration, telemetry, and lifecycle.
//!
//! The binary in `main.rs` wires PostgreSQL, Redpanda, the dispatcher, the
//! ride event consumer, and the HTTP API together with these pieces.

pub mod config;
pub mod lifecycle;
pub mod telemetry;

pub use config::Config;
pub use lifecycle::{Application, BoxError};
