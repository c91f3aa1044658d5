//! HTTP request handlers, grouped by resource.

pub mod health;
pub mod rides;
pub mod users;

pub use health::health_check;
