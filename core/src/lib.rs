//! # Ridehail Core
//!
//! Domain model and dispatch logic for the ride-hailing backend.
//!
//! This crate has no I/O of its own. Storage and messaging are reached through
//! two traits, [`EntityStore`](store::EntityStore) and
//! [`EventBus`](event_bus::EventBus), whose production implementations live in
//! `ridehail-postgres` and `ridehail-redpanda`.
//!
//! ## Components
//!
//! - [`geo`]: points and haversine distance
//! - [`model`]: users, ride requests, rides
//! - [`store`]: entity store trait and nearest-driver selection
//! - [`event`]: ride events and their wire encoding
//! - [`event_bus`]: publish/subscribe trait
//! - [`dispatcher`]: the request → match → complete protocol
//!
//! ## Example
//!
//! ```ignore
//! use ridehail_core::dispatcher::Dispatcher;
//! use ridehail_core::geo::GeoPoint;
//! use ridehail_core::model::{NewRideRequest, NewUser, Role};
//!
//! let dispatcher = Dispatcher::new(store, event_bus);
//!
//! let rider = dispatcher
//!     .register_user(NewUser::new("ana", Role::Rider, GeoPoint::new(0.0, 0.0)))
//!     .await?;
//! dispatcher
//!     .register_user(NewUser::new("bo", Role::Driver, GeoPoint::new(1.0, 1.0)))
//!     .await?;
//!
//! let ride = dispatcher
//!     .request_ride(NewRideRequest::new(rider.id, GeoPoint::new(0.0, 0.0), GeoPoint::new(5.0, 5.0)))
//!     .await?;
//! ```

pub mod dispatcher;
pub mod event;
pub mod event_bus;
pub mod geo;
pub mod model;
pub mod store;

pub use dispatcher::{DispatchError, Dispatcher};
pub use geo::{GeoPoint, haversine_km};
