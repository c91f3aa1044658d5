//! # Ridehail Testing
//!
//! Test doubles and fixtures for the ride-hailing backend.
//!
//! This crate provides:
//! - [`InMemoryEntityStore`]: a `BTreeMap`-backed [`EntityStore`](ridehail_core::store::EntityStore)
//! - [`InMemoryEventBus`]: a recording, broadcasting [`EventBus`](ridehail_core::event_bus::EventBus)
//!   with failure injection
//! - [`fixtures`]: user and request builders, plus a ready-wired [`fixtures::TestHarness`]
//!
//! ## Example
//!
//! ```ignore
//! use ridehail_testing::fixtures::{TestHarness, driver, rider};
//!
//! #[tokio::test]
//! async fn matches_the_only_driver() {
//!     let harness = TestHarness::new();
//!     let r = harness.dispatcher.register_user(rider("ana", 0.0, 0.0)).await.unwrap();
//!     let d = harness.dispatcher.register_user(driver("bo", 1.0, 1.0)).await.unwrap();
//!
//!     let ride = harness.dispatcher
//!         .request_ride(harness.request(r.id, (0.0, 0.0), (5.0, 5.0)))
//!         .await
//!         .unwrap();
//!     assert_eq!(ride.driver_id, d.id);
//! }
//! ```

pub mod entity_store;
pub mod event_bus;

/// Fixtures for building users, requests, and a wired dispatcher.
pub mod fixtures {
    use crate::{InMemoryEntityStore, InMemoryEventBus};
    use ridehail_core::dispatcher::Dispatcher;
    use ridehail_core::geo::GeoPoint;
    use ridehail_core::model::{NewRideRequest, NewUser, Role, UserId};
    use std::sync::Arc;

    /// A rider registration at `(latitude, longitude)`.
    #[must_use]
    pub fn rider(name: &str, latitude: f64, longitude: f64) -> NewUser {
        NewUser::new(name, Role::Rider, GeoPoint::new(latitude, longitude))
    }

    /// A driver registration at `(latitude, longitude)`.
    #[must_use]
    pub fn driver(name: &str, latitude: f64, longitude: f64) -> NewUser {
        NewUser::new(name, Role::Driver, GeoPoint::new(latitude, longitude))
    }

    /// A ride request from `pickup` to `dropoff`, each given as `(lat, lon)`.
    #[must_use]
    pub const fn ride_request(
        rider_id: UserId,
        pickup: (f64, f64),
        dropoff: (f64, f64),
    ) -> NewRideRequest {
        NewRideRequest::new(
            rider_id,
            GeoPoint::new(pickup.0, pickup.1),
            GeoPoint::new(dropoff.0, dropoff.1),
        )
    }

    /// A dispatcher wired to fresh in-memory doubles, with handles to both.
    #[derive(Clone)]
    pub struct TestHarness {
        /// Dispatcher under test.
        pub dispatcher: Dispatcher,
        /// Store shared with the dispatcher.
        pub store: InMemoryEntityStore,
        /// Bus shared with the dispatcher.
        pub bus: InMemoryEventBus,
    }

    impl TestHarness {
        /// Fresh store, fresh bus, default topic.
        #[must_use]
        pub fn new() -> Self {
            let store = InMemoryEntityStore::new();
            let bus = InMemoryEventBus::new();
            let dispatcher = Dispatcher::new(Arc::new(store.clone()), Arc::new(bus.clone()));
            Self {
                dispatcher,
                store,
                bus,
            }
        }

        /// Shorthand for [`ride_request`].
        #[must_use]
        pub const fn request(
            &self,
            rider_id: UserId,
            pickup: (f64, f64),
            dropoff: (f64, f64),
        ) -> NewRideRequest {
            ride_request(rider_id, pickup, dropoff)
        }
    }

    impl Default for TestHarness {
        fn default() -> Self {
            Self::new()
        }
    }
}

pub use entity_store::InMemoryEntityStore;
pub use event_bus::InMemoryEventBus;
