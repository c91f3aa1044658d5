//! In-memory [`EntityStore`] for fast, deterministic tests.

use ridehail_core::geo::GeoPoint;
use ridehail_core::model::{
    NewRide, NewRideRequest, NewUser, Ride, RideId, RideRequest, RideRequestId, RideStatus, User,
    UserId,
};
use ridehail_core::store::{EntityStore, StoreError, StoreFuture};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Default)]
struct Tables {
    users: BTreeMap<UserId, User>,
    ride_requests: BTreeMap<RideRequestId, RideRequest>,
    rides: BTreeMap<RideId, Ride>,
    next_id: i64,
}

impl Tables {
    // One sequence for all tables keeps ids unique across entity kinds,
    // which makes mixed-up ids fail loudly in tests.
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// `BTreeMap`-backed entity store.
///
/// Ids start at 1 and increase monotonically. Drivers are listed in id
/// order, like the Postgres store. Each operation holds the lock for its whole
/// duration, so single-entity writes are atomic.
///
/// # Example
///
/// ```
/// use ridehail_testing::InMemoryEntityStore;
/// use ridehail_core::store::EntityStore;
/// use ridehail_core::model::{NewUser, Role};
/// use ridehail_core::geo::GeoPoint;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = InMemoryEntityStore::new();
/// let driver = store.add_user(NewUser::new("dana", Role::Driver, GeoPoint::new(1.0, 1.0))).await?;
/// assert_eq!(store.find_nearest_driver(GeoPoint::new(0.0, 0.0)).await?, driver);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemoryEntityStore {
    tables: Arc<RwLock<Tables>>,
    fail_ride_writes: Arc<AtomicBool>,
}

impl InMemoryEntityStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every stored user, in id order.
    #[must_use]
    pub fn users(&self) -> Vec<User> {
        self.read()
            .map(|t| t.users.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Snapshot of every stored ride request, in id order.
    #[must_use]
    pub fn ride_requests(&self) -> Vec<RideRequest> {
        self.read()
            .map(|t| t.ride_requests.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Snapshot of every stored ride, in id order.
    #[must_use]
    pub fn rides(&self) -> Vec<Ride> {
        self.read()
            .map(|t| t.rides.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Make every subsequent `add_ride` and `update_ride_status` fail with
    /// [`StoreError::Database`] (or succeed again).
    pub fn fail_ride_writes(&self, fail: bool) {
        self.fail_ride_writes.store(fail, Ordering::SeqCst);
    }

    fn check_ride_write(&self) -> Result<(), StoreError> {
        if self.fail_ride_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Database("ride writes disabled".to_string()));
        }
        Ok(())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, StoreError> {
        self.tables
            .read()
            .map_err(|_| StoreError::Database("in-memory store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, StoreError> {
        self.tables
            .write()
            .map_err(|_| StoreError::Database("in-memory store lock poisoned".to_string()))
    }
}

impl EntityStore for InMemoryEntityStore {
    fn add_user(&self, user: NewUser) -> StoreFuture<'_, User> {
        Box::pin(async move {
            let mut tables = self.write()?;
            let user = user.with_id(UserId::new(tables.allocate_id()));
            tables.users.insert(user.id, user.clone());
            Ok(user)
        })
    }

    fn get_user(&self, id: UserId) -> StoreFuture<'_, User> {
        Box::pin(async move {
            self.read()?
                .users
                .get(&id)
                .cloned()
                .ok_or(StoreError::user_not_found(id))
        })
    }

    fn update_user_location(&self, id: UserId, position: GeoPoint) -> StoreFuture<'_, User> {
        Box::pin(async move {
            let mut tables = self.write()?;
            let user = tables
                .users
                .get_mut(&id)
                .ok_or(StoreError::user_not_found(id))?;
            user.latitude = position.latitude;
            user.longitude = position.longitude;
            Ok(user.clone())
        })
    }

    fn add_ride_request(&self, request: NewRideRequest) -> StoreFuture<'_, RideRequest> {
        Box::pin(async move {
            let mut tables = self.write()?;
            let request = request.with_id(RideRequestId::new(tables.allocate_id()));
            tables.ride_requests.insert(request.id, request.clone());
            Ok(request)
        })
    }

    fn get_ride_request(&self, id: RideRequestId) -> StoreFuture<'_, RideRequest> {
        Box::pin(async move {
            self.read()?
                .ride_requests
                .get(&id)
                .cloned()
                .ok_or(StoreError::ride_request_not_found(id))
        })
    }

    fn add_ride(&self, ride: NewRide) -> StoreFuture<'_, Ride> {
        Box::pin(async move {
            self.check_ride_write()?;
            let mut tables = self.write()?;
            let ride = ride.with_id(RideId::new(tables.allocate_id()));
            tables.rides.insert(ride.id, ride.clone());
            Ok(ride)
        })
    }

    fn get_ride(&self, id: RideId) -> StoreFuture<'_, Ride> {
        Box::pin(async move {
            self.read()?
                .rides
                .get(&id)
                .cloned()
                .ok_or(StoreError::ride_not_found(id))
        })
    }

    fn update_ride_status(&self, id: RideId, status: RideStatus) -> StoreFuture<'_, Ride> {
        Box::pin(async move {
            self.check_ride_write()?;
            let mut tables = self.write()?;
            let ride = tables
                .rides
                .get_mut(&id)
                .ok_or(StoreError::ride_not_found(id))?;
            if !ride.status.can_transition_to(status) {
                return Err(StoreError::InvalidTransition {
                    id,
                    from: ride.status,
                    to: status,
                });
            }
            ride.status = status;
            Ok(ride.clone())
        })
    }

    fn list_drivers(&self) -> StoreFuture<'_, Vec<User>> {
        Box::pin(async move {
            Ok(self
                .read()?
                .users
                .values()
                .filter(|user| user.is_driver())
                .cloned()
                .collect())
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use ridehail_core::model::Role;

    #[tokio::test]
    async fn ids_are_assigned_in_order() {
        let store = InMemoryEntityStore::new();
        let a = store
            .add_user(NewUser::new("a", Role::Rider, GeoPoint::new(0.0, 0.0)))
            .await
            .unwrap();
        let b = store
            .add_user(NewUser::new("b", Role::Driver, GeoPoint::new(0.0, 0.0)))
            .await
            .unwrap();
        assert!(a.id < b.id);
        assert_eq!(store.users().len(), 2);
    }

    #[tokio::test]
    async fn unknown_ids_are_not_found() {
        let store = InMemoryEntityStore::new();
        assert_eq!(
            store.get_user(UserId::new(5)).await,
            Err(StoreError::user_not_found(UserId::new(5)))
        );
        assert_eq!(
            store
                .update_user_location(UserId::new(5), GeoPoint::new(1.0, 1.0))
                .await,
            Err(StoreError::user_not_found(UserId::new(5)))
        );
        assert_eq!(
            store
                .update_ride_status(RideId::new(8), RideStatus::Completed)
                .await,
            Err(StoreError::ride_not_found(RideId::new(8)))
        );
        assert_eq!(
            store.get_ride_request(RideRequestId::new(2)).await,
            Err(StoreError::ride_request_not_found(RideRequestId::new(2)))
        );
    }

    #[tokio::test]
    async fn ride_status_never_moves_backwards() {
        let store = InMemoryEntityStore::new();
        let ride = store
            .add_ride(NewRide {
                rider_id: UserId::new(1),
                driver_id: UserId::new(2),
                pickup: GeoPoint::new(0.0, 0.0),
                dropoff: GeoPoint::new(1.0, 1.0),
            })
            .await
            .unwrap();
        assert_eq!(ride.status, RideStatus::Ongoing);

        let done = store
            .update_ride_status(ride.id, RideStatus::Completed)
            .await
            .unwrap();
        assert_eq!(done.status, RideStatus::Completed);

        let back = store.update_ride_status(ride.id, RideStatus::Ongoing).await;
        assert!(matches!(back, Err(StoreError::InvalidTransition { .. })));
        assert_eq!(
            store.get_ride(ride.id).await.unwrap().status,
            RideStatus::Completed
        );
    }

    #[tokio::test]
    async fn list_drivers_skips_riders() {
        let store = InMemoryEntityStore::new();
        store
            .add_user(NewUser::new("r", Role::Rider, GeoPoint::new(0.0, 0.0)))
            .await
            .unwrap();
        let d = store
            .add_user(NewUser::new("d", Role::Driver, GeoPoint::new(3.0, 3.0)))
            .await
            .unwrap();
        assert_eq!(store.list_drivers().await.unwrap(), vec![d]);
    }

    #[tokio::test]
    async fn nearest_driver_on_empty_store_fails() {
        let store = InMemoryEntityStore::new();
        assert_eq!(
            store.find_nearest_driver(GeoPoint::new(0.0, 0.0)).await,
            Err(StoreError::NoAvailableDriver)
        );
    }
}
