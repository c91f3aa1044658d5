//! [`EntityStore`] backed by `PostgreSQL`.

use ridehail_core::geo::GeoPoint;
use ridehail_core::model::{
    NewRide, NewRideRequest, NewUser, Ride, RideId, RideRequest, RideRequestId, RideStatus, Role,
    User, UserId,
};
use ridehail_core::store::{EntityStore, StoreError, StoreFuture};
use sqlx::Row;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use std::time::Duration;

const USER_COLUMNS: &str = "id, name, role, latitude, longitude";
const RIDE_REQUEST_COLUMNS: &str =
    "id, rider_id, initial_latitude, initial_longitude, final_latitude, final_longitude";
const RIDE_COLUMNS: &str = "id, rider_id, driver_id, initial_latitude, initial_longitude, \
                            final_latitude, final_longitude, status";

/// `PostgreSQL`-backed entity store.
///
/// Ids come from `BIGSERIAL` columns. Every method is a single statement
/// except [`EntityStore::update_ride_status`], which locks the ride row in a
/// transaction so the transition check and the write see the same status.
///
/// # Schema
///
/// Created by [`PostgresEntityStore::migrate`]:
///
/// ```sql
/// CREATE TABLE users (id BIGSERIAL PRIMARY KEY, name TEXT, role TEXT, latitude DOUBLE PRECISION, longitude DOUBLE PRECISION);
/// CREATE TABLE ride_requests (id BIGSERIAL PRIMARY KEY, rider_id BIGINT REFERENCES users(id), ...);
/// CREATE TABLE rides (id BIGSERIAL PRIMARY KEY, rider_id BIGINT, driver_id BIGINT, ..., status TEXT);
/// ```
#[derive(Clone)]
pub struct PostgresEntityStore {
    pool: PgPool,
}

impl PostgresEntityStore {
    /// Create a store over an existing connection pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a connection pool to `database_url`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if no connection can be established
    /// within `connect_timeout_secs`.
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        connect_timeout_secs: u64,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(connect_timeout_secs))
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Database(format!("Failed to connect: {e}")))?;

        tracing::info!(max_connections, "Connected to PostgreSQL");
        Ok(Self::from_pool(pool))
    }

    /// Create the `users`, `ride_requests`, and `rides` tables if missing.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if migration fails.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Database(format!("Migration failed: {e}")))?;
        tracing::info!("Database migrations applied");
        Ok(())
    }

    /// Get the underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn row_to_user(row: &PgRow) -> Result<User, StoreError> {
        let decode = db_error("decode user");
        let role: String = row.try_get("role").map_err(&decode)?;
        Ok(User {
            id: UserId::new(row.try_get("id").map_err(&decode)?),
            name: row.try_get("name").map_err(&decode)?,
            role: Role::parse(&role).map_err(StoreError::Database)?,
            latitude: row.try_get("latitude").map_err(&decode)?,
            longitude: row.try_get("longitude").map_err(&decode)?,
        })
    }

    fn row_to_ride_request(row: &PgRow) -> Result<RideRequest, StoreError> {
        let decode = db_error("decode ride request");
        Ok(RideRequest {
            id: RideRequestId::new(row.try_get("id").map_err(&decode)?),
            rider_id: UserId::new(row.try_get("rider_id").map_err(&decode)?),
            initial_latitude: row.try_get("initial_latitude").map_err(&decode)?,
            initial_longitude: row.try_get("initial_longitude").map_err(&decode)?,
            final_latitude: row.try_get("final_latitude").map_err(&decode)?,
            final_longitude: row.try_get("final_longitude").map_err(&decode)?,
        })
    }

    fn row_to_ride(row: &PgRow) -> Result<Ride, StoreError> {
        let decode = db_error("decode ride");
        let status: String = row.try_get("status").map_err(&decode)?;
        Ok(Ride {
            id: RideId::new(row.try_get("id").map_err(&decode)?),
            rider_id: UserId::new(row.try_get("rider_id").map_err(&decode)?),
            driver_id: UserId::new(row.try_get("driver_id").map_err(&decode)?),
            initial_latitude: row.try_get("initial_latitude").map_err(&decode)?,
            initial_longitude: row.try_get("initial_longitude").map_err(&decode)?,
            final_latitude: row.try_get("final_latitude").map_err(&decode)?,
            final_longitude: row.try_get("final_longitude").map_err(&decode)?,
            status: RideStatus::parse(&status).map_err(StoreError::Database)?,
        })
    }
}

/// Map a sqlx error to [`StoreError::Database`], counting it under `operation`.
fn db_error(operation: &'static str) -> impl Fn(sqlx::Error) -> StoreError {
    move |e| {
        tracing::error!(operation, error = %e, "Database operation failed");
        metrics::counter!("store.errors", "operation" => operation).increment(1);
        StoreError::Database(format!("{operation}: {e}"))
    }
}

impl EntityStore for PostgresEntityStore {
    fn add_user(&self, user: NewUser) -> StoreFuture<'_, User> {
        Box::pin(async move {
            let row = sqlx::query(&format!(
                "INSERT INTO users (name, role, latitude, longitude)
                 VALUES ($1, $2, $3, $4)
                 RETURNING {USER_COLUMNS}"
            ))
            .bind(&user.name)
            .bind(user.role.as_str())
            .bind(user.latitude)
            .bind(user.longitude)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("add user"))?;

            Self::row_to_user(&row)
        })
    }

    fn get_user(&self, id: UserId) -> StoreFuture<'_, User> {
        Box::pin(async move {
            let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
                .bind(id.get())
                .fetch_optional(&self.pool)
                .await
                .map_err(db_error("get user"))?
                .ok_or(StoreError::user_not_found(id))?;

            Self::row_to_user(&row)
        })
    }

    fn update_user_location(&self, id: UserId, position: GeoPoint) -> StoreFuture<'_, User> {
        Box::pin(async move {
            let row = sqlx::query(&format!(
                "UPDATE users SET latitude = $1, longitude = $2
                 WHERE id = $3
                 RETURNING {USER_COLUMNS}"
            ))
            .bind(position.latitude)
            .bind(position.longitude)
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("update user location"))?
            .ok_or(StoreError::user_not_found(id))?;

            Self::row_to_user(&row)
        })
    }

    fn add_ride_request(&self, request: NewRideRequest) -> StoreFuture<'_, RideRequest> {
        Box::pin(async move {
            let row = sqlx::query(&format!(
                "INSERT INTO ride_requests
                    (rider_id, initial_latitude, initial_longitude, final_latitude, final_longitude)
                 VALUES ($1, $2, $3, $4, $5)
                 RETURNING {RIDE_REQUEST_COLUMNS}"
            ))
            .bind(request.rider_id.get())
            .bind(request.initial_latitude)
            .bind(request.initial_longitude)
            .bind(request.final_latitude)
            .bind(request.final_longitude)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("add ride request"))?;

            Self::row_to_ride_request(&row)
        })
    }

    fn get_ride_request(&self, id: RideRequestId) -> StoreFuture<'_, RideRequest> {
        Box::pin(async move {
            let row = sqlx::query(&format!(
                "SELECT {RIDE_REQUEST_COLUMNS} FROM ride_requests WHERE id = $1"
            ))
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("get ride request"))?
            .ok_or(StoreError::ride_request_not_found(id))?;

            Self::row_to_ride_request(&row)
        })
    }

    fn add_ride(&self, ride: NewRide) -> StoreFuture<'_, Ride> {
        Box::pin(async move {
            let row = sqlx::query(&format!(
                "INSERT INTO rides
                    (rider_id, driver_id, initial_latitude, initial_longitude,
                     final_latitude, final_longitude, status)
                 VALUES ($1, $2, $3, $4, $5, $6, $7)
                 RETURNING {RIDE_COLUMNS}"
            ))
            .bind(ride.rider_id.get())
            .bind(ride.driver_id.get())
            .bind(ride.pickup.latitude)
            .bind(ride.pickup.longitude)
            .bind(ride.dropoff.latitude)
            .bind(ride.dropoff.longitude)
            .bind(RideStatus::Ongoing.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("add ride"))?;

            Self::row_to_ride(&row)
        })
    }

    fn get_ride(&self, id: RideId) -> StoreFuture<'_, Ride> {
        Box::pin(async move {
            let row = sqlx::query(&format!("SELECT {RIDE_COLUMNS} FROM rides WHERE id = $1"))
                .bind(id.get())
                .fetch_optional(&self.pool)
                .await
                .map_err(db_error("get ride"))?
                .ok_or(StoreError::ride_not_found(id))?;

            Self::row_to_ride(&row)
        })
    }

    fn update_ride_status(&self, id: RideId, status: RideStatus) -> StoreFuture<'_, Ride> {
        Box::pin(async move {
            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(db_error("update ride status"))?;

            let current = sqlx::query("SELECT status FROM rides WHERE id = $1 FOR UPDATE")
                .bind(id.get())
                .fetch_optional(&mut *tx)
                .await
                .map_err(db_error("update ride status"))?
                .ok_or(StoreError::ride_not_found(id))?;
            let current: String = current
                .try_get("status")
                .map_err(db_error("update ride status"))?;
            let current = RideStatus::parse(&current).map_err(StoreError::Database)?;

            if !current.can_transition_to(status) {
                return Err(StoreError::InvalidTransition {
                    id,
                    from: current,
                    to: status,
                });
            }

            let row = sqlx::query(&format!(
                "UPDATE rides SET status = $1 WHERE id = $2 RETURNING {RIDE_COLUMNS}"
            ))
            .bind(status.as_str())
            .bind(id.get())
            .fetch_one(&mut *tx)
            .await
            .map_err(db_error("update ride status"))?;

            tx.commit().await.map_err(db_error("update ride status"))?;

            Self::row_to_ride(&row)
        })
    }

    fn list_drivers(&self) -> StoreFuture<'_, Vec<User>> {
        Box::pin(async move {
            let rows = sqlx::query(&format!(
                "SELECT {USER_COLUMNS} FROM users WHERE role = $1 ORDER BY id ASC"
            ))
            .bind(Role::Driver.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("list drivers"))?;

            rows.iter().map(Self::row_to_user).collect()
        })
    }
}
