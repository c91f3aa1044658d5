//! Users, ride requests, and rides.
//!
//! Field names match the persisted columns so the same JSON shape travels over
//! HTTP and over the event bus. Persisted records carry an id; the `New*`
//! types are the inputs to the entity store before an id is assigned.

use crate::geo::GeoPoint;
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            /// Wrap a raw database id.
            #[must_use]
            pub const fn new(id: i64) -> Self {
                Self(id)
            }

            /// The raw database id.
            #[must_use]
            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

entity_id!(
    /// Identifier of a [`User`].
    UserId
);
entity_id!(
    /// Identifier of a [`RideRequest`].
    RideRequestId
);
entity_id!(
    /// Identifier of a [`Ride`].
    RideId
);

/// What a user does on the platform. Fixed at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Offers rides.
    Driver,
    /// Requests rides.
    Rider,
}

impl Role {
    /// Database string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Driver => "driver",
            Self::Rider => "rider",
        }
    }

    /// Parse a role from its database string.
    ///
    /// # Errors
    ///
    /// Returns the unrecognized input.
    pub fn parse(s: &str) -> Result<Self, String> {
        match s {
            "driver" => Ok(Self::Driver),
            "rider" => Ok(Self::Rider),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a [`Ride`].
///
/// The only legal transition is `Ongoing -> Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RideStatus {
    /// Driver matched, trip in progress.
    Ongoing,
    /// Trip finished. Terminal.
    Completed,
}

impl RideStatus {
    /// Database string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Ongoing => "ongoing",
            Self::Completed => "completed",
        }
    }

    /// Parse a status from its database string.
    ///
    /// # Errors
    ///
    /// Returns the unrecognized input.
    pub fn parse(s: &str) -> Result<Self, String> {
        match s {
            "ongoing" => Ok(Self::Ongoing),
            "completed" => Ok(Self::Completed),
            other => Err(format!("unknown ride status '{other}'")),
        }
    }

    /// Whether a ride in this state may move to `next`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!((self, next), (Self::Ongoing, Self::Completed))
    }
}

impl fmt::Display for RideStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registered driver or rider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Store-assigned id.
    pub id: UserId,
    /// Display name.
    pub name: String,
    /// Driver or rider.
    pub role: Role,
    /// Last known latitude.
    pub latitude: f64,
    /// Last known longitude.
    pub longitude: f64,
}

impl User {
    /// Last known position.
    #[must_use]
    pub const fn position(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }

    /// Whether this user is a driver.
    #[must_use]
    pub fn is_driver(&self) -> bool {
        self.role == Role::Driver
    }
}

/// Registration input for a [`User`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewUser {
    /// Display name.
    pub name: String,
    /// Driver or rider.
    pub role: Role,
    /// Initial latitude.
    pub latitude: f64,
    /// Initial longitude.
    pub longitude: f64,
}

impl NewUser {
    /// Registration input at `position`.
    #[must_use]
    pub fn new(name: impl Into<String>, role: Role, position: GeoPoint) -> Self {
        Self {
            name: name.into(),
            role,
            latitude: position.latitude,
            longitude: position.longitude,
        }
    }

    /// Requested initial position.
    #[must_use]
    pub const fn position(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }

    /// Attach a store-assigned id.
    #[must_use]
    pub fn with_id(self, id: UserId) -> User {
        User {
            id,
            name: self.name,
            role: self.role,
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }
}

/// A rider's request to travel from pickup (`initial_*`) to dropoff (`final_*`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RideRequest {
    /// Store-assigned id.
    pub id: RideRequestId,
    /// Requesting rider.
    pub rider_id: UserId,
    /// Pickup latitude.
    pub initial_latitude: f64,
    /// Pickup longitude.
    pub initial_longitude: f64,
    /// Dropoff latitude.
    pub final_latitude: f64,
    /// Dropoff longitude.
    pub final_longitude: f64,
}

impl RideRequest {
    /// Pickup point.
    #[must_use]
    pub const fn pickup(&self) -> GeoPoint {
        GeoPoint::new(self.initial_latitude, self.initial_longitude)
    }

    /// Dropoff point.
    #[must_use]
    pub const fn dropoff(&self) -> GeoPoint {
        GeoPoint::new(self.final_latitude, self.final_longitude)
    }
}

/// Input for a [`RideRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRideRequest {
    /// Requesting rider.
    pub rider_id: UserId,
    /// Pickup latitude.
    pub initial_latitude: f64,
    /// Pickup longitude.
    pub initial_longitude: f64,
    /// Dropoff latitude.
    pub final_latitude: f64,
    /// Dropoff longitude.
    pub final_longitude: f64,
}

impl NewRideRequest {
    /// Request a trip for `rider_id` from `pickup` to `dropoff`.
    #[must_use]
    pub const fn new(rider_id: UserId, pickup: GeoPoint, dropoff: GeoPoint) -> Self {
        Self {
            rider_id,
            initial_latitude: pickup.latitude,
            initial_longitude: pickup.longitude,
            final_latitude: dropoff.latitude,
            final_longitude: dropoff.longitude,
        }
    }

    /// Pickup point.
    #[must_use]
    pub const fn pickup(&self) -> GeoPoint {
        GeoPoint::new(self.initial_latitude, self.initial_longitude)
    }

    /// Dropoff point.
    #[must_use]
    pub const fn dropoff(&self) -> GeoPoint {
        GeoPoint::new(self.final_latitude, self.final_longitude)
    }

    /// Attach a store-assigned id.
    #[must_use]
    pub const fn with_id(self, id: RideRequestId) -> RideRequest {
        RideRequest {
            id,
            rider_id: self.rider_id,
            initial_latitude: self.initial_latitude,
            initial_longitude: self.initial_longitude,
            final_latitude: self.final_latitude,
            final_longitude: self.final_longitude,
        }
    }
}

/// A matched trip between a rider and a driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ride {
    /// Store-assigned id.
    pub id: RideId,
    /// Rider being carried.
    pub rider_id: UserId,
    /// Matched driver.
    pub driver_id: UserId,
    /// Pickup latitude, copied from the request.
    pub initial_latitude: f64,
    /// Pickup longitude, copied from the request.
    pub initial_longitude: f64,
    /// Dropoff latitude, copied from the request.
    pub final_latitude: f64,
    /// Dropoff longitude, copied from the request.
    pub final_longitude: f64,
    /// Lifecycle state.
    pub status: RideStatus,
}

impl Ride {
    /// Pickup point.
    #[must_use]
    pub const fn pickup(&self) -> GeoPoint {
        GeoPoint::new(self.initial_latitude, self.initial_longitude)
    }

    /// Dropoff point.
    #[must_use]
    pub const fn dropoff(&self) -> GeoPoint {
        GeoPoint::new(self.final_latitude, self.final_longitude)
    }
}

/// Input for a [`Ride`]. Rides always start out [`RideStatus::Ongoing`].
#[derive(Debug, Clone, PartialEq)]
pub struct NewRide {
    /// Rider being carried.
    pub rider_id: UserId,
    /// Matched driver.
    pub driver_id: UserId,
    /// Pickup point.
    pub pickup: GeoPoint,
    /// Dropoff point.
    pub dropoff: GeoPoint,
}

impl NewRide {
    /// Match `request` to `driver_id`, copying the request's endpoints.
    #[must_use]
    pub const fn for_request(request: &RideRequest, driver_id: UserId) -> Self {
        Self {
            rider_id: request.rider_id,
            driver_id,
            pickup: request.pickup(),
            dropoff: request.dropoff(),
        }
    }

    /// Attach a store-assigned id and the initial status.
    #[must_use]
    pub const fn with_id(self, id: RideId) -> Ride {
        Ride {
            id,
            rider_id: self.rider_id,
            driver_id: self.driver_id,
            initial_latitude: self.pickup.latitude,
            initial_longitude: self.pickup.longitude,
            final_latitude: self.dropoff.latitude,
            final_longitude: self.dropoff.longitude,
            status: RideStatus::Ongoing,
        }
    }
}
