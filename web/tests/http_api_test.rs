//! HTTP API tests against the router with in-memory backends.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use axum::http::StatusCode;
use axum_test::TestServer;
use ridehail_core::event::{DRIVER_LOCATION_UPDATE, RIDE_COMPLETION, RIDE_REQUEST};
use ridehail_core::geo::GeoPoint;
use ridehail_core::model::{Ride, RideStatus, Role, User};
use ridehail_core::store::EntityStore;
use ridehail_testing::fixtures::TestHarness;
use ridehail_web::{AppState, build_router};
use serde_json::{Value, json};

fn server() -> (TestServer, TestHarness) {
    let harness = TestHarness::new();
    let app = build_router(AppState::new(harness.dispatcher.clone()));
    (TestServer::new(app).expect("router should serve"), harness)
}

async fn register(server: &TestServer, name: &str, role: &str, lat: f64, lon: f64) -> User {
    let response = server
        .post("/users/register")
        .json(&json!({"name": name, "role": role, "latitude": lat, "longitude": lon}))
        .await;
    response.assert_status(StatusCode::CREATED);
    response.json::<User>()
}

#[tokio::test]
async fn test_health() {
    let (server, _) = server();
    let response = server.get("/health").await;
    response.assert_status_ok();
    assert_eq!(response.text(), "ok");
}

#[tokio::test]
async fn test_register_user_returns_created_user() {
    let (server, harness) = server();

    let user = register(&server, "Ada", "driver", 1.0, 2.0).await;

    assert_eq!(user.name, "Ada");
    assert_eq!(user.role, Role::Driver);
    assert_eq!(user.position(), GeoPoint::new(1.0, 2.0));
    assert_eq!(harness.store.get_user(user.id).await.unwrap(), user);
}

#[tokio::test]
async fn test_register_user_rejects_unknown_role() {
    let (server, harness) = server();

    let response = server
        .post("/users/register")
        .json(&json!({"name": "X", "role": "pilot", "latitude": 0.0, "longitude": 0.0}))
        .await;

    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response.json::<Value>()["code"], "VALIDATION_ERROR");
    assert!(harness.store.users().is_empty());
}

#[tokio::test]
async fn test_register_user_rejects_out_of_range_latitude() {
    let (server, _) = server();

    let response = server
        .post("/users/register")
        .json(&json!({"name": "X", "role": "rider", "latitude": 91.0, "longitude": 0.0}))
        .await;

    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let (server, _) = server();

    let response = server
        .post("/users/register")
        .text("{\"name\": ")
        .content_type("application/json")
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_request_ride_end_to_end() {
    let (server, harness) = server();
    let r1 = register(&server, "R1", "rider", 0.0, 0.0).await;
    let d1 = register(&server, "D1", "driver", 1.0, 1.0).await;
    register(&server, "D2", "driver", 10.0, 10.0).await;

    let response = server
        .post("/rides/request")
        .json(&json!({
            "rider_id": r1.id,
            "initial_latitude": 0.0,
            "initial_longitude": 0.0,
            "final_latitude": 5.0,
            "final_longitude": 5.0,
        }))
        .await;

    response.assert_status(StatusCode::CREATED);
    let ride = response.json::<Ride>();
    assert_eq!(ride.driver_id, d1.id);
    assert_eq!(ride.rider_id, r1.id);
    assert_eq!(ride.status, RideStatus::Completed);
    assert_eq!(ride.dropoff(), GeoPoint::new(5.0, 5.0));

    assert_eq!(
        harness.bus.published_types(),
        vec![
            RIDE_REQUEST,
            DRIVER_LOCATION_UPDATE,
            DRIVER_LOCATION_UPDATE,
            RIDE_COMPLETION
        ]
    );
}

#[tokio::test]
async fn test_request_ride_without_drivers_is_not_found() {
    let (server, harness) = server();
    let rider = register(&server, "R", "rider", 0.0, 0.0).await;

    let response = server
        .post("/rides/request")
        .json(&json!({
            "rider_id": rider.id,
            "initial_latitude": 0.0,
            "initial_longitude": 0.0,
            "final_latitude": 1.0,
            "final_longitude": 1.0,
        }))
        .await;

    response.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(response.json::<Value>()["code"], "NO_AVAILABLE_DRIVER");
    // The request itself was stored.
    assert_eq!(harness.store.ride_requests().len(), 1);
}

#[tokio::test]
async fn test_request_ride_for_unknown_rider_is_not_found() {
    let (server, _) = server();
    register(&server, "D", "driver", 0.0, 0.0).await;

    let response = server
        .post("/rides/request")
        .json(&json!({
            "rider_id": 999,
            "initial_latitude": 0.0,
            "initial_longitude": 0.0,
            "final_latitude": 1.0,
            "final_longitude": 1.0,
        }))
        .await;

    response.assert_status(StatusCode::NOT_FOUND);
    let body = response.json::<Value>();
    assert_eq!(body["code"], "NOT_FOUND");
    assert_eq!(body["message"], "user with id 999 not found");
}

#[tokio::test]
async fn test_update_driver_location() {
    let (server, harness) = server();
    let driver = register(&server, "D", "driver", 0.0, 0.0).await;

    let response = server
        .post(&format!("/drivers/{}/location", driver.id))
        .json(&json!({"latitude": 3.5, "longitude": -7.25}))
        .await;

    response.assert_status_ok();
    let moved = response.json::<User>();
    assert_eq!(moved.id, driver.id);
    assert_eq!(moved.position(), GeoPoint::new(3.5, -7.25));
    assert_eq!(harness.bus.published_types(), vec![DRIVER_LOCATION_UPDATE]);
}

#[tokio::test]
async fn test_update_location_of_rider_is_rejected() {
    let (server, harness) = server();
    let rider = register(&server, "R", "rider", 0.0, 0.0).await;

    let response = server
        .post(&format!("/drivers/{}/location", rider.id))
        .json(&json!({"latitude": 1.0, "longitude": 1.0}))
        .await;

    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    assert!(harness.bus.published().is_empty());
}

#[tokio::test]
async fn test_update_location_of_unknown_driver_is_not_found() {
    let (server, _) = server();

    let response = server
        .post("/drivers/41/location")
        .json(&json!({"latitude": 1.0, "longitude": 1.0}))
        .await;

    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_non_numeric_path_id_is_bad_request() {
    let (server, _) = server();

    let response = server
        .post("/drivers/abc/location")
        .json(&json!({"latitude": 1.0, "longitude": 1.0}))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_find_driver_for_stored_request() {
    let (server, harness) = server();
    let rider = register(&server, "R", "rider", 0.0, 0.0).await;
    let near = register(&server, "Near", "driver", 0.5, 0.5).await;
    register(&server, "Far", "driver", 20.0, 20.0).await;

    let request = harness
        .store
        .add_ride_request(harness.request(rider.id, (0.0, 0.0), (1.0, 1.0)))
        .await
        .unwrap();

    let response = server
        .get(&format!("/rides/find-driver/{}", request.id))
        .await;

    response.assert_status_ok();
    assert_eq!(response.json::<User>(), near);
    // Lookup only: no ride, no events.
    assert!(harness.store.rides().is_empty());
    assert!(harness.bus.published().is_empty());
}

#[tokio::test]
async fn test_find_driver_for_unknown_request_is_not_found() {
    let (server, _) = server();

    let response = server.get("/rides/find-driver/77").await;

    response.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(
        response.json::<Value>()["message"],
        "ride request with id 77 not found"
    );
}
