//! Application lifecycle tests with in-memory backends.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use ridehail_core::event::RIDE_EVENTS_TOPIC;
use ridehail_runtime::{EventConsumer, RideEventRouter};
use ridehail_server::Application;
use ridehail_testing::fixtures::TestHarness;
use ridehail_web::{AppState, build_router};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, oneshot};

async fn get(addr: SocketAddr, path: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    response
}

#[tokio::test]
async fn test_serves_until_signalled_then_stops_consumer() {
    let harness = TestHarness::new();
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let consumer = EventConsumer::builder()
        .name("lifecycle-test")
        .topics(vec![RIDE_EVENTS_TOPIC.to_string()])
        .event_bus(Arc::new(harness.bus.clone()))
        .handler(Arc::new(RideEventRouter::new()))
        .shutdown(shutdown_rx)
        .build()
        .unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = Application::new(
        listener,
        build_router(AppState::new(harness.dispatcher.clone())),
        consumer,
        shutdown_tx,
    )
    .with_shutdown_timeout(Duration::from_secs(2));

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let running = tokio::spawn(app.run_until(async move {
        let _ = stop_rx.await;
    }));

    let response = get(addr, "/health").await;
    assert!(response.starts_with("HTTP/1.1 200"), "got: {response}");

    tokio::time::timeout(Duration::from_secs(2), async {
        while harness.bus.subscribe_calls() == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("consumer never subscribed");

    stop_tx.send(()).unwrap();
    let result = tokio::time::timeout(Duration::from_secs(5), running)
        .await
        .expect("application did not stop")
        .unwrap();
    assert!(result.is_ok());

    // The listener is gone.
    assert!(TcpStream::connect(addr).await.is_err());
}

#[tokio::test]
async fn test_metrics_listener_is_served_and_stopped() {
    let harness = TestHarness::new();
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let consumer = EventConsumer::new(
        "lifecycle-metrics-test",
        vec![RIDE_EVENTS_TOPIC.to_string()],
        Arc::new(harness.bus.clone()),
        Arc::new(RideEventRouter::new()),
        shutdown_rx,
    );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let metrics_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let metrics_addr = metrics_listener.local_addr().unwrap();
    let metrics_app = axum::Router::new().route("/metrics", axum::routing::get(|| async { "up 1" }));

    let app = Application::new(
        listener,
        build_router(AppState::new(harness.dispatcher.clone())),
        consumer,
        shutdown_tx,
    )
    .with_metrics(metrics_listener, metrics_app);

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let running = tokio::spawn(app.run_until(async move {
        let _ = stop_rx.await;
    }));

    let response = get(metrics_addr, "/metrics").await;
    assert!(response.ends_with("up 1"), "got: {response}");

    stop_tx.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(5), running)
        .await
        .expect("application did not stop")
        .unwrap()
        .unwrap();

    assert!(TcpStream::connect(metrics_addr).await.is_err());
}
