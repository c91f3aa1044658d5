//! Ride dispatch HTTP server.
//!
//! Matches riders to the nearest driver, simulates the trip, and streams
//! ride events through Redpanda.

use ridehail_core::dispatcher::Dispatcher;
use ridehail_core::event_bus::EventBus;
use ridehail_postgres::PostgresEntityStore;
use ridehail_redpanda::RedpandaEventBus;
use ridehail_runtime::metrics::MetricsServer;
use ridehail_runtime::{EventConsumer, RideEventRouter};
use ridehail_server::{Application, BoxError, Config, telemetry};
use ridehail_web::{AppState, build_router};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // A missing .env file is fine; the process environment still applies.
    let _ = dotenvy::dotenv();
    telemetry::init_tracing();

    info!("Starting ride dispatch server");

    let config = Config::from_env();
    info!(
        redpanda_brokers = %config.redpanda.brokers,
        topic = %config.redpanda.topic,
        consumer_group = %config.redpanda.consumer_group,
        "Configuration loaded"
    );

    let mut metrics = MetricsServer::new(config.metrics_addr().parse()?);
    metrics.start()?;

    info!("Connecting to PostgreSQL...");
    let store = PostgresEntityStore::connect(
        &config.database.url,
        config.database.max_connections,
        config.database.connect_timeout,
    )
    .await?;
    store.migrate().await?;
    let pool = store.pool().clone();

    info!("Connecting to Redpanda event bus...");
    let event_bus: Arc<dyn EventBus> = Arc::new(
        RedpandaEventBus::builder()
            .brokers(&config.redpanda.brokers)
            .consumer_group(&config.redpanda.consumer_group)
            .auto_offset_reset(&config.redpanda.auto_offset_reset)
            .build()?,
    );
    info!("Event bus connected");

    let dispatcher =
        Dispatcher::new(Arc::new(store), event_bus.clone()).with_topic(&config.redpanda.topic);

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let consumer = EventConsumer::builder()
        .name("ride-events")
        .topics(vec![config.redpanda.topic.clone()])
        .event_bus(event_bus)
        .handler(Arc::new(RideEventRouter::new()))
        .shutdown(shutdown_rx)
        .backoff(config.backoff_policy())
        .build()?;

    let listener = TcpListener::bind(config.server_addr()).await?;
    info!(address = %config.server_addr(), "Server listening");
    let metrics_listener = TcpListener::bind(metrics.addr()).await?;
    info!(address = %metrics.addr(), "Metrics endpoint listening");

    Application::new(
        listener,
        build_router(AppState::new(dispatcher)),
        consumer,
        shutdown_tx,
    )
    .with_metrics(metrics_listener, telemetry::metrics_router(Arc::new(metrics)))
    .with_pool(pool)
    .with_shutdown_timeout(config.shutdown_timeout())
    .run()
    .await
}
