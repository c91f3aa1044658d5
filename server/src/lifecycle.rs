//! Application lifecycle management and graceful shutdown.
//!
//! # Graceful Shutdown
//!
//! When a shutdown signal is received (Ctrl+C or SIGTERM):
//! 1. HTTP server stops accepting new connections and drains in-flight requests
//! 2. Shutdown signal broadcast to the event consumer and the metrics server
//! 3. Wait for background tasks to finish, up to the shutdown timeout
//! 4. Close the database pool
//!
//! # Example
//!
//! ```rust,ignore
//! let app = Application::new(listener, router, consumer, shutdown_tx)
//!     .with_metrics(metrics_listener, metrics_router)
//!     .with_pool(pool);
//!
//! app.run().await?;
//! ```

use ridehail_runtime::EventConsumer;
use sqlx::PgPool;
use std::future::Future;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Error type returned by [`Application::run`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Running application with all background tasks.
///
/// # Lifecycle
///
/// 1. Created via [`Application::new`]
/// 2. Started via [`Application::run`]
/// 3. Runs until shutdown signal received
/// 4. Coordinates graceful shutdown of all tasks
pub struct Application {
    listener: TcpListener,
    app: axum::Router,
    metrics: Option<(TcpListener, axum::Router)>,
    consumer: EventConsumer,
    shutdown_tx: broadcast::Sender<()>,
    pool: Option<PgPool>,
    shutdown_timeout: Duration,
}

impl Application {
    /// Create a new application instance.
    ///
    /// `consumer` must have been built with a receiver from `shutdown_tx`.
    #[must_use]
    pub const fn new(
        listener: TcpListener,
        app: axum::Router,
        consumer: EventConsumer,
        shutdown_tx: broadcast::Sender<()>,
    ) -> Self {
        Self {
            listener,
            app,
            metrics: None,
            consumer,
            shutdown_tx,
            pool: None,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }

    /// Also serve `router` (the Prometheus scrape endpoint) on `listener`.
    #[must_use]
    pub fn with_metrics(mut self, listener: TcpListener, router: axum::Router) -> Self {
        self.metrics = Some((listener, router));
        self
    }

    /// Close `pool` once everything else has stopped.
    #[must_use]
    pub fn with_pool(mut self, pool: PgPool) -> Self {
        self.pool = Some(pool);
        self
    }

    /// How long to wait for each background task at shutdown (default 10s).
    #[must_use]
    pub const fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Run until Ctrl+C or SIGTERM, then shut down gracefully.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP server fails.
    pub async fn run(self) -> Result<(), BoxError> {
        self.run_until(shutdown_signal()).await
    }

    /// Run until `signal` completes, then shut down gracefully.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP server fails.
    pub async fn run_until<F>(self, signal: F) -> Result<(), BoxError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let consumer_handle = self.consumer.spawn();
        info!("Event consumer started");

        let metrics_handle = self.metrics.map(|(listener, router)| {
            let mut shutdown_rx = self.shutdown_tx.subscribe();
            tokio::spawn(async move {
                let stopped = async move {
                    let _ = shutdown_rx.recv().await;
                };
                if let Err(e) = axum::serve(listener, router)
                    .with_graceful_shutdown(stopped)
                    .await
                {
                    error!(error = %e, "Metrics server failed");
                }
            })
        });

        info!(address = ?self.listener.local_addr().ok(), "HTTP server listening for requests");
        let served = axum::serve(self.listener, self.app)
            .with_graceful_shutdown(signal)
            .await;

        info!("HTTP server stopped, initiating graceful shutdown...");
        let _ = self.shutdown_tx.send(());

        await_task("event consumer", consumer_handle, self.shutdown_timeout).await;
        if let Some(handle) = metrics_handle {
            await_task("metrics server", handle, self.shutdown_timeout).await;
        }

        if let Some(pool) = self.pool {
            pool.close().await;
            info!("Database pool closed");
        }

        served?;
        info!("Graceful shutdown complete");
        Ok(())
    }
}

async fn await_task(name: &str, handle: JoinHandle<()>, timeout: Duration) {
    match tokio::time::timeout(timeout, handle).await {
        Ok(Ok(())) => info!(task = name, "Task stopped gracefully"),
        Ok(Err(e)) => warn!(task = name, error = %e, "Task failed"),
        Err(_) => warn!(task = name, "Task shutdown timed out"),
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
///
/// If a handler cannot be installed, that signal is never reported.
pub async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        () = terminate => {
            info!("Received SIGTERM signal");
        }
    }
}
