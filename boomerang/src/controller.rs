//! Process lifecycle: wires storage, dispatcher, metrics and the HTTP
//! ingress together, and coordinates graceful shutdown on SIGINT/SIGTERM.

use std::sync::{Arc, LazyLock};

use boomerang_common::{config::Config, internal, logging, tracing, Signal};
use boomerang_dispatcher::Dispatcher;
use boomerang_storage::StorageManager;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::server::{self, AppState};

pub static SHUTDOWN_BROADCAST: LazyLock<broadcast::Sender<Signal>> = LazyLock::new(|| {
    let (sender, _receiver) = broadcast::channel(64);
    sender
});

async fn shutdown() -> anyhow::Result<()> {
    let mut terminate = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            internal!("CTRL+C received, shutting down");
        }
        _ = terminate.recv() => {
            internal!("SIGTERM received, shutting down");
        }
    };

    let mut receiver = SHUTDOWN_BROADCAST.subscribe();
    SHUTDOWN_BROADCAST
        .send(Signal::Shutdown)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Interrupted, e.to_string()))?;

    loop {
        tokio::select! {
            sig = receiver.recv() => {
                match sig {
                    Ok(s) => tracing::debug!("received {s:?}"),
                    Err(broadcast::error::RecvError::Closed) => break,
                    Err(e) => tracing::debug!("received: {e:?}"),
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    Ok(())
}

/// The running service: an HTTP ingress feeding a `StorageManager`, and a
/// `Dispatcher` draining it.
pub struct Boomerang {
    config: Config,
    storage: Arc<StorageManager>,
    dispatcher: Arc<Dispatcher>,
    metrics: Arc<boomerang_metrics::Metrics>,
}

impl Boomerang {
    /// # Errors
    ///
    /// Returns an error if storage recovery, the dispatcher's HTTP client,
    /// or the metrics exporter fail to initialize.
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let metrics = Arc::new(boomerang_metrics::init(&config.metrics)?);
        let storage = Arc::new(StorageManager::new(&config.storage, metrics.clone())?);
        let dispatcher = Arc::new(Dispatcher::new(storage.clone(), &config.dispatcher, metrics.clone())?);

        Ok(Self {
            config,
            storage,
            dispatcher,
            metrics,
        })
    }

    /// Runs until a shutdown signal is received, then drains the
    /// dispatcher, storage manager, and process in that order.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP listener cannot bind, or if the
    /// dispatcher or ingress server fail outside of shutdown.
    pub async fn run(self) -> anyhow::Result<()> {
        logging::init();
        internal!("boomerang starting");

        let state = AppState {
            storage: self.storage.clone(),
            metrics: self.metrics.clone(),
        };
        let app = server::router(state);
        let listener = TcpListener::bind(("0.0.0.0", self.config.server.port)).await?;
        internal!("listening on port {}", self.config.server.port);

        let mut ingress_shutdown = SHUTDOWN_BROADCAST.subscribe();
        let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
            let _ = ingress_shutdown.recv().await;
        });

        let dispatcher_handle = tokio::spawn(self.dispatcher.clone().serve(SHUTDOWN_BROADCAST.subscribe()));

        let result = tokio::select! {
            r = serve => r.map_err(anyhow::Error::from),
            r = shutdown() => r,
        };

        internal!("waiting for the dispatcher to finish its in-flight batch");
        dispatcher_handle.await??;

        internal!("draining storage manager");
        self.storage.shutdown().await?;

        internal!("shutting down metrics");
        self.metrics.shutdown()?;

        result
    }
}
