//! The main application logic, decoupled from the entry point.

use crate::{
    config::Config,
    core::NotificationChannel,
    dispatch::Dispatcher,
    internal_metrics,
    server::{self, AppState},
    services::{build_channels, build_suggester},
    task_manager::TaskManager,
};
use anyhow::{Context, Result};
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, instrument};

/// A handle to the running application.
pub struct App {
    task_manager: TaskManager,
    local_addr: SocketAddr,
    channel_names: Vec<String>,
}

impl App {
    /// Creates a new `AppBuilder` to construct an `App`.
    pub fn builder(config: Config) -> AppBuilder {
        AppBuilder::new(config)
    }

    /// The address the HTTP server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn channel_names(&self) -> &[String] {
        &self.channel_names
    }

    /// Waits for the shutdown signal and then gracefully shuts down all tasks.
    pub async fn run(self) -> Result<()> {
        let mut shutdown_rx = self.task_manager.get_shutdown_rx();
        if !*shutdown_rx.borrow() {
            shutdown_rx.changed().await.ok();
        }
        info!("Shutdown signal received. Waiting for tasks to complete...");

        let panicked = self.task_manager.shutdown().await;
        if panicked > 0 {
            anyhow::bail!("{} tasks panicked during shutdown", panicked);
        }
        Ok(())
    }
}

/// Builder for the main application.
///
/// Separates constructing the application's components from running it, and
/// lets tests substitute components.
pub struct AppBuilder {
    config: Config,
    channels_override: Option<Vec<Arc<dyn NotificationChannel>>>,
}

impl AppBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            channels_override: None,
        }
    }

    /// Overrides the notification channels for testing.
    pub fn channels_override(mut self, channels: Vec<Arc<dyn NotificationChannel>>) -> Self {
        self.channels_override = Some(channels);
        self
    }

    /// Builds all components, binds the listener and starts serving.
    #[instrument(skip_all)]
    pub async fn build(self, shutdown_rx: watch::Receiver<bool>) -> Result<App> {
        let config = self.config;
        let task_manager = TaskManager::new(shutdown_rx);

        // =========================================================================
        // 1. Metrics
        // =========================================================================
        let prom_handle = if config.metrics.enabled {
            internal_metrics::install()
        } else {
            None
        };

        // =========================================================================
        // 2. Channels and Dispatcher
        // =========================================================================
        let channels = match self.channels_override {
            Some(channels) => channels,
            None => build_channels(&config)?,
        };
        let dispatcher = Dispatcher::new(channels);
        let channel_names: Vec<String> = dispatcher
            .channel_names()
            .into_iter()
            .map(str::to_string)
            .collect();
        info!(channels = ?channel_names, "Dispatcher ready.");

        let suggester = build_suggester(&config)?;

        // =========================================================================
        // 3. HTTP Server
        // =========================================================================
        let state = AppState {
            dispatcher: Arc::new(dispatcher),
            suggester,
            contact: Arc::new(config.contact.clone()),
        };
        let router = server::router(state, prom_handle);

        let bind = SocketAddr::new(config.server.bind_address, config.server.port);
        let listener = TcpListener::bind(bind)
            .await
            .with_context(|| format!("failed to bind {}", bind))?;
        let local_addr = listener.local_addr()?;

        task_manager.spawn(
            "HttpServer",
            server::serve(listener, router, task_manager.get_shutdown_rx()),
        );

        info!("PageRelay listening on {}", local_addr);

        Ok(App {
            task_manager,
            local_addr,
            channel_names,
        })
    }
}
