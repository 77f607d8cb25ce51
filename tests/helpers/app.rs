//! Test helpers for running the full application instance.

use anyhow::Result;
use pagerelay::{app::App, config::Config, core::NotificationChannel};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::{sync::watch, task::JoinHandle, time::timeout};

/// A running instance of the application bound to a free local port.
pub struct TestApp {
    pub addr: SocketAddr,
    pub client: reqwest::Client,
    shutdown_tx: watch::Sender<bool>,
    app_handle: JoinHandle<Result<()>>,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Submits the page form the way a browser does.
    pub async fn post_page(&self, message: &str) -> reqwest::Response {
        self.client
            .post(self.url("/"))
            .form(&[("m", message)])
            .send()
            .await
            .unwrap()
    }

    /// Shuts down the application and waits for it to terminate.
    pub async fn shutdown(self) -> Result<()> {
        self.shutdown_tx.send(true)?;
        match timeout(Duration::from_secs(5), self.app_handle).await {
            Ok(joined) => joined?,
            Err(_) => Err(anyhow::anyhow!("App failed to shut down within the timeout")),
        }
    }
}

/// Returns a configuration that binds to an ephemeral loopback port.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.server.bind_address = IpAddr::V4(Ipv4Addr::LOCALHOST);
    config.server.port = 0;
    config
}

/// Starts the app with the channels built from `config`.
pub async fn spawn_app(config: Config) -> Result<TestApp> {
    start(config, None).await
}

/// Starts the app with the given channels instead of the configured ones.
pub async fn spawn_app_with_channels(
    config: Config,
    channels: Vec<Arc<dyn NotificationChannel>>,
) -> Result<TestApp> {
    start(config, Some(channels)).await
}

async fn start(
    config: Config,
    channels: Option<Vec<Arc<dyn NotificationChannel>>>,
) -> Result<TestApp> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut builder = App::builder(config);
    if let Some(channels) = channels {
        builder = builder.channels_override(channels);
    }
    let app = builder.build(shutdown_rx).await?;
    let addr = app.local_addr();
    let app_handle = tokio::spawn(app.run());

    Ok(TestApp {
        addr,
        client: reqwest::Client::new(),
        shutdown_tx,
        app_handle,
    })
}
