//! PageRelay - page the on-call person from any browser.
//!
//! Loads configuration, initialises logging, starts the HTTP server and
//! waits for Ctrl-C.

use anyhow::Result;
use clap::Parser;
use pagerelay::{app::App, cli::Cli, config::Config};
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match Config::load(&cli).and_then(|config| config.validate().map(|_| config)) {
        Ok(config) => config,
        Err(err) => {
            // Logging is not configured yet; use a default subscriber for this error.
            tracing_subscriber::fmt().init();
            error!("Failed to load configuration: {:#}", err);
            std::process::exit(1);
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("PageRelay starting up...");
    info!("-------------------- Configuration --------------------");
    info!("Log Level: {}", config.log_level);
    info!("Listen Address: {}:{}", config.server.bind_address, config.server.port);
    info!(
        "PagerDuty: {}",
        if config.pagerduty.is_some() { "Enabled" } else { "Disabled" }
    );
    info!(
        "Garmin: {}",
        if config.garmin.is_some() { "Enabled" } else { "Disabled" }
    );
    info!(
        "Suggestions: {}",
        if config.suggest.is_some() { "Enabled" } else { "Disabled" }
    );
    match config.default_timeout_ms {
        Some(ms) => info!("Default Provider Timeout: {}ms", ms),
        None => info!("Default Provider Timeout: None"),
    }
    info!("Metrics: {}", if config.metrics.enabled { "Enabled" } else { "Disabled" });
    info!("-------------------------------------------------------");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let app = App::builder(config).build(shutdown_rx).await?;

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
        }
        info!("Shutdown signal received. Shutting down gracefully...");
        let _ = shutdown_tx.send(true);
    });

    app.run().await?;
    info!("All tasks shut down. Exiting.");
    Ok(())
}
