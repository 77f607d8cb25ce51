//! Command-Line Interface (CLI) argument parsing.
//!
//! This module defines the command-line arguments for the application using the
//! `clap` crate. These arguments are parsed at startup and then merged with
//! the configuration file and environment variables, taking precedence over both.

use clap::Parser;
use figment::{
    value::{Dict, Map, Value},
    Error, Metadata, Profile, Provider,
};
use std::path::PathBuf;

/// Relays a short text message from a web form to on-call paging providers.
#[derive(Parser, Debug, Clone, Default)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Port for the HTTP server.
    #[arg(short, long, value_name = "PORT")]
    pub port: Option<u16>,

    /// Address to bind the HTTP server to.
    #[arg(long, value_name = "IP")]
    pub bind_address: Option<String>,

    /// Logging level (e.g. "info", "debug").
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Timeout for each outbound provider request in milliseconds.
    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,

    /// Serve Prometheus metrics on `/metrics`.
    #[arg(long)]
    pub metrics: bool,
}

impl Provider for Cli {
    fn metadata(&self) -> Metadata {
        Metadata::named("Command-Line Arguments")
    }

    fn data(&self) -> Result<Map<Profile, Dict>, Error> {
        let mut dict = Dict::new();
        let mut server = Dict::new();

        if let Some(port) = self.port {
            server.insert("port".into(), Value::from(port));
        }
        if let Some(addr) = &self.bind_address {
            server.insert("bind_address".into(), Value::from(addr.clone()));
        }
        if !server.is_empty() {
            dict.insert("server".into(), Value::from(server));
        }

        if let Some(level) = &self.log_level {
            dict.insert("log_level".into(), Value::from(level.clone()));
        }

        if let Some(timeout) = self.timeout_ms {
            dict.insert("default_timeout_ms".into(), Value::from(timeout));
        }

        if self.metrics {
            let mut metrics = Dict::new();
            metrics.insert("enabled".into(), Value::from(true));
            dict.insert("metrics".into(), Value::from(metrics));
        }

        let mut map = Map::new();
        map.insert(Profile::Default, dict);
        Ok(map)
    }
}
