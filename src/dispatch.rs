//! Fans one alert out to every configured notification channel.
//!
//! Each channel runs in its own task. The dispatcher waits for all of them
//! and reports success only if every channel succeeded. A channel that
//! already delivered is not rolled back when another one fails.

use crate::core::{Alert, NotificationChannel};
use crate::internal_metrics;
use crate::notification::{ChannelError, ChannelErrorKind};
use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, error, info, instrument};

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("message must not be empty")]
    EmptyMessage,

    #[error("no notification channels configured")]
    NoChannels,

    /// At least one channel failed. Displays only the first failure observed;
    /// any others are kept in `also_failed`.
    #[error("{first}")]
    ChannelFailed {
        first: ChannelError,
        also_failed: Vec<ChannelError>,
    },
}

impl DispatchError {
    /// Returns true if the error was caused by the caller's input rather than
    /// by a downstream provider.
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, DispatchError::EmptyMessage)
    }

    /// All channel failures, in the order they were observed.
    pub fn failures(&self) -> impl Iterator<Item = &ChannelError> {
        let (first, rest) = match self {
            DispatchError::ChannelFailed { first, also_failed } => {
                (Some(first), also_failed.as_slice())
            }
            _ => (None, &[][..]),
        };
        first.into_iter().chain(rest)
    }
}

/// Sends alerts to a fixed set of channels concurrently.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    channels: Vec<Arc<dyn NotificationChannel>>,
}

impl Dispatcher {
    pub fn new(channels: Vec<Arc<dyn NotificationChannel>>) -> Self {
        Self { channels }
    }

    pub fn channel_names(&self) -> Vec<&str> {
        self.channels.iter().map(|c| c.name()).collect()
    }

    /// Sends `alert` to every channel and waits for all of them.
    ///
    /// Blank messages are rejected before any channel is invoked.
    #[instrument(skip_all, fields(channels = self.channels.len()))]
    pub async fn dispatch(&self, alert: &Alert) -> Result<(), DispatchError> {
        if alert.is_blank() {
            return Err(DispatchError::EmptyMessage);
        }
        if self.channels.is_empty() {
            return Err(DispatchError::NoChannels);
        }

        let alert = Arc::new(alert.clone());
        let mut pending: FuturesUnordered<_> = self
            .channels
            .iter()
            .map(|channel| {
                let name = channel.name().to_string();
                let channel = channel.clone();
                let alert = alert.clone();
                let start = Instant::now();
                // Keeps running if the originating request is dropped.
                let handle = tokio::spawn(async move { channel.send(&alert).await });
                async move { (name, handle.await, start.elapsed()) }
            })
            .collect();

        let mut failures = Vec::new();
        while let Some((name, joined, elapsed)) = pending.next().await {
            let result = joined.unwrap_or_else(|e| {
                Err(ChannelError::new(
                    name.clone(),
                    ChannelErrorKind::Internal(format!("send task failed: {}", e)),
                ))
            });
            match result {
                Ok(()) => {
                    internal_metrics::record_channel_send(&name, "success", elapsed);
                    debug!(channel = %name, "Channel delivered alert");
                }
                Err(e) => {
                    internal_metrics::record_channel_send(&name, e.category(), elapsed);
                    error!(
                        channel = %name,
                        category = e.category(),
                        error = %e,
                        "Channel failed to deliver alert"
                    );
                    failures.push(e);
                }
            }
        }

        let mut failures = failures.into_iter();
        match failures.next() {
            None => {
                internal_metrics::record_dispatch("success");
                info!("Alert delivered to all channels");
                Ok(())
            }
            Some(first) => {
                internal_metrics::record_dispatch("failure");
                Err(DispatchError::ChannelFailed {
                    first,
                    also_failed: failures.collect(),
                })
            }
        }
    }
}
