//! Core domain types and service traits for PageRelay
//!
//! This module defines the alert that flows through a dispatch and the trait
//! contract every notification provider implements.

use crate::notification::ChannelError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A page to be delivered to every configured notification channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Alert {
    /// The free-text page body as submitted by the caller.
    pub message: String,
    /// The caller's network address, when the boundary knows it.
    pub source: Option<String>,
}

impl Alert {
    /// Creates a new alert.
    pub fn new(message: impl Into<String>, source: Option<String>) -> Self {
        Self {
            message: message.into(),
            source,
        }
    }

    /// Returns true if the message carries no printable content.
    pub fn is_blank(&self) -> bool {
        self.message.trim().is_empty()
    }
}

// =============================================================================
// Service Traits
// =============================================================================

/// Delivers alerts to a single downstream provider.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// A unique, descriptive name for the channel (e.g., "pagerduty", "garmin").
    /// Used for logging, metrics and error attribution.
    fn name(&self) -> &str;

    /// Sends an alert to the provider.
    ///
    /// # Returns
    /// * `Ok(())` if the provider accepted the alert
    /// * `Err(ChannelError)` tagged with this channel's name otherwise
    async fn send(&self, alert: &Alert) -> Result<(), ChannelError>;
}

impl std::fmt::Debug for dyn NotificationChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationChannel")
            .field("name", &self.name())
            .finish()
    }
}
