//! Notification channels and their shared error type.
//!
//! Each submodule implements `NotificationChannel` for one provider. Every
//! failure a channel can produce is reported as a `ChannelError` carrying the
//! channel's name, so the dispatcher can forward it without rewrapping.
pub mod garmin;
pub mod pagerduty;

pub use garmin::GarminChannel;
pub use pagerduty::PagerDutyChannel;

use thiserror::Error;

/// A failed delivery attempt on a single channel.
#[derive(Error, Debug)]
#[error("error from {channel}: {kind}")]
pub struct ChannelError {
    /// Name of the channel that produced the failure.
    pub channel: String,
    /// What went wrong.
    #[source]
    pub kind: ChannelErrorKind,
}

#[derive(Error, Debug)]
pub enum ChannelErrorKind {
    /// Connection, TLS or timeout failure while talking to the provider.
    #[error("{0}")]
    Transport(#[source] reqwest::Error),

    #[error("failed to encode request: {0}")]
    Encoding(#[source] serde_json::Error),

    /// The provider answered with a status other than the one it documents
    /// for success. Carries the raw response body.
    #[error("{body}")]
    Rejected { status: u16, body: String },

    #[error("{status}: {message}")]
    ProviderStatus { status: String, message: String },

    #[error("expected {expected} message, got {actual}")]
    CountMismatch { expected: u64, actual: u64 },

    #[error("unexpected response body: {0}")]
    ResponseShape(#[source] serde_json::Error),

    #[error("{0}")]
    Internal(String),
}

impl ChannelError {
    pub fn new(channel: impl Into<String>, kind: ChannelErrorKind) -> Self {
        Self {
            channel: channel.into(),
            kind,
        }
    }

    /// The failure category, used as a metrics label and in logs.
    pub fn category(&self) -> &'static str {
        match self.kind {
            ChannelErrorKind::Transport(_) => "transport",
            ChannelErrorKind::Encoding(_) => "encoding",
            ChannelErrorKind::Rejected { .. } | ChannelErrorKind::ProviderStatus { .. } => {
                "rejected"
            }
            ChannelErrorKind::CountMismatch { .. } | ChannelErrorKind::ResponseShape(_) => {
                "response"
            }
            ChannelErrorKind::Internal(_) => "internal",
        }
    }

    /// Returns true if the failure was a request timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(&self.kind, ChannelErrorKind::Transport(e) if e.is_timeout())
    }
}

/// Builds the shared HTTP client for a channel, applying the optional
/// per-request timeout.
pub(crate) fn http_client(timeout_ms: Option<u64>) -> reqwest::Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder();
    if let Some(ms) = timeout_ms {
        builder = builder.timeout(std::time::Duration::from_millis(ms));
    }
    builder.build()
}
