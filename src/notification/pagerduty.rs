//! A channel that triggers incidents through the PagerDuty Events API v2.

use super::{http_client, ChannelError, ChannelErrorKind};
use crate::config::PagerDutyConfig;
use crate::core::{Alert, NotificationChannel};
use async_trait::async_trait;
use reqwest::{header::CONTENT_TYPE, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

pub const CHANNEL_NAME: &str = "pagerduty";

/// Reported as the event source when the caller's address is unknown.
pub const DEFAULT_SOURCE: &str = "pagerelay";

#[derive(Debug, Serialize)]
struct Event<'a> {
    routing_key: &'a str,
    event_action: &'static str,
    payload: EventPayload<'a>,
}

#[derive(Debug, Serialize)]
struct EventPayload<'a> {
    summary: &'a str,
    source: &'a str,
    severity: &'static str,
}

#[derive(Debug, Deserialize)]
struct EventResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    dedup_key: Option<String>,
}

/// Sends every alert as a `trigger` event with `critical` severity.
pub struct PagerDutyChannel {
    client: reqwest::Client,
    routing_key: String,
    endpoint: String,
    verify_response: bool,
}

impl PagerDutyChannel {
    /// Creates a new `PagerDutyChannel`. `default_timeout_ms` applies only
    /// when the channel config sets no timeout of its own.
    pub fn new(config: &PagerDutyConfig, default_timeout_ms: Option<u64>) -> reqwest::Result<Self> {
        Ok(Self {
            client: http_client(config.timeout_ms.or(default_timeout_ms))?,
            routing_key: config.routing_key.clone(),
            endpoint: config.endpoint.clone(),
            verify_response: config.verify_response,
        })
    }

    fn error(kind: ChannelErrorKind) -> ChannelError {
        ChannelError::new(CHANNEL_NAME, kind)
    }
}

#[async_trait]
impl NotificationChannel for PagerDutyChannel {
    fn name(&self) -> &str {
        CHANNEL_NAME
    }

    #[instrument(skip_all, fields(channel = CHANNEL_NAME))]
    async fn send(&self, alert: &Alert) -> Result<(), ChannelError> {
        let source = alert.source.as_deref().unwrap_or(DEFAULT_SOURCE);
        let event = Event {
            routing_key: &self.routing_key,
            event_action: "trigger",
            payload: EventPayload {
                summary: &alert.message,
                source,
                severity: "critical",
            },
        };
        let body = serde_json::to_vec(&event)
            .map_err(|e| Self::error(ChannelErrorKind::Encoding(e)))?;

        info!(summary = %alert.message, source, "[->pagerduty] triggering event");

        let response = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| Self::error(ChannelErrorKind::Transport(e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Self::error(ChannelErrorKind::Transport(e)))?;

        if status != StatusCode::ACCEPTED {
            return Err(Self::error(ChannelErrorKind::Rejected {
                status: status.as_u16(),
                body: text,
            }));
        }

        info!(body = %text, "[<-pagerduty] event accepted");

        if !self.verify_response {
            return Ok(());
        }

        let reply: EventResponse = serde_json::from_str(&text)
            .map_err(|e| Self::error(ChannelErrorKind::ResponseShape(e)))?;
        if reply.status != "success" {
            return Err(Self::error(ChannelErrorKind::ProviderStatus {
                status: reply.status,
                message: reply.message,
            }));
        }
        debug!(dedup_key = ?reply.dedup_key, "PagerDuty confirmed event");
        Ok(())
    }
}
