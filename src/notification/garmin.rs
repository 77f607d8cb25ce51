//! A channel that delivers alerts to a Garmin inReach satellite messenger
//! through the IPC Inbound messaging API.

use super::{http_client, ChannelError, ChannelErrorKind};
use crate::config::GarminConfig;
use crate::core::{Alert, NotificationChannel};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{header::CONTENT_TYPE, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

pub const CHANNEL_NAME: &str = "garmin";

/// Every request carries exactly one message, so exactly one must be reported
/// back as delivered.
const EXPECTED_COUNT: u64 = 1;

#[derive(Debug, Serialize)]
struct MessageRequest<'a> {
    messages: [Message<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    recipients: [&'a str; 1],
    sender: &'a str,
    timestamp: String,
    message: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    count: u64,
}

pub struct GarminChannel {
    client: reqwest::Client,
    api_key: String,
    imei: String,
    sender: String,
    endpoint: String,
}

impl GarminChannel {
    /// Creates a new `GarminChannel`. `default_timeout_ms` applies only when
    /// the channel config sets no timeout of its own.
    pub fn new(config: &GarminConfig, default_timeout_ms: Option<u64>) -> reqwest::Result<Self> {
        Ok(Self {
            client: http_client(config.timeout_ms.or(default_timeout_ms))?,
            api_key: config.api_key.clone(),
            imei: config.imei.clone(),
            sender: config.sender.clone(),
            endpoint: config.endpoint.clone(),
        })
    }

    fn encode(&self, alert: &Alert, now: DateTime<Utc>) -> Result<Vec<u8>, ChannelError> {
        let request = MessageRequest {
            messages: [Message {
                recipients: [self.imei.as_str()],
                sender: &self.sender,
                timestamp: now.to_rfc3339_opts(SecondsFormat::Secs, true),
                message: &alert.message,
            }],
        };
        serde_json::to_vec(&request)
            .map_err(|e| ChannelError::new(CHANNEL_NAME, ChannelErrorKind::Encoding(e)))
    }
}

#[async_trait]
impl NotificationChannel for GarminChannel {
    fn name(&self) -> &str {
        CHANNEL_NAME
    }

    #[instrument(skip_all, fields(channel = CHANNEL_NAME))]
    async fn send(&self, alert: &Alert) -> Result<(), ChannelError> {
        let error = |kind| ChannelError::new(CHANNEL_NAME, kind);
        let body = self.encode(alert, Utc::now())?;

        info!(payload = %String::from_utf8_lossy(&body), "sending message to garmin");

        let response = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .header("x-api-key", self.api_key.as_str())
            .body(body)
            .send()
            .await
            .map_err(|e| error(ChannelErrorKind::Transport(e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| error(ChannelErrorKind::Transport(e)))?;

        if status != StatusCode::OK {
            return Err(error(ChannelErrorKind::Rejected {
                status: status.as_u16(),
                body: text,
            }));
        }

        let reply: MessageResponse =
            serde_json::from_str(&text).map_err(|e| error(ChannelErrorKind::ResponseShape(e)))?;
        if reply.count != EXPECTED_COUNT {
            return Err(error(ChannelErrorKind::CountMismatch {
                expected: EXPECTED_COUNT,
                actual: reply.count,
            }));
        }
        Ok(())
    }
}
