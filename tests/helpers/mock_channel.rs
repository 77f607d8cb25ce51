//! A mock notification channel that records every alert it is asked to send.

use async_trait::async_trait;
use pagerelay::core::{Alert, NotificationChannel};
use pagerelay::notification::{ChannelError, ChannelErrorKind};
use std::sync::{Arc, Mutex};

#[derive(Clone, Debug)]
pub struct MockChannel {
    name: &'static str,
    fail_with: Option<String>,
    panics: bool,
    pub sent: Arc<Mutex<Vec<Alert>>>,
}

impl MockChannel {
    pub fn succeeding(name: &'static str) -> Self {
        Self {
            name,
            fail_with: None,
            panics: false,
            sent: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing(name: &'static str, body: &str) -> Self {
        Self {
            fail_with: Some(body.to_string()),
            ..Self::succeeding(name)
        }
    }

    pub fn panicking(name: &'static str) -> Self {
        Self {
            panics: true,
            ..Self::succeeding(name)
        }
    }

    pub fn get_sent(&self) -> Vec<Alert> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationChannel for MockChannel {
    fn name(&self) -> &str {
        self.name
    }

    async fn send(&self, alert: &Alert) -> Result<(), ChannelError> {
        self.sent.lock().unwrap().push(alert.clone());
        if self.panics {
            panic!("{} exploded", self.name);
        }
        match &self.fail_with {
            Some(body) => Err(ChannelError::new(
                self.name,
                ChannelErrorKind::Rejected {
                    status: 500,
                    body: body.clone(),
                },
            )),
            None => Ok(()),
        }
    }
}
