//! Asks a chat-completion model to critique a draft page before it is sent.

use crate::config::SuggestConfig;
use crate::notification::http_client;
use reqwest::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

const SYSTEM_PROMPT: &str = "You are an assistant helping users to write good text to include in \
an urgent page sent to a person. Good page text contains a very brief description of the \
problem (e.g. \"down\" or \"slow\"), the systems it affects (acronyms for system names are \
fine), the identity of the sender (first names are fine), and how to contact them (e.g. a \
phone number or incident Slack channel). The request will consist of just the user's proposed \
page text. Respond with just a very brief message suggesting improvements that the sender \
might make or saying \"Looks good, send it!\". Remember that the user is likely in an urgent, \
stressful situation, so make your response brief and err on the side of assuming that the \
message is sufficient if the text might be OK. Assume that the recipient already knows the \
message is urgent so the sender doesn't have to specify urgency.";

#[derive(Error, Debug)]
pub enum SuggestError {
    #[error("error from openai: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("error from openai: {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("error from openai: unexpected response body: {0}")]
    ResponseShape(#[from] serde_json::Error),

    #[error("error from openai: response contained no choices")]
    NoChoices,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// A client for the chat-completions endpoint.
pub struct SuggestClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: String,
}

impl SuggestClient {
    pub fn new(config: &SuggestConfig) -> reqwest::Result<Self> {
        Ok(Self {
            client: http_client(config.timeout_ms)?,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            endpoint: config.endpoint.clone(),
        })
    }

    /// Returns the model's critique of `draft` verbatim.
    #[instrument(skip_all, fields(model = %self.model))]
    pub async fn suggest(&self, draft: &str) -> Result<String, SuggestError> {
        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: draft,
                },
            ],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(SuggestError::Rejected {
                status: status.as_u16(),
                body: text,
            });
        }

        let reply: ChatResponse = serde_json::from_str(&text)?;
        let suggestion = reply
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(SuggestError::NoChoices)?;
        debug!(%suggestion, "Received suggestion");
        Ok(suggestion)
    }
}
