//! WhatsApp Cloud API (Graph API) client

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use wa_core::MetaConfig;

use crate::error::{MetaError, Result};

/// Longest text body the Cloud API accepts
pub const MAX_TEXT_CHARS: usize = 4096;

/// Graph API client for one sending phone number
#[derive(Clone)]
pub struct GraphApi {
    client: Client,
    base_url: String,
    version: String,
    phone_number_id: String,
    access_token: String,
    verify_token: String,
}

impl GraphApi {
    /// Create a new Graph API client
    pub fn new(config: &MetaConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| MetaError::Config(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.graph_base_url.trim_end_matches('/').to_string(),
            version: config.graph_version.clone(),
            phone_number_id: config.phone_number_id.clone(),
            access_token: config.access_token.clone(),
            verify_token: config.verify_token.clone(),
        })
    }

    /// Reference URL for a media object id
    pub fn media_reference(&self, media_id: &str) -> String {
        format!("{}/{}/{}", self.base_url, self.version, media_id)
    }

    /// Send a text message, returning the WhatsApp message id
    pub async fn send_text(&self, to: &str, body: &str) -> Result<Option<String>> {
        let url = format!(
            "{}/{}/{}/messages",
            self.base_url, self.version, self.phone_number_id
        );

        let payload = SendMessagePayload {
            messaging_product: "whatsapp",
            recipient_type: "individual",
            to,
            kind: "text",
            text: TextBody { body },
        };

        debug!("Sending message to {}: {}", to, body);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Graph API error: {} - {}", status, body);
            return Err(MetaError::Api(format!("{} - {}", status, body)));
        }

        let result: SendMessageResponse = response.json().await?;
        let message_id = result.messages.into_iter().next().map(|m| m.id);
        info!("Message sent to {}: {:?}", to, message_id);

        Ok(message_id)
    }

    /// Verify the webhook subscription handshake
    pub fn verify_webhook(&self, mode: &str, token: &str, challenge: &str) -> Result<String> {
        if mode == "subscribe" && !self.verify_token.is_empty() && token == self.verify_token {
            info!("Webhook verified successfully");
            Ok(challenge.to_string())
        } else {
            error!("Webhook verification failed: invalid mode or token");
            Err(MetaError::WebhookVerificationFailed)
        }
    }
}

#[derive(Debug, Serialize)]
struct SendMessagePayload<'a> {
    messaging_product: &'static str,
    recipient_type: &'static str,
    to: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    text: TextBody<'a>,
}

#[derive(Debug, Serialize)]
struct TextBody<'a> {
    body: &'a str,
}

#[derive(Debug, Deserialize)]
struct SendMessageResponse {
    #[serde(default)]
    messages: Vec<SentMessage>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    id: String,
}
