//! Meta WhatsApp webhook payloads and their normalization
//!
//! Only the first message of the first change of the first entry is
//! considered. Status callbacks carry no `messages` and are ignored.

use serde::Deserialize;
use tracing::warn;

use wa_core::{Inbound, InboundMessage, MessagesConfig};

use crate::error::{MetaError, Result};

/// Top-level webhook notification
#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    /// Normally `whatsapp_business_account`
    #[serde(default)]
    pub object: Option<String>,
    #[serde(default)]
    pub entry: Vec<WebhookEntry>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookEntry {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub changes: Vec<WebhookChange>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookChange {
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub value: Option<WebhookValue>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookValue {
    #[serde(default)]
    pub messages: Vec<WebhookMessage>,
    #[serde(default)]
    pub statuses: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookMessage {
    /// Sender phone number, digits only
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub text: Option<TextContent>,
    #[serde(default)]
    pub image: Option<ImageContent>,
    #[serde(default)]
    pub interactive: Option<InteractiveContent>,
}

#[derive(Debug, Deserialize)]
pub struct TextContent {
    #[serde(default)]
    pub body: String,
}

#[derive(Debug, Deserialize)]
pub struct ImageContent {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct InteractiveContent {
    #[serde(default)]
    pub button_reply: Option<InteractiveReply>,
    #[serde(default)]
    pub list_reply: Option<InteractiveReply>,
}

#[derive(Debug, Deserialize)]
pub struct InteractiveReply {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: String,
}

/// Parse a raw webhook body
pub fn parse_payload(body: &[u8]) -> Result<WebhookPayload> {
    serde_json::from_slice(body).map_err(|e| MetaError::InvalidPayload(e.to_string()))
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Normalize a webhook payload into an [`Inbound`]
///
/// `media_reference` turns an image id into the URL handed to the runtime.
pub fn normalize(
    payload: &WebhookPayload,
    messages: &MessagesConfig,
    media_reference: impl Fn(&str) -> String,
) -> Inbound {
    let Some(message) = payload
        .entry
        .first()
        .and_then(|entry| entry.changes.first())
        .and_then(|change| change.value.as_ref())
        .and_then(|value| value.messages.first())
    else {
        return Inbound::Ignored;
    };

    let user_id = message.from.trim().trim_start_matches('+').to_string();
    if user_id.is_empty() {
        warn!("Ignoring message without sender: {:?}", message.id);
        return Inbound::Ignored;
    }

    let unsupported = |kind: &str| Inbound::Unsupported {
        user_id: user_id.clone(),
        kind: kind.to_string(),
    };

    match message.kind.as_str() {
        "text" => {
            let text = non_blank(message.text.as_ref().map(|t| t.body.as_str()))
                .unwrap_or_else(|| messages.default_text.clone());
            Inbound::Message(InboundMessage::text(user_id.clone(), text))
        }
        "image" => match &message.image {
            Some(image) if !image.id.trim().is_empty() => {
                let text = non_blank(image.caption.as_deref())
                    .unwrap_or_else(|| messages.image_text.clone());
                Inbound::Message(
                    InboundMessage::text(user_id.clone(), text)
                        .with_media(media_reference(image.id.trim())),
                )
            }
            _ => unsupported("image"),
        },
        "interactive" => {
            let reply = message.interactive.as_ref().and_then(|i| {
                i.button_reply
                    .as_ref()
                    .or(i.list_reply.as_ref())
                    .and_then(|r| non_blank(Some(r.title.as_str())))
            });
            match reply {
                Some(title) => Inbound::Message(InboundMessage::text(user_id.clone(), title)),
                None => unsupported("interactive"),
            }
        }
        other => unsupported(other),
    }
}
