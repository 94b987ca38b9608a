//! Normalized inbound messages

/// A user message extracted from a channel webhook
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Channel-native user id (phone number without prefix or `+`)
    pub user_id: String,
    /// Message text, possibly a placeholder
    pub text: String,
    /// At most one media reference
    pub media_url: Option<String>,
}

impl InboundMessage {
    pub fn text(user_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            text: text.into(),
            media_url: None,
        }
    }

    pub fn with_media(mut self, media_url: impl Into<String>) -> Self {
        self.media_url = Some(media_url.into());
        self
    }
}

/// Result of normalizing a raw webhook body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// A message to relay to the bot runtime
    Message(InboundMessage),
    /// A message of a kind the relay does not handle
    Unsupported { user_id: String, kind: String },
    /// Not a user message (delivery/status callback)
    Ignored,
}
