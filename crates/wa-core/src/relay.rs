//! Message relay between a WhatsApp channel and the bot runtime
//!
//! The relay intercepts reset commands, keeps the advisory session map up
//! to date, calls the runtime and renders its traces. It always produces a
//! text for the user; channel crates only decide how to deliver it.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{error, info, warn};

use crate::config::{Config, MessagesConfig};
use crate::error::{RelayError, Result};
use crate::message::InboundMessage;
use crate::runtime::BotRuntime;
use crate::session::SessionStore;
use crate::trace::render_or_default;

/// Words that restart the conversation instead of reaching the runtime
const RESET_COMMANDS: [&str; 3] = ["reset", "inicio", "reiniciar"];

/// Check whether `text` is a reset command (case-insensitive)
pub fn is_reset_command(text: &str) -> bool {
    let text = text.trim().to_lowercase();
    RESET_COMMANDS.contains(&text.as_str())
}

/// Cut `text` to `max_chars` characters on a char boundary
///
/// Each channel has its own limit: Twilio rejects WhatsApp bodies over
/// 1600 characters, the Cloud API accepts up to 4096.
pub fn truncate_for_whatsapp(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let mut truncated: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    truncated.push_str("...");
    truncated
}

/// Relay shared by every channel handler
pub struct Relay {
    runtime: Arc<dyn BotRuntime>,
    sessions: Arc<dyn SessionStore>,
    messages: MessagesConfig,
    reset_remote_session: bool,
    media_variable: Option<String>,
}

impl Relay {
    /// Create a relay from its collaborators and configuration
    pub fn new(
        runtime: Arc<dyn BotRuntime>,
        sessions: Arc<dyn SessionStore>,
        config: &Config,
    ) -> Self {
        Self {
            runtime,
            sessions,
            messages: config.messages.clone(),
            reset_remote_session: config.bot_runtime.reset_remote_session,
            media_variable: config.bot_runtime.media_variable.clone(),
        }
    }

    /// Fixed user-visible texts
    pub fn messages(&self) -> &MessagesConfig {
        &self.messages
    }

    /// Advisory session store
    pub fn sessions(&self) -> &Arc<dyn SessionStore> {
        &self.sessions
    }

    /// Produce the reply for an inbound message, never failing
    ///
    /// Runtime failures are logged and replaced by the configured apology.
    /// The reply is cut to `max_chars`, the delivering channel's limit.
    pub async fn reply_for(&self, message: &InboundMessage, max_chars: usize) -> String {
        let reply = match self.process(message).await {
            Ok(reply) => reply,
            Err(e) => {
                error!("Error processing message from {}: {}", message.user_id, e);
                self.messages.error_reply.clone()
            }
        };

        truncate_for_whatsapp(&reply, max_chars)
    }

    /// Handle a message, surfacing runtime failures
    pub async fn process(&self, message: &InboundMessage) -> Result<String> {
        if is_reset_command(&message.text) {
            return Ok(self.reset(&message.user_id).await);
        }

        self.sessions.touch(&message.user_id);

        if let Some(media_url) = &message.media_url {
            self.store_media_variable(&message.user_id, media_url).await;
        }

        let traces = self
            .runtime
            .interact(&message.user_id, &message.text, message.media_url.as_deref())
            .await?;

        Ok(render_or_default(&traces, &self.messages.default_reply))
    }

    /// Forget the user's session locally and, best-effort, in the runtime
    pub async fn reset(&self, user_id: &str) -> String {
        self.sessions.remove(user_id);
        info!("Session reset for {}", user_id);

        if self.reset_remote_session {
            if let Err(e) = self.runtime.delete_state(user_id).await {
                let e = match e {
                    e @ RelayError::SessionResetRemoteFailure(_) => e,
                    other => RelayError::SessionResetRemoteFailure(other.to_string()),
                };
                warn!("{}", e);
            }
        }

        self.messages.reset_reply.clone()
    }

    /// Reply for a message type the relay cannot forward
    pub fn unsupported_reply(&self, user_id: &str, kind: &str) -> String {
        let e = RelayError::UnsupportedMessageType(kind.to_string());
        info!("{} from {}", e, user_id);
        self.messages.unsupported_reply.clone()
    }

    async fn store_media_variable(&self, user_id: &str, media_url: &str) {
        let Some(variable) = &self.media_variable else {
            return;
        };

        let mut variables = Map::new();
        variables.insert(variable.clone(), Value::String(media_url.to_string()));

        match self.runtime.update_variables(user_id, variables).await {
            Ok(()) => info!("Stored media reference for {}", user_id),
            Err(e) => warn!("Failed to store media reference for {}: {}", user_id, e),
        }
    }
}
