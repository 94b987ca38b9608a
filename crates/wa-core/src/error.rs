//! Error types for wa-core

use thiserror::Error;

/// wa-core error type
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Unsupported message type: {0}")]
    UnsupportedMessageType(String),

    #[error("Bot runtime unavailable: {0}")]
    BotRuntimeUnavailable(String),

    #[error("Channel send failed: {0}")]
    ChannelSendFailure(String),

    #[error("Remote session reset failed: {0}")]
    SessionResetRemoteFailure(String),

    #[error("Invalid webhook payload: {0}")]
    InvalidPayload(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for RelayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RelayError::BotRuntimeUnavailable(format!("request timed out: {}", err))
        } else {
            RelayError::BotRuntimeUnavailable(err.to_string())
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, RelayError>;
