//! Error types for wa-meta

use thiserror::Error;

/// wa-meta error type
#[derive(Error, Debug)]
pub enum MetaError {
    #[error("Graph API error: {0}")]
    Api(String),

    #[error("Graph API request failed: {0}")]
    Request(String),

    #[error("Webhook verification failed")]
    WebhookVerificationFailed,

    #[error("Webhook signature verification failed")]
    SignatureVerificationFailed,

    #[error("Invalid webhook payload: {0}")]
    InvalidPayload(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for MetaError {
    fn from(err: reqwest::Error) -> Self {
        MetaError::Request(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, MetaError>;
