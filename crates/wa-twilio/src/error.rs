//! Error types for wa-twilio

use thiserror::Error;

/// wa-twilio error type
#[derive(Error, Debug)]
pub enum TwilioError {
    #[error("Invalid webhook payload: {0}")]
    InvalidPayload(String),

    #[error("TwiML generation failed: {0}")]
    Xml(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, TwilioError>;
