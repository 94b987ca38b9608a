//! wa-twilio: Twilio WhatsApp channel for wa-relay
//!
//! Twilio posts each inbound WhatsApp message as a form-encoded webhook
//! and accepts the reply inline as a TwiML document, so this channel
//! never calls the Twilio REST API.

pub mod error;
pub mod inbound;
pub mod twiml;
pub mod webhook;

pub use error::{Result, TwilioError};
pub use inbound::normalize;
pub use twiml::{MAX_BODY_CHARS, message_response, twiml_response};
pub use webhook::{WebhookState, create_webhook_router};
