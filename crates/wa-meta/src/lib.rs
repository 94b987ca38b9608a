//! wa-meta: WhatsApp Cloud API channel for wa-relay
//!
//! Meta delivers inbound messages as JSON webhooks and expects replies to
//! be sent separately through the Graph API. The webhook itself is only
//! acknowledged.

pub mod api;
pub mod error;
pub mod inbound;
pub mod signature;
pub mod webhook;

pub use api::{GraphApi, MAX_TEXT_CHARS};
pub use error::{MetaError, Result};
pub use inbound::{WebhookPayload, normalize, parse_payload};
pub use webhook::{WebhookState, create_webhook_router};
