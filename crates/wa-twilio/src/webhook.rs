//! Webhook router for receiving WhatsApp messages from Twilio

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    Router,
    extract::{Form, State, rejection::FormRejection},
    response::Response,
    routing::post,
};
use tower_http::catch_panic::CatchPanicLayer;
use tracing::{debug, error, info};

use wa_core::{Inbound, Relay, truncate_for_whatsapp};

use crate::inbound::normalize;
use crate::twiml::{MAX_BODY_CHARS, twiml_response};

/// Webhook server state
#[derive(Clone)]
pub struct WebhookState {
    pub relay: Arc<Relay>,
}

/// Create the Twilio webhook router (`POST /webhook`)
pub fn create_webhook_router(state: WebhookState) -> Router {
    let apology = state.relay.messages().error_reply.clone();

    Router::new()
        .route("/webhook", post(handle_webhook))
        .layer(CatchPanicLayer::custom(move |panic: Box<dyn Any + Send>| {
            error!("Webhook handler panicked: {}", panic_message(panic.as_ref()));
            twiml_response(Some(&apology))
        }))
        .with_state(Arc::new(state))
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<String>() {
        s
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else {
        "unknown panic"
    }
}

/// Handle incoming WhatsApp webhook
async fn handle_webhook(
    State(state): State<Arc<WebhookState>>,
    form: std::result::Result<Form<HashMap<String, String>>, FormRejection>,
) -> Response {
    let Form(fields) = match form {
        Ok(form) => form,
        Err(e) => {
            error!("Unreadable Twilio webhook: {}", e);
            return twiml_response(Some(&state.relay.messages().error_reply));
        }
    };

    debug!("Twilio webhook fields: {:?}", fields);

    let reply = match normalize(&fields, state.relay.messages()) {
        Ok(Inbound::Message(message)) => {
            info!(
                "Received WhatsApp message from {}: {}{}",
                message.user_id,
                message.text,
                if message.media_url.is_some() { " [image]" } else { "" }
            );
            state.relay.reply_for(&message, MAX_BODY_CHARS).await
        }
        Ok(Inbound::Unsupported { user_id, kind }) => {
            truncate_for_whatsapp(
                &state.relay.unsupported_reply(&user_id, &kind),
                MAX_BODY_CHARS,
            )
        }
        Ok(Inbound::Ignored) => {
            debug!("Ignoring Twilio status callback");
            return twiml_response(None);
        }
        Err(e) => {
            error!("Error handling Twilio webhook: {}", e);
            state.relay.messages().error_reply.clone()
        }
    };

    info!("Replying with {} characters", reply.chars().count());
    twiml_response(Some(&reply))
}
