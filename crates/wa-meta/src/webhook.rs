//! Webhook router for the WhatsApp Cloud API
//!
//! - `GET /webhook`: subscription handshake
//! - `POST /webhook`: inbound messages; the reply goes out through the
//!   Graph API and the webhook is acknowledged with an empty 200

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    Router,
    body::{Body, Bytes},
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
};
use tower_http::catch_panic::CatchPanicLayer;
use tracing::{debug, error, info, warn};

use wa_core::{Inbound, Relay, RelayError, truncate_for_whatsapp};

use crate::api::{GraphApi, MAX_TEXT_CHARS};
use crate::inbound::{normalize, parse_payload};
use crate::signature::{SIGNATURE_HEADER, verify_signature};

/// Webhook server state
#[derive(Clone)]
pub struct WebhookState {
    pub relay: Arc<Relay>,
    pub api: Arc<GraphApi>,
    /// When set, every POST must carry a valid `X-Hub-Signature-256`
    pub app_secret: Option<String>,
}

/// Create the Meta webhook router
pub fn create_webhook_router(state: WebhookState) -> Router {
    Router::new()
        .route("/webhook", get(verify_webhook).post(handle_webhook))
        .layer(CatchPanicLayer::custom(|_: Box<dyn Any + Send>| {
            error!("Webhook handler panicked");
            empty_response(StatusCode::INTERNAL_SERVER_ERROR)
        }))
        .with_state(Arc::new(state))
}

fn empty_response(status: StatusCode) -> Response {
    (status, Body::empty()).into_response()
}

/// Subscription handshake: echo `hub.challenge` when the token matches
async fn verify_webhook(
    State(state): State<Arc<WebhookState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let param = |name: &str| params.get(name).map(String::as_str).unwrap_or_default();

    match state.api.verify_webhook(
        param("hub.mode"),
        param("hub.verify_token"),
        param("hub.challenge"),
    ) {
        Ok(challenge) => (StatusCode::OK, challenge).into_response(),
        Err(_) => empty_response(StatusCode::FORBIDDEN),
    }
}

/// Handle incoming webhook notification
async fn handle_webhook(
    State(state): State<Arc<WebhookState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Some(secret) = &state.app_secret {
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();

        if !verify_signature(secret, &body, signature) {
            warn!("Invalid or missing webhook signature");
            return empty_response(StatusCode::UNAUTHORIZED);
        }
    }

    let payload = match parse_payload(&body) {
        Ok(payload) => payload,
        Err(e) => {
            error!("Failed to parse webhook body: {}", e);
            return empty_response(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    let inbound = normalize(&payload, state.relay.messages(), |id| {
        state.api.media_reference(id)
    });

    let (user_id, reply) = match inbound {
        Inbound::Message(message) => {
            info!(
                "Received WhatsApp message from {}: {}{}",
                message.user_id,
                message.text,
                if message.media_url.is_some() { " [image]" } else { "" }
            );
            let reply = state.relay.reply_for(&message, MAX_TEXT_CHARS).await;
            (message.user_id, reply)
        }
        Inbound::Unsupported { user_id, kind } => {
            let reply = truncate_for_whatsapp(
                &state.relay.unsupported_reply(&user_id, &kind),
                MAX_TEXT_CHARS,
            );
            (user_id, reply)
        }
        Inbound::Ignored => {
            debug!("Ignoring notification without messages");
            return empty_response(StatusCode::OK);
        }
    };

    if let Err(e) = state.api.send_text(&user_id, &reply).await {
        // Still acknowledged so Meta does not redeliver the message
        error!("{}", RelayError::ChannelSendFailure(e.to_string()));
    }

    empty_response(StatusCode::OK)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::to_bytes;
    use axum::http::{Request, header};
    use hmac::{Hmac, Mac};
    use serde_json::{Map, Value, json};
    use sha2::Sha256;
    use std::sync::Mutex;
    use tower::ServiceExt;
    use wa_core::{Config, InMemorySessionStore, MetaConfig, SessionStore, Trace};
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Default)]
    struct FakeRuntime {
        interacts: Mutex<Vec<(String, String, Option<String>)>>,
        traces: Vec<Trace>,
        fail: bool,
        panic: bool,
    }

    #[async_trait]
    impl wa_core::BotRuntime for FakeRuntime {
        async fn interact(
            &self,
            user_id: &str,
            text: &str,
            media_url: Option<&str>,
        ) -> wa_core::Result<Vec<Trace>> {
            if self.panic {
                panic!("runtime exploded");
            }
            self.interacts.lock().unwrap().push((
                user_id.to_string(),
                text.to_string(),
                media_url.map(str::to_string),
            ));
            if self.fail {
                return Err(RelayError::BotRuntimeUnavailable("timed out".to_string()));
            }
            Ok(self.traces.clone())
        }

        async fn delete_state(&self, _user_id: &str) -> wa_core::Result<()> {
            Ok(())
        }

        async fn update_variables(
            &self,
            _user_id: &str,
            _variables: Map<String, Value>,
        ) -> wa_core::Result<()> {
            Ok(())
        }
    }

    struct Harness {
        router: Router,
        runtime: Arc<FakeRuntime>,
        sessions: Arc<InMemorySessionStore>,
    }

    fn setup(runtime: FakeRuntime, graph_url: &str, app_secret: Option<&str>) -> Harness {
        let runtime = Arc::new(runtime);
        let sessions = Arc::new(InMemorySessionStore::new(100));
        let relay = Relay::new(runtime.clone(), sessions.clone(), &Config::default());
        let api = GraphApi::new(&MetaConfig {
            access_token: "token".to_string(),
            phone_number_id: "PNID".to_string(),
            verify_token: "verify-me".to_string(),
            graph_base_url: graph_url.to_string(),
            ..Default::default()
        })
        .unwrap();

        let router = create_webhook_router(WebhookState {
            relay: Arc::new(relay),
            api: Arc::new(api),
            app_secret: app_secret.map(str::to_string),
        });

        Harness {
            router,
            runtime,
            sessions,
        }
    }

    fn text_payload(from: &str, body: &str) -> String {
        json!({
            "object": "whatsapp_business_account",
            "entry": [{
                "id": "WABA",
                "changes": [{
                    "field": "messages",
                    "value": {
                        "messaging_product": "whatsapp",
                        "messages": [{"from": from, "id": "wamid.1", "type": "text", "text": {"body": body}}]
                    }
                }]
            }]
        })
        .to_string()
    }

    async fn mount_send(server: &MockServer, expected_body: &str, times: u64) {
        Mock::given(method("POST"))
            .and(path("/v18.0/PNID/messages"))
            .and(body_partial_json(json!({"to": "5216181234567", "text": {"body": expected_body}})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"messages": [{"id": "wamid.out"}]})),
            )
            .expect(times)
            .mount(server)
            .await;
    }

    async fn post(router: Router, body: String, signature: Option<String>) -> (StatusCode, String) {
        let mut request = Request::builder()
            .method("POST")
            .uri("/webhook")
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(signature) = signature {
            request = request.header(SIGNATURE_HEADER, signature);
        }

        let response = router
            .oneshot(request.body(Body::from(body)).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    async fn get(router: Router, uri: &str) -> (StatusCode, String) {
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_handshake_success() {
        let h = setup(FakeRuntime::default(), "http://127.0.0.1:1", None);
        let (status, body) = get(
            h.router,
            "/webhook?hub.mode=subscribe&hub.verify_token=verify-me&hub.challenge=1158201444",
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "1158201444");
    }

    #[tokio::test]
    async fn test_handshake_mismatch() {
        for uri in [
            "/webhook?hub.mode=subscribe&hub.verify_token=wrong&hub.challenge=1",
            "/webhook?hub.mode=unsubscribe&hub.verify_token=verify-me&hub.challenge=1",
            "/webhook",
        ] {
            let h = setup(FakeRuntime::default(), "http://127.0.0.1:1", None);
            let (status, _) = get(h.router, uri).await;
            assert_eq!(status, StatusCode::FORBIDDEN, "{}", uri);
        }
    }

    #[tokio::test]
    async fn test_text_message_sent_via_graph_api() {
        let server = MockServer::start().await;
        mount_send(&server, "Bienvenido", 1).await;

        let h = setup(
            FakeRuntime {
                traces: vec![Trace::Text { message: "Bienvenido".to_string() }],
                ..Default::default()
            },
            &server.uri(),
            None,
        );

        let (status, body) = post(h.router, text_payload("5216181234567", "Hola"), None).await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.is_empty());
        assert_eq!(h.runtime.interacts.lock().unwrap().len(), 1);
        assert!(h.sessions.get("5216181234567").is_some());
    }

    #[tokio::test]
    async fn test_image_message_forwards_reference() {
        let server = MockServer::start().await;
        mount_send(&server, "Gracias por contactar al Sistema 072.", 1).await;

        let h = setup(FakeRuntime::default(), &server.uri(), None);
        let payload = json!({
            "entry": [{"changes": [{"value": {"messages": [{
                "from": "5216181234567", "type": "image", "image": {"id": "ABC123"}
            }]}}]}]
        })
        .to_string();

        let (status, _) = post(h.router, payload, None).await;
        assert_eq!(status, StatusCode::OK);

        let interacts = h.runtime.interacts.lock().unwrap().clone();
        assert_eq!(interacts[0].1, "Imagen recibida");
        assert_eq!(
            interacts[0].2,
            Some(format!("{}/v18.0/ABC123", server.uri()))
        );
    }

    #[tokio::test]
    async fn test_unsupported_type_skips_runtime() {
        let server = MockServer::start().await;
        mount_send(
            &server,
            "Lo sentimos, por el momento solo podemos procesar mensajes de texto e imágenes.",
            1,
        )
        .await;

        let h = setup(FakeRuntime::default(), &server.uri(), None);
        let payload = json!({
            "entry": [{"changes": [{"value": {"messages": [{
                "from": "5216181234567", "type": "audio", "audio": {"id": "AUD"}
            }]}}]}]
        })
        .to_string();

        let (status, _) = post(h.router, payload, None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(h.runtime.interacts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reset_command() {
        let server = MockServer::start().await;
        mount_send(
            &server,
            "Conversación reiniciada. Escribe cualquier mensaje para comenzar de nuevo.",
            1,
        )
        .await;

        let h = setup(FakeRuntime::default(), &server.uri(), None);
        h.sessions.touch("5216181234567");

        let (status, _) = post(h.router, text_payload("5216181234567", "Inicio"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(h.runtime.interacts.lock().unwrap().is_empty());
        assert!(h.sessions.get("5216181234567").is_none());
    }

    #[tokio::test]
    async fn test_runtime_failure_sends_apology() {
        let server = MockServer::start().await;
        mount_send(&server, "Lo sentimos, ocurrió un error. Intenta nuevamente.", 1).await;

        let h = setup(
            FakeRuntime {
                fail: true,
                ..Default::default()
            },
            &server.uri(),
            None,
        );

        let (status, _) = post(h.router, text_payload("5216181234567", "Hola"), None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_send_failure_still_acknowledged() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let h = setup(FakeRuntime::default(), &server.uri(), None);
        let (status, body) = post(h.router, text_payload("5216181234567", "Hola"), None).await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_status_callback_acknowledged() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let h = setup(FakeRuntime::default(), &server.uri(), None);
        let payload = json!({
            "entry": [{"changes": [{"value": {"statuses": [{"id": "wamid.1", "status": "read"}]}}]}]
        })
        .to_string();

        let (status, _) = post(h.router, payload, None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(h.runtime.interacts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_panic_is_500_empty() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let h = setup(
            FakeRuntime {
                panic: true,
                ..Default::default()
            },
            &server.uri(),
            None,
        );

        let (status, body) = post(h.router, text_payload("5216181234567", "Hola"), None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_long_reply_cut_to_cloud_api_limit() {
        let server = MockServer::start().await;
        let expected = format!("{}...", "a".repeat(MAX_TEXT_CHARS - 3));
        mount_send(&server, &expected, 1).await;

        let h = setup(
            FakeRuntime {
                traces: vec![Trace::Text { message: "a".repeat(5000) }],
                ..Default::default()
            },
            &server.uri(),
            None,
        );

        let (status, _) = post(h.router, text_payload("5216181234567", "Hola"), None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_invalid_json_is_500() {
        let h = setup(FakeRuntime::default(), "http://127.0.0.1:1", None);
        let (status, body) = post(h.router, "not json".to_string(), None).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_signature_enforced_when_configured() {
        let server = MockServer::start().await;
        mount_send(&server, "Gracias por contactar al Sistema 072.", 1).await;

        let payload = text_payload("5216181234567", "Hola");

        let h = setup(FakeRuntime::default(), &server.uri(), Some("app-secret"));
        let (status, _) = post(h.router, payload.clone(), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let h = setup(FakeRuntime::default(), &server.uri(), Some("app-secret"));
        let (status, _) = post(h.router, payload.clone(), Some("sha256=00".to_string())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let mut mac = Hmac::<Sha256>::new_from_slice(b"app-secret").unwrap();
        mac.update(payload.as_bytes());
        let signature = format!("sha256={}", hex::encode(mac.finalize().into_bytes()));

        let h = setup(FakeRuntime::default(), &server.uri(), Some("app-secret"));
        let (status, _) = post(h.router, payload, Some(signature)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(h.runtime.interacts.lock().unwrap().len(), 1);
    }
}
