//! Status routes shared by both channels
//!
//! - `GET /`: HTML status page
//! - `GET /test`: JSON status
//! - `GET /health`: liveness probe

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    response::Html,
    routing::get,
};
use chrono::{Local, Utc};
use serde::Serialize;

use wa_core::{Config, SessionStore};

/// Capabilities advertised by `/test`
const FEATURES: [&str; 4] = ["text", "images", "buttons", "reset"];

/// State behind the status routes
#[derive(Clone)]
pub struct StatusState {
    pub service_name: String,
    pub channel: &'static str,
    pub project_id: Option<String>,
    pub runtime_version: String,
    pub sessions: Arc<dyn SessionStore>,
}

impl StatusState {
    pub fn new(config: &Config, sessions: Arc<dyn SessionStore>) -> Self {
        Self {
            service_name: config.service_name.clone(),
            channel: config.channel.as_str(),
            project_id: config.bot_runtime.project_id.clone(),
            runtime_version: config.bot_runtime.version.clone(),
            sessions,
        }
    }
}

/// `/test` response body
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub service: String,
    pub channel: &'static str,
    pub timestamp: String,
    pub bot_runtime_project: Option<String>,
    pub bot_runtime_version: String,
    pub features: Vec<&'static str>,
    pub active_sessions: usize,
}

pub fn status_routes(state: StatusState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/test", get(status))
        .route("/health", get(health))
        .with_state(Arc::new(state))
}

async fn health() -> &'static str {
    "OK"
}

async fn status(State(state): State<Arc<StatusState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "OK",
        service: state.service_name.clone(),
        channel: state.channel,
        timestamp: Utc::now().to_rfc3339(),
        bot_runtime_project: state.project_id.clone(),
        bot_runtime_version: state.runtime_version.clone(),
        features: FEATURES.to_vec(),
        active_sessions: state.sessions.len(),
    })
}

async fn index(State(state): State<Arc<StatusState>>) -> Html<String> {
    let row = |label: &str, value: &str| {
        format!(
            r#"<div class="info-item"><span class="label">{}</span><span class="value">{}</span></div>"#,
            label,
            escape_html(value)
        )
    };

    let rows = [
        row("Estado:", "Online"),
        row("Canal:", state.channel),
        row("Endpoint:", "/webhook"),
        row("Project ID:", state.project_id.as_deref().unwrap_or("-")),
        row("Versión:", &state.runtime_version),
        row(
            "Actualización:",
            &Local::now().format("%d/%m/%Y %H:%M:%S").to_string(),
        ),
    ]
    .concat();

    let badges: String = FEATURES
        .iter()
        .map(|f| format!(r#"<span class="badge">✓ {}</span>"#, f))
        .collect();

    Html(format!(
        r#"<!DOCTYPE html>
<html><head><meta charset="utf-8"><title>{name}</title><style>
body{{font-family:Arial,sans-serif;background:#667eea;min-height:100vh;display:flex;align-items:center;justify-content:center;margin:0;padding:20px}}
.card{{background:white;padding:40px;border-radius:20px;max-width:600px;width:100%}}
.status{{color:#48bb78;font-size:22px;font-weight:600;margin:25px 0}}
.info-item{{display:flex;justify-content:space-between;padding:10px 0;border-bottom:1px solid #e2e8f0}}
.label{{font-weight:600;color:#4a5568}}
.value{{color:#718096;font-family:'Courier New',monospace;font-size:14px}}
.badge{{background:#667eea;color:white;padding:8px 16px;border-radius:20px;font-size:13px;margin-right:8px}}
</style></head><body><div class="card">
<h1>{name}</h1>
<div class="status">Webhook Activo</div>
<div class="info">{rows}</div>
<div class="badges">{badges}</div>
</div></body></html>"#,
        name = escape_html(&state.service_name),
        rows = rows,
        badges = badges,
    ))
}

fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
