//! HTTP server assembly and lifecycle

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::info;

use wa_core::{BotRuntime, BotRuntimeClient, Channel, Config, InMemorySessionStore, Relay, SessionStore};
use wa_meta::GraphApi;

use crate::status::{StatusState, status_routes};

/// Build the full application router for the configured channel
pub fn build_router(
    config: &Config,
    runtime: Arc<dyn BotRuntime>,
    sessions: Arc<dyn SessionStore>,
) -> anyhow::Result<Router> {
    let relay = Arc::new(Relay::new(runtime, sessions.clone(), config));

    let webhook = match config.channel {
        Channel::Twilio => wa_twilio::create_webhook_router(wa_twilio::WebhookState { relay }),
        Channel::Meta => {
            let api = GraphApi::new(&config.meta)
                .map_err(|e| anyhow::anyhow!("Failed to create Graph API client: {}", e))?;
            wa_meta::create_webhook_router(wa_meta::WebhookState {
                relay,
                api: Arc::new(api),
                app_secret: config.meta.app_secret.clone(),
            })
        }
    };

    Ok(Router::new()
        .merge(status_routes(StatusState::new(config, sessions)))
        .merge(webhook)
        .layer(TraceLayer::new_for_http()))
}

/// Start the relay and serve until Ctrl+C
pub async fn run_server(config: Config) -> anyhow::Result<()> {
    let runtime = BotRuntimeClient::new(&config.bot_runtime)
        .map_err(|e| anyhow::anyhow!("Failed to create bot runtime client: {}", e))?;
    let sessions = Arc::new(InMemorySessionStore::new(config.sessions.max_sessions));

    let app = build_router(&config, Arc::new(runtime), sessions)?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("Channel: {}", config.channel.as_str());
    info!("Bot runtime: {} ({})", config.bot_runtime.base_url, config.bot_runtime.version);
    info!("Webhook listening on {} (POST /webhook)", addr);
    info!("Press Ctrl+C to exit");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down...");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl+C: {}", e);
    }
}
