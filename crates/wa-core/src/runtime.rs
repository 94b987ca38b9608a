//! Bot runtime API client
//!
//! Talks to a Voiceflow-style dialogue runtime:
//! - `POST   {base}/state/user/{userID}/interact`
//! - `DELETE {base}/state/user/{userID}`
//! - `PATCH  {base}/state/user/{userID}/variables`

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, Url};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, error, info};

use crate::config::BotRuntimeConfig;
use crate::error::{RelayError, Result};
use crate::trace::Trace;

/// Trace kinds the runtime is asked not to emit
const EXCLUDED_TRACE_TYPES: [&str; 3] = ["block", "debug", "flow"];

/// Operations the relay needs from the bot runtime
#[async_trait]
pub trait BotRuntime: Send + Sync {
    /// Send the user's input and return the runtime's traces
    async fn interact(&self, user_id: &str, text: &str, media_url: Option<&str>)
        -> Result<Vec<Trace>>;

    /// Delete the runtime's conversation state for a user
    async fn delete_state(&self, user_id: &str) -> Result<()>;

    /// Merge variables into the runtime's state for a user
    async fn update_variables(&self, user_id: &str, variables: Map<String, Value>) -> Result<()>;
}

/// Interact request body
#[derive(Debug, Serialize)]
struct InteractRequest<'a> {
    action: Action<'a>,
    config: InteractConfig,
}

#[derive(Debug, Serialize)]
struct Action<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    payload: &'a str,
}

#[derive(Debug, Serialize)]
struct InteractConfig {
    tts: bool,
    #[serde(rename = "stripSSML")]
    strip_ssml: bool,
    #[serde(rename = "stopAll")]
    stop_all: bool,
    #[serde(rename = "excludeTypes")]
    exclude_types: [&'static str; 3],
}

impl Default for InteractConfig {
    fn default() -> Self {
        Self {
            tts: false,
            strip_ssml: true,
            stop_all: true,
            exclude_types: EXCLUDED_TRACE_TYPES,
        }
    }
}

/// HTTP client for the bot runtime
#[derive(Debug, Clone)]
pub struct BotRuntimeClient {
    client: Client,
    base_url: Url,
    api_key: String,
    version: String,
}

impl BotRuntimeClient {
    /// Create a new client from configuration
    pub fn new(config: &BotRuntimeConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RelayError::Config(format!("Failed to build HTTP client: {}", e)))?;

        let base_url = Url::parse(&config.base_url).map_err(|e| {
            RelayError::Config(format!("Invalid bot runtime URL {}: {}", config.base_url, e))
        })?;

        Ok(Self {
            client,
            base_url,
            api_key: config.api_key.clone(),
            version: config.version.clone(),
        })
    }

    /// Build `{base}/state/user/{user_id}[/{tail}]` with proper escaping
    fn user_url(&self, user_id: &str, tail: Option<&str>) -> Result<Url> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                RelayError::Config(format!("Bot runtime URL cannot be a base: {}", self.base_url))
            })?;
            segments.pop_if_empty().extend(["state", "user", user_id]);
            if let Some(tail) = tail {
                segments.push(tail);
            }
        }
        Ok(url)
    }

    /// Add authentication and version headers
    fn add_auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header(reqwest::header::AUTHORIZATION, &self.api_key)
            .header("versionID", &self.version)
    }
}

/// Turn a non-success response into an error carrying the response body
async fn ensure_success(response: Response, what: &str) -> std::result::Result<Response, String> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    error!("Bot runtime {} failed: {} - {}", what, status, body);
    Err(format!("{} - {}", status, body))
}

#[async_trait]
impl BotRuntime for BotRuntimeClient {
    async fn interact(
        &self,
        user_id: &str,
        text: &str,
        media_url: Option<&str>,
    ) -> Result<Vec<Trace>> {
        let url = self.user_url(user_id, Some("interact"))?;

        let request = InteractRequest {
            action: Action {
                kind: "text",
                payload: media_url.unwrap_or(text),
            },
            config: InteractConfig::default(),
        };

        debug!("Interact for {}: {:?}", user_id, request.action);

        let response = self
            .add_auth(self.client.post(url).json(&request))
            .send()
            .await?;

        let response = ensure_success(response, "interact")
            .await
            .map_err(RelayError::BotRuntimeUnavailable)?;

        let traces: Vec<Trace> = response.json().await?;
        info!("Bot runtime returned {} traces for {}", traces.len(), user_id);

        Ok(traces)
    }

    async fn delete_state(&self, user_id: &str) -> Result<()> {
        let url = self.user_url(user_id, None)?;

        let response = self
            .add_auth(self.client.delete(url))
            .send()
            .await
            .map_err(|e| RelayError::SessionResetRemoteFailure(e.to_string()))?;

        ensure_success(response, "state delete")
            .await
            .map_err(RelayError::SessionResetRemoteFailure)?;

        info!("Deleted bot runtime state for {}", user_id);
        Ok(())
    }

    async fn update_variables(&self, user_id: &str, variables: Map<String, Value>) -> Result<()> {
        let url = self.user_url(user_id, Some("variables"))?;

        let response = self
            .add_auth(self.client.patch(url).json(&variables))
            .send()
            .await?;

        ensure_success(response, "variables update")
            .await
            .map_err(RelayError::BotRuntimeUnavailable)?;

        debug!("Updated {} bot runtime variables for {}", variables.len(), user_id);
        Ok(())
    }
}
