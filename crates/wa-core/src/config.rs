//! Configuration management
//!
//! Configuration is read with the following priority:
//! 1. environment variables
//! 2. the `wa-relay.toml` file (or the path given on the command line)
//! 3. defaults
//!
//! `${VAR_NAME}` references inside the TOML file are expanded from the
//! environment before parsing. Secrets never have defaults: a missing bot
//! runtime key or Meta credential is reported by [`Config::validate`].

use serde::{Deserialize, Serialize};
use std::path::Path;

use tracing::warn;

use crate::error::{RelayError, Result};

/// Default configuration file name looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "wa-relay.toml";

/// WhatsApp channel provider served by this process
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    /// Twilio WhatsApp sandbox / sender, replies inline as TwiML
    #[default]
    Twilio,
    /// Meta WhatsApp Cloud API, replies through the Graph API
    Meta,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Twilio => "twilio",
            Channel::Meta => "meta",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "twilio" => Some(Channel::Twilio),
            "meta" | "cloud" | "whatsapp_cloud" => Some(Channel::Meta),
            _ => None,
        }
    }
}

/// Bot runtime (dialogue manager) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BotRuntimeConfig {
    /// API key sent verbatim in the `Authorization` header
    pub api_key: String,

    /// Base URL of the runtime API
    pub base_url: String,

    /// Version selector sent in the `versionID` header
    pub version: String,

    /// Project id, informational only (shown on the status endpoints)
    pub project_id: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Also delete the runtime's own state on a reset command
    pub reset_remote_session: bool,

    /// Runtime variable that receives the media URL before interact
    pub media_variable: Option<String>,
}

impl Default for BotRuntimeConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_runtime_url(),
            version: default_runtime_version(),
            project_id: None,
            timeout_secs: 30,
            reset_remote_session: true,
            media_variable: Some("foto_url".to_string()),
        }
    }
}

fn default_runtime_url() -> String {
    "https://general-runtime.voiceflow.com".to_string()
}

fn default_runtime_version() -> String {
    "development".to_string()
}

/// Meta WhatsApp Cloud API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetaConfig {
    /// Permanent or system-user access token (bearer)
    pub access_token: String,

    /// Sending phone number id
    pub phone_number_id: String,

    /// Token expected during the webhook subscription handshake
    pub verify_token: String,

    /// App secret; when set, `X-Hub-Signature-256` is enforced
    pub app_secret: Option<String>,

    /// WhatsApp Business Account id, informational only
    pub business_account_id: Option<String>,

    /// Graph API base URL
    pub graph_base_url: String,

    /// Graph API version segment
    pub graph_version: String,
}

impl Default for MetaConfig {
    fn default() -> Self {
        Self {
            access_token: String::new(),
            phone_number_id: String::new(),
            verify_token: String::new(),
            app_secret: None,
            business_account_id: None,
            graph_base_url: "https://graph.facebook.com".to_string(),
            graph_version: "v18.0".to_string(),
        }
    }
}

/// Session store limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionsConfig {
    /// Maximum number of tracked users; the least recently active is evicted
    pub max_sessions: usize,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self { max_sessions: 10_000 }
    }
}

/// User-visible fixed texts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MessagesConfig {
    /// Sent when the bot runtime produced nothing printable
    pub default_reply: String,
    /// Sent when the bot runtime could not be reached
    pub error_reply: String,
    /// Sent after a reset command
    pub reset_reply: String,
    /// Sent for message types the relay cannot forward
    pub unsupported_reply: String,
    /// Text used when a Twilio message has no body
    pub default_text: String,
    /// Text used when an image arrives without caption
    pub image_text: String,
}

impl Default for MessagesConfig {
    fn default() -> Self {
        Self {
            default_reply: "Gracias por contactar al Sistema 072.".to_string(),
            error_reply: "Lo sentimos, ocurrió un error. Intenta nuevamente.".to_string(),
            reset_reply: "Conversación reiniciada. Escribe cualquier mensaje para comenzar de nuevo."
                .to_string(),
            unsupported_reply:
                "Lo sentimos, por el momento solo podemos procesar mensajes de texto e imágenes."
                    .to_string(),
            default_text: "Hola".to_string(),
            image_text: "Imagen recibida".to_string(),
        }
    }
}

/// Main configuration for wa-relay
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Name shown on the status endpoints
    pub service_name: String,

    /// Channel served by this process
    pub channel: Channel,

    /// HTTP listen port
    pub port: u16,

    pub bot_runtime: BotRuntimeConfig,

    pub meta: MetaConfig,

    pub sessions: SessionsConfig,

    pub messages: MessagesConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_name: "Sistema 072 Webhook".to_string(),
            channel: Channel::default(),
            port: 3000,
            bot_runtime: BotRuntimeConfig::default(),
            meta: MetaConfig::default(),
            sessions: SessionsConfig::default(),
            messages: MessagesConfig::default(),
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl Config {
    /// Expand `${VAR_NAME}` references using `lookup`
    ///
    /// Unknown variables expand to an empty string.
    fn expand_vars(value: &str, lookup: &impl Fn(&str) -> Option<String>) -> String {
        let mut result = String::with_capacity(value.len());
        let mut chars = value.chars().peekable();

        while let Some(c) = chars.next() {
            if c == '$' && chars.peek() == Some(&'{') {
                chars.next();

                let mut var_name = String::new();
                for c in chars.by_ref() {
                    if c == '}' {
                        break;
                    }
                    var_name.push(c);
                }

                if let Some(env_value) = lookup(&var_name) {
                    result.push_str(&env_value);
                }
            } else {
                result.push(c);
            }
        }

        result
    }

    /// Parse TOML content, expanding variables and applying overrides from `lookup`
    pub fn from_toml_str(
        content: &str,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let expanded = Self::expand_vars(content, &lookup);

        let mut config: Config = toml::from_str(&expanded)
            .map_err(|e| RelayError::Config(format!("Failed to parse TOML: {}", e)))?;

        config.apply_overrides(lookup);
        Ok(config)
    }

    /// Load a TOML configuration file; environment variables take precedence
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path).map_err(|e| {
            RelayError::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;

        Self::from_toml_str(&content, env_lookup)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_overrides(env_lookup);
        config
    }

    /// Load configuration and validate it
    ///
    /// An explicit `path` must exist. Without one, `wa-relay.toml` in the
    /// working directory is used when present, otherwise the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_toml_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_toml_file(DEFAULT_CONFIG_FILE)?
            }
            None => Self::from_env(),
        };

        config.validate()?;
        Ok(config)
    }

    /// Override values with those found through `lookup`
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(name) = get("SERVICE_NAME") {
            self.service_name = name;
        }
        if let Some(channel) = get("RELAY_CHANNEL").and_then(|v| Channel::parse(&v)) {
            self.channel = channel;
        }
        if let Some(port) = get("PORT").and_then(|v| v.trim().parse().ok()) {
            self.port = port;
        }

        // Bot runtime
        if let Some(key) = get("BOT_RUNTIME_API_KEY") {
            self.bot_runtime.api_key = key;
        }
        if let Some(url) = get("BOT_RUNTIME_URL") {
            self.bot_runtime.base_url = url;
        }
        if let Some(version) = get("BOT_RUNTIME_VERSION") {
            self.bot_runtime.version = version;
        }
        if let Some(project) = get("BOT_RUNTIME_PROJECT_ID") {
            self.bot_runtime.project_id = Some(project);
        }
        if let Some(secs) = get("BOT_RUNTIME_TIMEOUT_SECS").and_then(|v| v.trim().parse().ok()) {
            self.bot_runtime.timeout_secs = secs;
        }
        if let Some(reset) = get("BOT_RUNTIME_RESET_REMOTE") {
            match parse_bool(&reset) {
                Some(reset) => self.bot_runtime.reset_remote_session = reset,
                None => warn!("Ignoring invalid BOT_RUNTIME_RESET_REMOTE value: {}", reset),
            }
        }
        if let Some(variable) = get("BOT_RUNTIME_MEDIA_VARIABLE") {
            self.bot_runtime.media_variable = Some(variable);
        }

        // Meta
        if let Some(token) = get("WHATSAPP_TOKEN") {
            self.meta.access_token = token;
        }
        if let Some(id) = get("WHATSAPP_PHONE_NUMBER_ID") {
            self.meta.phone_number_id = id;
        }
        if let Some(token) = get("WHATSAPP_VERIFY_TOKEN") {
            self.meta.verify_token = token;
        }
        if let Some(secret) = get("WHATSAPP_APP_SECRET") {
            self.meta.app_secret = Some(secret);
        }
        if let Some(id) = get("WHATSAPP_BUSINESS_ACCOUNT_ID") {
            self.meta.business_account_id = Some(id);
        }
        if let Some(url) = get("GRAPH_API_URL") {
            self.meta.graph_base_url = url;
        }
        if let Some(version) = get("GRAPH_API_VERSION") {
            self.meta.graph_version = version;
        }

        if let Some(max) = get("MAX_SESSIONS").and_then(|v| v.trim().parse().ok()) {
            self.sessions.max_sessions = max;
        }
    }

    /// Check that every credential required by the selected channel is present
    pub fn validate(&self) -> Result<()> {
        if self.bot_runtime.api_key.trim().is_empty() {
            return Err(RelayError::Config(
                "BOT_RUNTIME_API_KEY (bot_runtime.api_key) not set".to_string(),
            ));
        }
        if self.bot_runtime.timeout_secs == 0 {
            return Err(RelayError::Config(
                "bot_runtime.timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.sessions.max_sessions == 0 {
            return Err(RelayError::Config(
                "sessions.max_sessions must be greater than zero".to_string(),
            ));
        }

        if self.channel == Channel::Meta {
            let required = [
                ("WHATSAPP_TOKEN (meta.access_token)", &self.meta.access_token),
                ("WHATSAPP_PHONE_NUMBER_ID (meta.phone_number_id)", &self.meta.phone_number_id),
                ("WHATSAPP_VERIFY_TOKEN (meta.verify_token)", &self.meta.verify_token),
            ];
            for (name, value) in required {
                if value.trim().is_empty() {
                    return Err(RelayError::Config(format!("{} not set", name)));
                }
            }
        }

        Ok(())
    }
}

fn env_lookup(name: &str) -> Option<String> {
    std::env::var(name).ok()
}
