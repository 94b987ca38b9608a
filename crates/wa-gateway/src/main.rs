//! wa-gateway: WhatsApp relay binary
//!
//! Usage:
//!   wa-gateway                   - Start the webhook server
//!   wa-gateway --config <path>   - Start with an explicit TOML file
//!   wa-gateway --help            - Show help

mod server;
mod status;

use std::path::PathBuf;

use tracing_subscriber::EnvFilter;
use wa_core::Config;

/// Run mode
#[derive(Debug, PartialEq)]
enum RunMode {
    /// Webhook server, optionally with an explicit config file
    Server { config_path: Option<PathBuf> },
    /// Show help
    Help,
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    let config_path = match parse_args(&args)? {
        RunMode::Help => {
            print_help();
            return Ok(());
        }
        RunMode::Version => {
            println!("wa-gateway {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        RunMode::Server { config_path } => config_path,
    };

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    // Load .env file
    dotenvy::dotenv().ok();

    let config = Config::load(config_path.as_deref())
        .map_err(|e| anyhow::anyhow!("Config error: {}", e))?;

    tracing::info!("Starting {}...", config.service_name);

    server::run_server(config).await
}

/// Parse command line arguments (program name excluded)
fn parse_args(args: &[String]) -> anyhow::Result<RunMode> {
    let mut config_path = None;
    let mut iter = args.iter();

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--help" | "-h" => return Ok(RunMode::Help),
            "--version" | "-v" => return Ok(RunMode::Version),
            "--config" | "-c" => match iter.next() {
                Some(path) => config_path = Some(PathBuf::from(path)),
                None => anyhow::bail!("{} requires a path", arg),
            },
            other => anyhow::bail!("Unknown argument: {} (see --help)", other),
        }
    }

    Ok(RunMode::Server { config_path })
}

/// Print help message
fn print_help() {
    println!("wa-gateway - WhatsApp to bot runtime relay");
    println!();
    println!("Usage:");
    println!("  wa-gateway                  Start the webhook server");
    println!("  wa-gateway --config <path>  Read configuration from <path> (default: wa-relay.toml)");
    println!("  wa-gateway --help           Show this help message");
    println!("  wa-gateway --version        Show version");
    println!();
    println!("Environment Variables:");
    println!("  BOT_RUNTIME_API_KEY         Bot runtime API key (required)");
    println!("  BOT_RUNTIME_PROJECT_ID      Project id shown on status pages");
    println!("  BOT_RUNTIME_VERSION         Version id or alias (default: development)");
    println!("  BOT_RUNTIME_URL             Runtime base URL");
    println!("  RELAY_CHANNEL               twilio or meta (default: twilio)");
    println!("  PORT                        HTTP port (default: 3000)");
    println!("  WHATSAPP_TOKEN              Meta access token (meta channel)");
    println!("  WHATSAPP_PHONE_NUMBER_ID    Meta sending phone number id (meta channel)");
    println!("  WHATSAPP_VERIFY_TOKEN       Meta webhook verify token (meta channel)");
    println!("  WHATSAPP_APP_SECRET         Enables X-Hub-Signature-256 checks");
    println!("  MAX_SESSIONS                Session store capacity (default: 10000)");
    println!("  RUST_LOG                    Log filter (default: info)");
}
