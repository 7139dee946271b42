//! dental-gateway: WhatsApp assistant for a dental clinic
//!
//! Usage:
//!   dental-gateway                 - Start the webhook server
//!   dental-gateway --check-config  - Print the effective configuration and exit
//!   dental-gateway --help          - Show help

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use dg_booking::{BookingService, build_classifier};
use dg_calendar::{build_provider, parse_timezone};
use dg_core::{CONFIG_FILE, Config, LlmClient};
use dg_whatsapp::{CloudApiClient, Responder, WebhookServer, WebhookState};
use tracing_subscriber::EnvFilter;

/// Run mode
enum RunMode {
    /// Serve the webhook
    Server,
    /// Print the redacted configuration
    CheckConfig,
    Help,
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mode = parse_args();

    match mode {
        RunMode::Help => {
            print_help();
            return Ok(());
        }
        RunMode::Version => {
            println!("dental-gateway {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        _ => {}
    }

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load .env file
    dotenvy::dotenv().ok();

    let config = Config::read().context("Failed to read configuration")?;

    match mode {
        RunMode::CheckConfig => check_config(&config),
        _ => {
            config.validate().context("Invalid configuration")?;
            run_server(config).await
        }
    }
}

/// Parse command line arguments
fn parse_args() -> RunMode {
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--check-config" => return RunMode::CheckConfig,
            "--help" | "-h" => return RunMode::Help,
            "--version" | "-v" => return RunMode::Version,
            _ => {}
        }
    }

    RunMode::Server
}

/// Print help message
fn print_help() {
    println!("dental-gateway - WhatsApp assistant for a dental clinic");
    println!();
    println!("Usage:");
    println!("  dental-gateway                 Start the webhook server");
    println!("  dental-gateway --check-config  Print the effective configuration and exit");
    println!("  dental-gateway --help          Show this help message");
    println!("  dental-gateway --version       Show version");
    println!();
    println!("Configuration is read from {} when present, then from", CONFIG_FILE);
    println!("environment variables (a .env file is loaded first).");
    println!();
    println!("Environment Variables:");
    println!("  VERIFY_TOKEN               Webhook verification token (required)");
    println!("  WHATSAPP_TOKEN             Cloud API access token (required)");
    println!("  WHATSAPP_PHONE_NUMBER_ID   Sending phone number ID (required)");
    println!("  WHATSAPP_APP_SECRET        App secret for X-Hub-Signature-256 checks");
    println!("  PORT / HOST                Listen address (default: 0.0.0.0:8000)");
    println!("  LLM_API_KEY                Model API key (OPENAI_API_KEY also accepted)");
    println!("  LLM_PROVIDER               openai or claude (default: openai)");
    println!("  LLM_MODEL                  Model name (default: gpt-4.1-mini)");
    println!("  CALENDAR_PROVIDER          none, google, caldav or memory (default: none)");
    println!("  GOOGLE_CREDENTIALS_JSON    Service account key for Google Calendar");
    println!("  CALDAV_URL                 CalDAV server URL");
    println!("  BOOKING_INTENT_MODE        keyword or model (default: keyword)");
    println!("  CLINIC_TIMEZONE            Clinic IANA time zone (default: Europe/Madrid)");
}

/// Print the redacted configuration and whether it is usable
fn check_config(config: &Config) -> anyhow::Result<()> {
    println!("{}", config.redacted().to_toml()?);

    match config.validate() {
        Ok(()) => {
            println!("# configuration OK");
            Ok(())
        }
        Err(e) => Err(anyhow::anyhow!("Invalid configuration: {}", e)),
    }
}

/// Wire the clients together and serve until Ctrl+C
async fn run_server(config: Config) -> anyhow::Result<()> {
    tracing::info!("Starting dental-gateway for {}", config.clinic.name);

    let zone = parse_timezone(&config.booking.timezone)?;

    let llm = LlmClient::from_config(&config.llm)?.map(Arc::new);
    match &llm {
        Some(client) => tracing::info!("Model: {} ({:?})", client.model(), client.provider()),
        None => tracing::info!("No LLM API key, free-text questions get the fallback reply"),
    }

    let mut responder = Responder::new(config.clinic.clone(), llm.clone());

    if let Some(calendar) = build_provider(&config.calendar, zone)? {
        let service = BookingService::from_config(calendar, &config.booking)?;
        let classifier = build_classifier(config.booking.intent_mode, llm.clone());
        responder = responder.with_booking(service, classifier);
        tracing::info!("Calendar booking enabled ({:?} intent)", config.booking.intent_mode);
    }

    let state = WebhookState {
        whatsapp: CloudApiClient::new(&config.whatsapp),
        responder,
        verify_token: config.whatsapp.verify_token.clone(),
        app_secret: config.whatsapp.app_secret.clone(),
    };

    if state.app_secret.is_none() {
        tracing::warn!("WHATSAPP_APP_SECRET not set, webhook signatures are not checked");
    }

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", config.server.host, config.server.port))?;

    tracing::info!("Press Ctrl+C to exit");

    WebhookServer::new(addr, state)
        .start(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for Ctrl+C: {}", e);
            }
            tracing::info!("Shutting down...");
        })
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
