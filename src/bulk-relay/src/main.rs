//! Bulk Relay: rate-limited WhatsApp broadcasts from an uploaded number list.
//!
//! Main entry point that initializes the session, the job registry, and the
//! HTTP server.

use clap::Parser;
use relay_api::{ApiServer, AppState};
use relay_channels::{ClientFactory, SessionManager, SimulatedClientFactory};
use relay_core::config::{AppConfig, ClientKind};
use relay_delivery::JobRegistry;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "bulk-relay")]
#[command(about = "Rate-limited WhatsApp broadcasts over a linked session")]
#[command(version)]
struct Cli {
    /// Bind address (overrides config)
    #[arg(long, env = "BULK_RELAY__API__HOST")]
    host: Option<String>,

    /// HTTP port (overrides config)
    #[arg(long, env = "BULK_RELAY__API__HTTP_PORT")]
    http_port: Option<u16>,

    /// Directory with the built web UI (overrides config)
    #[arg(long, env = "BULK_RELAY__API__STATIC_DIR")]
    static_dir: Option<String>,

    /// Do not start the Prometheus exporter
    #[arg(long, default_value_t = false)]
    no_metrics: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "bulk_relay=info,relay_api=info,relay_delivery=info,relay_channels=info,tower_http=info"
                    .into()
            }),
        )
        .json()
        .init();

    let cli = Cli::parse();

    info!("Bulk Relay starting up");

    let mut config = AppConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });

    if let Some(host) = cli.host {
        config.api.host = host;
    }
    if let Some(port) = cli.http_port {
        config.api.http_port = port;
    }
    if cli.static_dir.is_some() {
        config.api.static_dir = cli.static_dir;
    }
    if cli.no_metrics {
        config.metrics.enabled = false;
    }

    info!(
        http_port = config.api.http_port,
        client = ?config.session.client,
        default_rate = config.dispatch.default_rate_per_minute,
        "Configuration loaded"
    );

    let factory: Arc<dyn ClientFactory> = match config.session.client {
        ClientKind::Simulated => Arc::new(SimulatedClientFactory::new(config.session.clone())),
    };

    let session = SessionManager::start(factory);
    // Link early so a pairing challenge is waiting when the UI first loads.
    session.ensure_initialized();

    let registry = Arc::new(JobRegistry::new(session.clone(), config.dispatch.clone()));
    let api_server = ApiServer::new(config.clone(), AppState::new(session, registry));

    if let Err(e) = api_server.start_metrics() {
        error!(error = %e, "Failed to start metrics exporter");
    }

    info!("Bulk Relay is ready to serve traffic");

    api_server.start_http().await?;

    Ok(())
}
