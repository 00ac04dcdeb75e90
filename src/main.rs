//! Quota Exporter
//!
//! Polls the quota API in the background and serves the results to
//! Prometheus.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                      Quota Exporter                        │
//! ├──────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐    ┌──────────────┐    ┌─────────────┐  │
//! │  │  Quota API   │───▶│  Collector   │───▶│  Registry / │  │
//! │  │   Client     │    │   (loop)     │    │   Health    │  │
//! │  └──────────────┘    └──────────────┘    └──────┬──────┘  │
//! │                                                 ▼         │
//! │                                  /metrics   /health       │
//! └──────────────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use quota_exporter::config::Config;
use quota_exporter::domain::QuotaSource;
use quota_exporter::monitoring::{run_server, AppState};
use quota_exporter::{HealthState, MetricRegistry, QuotaApiClient, QuotaCollector};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Quota Exporter - publishes quota usage from the quota API as Prometheus metrics
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the YAML config file
    #[arg(long, env = "QUOTA_EXPORTER_CONFIG", default_value = "config.yaml")]
    config: PathBuf,

    /// Quota API URL (overrides quota_exporter.api_url)
    #[arg(long, env = "QUOTA_API_URL")]
    api_url: Option<String>,

    /// Listen address for /metrics and /health (overrides the server section)
    #[arg(long, env = "LISTEN_ADDR")]
    listen_addr: Option<SocketAddr>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_logging(&args)?;

    info!("Starting Quota Exporter");

    let mut config = Config::load(&args.config)
        .with_context(|| format!("failed to load config from {}", args.config.display()))?;
    if let Some(api_url) = args.api_url {
        config.collector.api_url = api_url;
    }
    if let Some(addr) = args.listen_addr {
        config.server.set_socket_addr(addr);
    }
    config.validate().context("invalid configuration")?;

    info!("  Quota API URL: {}", config.collector.api_url);
    info!("  Scrape interval: {:?}", config.collector.scrape_interval);
    info!("  Request timeout: {:?}", config.collector.request_timeout);

    let metrics = Arc::new(MetricRegistry::new()?);
    let health = Arc::new(HealthState::new());
    let source: Arc<dyn QuotaSource> = Arc::new(QuotaApiClient::new(&config.collector.api_url)?);

    let collector = Arc::new(QuotaCollector::new(
        &config.collector,
        source,
        Arc::clone(&metrics),
        Arc::clone(&health),
    ));

    let shutdown = CancellationToken::new();

    // Spawn the collection loop
    let collector_handle = tokio::spawn(collector.run(shutdown.clone()));

    // Stop everything on Ctrl-C
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received shutdown signal");
                signal_token.cancel();
            }
            Err(e) => error!("Failed to listen for shutdown signal: {}", e),
        }
    });

    let addr = config.server.socket_addr()?;
    let served = run_server(addr, AppState::new(metrics, health), shutdown.clone()).await;

    shutdown.cancel();
    collector_handle.await.context("collector task panicked")?;
    served?;

    info!("Quota Exporter shutdown complete");
    Ok(())
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) -> anyhow::Result<()> {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env()
        .add_directive(level.into())
        .add_directive("hyper=warn".parse()?)
        .add_directive("reqwest=warn".parse()?);

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }

    Ok(())
}
