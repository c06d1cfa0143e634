//! latch gateway - verifies signed requests and serves published paths
//!
//! Holds every claimed path in memory. Restarting the process forgets all
//! claims.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tokio::sync::watch;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use gateway::config::DEFAULT_FRESHNESS_WINDOW;
use gateway::{Config, GatewayState};

/// latch gateway - verifies signed requests and serves published paths
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port to listen on for HTTP requests
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Seconds a signed request timestamp may drift from the gateway clock
    #[arg(long, default_value_t = DEFAULT_FRESHNESS_WINDOW.as_secs())]
    freshness_window: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let (non_blocking_writer, _guard) = tracing_appender::non_blocking(std::io::stdout());
    let log_level: tracing::Level = args.log_level.parse().unwrap_or(tracing::Level::INFO);
    let env_filter = EnvFilter::builder()
        .with_default_directive(log_level.into())
        .from_env_lossy();

    let stdout_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_writer(non_blocking_writer)
        .with_filter(env_filter);

    tracing_subscriber::registry().with(stdout_layer).init();

    tracing::info!("Starting latch gateway");

    let listen_addr = SocketAddr::from_str(&format!("0.0.0.0:{}", args.port))?;
    let mut config = Config::new(listen_addr)
        .with_freshness_window(Duration::from_secs(args.freshness_window));
    config.log_level = log_level;

    let state = GatewayState::from_config(&config);

    // Set up graceful shutdown
    let (shutdown_tx, shutdown_rx) = watch::channel(());
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl+c: {}", e);
            return;
        }
        tracing::info!("Received shutdown signal");
        let _ = shutdown_tx.send(());
    });

    gateway::run(config, state, shutdown_rx).await?;

    tracing::info!("Gateway shutdown complete");
    Ok(())
}
