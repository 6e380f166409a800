use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tollgate::config::TollgateConfig;
use tollgate::http::HttpServer;

/// Fixed-window rate limiting gateway.
#[derive(Debug, Parser)]
#[command(name = "tollgate", version, about)]
struct Cli {
    /// Service configuration file (YAML or TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Route rules file, overrides `rate_limiting.rules_path`
    #[arg(short, long)]
    rules: Option<PathBuf>,

    /// Listen address, overrides `server.addr`
    #[arg(short, long)]
    addr: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_thread_ids(true)
        .init();

    info!("Starting Tollgate");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let cli = Cli::parse();

    let config = TollgateConfig::load(cli.config.as_deref())?
        .with_overrides(cli.rules.as_deref(), cli.addr);
    info!(addr = %config.server.addr, "Configuration loaded");

    // Invalid rules are fatal: never serve with rate limiting silently disabled
    let rate_limiter = Arc::new(config.build_rate_limiter()?);

    let sweeper = rate_limiter.spawn_sweeper(Duration::from_secs(
        config.rate_limiting.sweep_interval_secs.max(1),
    ));

    HttpServer::new(config.server.addr, rate_limiter)
        .serve_with_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();
    info!("Tollgate stopped");
    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
