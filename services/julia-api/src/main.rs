//! Julia tile API service.
//!
//! HTTP server streaming Julia-set tiles over WebSocket sessions.

use anyhow::{anyhow, Result};
use clap::Parser;
use std::{net::SocketAddr, sync::Arc};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use julia_api::{build_router, config::ServerConfig, state::AppState};

#[derive(Parser, Debug)]
#[command(name = "julia-api")]
#[command(about = "Julia set tile streaming server")]
struct Args {
    /// Listen address (default: LISTEN_ADDR or 0.0.0.0:8080)
    #[arg(short, long)]
    listen: Option<String>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Number of tokio worker threads (default: TOKIO_WORKER_THREADS or CPU cores)
    #[arg(long)]
    worker_threads: Option<usize>,

    /// Nominal tile edge in pixels (default: TILE_SIZE or 128)
    #[arg(long)]
    tile_size: Option<u32>,

    /// Maximum cached tiles (default: MAX_CACHE_SIZE or 1000)
    #[arg(long)]
    max_cache_size: Option<usize>,

    /// Maximum tile renders in flight (default: RENDER_CONCURRENCY or CPU cores)
    #[arg(long)]
    render_concurrency: Option<usize>,

    /// Tiles buffered per batch ahead of the client (default: TILE_CHANNEL_CAPACITY or 64)
    #[arg(long)]
    tile_channel_capacity: Option<usize>,
}

impl Args {
    /// CLI flags take precedence over the environment.
    fn apply(&self, config: &mut ServerConfig) {
        if let Some(listen) = &self.listen {
            config.listen = listen.clone();
        }
        if let Some(threads) = self.worker_threads {
            config.worker_threads = Some(threads);
        }
        if let Some(size) = self.tile_size {
            config.tile_size = size;
        }
        if let Some(size) = self.max_cache_size {
            config.max_cache_size = size;
        }
        if let Some(n) = self.render_concurrency {
            config.render_concurrency = n;
        }
        if let Some(n) = self.tile_channel_capacity {
            config.tile_channel_capacity = n;
        }
    }
}

fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let mut config = ServerConfig::from_env();
    args.apply(&mut config);
    config.validate().map_err(|e| anyhow!("invalid configuration: {}", e))?;

    // Build tokio runtime with configurable worker threads
    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();
    if let Some(threads) = config.worker_threads {
        runtime_builder.worker_threads(threads);
    }

    let runtime = runtime_builder.build()?;
    runtime.block_on(async_main(args, config))?;
    Ok(())
}

async fn async_main(args: Args, config: ServerConfig) -> Result<()> {
    // Initialize tracing
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    // Initialize Prometheus metrics exporter
    let prometheus_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow!("failed to install Prometheus recorder: {}", e))?;

    info!("Prometheus metrics exporter initialized");
    info!(
        tile_size = config.tile_size,
        max_cache_size = config.max_cache_size,
        render_concurrency = config.render_concurrency,
        tile_channel_capacity = config.tile_channel_capacity,
        worker_threads = ?config.worker_threads,
        "Starting julia tile server"
    );

    let addr: SocketAddr = config.listen.parse()?;
    let state = Arc::new(AppState::new(config, Some(prometheus_handle)));
    let app = build_router(state);

    info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_flags_override_environment() {
        let args = Args::parse_from([
            "julia-api",
            "--tile-channel-capacity",
            "8",
            "--render-concurrency",
            "3",
        ]);
        let mut config = ServerConfig {
            tile_channel_capacity: 256,
            render_concurrency: 16,
            ..ServerConfig::default()
        };

        args.apply(&mut config);
        assert_eq!(config.tile_channel_capacity, 8);
        assert_eq!(config.render_concurrency, 3);
    }

    #[test]
    fn test_absent_flags_keep_environment_values() {
        let args = Args::parse_from(["julia-api"]);
        let mut config = ServerConfig {
            tile_channel_capacity: 256,
            ..ServerConfig::default()
        };

        args.apply(&mut config);
        assert_eq!(config.tile_channel_capacity, 256);
        assert_eq!(config.listen, ServerConfig::default().listen);
    }
}
