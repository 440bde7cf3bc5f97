//! Multivec API Server
//!
//! Serves tiles of multivec genomic datasets stored as per-chromosome Zarr
//! arrays.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use multivec_api::config::ServiceConfig;
use multivec_api::state::AppState;

/// Multivec API Server
#[derive(Parser, Debug)]
#[command(name = "multivec-api")]
#[command(about = "HTTP tile server for multivec genomic datasets")]
struct Args {
    /// Listen address
    #[arg(short, long, default_value = "0.0.0.0:8000", env = "MULTIVEC_LISTEN_ADDR")]
    listen: String,

    /// Tileset registry (YAML)
    #[arg(short, long, default_value = "config/tilesets.yaml", env = "MULTIVEC_CONFIG")]
    config: PathBuf,

    /// Log level
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    log_level: String,

    /// Number of worker threads
    #[arg(long, env = "MULTIVEC_WORKER_THREADS")]
    worker_threads: Option<usize>,
}

fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Remote stores block inside the runtime, so it must be multi-threaded
    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();

    if let Some(threads) = args.worker_threads {
        runtime_builder.worker_threads(threads);
    }

    let runtime = runtime_builder
        .build()
        .context("Failed to create Tokio runtime")?;

    runtime.block_on(run_server(args))
}

async fn run_server(args: Args) -> Result<()> {
    // Initialize tracing
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .json()
        .init();

    // Initialize Prometheus metrics exporter
    let prometheus_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus recorder")?;

    info!("Starting multivec API server");

    let config = ServiceConfig::load(&args.config)?;
    let state = AppState::from_config(&config)
        .context("Failed to initialize application state")?
        .with_prometheus(prometheus_handle);
    let app = multivec_api::build_router(Arc::new(state));

    let addr: SocketAddr = args
        .listen
        .parse()
        .with_context(|| format!("Invalid listen address {:?}", args.listen))?;

    info!("Multivec API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await.context("Server failed")?;

    Ok(())
}
