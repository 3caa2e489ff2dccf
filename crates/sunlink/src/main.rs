//! sunlink daemon: bridges a solar telemetry cloud to a local smart-home hub.
//!
//! Runs the bridge loop in the background and serves the thin HTTP front
//! door: credential submission, status queries, and the static dashboard.

mod handlers;
mod routes;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;
use url::Url;

use sunlink_api::hub::{DEFAULT_HUB_URL, HUB_URL_ENV};
use sunlink_config::SettingsStore;
use sunlink_core::state::{BridgeConfig, BridgeState};

/// Solar telemetry to smart-home hub bridge
#[derive(Parser, Debug)]
#[command(name = "sunlink")]
#[command(about = "Bridges a solar inverter telemetry cloud to a local smart-home hub")]
#[command(version)]
struct Args {
    /// Bind address
    #[arg(long, default_value = "0.0.0.0")]
    bind: String,

    /// HTTP server port
    #[arg(short, long, env = "PORT", default_value = "9009")]
    port: u16,

    /// Hub base URL
    #[arg(long, env = HUB_URL_ENV, default_value = DEFAULT_HUB_URL)]
    hub_url: Url,

    /// Directory holding the persisted settings document
    #[arg(long, env = "SUNLINK_DATA_DIR", default_value = "./userdata")]
    data_dir: PathBuf,

    /// Directory of static dashboard files
    #[arg(long, default_value = "./public")]
    public_dir: PathBuf,

    /// Log filter (RUST_LOG overrides)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_tracing(&args.log_level);

    let store = match SettingsStore::load(&args.data_dir) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("failed to load settings from {}: {e}", args.data_dir.display());
            std::process::exit(1);
        }
    };

    let config = BridgeConfig::production(args.hub_url.clone());
    let state = Arc::new(BridgeState::new(config, store));

    let cancel = CancellationToken::new();
    tokio::spawn(sunlink_core::bridge::run(Arc::clone(&state), cancel.clone()));

    let app = routes::router(Arc::clone(&state), &args.public_dir);
    let addr = format!("{}:{}", args.bind, args.port);

    info!(version = env!("CARGO_PKG_VERSION"), %addr, hub = %args.hub_url, "sunlink listening");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            eprintln!("failed to bind {addr}: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = axum::serve(listener, app).await {
        eprintln!("server error: {e}");
        cancel.cancel();
        std::process::exit(1);
    }
}

fn init_tracing(default_filter: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_filter.to_owned())),
        )
        .with_target(false)
        .init();
}
