//! burrow-relay binary entry point.
//!
//! Usage:
//! ```bash
//! burrow-relay --config relay.toml
//! burrow-relay --bind 127.0.0.1:5000 --log-level debug
//! burrow-relay --help
//! ```

use anyhow::Context;
use burrow_relay::config::Config;
use burrow_relay::http::build_router;
use burrow_relay::liveness::spawn_liveness_monitor;
use burrow_relay::shutdown::wait_for_shutdown_signal;
use burrow_relay::BurrowRelay;
use clap::Parser;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG: &str = "relay.toml";

/// BurrowSpace rendezvous and fallback-relay server.
#[derive(Parser, Debug)]
#[command(name = "burrow-relay")]
#[command(version)]
struct Cli {
    /// Config file. Defaults to ./relay.toml when present.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Listen address, overriding `server.bind_address`.
    #[arg(long)]
    bind: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .init();

    tracing::info!("burrow-relay v{}", env!("CARGO_PKG_VERSION"));

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(bind) = cli.bind {
        config.server.bind_address = bind;
    }

    let liveness = config.liveness.clone();
    let bind_address = config.server.bind_address.clone();

    let relay = Arc::new(BurrowRelay::open(config).await?);
    tracing::info!("Server ID: {}", relay.server_id());

    let monitor = spawn_liveness_monitor(relay.peers_arc(), liveness);

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("failed to bind {}", bind_address))?;
    tracing::info!("Listening on {}", bind_address);

    let app = build_router(relay);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(wait_for_shutdown_signal())
    .await?;

    monitor.abort();
    tracing::info!("Shutdown complete");
    Ok(())
}

/// Load the config file, or defaults when no file is given and
/// `relay.toml` does not exist.
fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    match path {
        Some(path) => Ok(Config::from_file(path)?),
        None => {
            let default = Path::new(DEFAULT_CONFIG);
            if default.exists() {
                Ok(Config::from_file(default)?)
            } else {
                tracing::info!("No {} found, using defaults", DEFAULT_CONFIG);
                Ok(Config::default())
            }
        }
    }
}
