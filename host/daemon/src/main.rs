//! roampetsd: the desktop pets host daemon.
//!
//! Loads the TOML config, serves the discovery/session protocol, and watches
//! the config file for changes, pushing updated snapshots to every connected
//! surface.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use roampets_core::{HostConfig, HostServer};

/// How often the config file's mtime is polled.
const CONFIG_POLL_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Parser, Debug)]
#[command(name = "roampetsd", about = "Desktop pets host daemon", version)]
struct Args {
    /// Path to the daemon configuration file.
    #[arg(short, long, default_value = "roampets.toml")]
    config: PathBuf,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = HostConfig::load(&args.config)
        .with_context(|| format!("loading config from {}", args.config.display()))?;
    tracing::info!(
        config = %args.config.display(),
        pets = config.pets.len(),
        workspace = %config.workspace,
        "starting"
    );

    let server = Arc::new(HostServer::new(config));

    tokio::spawn(watch_config(Arc::clone(&server), args.config.clone()));

    tokio::select! {
        result = server.run() => result.context("server failed")?,
        _ = tokio::signal::ctrl_c() => tracing::info!("shutting down"),
    }
    Ok(())
}

/// Poll the config file's mtime; on change, reload and push to all sessions.
/// A config that fails to reload keeps the previous one active.
async fn watch_config(server: Arc<HostServer>, path: PathBuf) {
    let mut last_mtime = mtime(&path);
    let mut ticker = tokio::time::interval(CONFIG_POLL_INTERVAL);
    loop {
        ticker.tick().await;
        let current = mtime(&path);
        if current == last_mtime {
            continue;
        }
        last_mtime = current;

        match HostConfig::load(&path) {
            Ok(config) => {
                tracing::info!(pets = config.pets.len(), "config changed, pushing");
                server.update_config(config);
                server.push_config().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "config reload failed, keeping previous");
            }
        }
    }
}

fn mtime(path: &std::path::Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}
