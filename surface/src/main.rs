//! roampets-surface binary: headless surface runtime.
//!
//! Connects to the host for the given workspace and runs the pet loops. An
//! embedding shell is expected to feed pointer events and layout updates and
//! to read back visuals and positions; run standalone, this mainly serves as
//! a protocol exerciser.

use std::sync::Arc;

use clap::Parser;
use parking_lot::RwLock;
use tokio::sync::{watch, Notify};
use tracing_subscriber::EnvFilter;

use roampets_surface::bounds::{self, LayoutMetrics};
use roampets_surface::{AssetStore, PetRegistry, SurfaceClient};

#[derive(Parser, Debug)]
#[command(name = "roampets-surface", about = "Desktop pets render-surface runtime", version)]
struct Args {
    /// Workspace path the host was started for.
    #[arg(short, long)]
    workspace: String,

    /// Initial viewport width in pixels.
    #[arg(long, default_value_t = 1920.0)]
    viewport_width: f64,

    /// Initial viewport height in pixels.
    #[arg(long, default_value_t = 1080.0)]
    viewport_height: f64,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    tracing::info!(workspace = %args.workspace, "starting");

    let metrics = Arc::new(RwLock::new(LayoutMetrics::unobstructed(
        args.viewport_width,
        args.viewport_height,
    )));
    let store = AssetStore::new();
    let registry = Arc::new(PetRegistry::new(Arc::clone(&metrics), store.clone()));

    // Layout inlet for the embedding shell; unused when run standalone.
    let (_layout_tx, layout_rx) = watch::channel::<Option<LayoutMetrics>>(None);
    let reposition = Arc::new(Notify::new());
    tokio::spawn(bounds::watch_layout(
        layout_rx,
        Arc::clone(&metrics),
        Arc::clone(&reposition),
    ));
    {
        let registry = Arc::clone(&registry);
        tokio::spawn(async move {
            loop {
                reposition.notified().await;
                registry.clamp_all();
            }
        });
    }

    let client = SurfaceClient::new(args.workspace, registry, store);
    tokio::select! {
        () = client.run() => {}
        _ = tokio::signal::ctrl_c() => tracing::info!("shutting down"),
    }
    Ok(())
}
