//! Phishguard - Entry point.
//!
//! Brings up a TUN device that captures all outbound traffic, blocks DNS
//! lookups of phishing domains and relays every other lookup to the
//! configured resolver until Ctrl-C.

use std::borrow::Cow;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use phishguard::blocklist::FileLoader;
use phishguard::config::Config;
use phishguard::dns::{PolicyEngine, UdpForwarder};
use phishguard::network::protect;
use phishguard::tunnel::{TracingSink, TunnelController, TunnelState};

#[cfg(target_os = "linux")]
async fn run() -> Result<()> {
    let config_path = std::env::var("CONFIG_PATH")
        .map(Cow::Owned)
        .unwrap_or(Cow::Borrowed("config.toml"));
    let config = Config::load(config_path.as_ref()).context("Failed to load configuration")?;

    // Initialize metrics (must be done early, before any metrics are recorded)
    phishguard::metrics::init(&config.metrics).context("Failed to initialize metrics")?;
    if config.metrics.enabled {
        info!("Metrics enabled on {}", config.metrics.listen);
    }

    info!("Starting phishguard...");
    info!("Upstream resolver: {}", config.upstream_resolver);
    info!(
        "Blocklist: {} inline entries, {} sources",
        config.blocklist.len(),
        config.blocklist_sources.len()
    );

    let blocklist = FileLoader::build(&config.blocklist, &config.blocklist_sources)
        .await
        .context("Failed to load blocklist")?;
    if blocklist.is_empty() {
        warn!("Blocklist is empty, no domain will be blocked");
    }

    let forwarder = UdpForwarder::new(
        Arc::from(protect::from_config(&config.protect)),
        config.forward_timeout(),
    );
    let controller = TunnelController::new(
        phishguard::network::LinuxTunProvider,
        forwarder,
        PolicyEngine::new(Arc::new(blocklist)),
        Arc::new(TracingSink),
        config.tunnel_settings(),
    );

    let mut state = controller.subscribe();
    controller
        .connect()
        .await
        .context("Failed to bring the tunnel up")?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl-C received, shutting down...");
        }
        _ = state.wait_for(|s| *s == TunnelState::Disconnected) => {
            warn!("Tunnel stopped on its own");
        }
    }

    controller.disconnect().await;
    info!("Shutdown complete.");
    Ok(())
}

#[cfg(not(target_os = "linux"))]
async fn run() -> Result<()> {
    anyhow::bail!("phishguard only ships a virtual interface backend for Linux")
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    run().await
}
