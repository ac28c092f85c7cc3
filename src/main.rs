use clap::Parser;
use dht_kv::config::Config;
use dht_kv::lookup::FederatedLookup;
use dht_kv::maintenance::MaintenanceScheduler;
use dht_kv::overlay::{DhtNode, Overlay, PeerIndex};
use dht_kv::publication::PublicationCoordinator;
use dht_kv::server::{self, AppState};
use dht_kv::storage::KeyedStore;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str()));
    fmt().with_env_filter(filter).with_target(false).init();

    let shutdown = CancellationToken::new();

    // 1. Storage and overlay:
    let store = Arc::new(KeyedStore::new());
    let peers = Arc::new(PeerIndex::new());

    let dht = DhtNode::bind(
        config.dht_addr(),
        config.overlay().await?,
        store.clone(),
        peers.clone(),
        shutdown.clone(),
    )
    .await?;
    tracing::info!("Node ID: {}", dht.id());
    tracing::info!("DHT listening on {}", dht.local_addr());

    dht.start();
    let overlay: Arc<dyn Overlay> = Arc::new(dht);

    // 2. Join the overlay in the background:
    let joiner = overlay.clone();
    tokio::spawn(async move {
        match joiner.bootstrap().await {
            Ok(stats) if stats.attempted == 0 => {
                tracing::info!("No starting nodes configured, running as first node")
            }
            Ok(stats) => tracing::info!(
                "Bootstrap complete: {}/{} starting nodes answered",
                stats.responded,
                stats.attempted
            ),
            Err(e) => tracing::warn!("Bootstrap failed: {}", e),
        }
    });

    // 3. Core services:
    let coordinator = Arc::new(PublicationCoordinator::new(
        store.clone(),
        peers.clone(),
        overlay.clone(),
        config.announce_timeout(),
        shutdown.clone(),
    ));

    let lookup = Arc::new(FederatedLookup::new(
        store.clone(),
        peers.clone(),
        overlay.clone(),
        config.fetch_failure_policy,
        config.lookup_concurrency,
        shutdown.clone(),
    ));

    let scheduler = MaintenanceScheduler::new(
        store.clone(),
        peers.clone(),
        overlay.clone(),
        coordinator.clone(),
        config.reannounce_interval(),
        config.replicate_interval(),
        shutdown.clone(),
    );
    let maintenance = scheduler.start();

    // 4. HTTP server:
    let app = server::router(AppState {
        peers,
        overlay,
        coordinator,
        lookup,
    });

    let listener = tokio::net::TcpListener::bind(config.http_addr()).await?;

    let signal = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        tracing::info!("Received shutdown signal");
        signal.cancel();
    });

    tracing::info!("Press Ctrl+C to shutdown");
    server::serve(listener, app, shutdown.clone()).await?;

    shutdown.cancel();
    for handle in maintenance {
        let _ = handle.await;
    }

    tracing::info!("Node stopped");
    Ok(())
}
