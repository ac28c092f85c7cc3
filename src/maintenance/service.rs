use crate::overlay::{Overlay, PeerIndexView};
use crate::publication::{PublicationCoordinator, PublishError};
use crate::storage::memory::{Item, KeyedStore};

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub struct MaintenanceScheduler {
    store: Arc<KeyedStore>,
    peers: Arc<dyn PeerIndexView>,
    overlay: Arc<dyn Overlay>,
    coordinator: Arc<PublicationCoordinator>,
    reannounce_interval: Duration,
    replicate_interval: Duration,
    shutdown: CancellationToken,
}

impl MaintenanceScheduler {
    pub fn new(
        store: Arc<KeyedStore>,
        peers: Arc<dyn PeerIndexView>,
        overlay: Arc<dyn Overlay>,
        coordinator: Arc<PublicationCoordinator>,
        reannounce_interval: Duration,
        replicate_interval: Duration,
        shutdown: CancellationToken,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            peers,
            overlay,
            coordinator,
            reannounce_interval,
            replicate_interval,
            shutdown,
        })
    }

    /// Spawns both loops and returns their handles. The loops exit once the
    /// shutdown token is cancelled.
    pub fn start(self: Arc<Self>) -> Vec<JoinHandle<()>> {
        tracing::info!(
            "Starting maintenance (reannounce every {:?}, replicate every {:?})",
            self.reannounce_interval,
            self.replicate_interval
        );

        let reannounce = {
            let scheduler = self.clone();
            tokio::spawn(async move {
                scheduler.reannounce_loop().await;
            })
        };

        let replicate = {
            let scheduler = self.clone();
            tokio::spawn(async move {
                scheduler.replicate_loop().await;
            })
        };

        vec![reannounce, replicate]
    }

    async fn reannounce_loop(self: Arc<Self>) {
        let mut interval = tokio::time::interval(self.reannounce_interval);

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = interval.tick() => {
                    self.reannounce_once();
                }
            }
        }

        tracing::debug!("Reannounce loop stopped");
    }

    async fn replicate_loop(self: Arc<Self>) {
        let mut interval = tokio::time::interval(self.replicate_interval);

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = interval.tick() => {
                    // A pass in flight is dropped on shutdown; commits are atomic.
                    tokio::select! {
                        _ = self.shutdown.cancelled() => break,
                        adopted = self.replicate_once() => {
                            if adopted > 0 {
                                tracing::info!("Replicated {} keys from peers", adopted);
                            }
                        }
                    }
                }
            }
        }

        tracing::debug!("Replicate loop stopped");
    }

    /// Announces every stored key once without waiting for the traversals.
    /// Returns how many announces were started.
    pub fn reannounce_once(&self) -> usize {
        let port = self.overlay.local_port();
        let mut started = 0;

        for key in self.store.keys() {
            match self.overlay.announce(key, port) {
                Ok(_handle) => started += 1,
                Err(e) => tracing::warn!("Reannounce of {} failed: {}", key, e),
            }
        }

        tracing::debug!("Reannounced {} keys", started);
        started
    }

    /// Pulls in every peer-only text key whose first peer returns a text value.
    /// Returns how many keys were committed locally.
    pub async fn replicate_once(&self) -> usize {
        let mut adopted = 0;

        for (key, peers) in self.peers.all() {
            if self.store.contains(&key) {
                continue;
            }
            // Prefix queries cannot return non-text keys.
            if key.as_str().is_none() {
                tracing::debug!("Not replicating non-text key {}", key);
                continue;
            }
            let Some(peer) = peers.first().copied() else {
                continue;
            };

            let item = match self.overlay.fetch(peer, key).await {
                Ok(Some(bytes)) => match Item::from_wire(bytes) {
                    Some(item) => item,
                    None => {
                        tracing::debug!("Peer {} returned a non-text value for {}", peer, key);
                        continue;
                    }
                },
                Ok(None) => {
                    tracing::debug!("Peer {} has no value for {}", peer, key);
                    continue;
                }
                Err(e) => {
                    tracing::debug!("Replicate of {} from {} failed: {}", key, peer, e);
                    continue;
                }
            };

            match self.coordinator.commit(key, item) {
                Ok(()) => {
                    tracing::debug!("Replicated {} from {}", key, peer);
                    adopted += 1;
                }
                Err(PublishError::Conflict(_)) => {
                    tracing::debug!("{} was stored while replicating", key);
                }
                Err(e) => tracing::warn!("Failed to commit replicated {}: {}", key, e),
            }
        }

        adopted
    }
}
