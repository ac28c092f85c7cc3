//! Write Path
//!
//! Accepts a key only if nobody is known to hold it, commits it locally, then
//! announces it on the overlay.

use crate::overlay::{MAX_VALUE_SIZE, Overlay, OverlayError, PeerIndexView};
use crate::storage::key::{Key, KeyError};
use crate::storage::memory::{Item, KeyedStore, StoreError};

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error(transparent)]
    InvalidKey(#[from] KeyError),

    #[error("value is too large: {len} > {max}")]
    ValueTooLarge { len: usize, max: usize },

    #[error("already exists: {0}")]
    Conflict(Key),

    #[error("failed to store {key}: {source}")]
    StoreFailure { key: Key, source: StoreError },

    #[error("failed to announce {key}: {source}")]
    AnnounceFailure { key: Key, source: OverlayError },

    #[error("announce of {key} did not finish within {timeout:?}")]
    AnnounceTimeout { key: Key, timeout: Duration },

    #[error("node is shutting down")]
    Cancelled,
}

pub struct PublicationCoordinator {
    store: Arc<KeyedStore>,
    peers: Arc<dyn PeerIndexView>,
    overlay: Arc<dyn Overlay>,
    announce_timeout: Duration,
    shutdown: CancellationToken,
}

impl PublicationCoordinator {
    pub fn new(
        store: Arc<KeyedStore>,
        peers: Arc<dyn PeerIndexView>,
        overlay: Arc<dyn Overlay>,
        announce_timeout: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            store,
            peers,
            overlay,
            announce_timeout,
            shutdown,
        }
    }

    /// Publishes `value` under `key`.
    ///
    /// 1. Encodes the key (rejects empty, oversized and zero-containing keys)
    ///    and rejects values too large for a single overlay reply.
    /// 2. Rejects keys already stored locally or announced by any peer.
    /// 3. Commits locally.
    /// 4. Announces and waits for the traversal, bounded by `announce_timeout`.
    ///
    /// A failed or timed-out announce is reported but the local commit stays;
    /// the reannounce loop will advertise the key again.
    pub async fn put(&self, key: &str, value: String) -> Result<(), PublishError> {
        let key = Key::encode(key)?;
        if value.len() > MAX_VALUE_SIZE {
            return Err(PublishError::ValueTooLarge {
                len: value.len(),
                max: MAX_VALUE_SIZE,
            });
        }

        if self.store.contains(&key) {
            return Err(PublishError::Conflict(key));
        }

        if !self.peers.peers_for(&key).is_empty() {
            return Err(PublishError::Conflict(key));
        }

        self.commit(key, Item::new(value))?;

        let handle = self
            .overlay
            .announce(key, self.overlay.local_port())
            .map_err(|source| PublishError::AnnounceFailure { key, source })?;

        tokio::select! {
            _ = self.shutdown.cancelled() => Err(PublishError::Cancelled),
            finished = tokio::time::timeout(self.announce_timeout, handle.wait()) => match finished {
                Ok(Ok(stats)) => {
                    tracing::info!(
                        "Published {} (announced to {} nodes)",
                        key,
                        stats.announced
                    );
                    Ok(())
                }
                Ok(Err(e)) => {
                    tracing::warn!("Announce of {} finished with error: {}", key, e);
                    Ok(())
                }
                Err(_) => Err(PublishError::AnnounceTimeout {
                    key,
                    timeout: self.announce_timeout,
                }),
            }
        }
    }

    /// Commits an item into the local store. Shared by client writes and
    /// replication so both obey the write-once rule.
    pub fn commit(&self, key: Key, item: Item) -> Result<(), PublishError> {
        match self.store.put(key, item) {
            Ok(()) => Ok(()),
            Err(StoreError::AlreadyExists(key)) => Err(PublishError::Conflict(key)),
            Err(source) => Err(PublishError::StoreFailure { key, source }),
        }
    }
}
