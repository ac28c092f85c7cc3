//! Read Path
//!
//! Merges locally held values with values fetched live from peers that
//! announced a matching key.

use crate::overlay::{Overlay, OverlayError, PeerIndexView, PeerRecord};
use crate::storage::key::Key;
use crate::storage::memory::{Item, KeyedStore};
use crate::storage::protocol::KeyValue;

use futures::stream::{self, StreamExt};
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// What a prefix query does when fetching from a peer fails outright.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum FetchFailurePolicy {
    /// Leave the key out of the result and keep going.
    #[default]
    Lenient,
    /// Fail the whole query.
    Strict,
}

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("failed to fetch {key} from {peer}: {source}")]
    PeerFetch {
        key: Key,
        peer: PeerRecord,
        source: OverlayError,
    },

    #[error("node is shutting down")]
    Cancelled,
}

pub struct FederatedLookup {
    store: Arc<KeyedStore>,
    peers: Arc<dyn PeerIndexView>,
    overlay: Arc<dyn Overlay>,
    policy: FetchFailurePolicy,
    concurrency: usize,
    shutdown: CancellationToken,
}

impl FederatedLookup {
    pub fn new(
        store: Arc<KeyedStore>,
        peers: Arc<dyn PeerIndexView>,
        overlay: Arc<dyn Overlay>,
        policy: FetchFailurePolicy,
        concurrency: usize,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            store,
            peers,
            overlay,
            policy,
            concurrency: concurrency.max(1),
            shutdown,
        }
    }

    /// Every known key starting with `prefix`.
    ///
    /// Local entries come first in key order, followed by peer-sourced
    /// entries in peer index order. A peer-only key is fetched from its first
    /// known peer; if that peer has no value the key is left out.
    pub async fn get_many(&self, prefix: &str) -> Result<Vec<KeyValue>, LookupError> {
        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => Err(LookupError::Cancelled),
            result = self.collect(prefix) => result,
        }
    }

    async fn collect(&self, prefix: &str) -> Result<Vec<KeyValue>, LookupError> {
        let local = self.store.get_all();

        let mut results: Vec<KeyValue> = local
            .iter()
            .filter(|(key, _)| key.matches_prefix(prefix))
            .map(|(key, item)| KeyValue {
                key: key.to_string(),
                value: item.value.clone(),
            })
            .collect();

        let remote: Vec<(Key, PeerRecord)> = self
            .peers
            .all()
            .into_iter()
            .filter(|(key, _)| key.matches_prefix(prefix) && !local.contains_key(key))
            .filter_map(|(key, peers)| peers.first().map(|peer| (key, *peer)))
            .collect();

        tracing::debug!(
            "getMany '{}': {} local, {} to fetch",
            prefix,
            results.len(),
            remote.len()
        );

        let mut fetches = stream::iter(remote)
            .map(|(key, peer)| async move { (key, peer, self.overlay.fetch(peer, key).await) })
            .buffered(self.concurrency);

        while let Some((key, peer, result)) = fetches.next().await {
            match result {
                Ok(Some(bytes)) => match Item::from_wire(bytes) {
                    Some(item) => results.push(KeyValue {
                        key: key.to_string(),
                        value: item.value,
                    }),
                    None => tracing::debug!("Peer {} returned a non-text value for {}", peer, key),
                },
                Ok(None) => tracing::debug!("Peer {} has no value for {}", peer, key),
                Err(source) => match self.policy {
                    FetchFailurePolicy::Strict => {
                        return Err(LookupError::PeerFetch { key, peer, source });
                    }
                    FetchFailurePolicy::Lenient => {
                        tracing::warn!("Skipping {}: fetch from {} failed: {}", key, peer, source);
                    }
                },
            }
        }

        Ok(results)
    }
}
