//! Peer Index
//!
//! Maps keys to the endpoints that announced them. The overlay's receive loop
//! is the only writer; the publication, lookup and maintenance paths only read
//! it through [`PeerIndexView`].

use super::types::PeerRecord;
use crate::storage::key::Key;

use dashmap::DashMap;

/// Read-only access to the peer index.
///
/// Two calls are not guaranteed to observe the same state: inbound announces
/// may land between them.
pub trait PeerIndexView: Send + Sync {
    /// Peers known for `key`, earliest announcer first.
    fn peers_for(&self, key: &Key) -> Vec<PeerRecord>;

    /// Every key with at least one peer, ordered by key bytes.
    fn all(&self) -> Vec<(Key, Vec<PeerRecord>)>;
}

#[derive(Debug, Default)]
pub struct PeerIndex {
    entries: DashMap<Key, Vec<PeerRecord>>,
}

impl PeerIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `peer` under `key`. Returns false if it was already known.
    pub fn add_peer(&self, key: Key, peer: PeerRecord) -> bool {
        let mut peers = self.entries.entry(key).or_default();
        if peers.contains(&peer) {
            return false;
        }
        peers.push(peer);
        true
    }

    pub fn key_count(&self) -> usize {
        self.entries.len()
    }

    pub fn peer_count(&self) -> usize {
        self.entries.iter().map(|entry| entry.value().len()).sum()
    }
}

impl PeerIndexView for PeerIndex {
    fn peers_for(&self, key: &Key) -> Vec<PeerRecord> {
        self.entries
            .get(key)
            .map(|peers| peers.value().clone())
            .unwrap_or_default()
    }

    fn all(&self) -> Vec<(Key, Vec<PeerRecord>)> {
        let mut all: Vec<(Key, Vec<PeerRecord>)> = self
            .entries
            .iter()
            .filter(|entry| !entry.value().is_empty())
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }
}
