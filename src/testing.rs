//! In-memory overlay double shared by the unit tests of the publication,
//! lookup, maintenance and server modules.

use crate::overlay::{
    AnnounceHandle, AnnounceStats, BootstrapStats, Contact, NodeId, Overlay, OverlayError,
    PeerRecord,
};
use crate::storage::key::Key;

use async_trait::async_trait;
use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{Notify, oneshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnounceMode {
    /// Traversal finishes successfully.
    Complete,
    /// Traversal finishes but reports an error.
    CompleteWithError,
    /// `announce` itself fails.
    FailToStart,
    /// Traversal never finishes.
    Hang,
}

pub struct FakeOverlay {
    port: u16,
    values: DashMap<(SocketAddr, Key), Vec<u8>>,
    unreachable: DashMap<SocketAddr, ()>,
    announced: Mutex<Vec<Key>>,
    mode: Mutex<AnnounceMode>,
    hung: Mutex<Vec<oneshot::Sender<Result<AnnounceStats, OverlayError>>>>,
    fetches: AtomicUsize,
    fetch_gate: Mutex<Option<Arc<Notify>>>,
}

impl FakeOverlay {
    pub fn new() -> Self {
        Self {
            port: 6881,
            values: DashMap::new(),
            unreachable: DashMap::new(),
            announced: Mutex::new(Vec::new()),
            mode: Mutex::new(AnnounceMode::Complete),
            hung: Mutex::new(Vec::new()),
            fetches: AtomicUsize::new(0),
            fetch_gate: Mutex::new(None),
        }
    }

    /// Makes `peer` answer `value` when asked for `key`.
    pub fn serve(&self, peer: PeerRecord, key: &str, value: &[u8]) {
        self.serve_key(peer, Key::encode(key).unwrap(), value);
    }

    /// Like `serve`, for keys that cannot be built from a string.
    pub fn serve_key(&self, peer: PeerRecord, key: Key, value: &[u8]) {
        self.values.insert((peer.addr, key), value.to_vec());
    }

    /// Makes every later fetch wait until the returned `Notify` is signalled
    /// once per fetch.
    pub fn hold_fetches(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.fetch_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    /// Makes every fetch against `peer` fail with a timeout.
    pub fn make_unreachable(&self, peer: PeerRecord) {
        self.unreachable.insert(peer.addr, ());
    }

    pub fn set_mode(&self, mode: AnnounceMode) {
        *self.mode.lock().unwrap() = mode;
    }

    pub fn announced(&self) -> Vec<Key> {
        self.announced.lock().unwrap().clone()
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

pub fn peer(port: u16) -> PeerRecord {
    PeerRecord {
        addr: format!("10.0.0.1:{}", port).parse().unwrap(),
    }
}

#[async_trait]
impl Overlay for FakeOverlay {
    async fn bootstrap(&self) -> Result<BootstrapStats, OverlayError> {
        Ok(BootstrapStats::default())
    }

    async fn ping(&self, addr: SocketAddr) -> Result<NodeId, OverlayError> {
        Err(OverlayError::Timeout(addr))
    }

    fn announce(&self, key: Key, _port: u16) -> Result<AnnounceHandle, OverlayError> {
        let mode = *self.mode.lock().unwrap();
        if mode == AnnounceMode::FailToStart {
            return Err(OverlayError::Closed);
        }

        self.announced.lock().unwrap().push(key);

        match mode {
            AnnounceMode::Complete => Ok(AnnounceHandle::completed(Ok(AnnounceStats {
                queried: 1,
                announced: 1,
            }))),
            AnnounceMode::CompleteWithError => {
                Ok(AnnounceHandle::completed(Err(OverlayError::Abandoned)))
            }
            _ => {
                let (done, handle) = AnnounceHandle::channel();
                self.hung.lock().unwrap().push(done);
                Ok(handle)
            }
        }
    }

    async fn fetch(&self, peer: PeerRecord, key: Key) -> Result<Option<Vec<u8>>, OverlayError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let gate = self.fetch_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.unreachable.contains_key(&peer.addr) {
            return Err(OverlayError::Timeout(peer.addr));
        }
        Ok(self
            .values
            .get(&(peer.addr, key))
            .map(|value| value.value().clone()))
    }

    fn local_port(&self) -> u16 {
        self.port
    }

    fn nodes(&self) -> Vec<Contact> {
        vec![]
    }

    fn status(&self) -> String {
        "fake overlay".to_string()
    }
}
