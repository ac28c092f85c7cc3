use super::peers::{PeerIndex, PeerIndexView};
use super::routing::RoutingTable;
use super::types::{AnnounceStats, BootstrapStats, Contact, DhtMessage, NodeId, PeerRecord};
use crate::storage::key::{KEY_SIZE, Key};
use crate::storage::memory::KeyedStore;

use async_trait::async_trait;
use dashmap::DashMap;
use futures::future::join_all;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const RECV_BUFFER_SIZE: usize = 65536;

/// Largest UDP payload an IPv4 datagram can carry.
const MAX_DATAGRAM_SIZE: usize = 65_507;

/// Bincode framing around the bytes of a `Value` reply: variant tag, tx,
/// sender id, option tag and length prefix.
const VALUE_FRAMING: usize = 4 + 8 + KEY_SIZE + 1 + 8;

/// Largest value a node can hand to a peer in a single `Value` reply.
pub const MAX_VALUE_SIZE: usize = MAX_DATAGRAM_SIZE - VALUE_FRAMING;

#[derive(Debug, Error)]
pub enum OverlayError {
    #[error("overlay node is shut down")]
    Closed,

    #[error("request to {0} timed out")]
    Timeout(SocketAddr),

    #[error("unexpected reply from {0}")]
    UnexpectedReply(SocketAddr),

    #[error("no starting node responded ({attempted} attempted)")]
    BootstrapFailed { attempted: usize },

    #[error("announce was abandoned before completing")]
    Abandoned,

    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Handle on an in-flight announce traversal.
pub struct AnnounceHandle {
    rx: oneshot::Receiver<Result<AnnounceStats, OverlayError>>,
}

impl AnnounceHandle {
    /// A handle plus the sender that completes it.
    pub fn channel() -> (oneshot::Sender<Result<AnnounceStats, OverlayError>>, Self) {
        let (tx, rx) = oneshot::channel();
        (tx, Self { rx })
    }

    /// A handle that is already finished.
    pub fn completed(result: Result<AnnounceStats, OverlayError>) -> Self {
        let (tx, handle) = Self::channel();
        let _ = tx.send(result);
        handle
    }

    /// Waits until the traversal finishes.
    pub async fn wait(self) -> Result<AnnounceStats, OverlayError> {
        self.rx.await.unwrap_or(Err(OverlayError::Abandoned))
    }
}

/// What the publication, lookup and maintenance paths need from the overlay.
#[async_trait]
pub trait Overlay: Send + Sync {
    /// Joins the overlay through the configured starting nodes.
    async fn bootstrap(&self) -> Result<BootstrapStats, OverlayError>;

    async fn ping(&self, addr: SocketAddr) -> Result<NodeId, OverlayError>;

    /// Starts advertising this node (reachable on `port`) as a holder of `key`.
    /// Fails only if the traversal could not be started.
    fn announce(&self, key: Key, port: u16) -> Result<AnnounceHandle, OverlayError>;

    /// Asks `peer` for its value under `key`. `Ok(None)` means the peer
    /// answered without a value.
    async fn fetch(&self, peer: PeerRecord, key: Key) -> Result<Option<Vec<u8>>, OverlayError>;

    /// Port other nodes should use to reach this one.
    fn local_port(&self) -> u16;

    fn nodes(&self) -> Vec<Contact>;

    /// Human-readable state dump.
    fn status(&self) -> String;
}

#[derive(Debug, Clone)]
pub struct OverlayConfig {
    pub bootstrap_nodes: Vec<SocketAddr>,
    pub request_timeout: Duration,
    /// How many of the closest nodes an announce reaches.
    pub k: usize,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            bootstrap_nodes: vec![],
            request_timeout: Duration::from_secs(5),
            k: 8,
        }
    }
}

/// UDP overlay node.
///
/// Answers `GetValue` from the node's own `KeyedStore` and records inbound
/// `AnnouncePeer` messages in the shared `PeerIndex`.
#[derive(Clone)]
pub struct DhtNode {
    pub local: Contact,
    socket: Arc<UdpSocket>,
    routing: Arc<RoutingTable>,
    peers: Arc<PeerIndex>,
    store: Arc<KeyedStore>,
    pending: Arc<DashMap<u64, oneshot::Sender<DhtMessage>>>,
    next_tx: Arc<AtomicU64>,
    config: OverlayConfig,
    shutdown: CancellationToken,
}

impl DhtNode {
    pub async fn bind(
        bind_addr: SocketAddr,
        config: OverlayConfig,
        store: Arc<KeyedStore>,
        peers: Arc<PeerIndex>,
        shutdown: CancellationToken,
    ) -> Result<Self, OverlayError> {
        let socket = UdpSocket::bind(bind_addr).await?;
        let local = Contact {
            id: NodeId::random(),
            addr: socket.local_addr()?,
        };

        Ok(Self {
            local,
            socket: Arc::new(socket),
            routing: Arc::new(RoutingTable::new(local.id)),
            peers,
            store,
            pending: Arc::new(DashMap::new()),
            next_tx: Arc::new(AtomicU64::new(rand::random())),
            config,
            shutdown,
        })
    }

    /// Spawns the receive loop. It stops when the shutdown token fires.
    pub fn start(&self) -> JoinHandle<()> {
        let node = self.clone();
        tokio::spawn(async move {
            node.receive_loop().await;
        })
    }

    pub fn id(&self) -> NodeId {
        self.local.id
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local.addr
    }

    pub fn routing(&self) -> &RoutingTable {
        &self.routing
    }

    async fn receive_loop(self) {
        let mut buf = vec![0u8; RECV_BUFFER_SIZE];
        tracing::info!("Overlay node {} listening on {}", self.local.id, self.local.addr);

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                received = self.socket.recv_from(&mut buf) => match received {
                    Ok((len, src)) => match bincode::deserialize::<DhtMessage>(&buf[..len]) {
                        Ok(msg) => {
                            if let Err(e) = self.handle_message(msg, src).await {
                                tracing::warn!("Error handling message from {}: {}", src, e);
                            }
                        }
                        Err(e) => {
                            tracing::warn!("Failed to deserialize message from {}: {}", src, e);
                        }
                    },
                    Err(e) => {
                        tracing::error!("Failed to receive UDP packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(100)).await;
                    }
                }
            }
        }

        // Dropping the responders fails every request still waiting.
        self.pending.clear();
        tracing::info!("Overlay node {} stopped", self.local.id);
    }

    async fn handle_message(&self, msg: DhtMessage, src: SocketAddr) -> Result<(), OverlayError> {
        self.routing.insert(Contact {
            id: msg.sender(),
            addr: src,
        });

        if msg.is_response() {
            match self.pending.remove(&msg.tx()) {
                Some((_, responder)) => {
                    let _ = responder.send(msg);
                }
                None => tracing::debug!("Dropping late reply {} from {}", msg.tx(), src),
            }
            return Ok(());
        }

        let from = self.local.id;
        let reply = match msg {
            DhtMessage::Ping { tx, .. } => DhtMessage::Pong { tx, from },
            DhtMessage::FindNode { tx, target, .. } => DhtMessage::Nodes {
                tx,
                from,
                nodes: self.routing.closest(&target, self.config.k),
            },
            DhtMessage::GetPeers { tx, key, .. } => {
                let key = Key::from_wire(key);
                DhtMessage::Peers {
                    tx,
                    from,
                    peers: self.peers.peers_for(&key),
                    nodes: self.routing.closest(&NodeId::from_key(&key), self.config.k),
                }
            }
            DhtMessage::AnnouncePeer { tx, key, port, .. } => {
                let key = Key::from_wire(key);
                let peer = PeerRecord {
                    addr: SocketAddr::new(src.ip(), port),
                };
                if self.peers.add_peer(key, peer) {
                    tracing::info!("Peer {} announced {}", peer, key);
                }
                DhtMessage::AnnounceAck { tx, from }
            }
            DhtMessage::GetValue { tx, key, .. } => DhtMessage::Value {
                tx,
                from,
                value: self.store.get(&Key::from_wire(key)).ok().map(|item| item.to_wire()),
            },
            other => {
                tracing::debug!("Unhandled message {:?} from {}", other, src);
                return Ok(());
            }
        };

        self.send(&reply, src).await
    }

    async fn send(&self, msg: &DhtMessage, addr: SocketAddr) -> Result<(), OverlayError> {
        let encoded = bincode::serialize(msg)?;
        self.socket.send_to(&encoded, addr).await?;
        Ok(())
    }

    /// Sends a request and waits for the reply carrying the same transaction id.
    async fn request<F>(&self, addr: SocketAddr, build: F) -> Result<DhtMessage, OverlayError>
    where
        F: FnOnce(u64) -> DhtMessage,
    {
        if self.shutdown.is_cancelled() {
            return Err(OverlayError::Closed);
        }

        let tx = self.next_tx.fetch_add(1, Ordering::Relaxed);
        let (responder, response) = oneshot::channel();
        self.pending.insert(tx, responder);

        if let Err(e) = self.send(&build(tx), addr).await {
            self.pending.remove(&tx);
            return Err(e);
        }

        tokio::select! {
            _ = self.shutdown.cancelled() => {
                self.pending.remove(&tx);
                Err(OverlayError::Closed)
            }
            result = tokio::time::timeout(self.config.request_timeout, response) => match result {
                Ok(Ok(reply)) => Ok(reply),
                Ok(Err(_)) => Err(OverlayError::Closed),
                Err(_) => {
                    self.pending.remove(&tx);
                    Err(OverlayError::Timeout(addr))
                }
            }
        }
    }

    async fn find_node(&self, addr: SocketAddr, target: NodeId) -> Result<Vec<Contact>, OverlayError> {
        let from = self.local.id;
        match self
            .request(addr, |tx| DhtMessage::FindNode { tx, from, target })
            .await?
        {
            DhtMessage::Nodes { nodes, .. } => Ok(nodes),
            _ => Err(OverlayError::UnexpectedReply(addr)),
        }
    }

    async fn get_peers(
        &self,
        addr: SocketAddr,
        key: Key,
    ) -> Result<(Vec<PeerRecord>, Vec<Contact>), OverlayError> {
        let from = self.local.id;
        let wire = key.to_wire();
        match self
            .request(addr, |tx| DhtMessage::GetPeers { tx, from, key: wire })
            .await?
        {
            DhtMessage::Peers { peers, nodes, .. } => Ok((peers, nodes)),
            _ => Err(OverlayError::UnexpectedReply(addr)),
        }
    }

    /// Asks the closest known nodes for closer ones, then announces to the
    /// `k` closest of everything learned.
    async fn announce_traversal(&self, key: Key, port: u16) -> Result<AnnounceStats, OverlayError> {
        let target = NodeId::from_key(&key);
        let initial = self.routing.closest(&target, self.config.k);
        if initial.is_empty() {
            tracing::debug!("No known nodes to announce {} to", key);
            return Ok(AnnounceStats::default());
        }

        let replies = join_all(initial.iter().map(|c| self.get_peers(c.addr, key))).await;

        let mut candidates: HashMap<NodeId, Contact> =
            initial.iter().map(|c| (c.id, *c)).collect();
        let mut queried = 0;
        for (contact, reply) in initial.iter().zip(replies) {
            match reply {
                Ok((_, nodes)) => {
                    queried += 1;
                    for node in nodes.into_iter().filter(|n| n.id != self.local.id) {
                        candidates.entry(node.id).or_insert(node);
                    }
                }
                Err(e) => {
                    tracing::debug!("Dropping unresponsive contact {}: {}", contact.addr, e);
                    self.routing.remove(&contact.id);
                    candidates.remove(&contact.id);
                }
            }
        }

        let mut targets: Vec<Contact> = candidates.into_values().collect();
        targets.sort_by_key(|c| c.id.distance(&target));
        targets.truncate(self.config.k);

        let from = self.local.id;
        let wire = key.to_wire();
        let acks = join_all(targets.iter().map(|c| {
            self.request(c.addr, move |tx| DhtMessage::AnnouncePeer {
                tx,
                from,
                key: wire,
                port,
            })
        }))
        .await;

        let announced = acks
            .iter()
            .filter(|ack| matches!(ack, Ok(DhtMessage::AnnounceAck { .. })))
            .count();

        Ok(AnnounceStats { queried, announced })
    }
}

#[async_trait]
impl Overlay for DhtNode {
    async fn bootstrap(&self) -> Result<BootstrapStats, OverlayError> {
        let attempted = self.config.bootstrap_nodes.len();
        if attempted == 0 {
            return Ok(BootstrapStats::default());
        }

        let results = join_all(
            self.config
                .bootstrap_nodes
                .iter()
                .map(|addr| self.find_node(*addr, self.local.id)),
        )
        .await;

        let mut responded = 0;
        let mut learned: HashMap<NodeId, Contact> = HashMap::new();
        for (addr, result) in self.config.bootstrap_nodes.iter().zip(results) {
            match result {
                Ok(contacts) => {
                    responded += 1;
                    for contact in contacts.into_iter().filter(|c| c.id != self.local.id) {
                        learned.insert(contact.id, contact);
                    }
                }
                Err(e) => tracing::warn!("Starting node {} did not answer: {}", addr, e),
            }
        }

        if responded == 0 {
            return Err(OverlayError::BootstrapFailed { attempted });
        }

        // Learned contacts enter the routing table once they answer.
        join_all(learned.values().map(|c| self.ping(c.addr))).await;

        Ok(BootstrapStats {
            attempted,
            responded,
        })
    }

    async fn ping(&self, addr: SocketAddr) -> Result<NodeId, OverlayError> {
        let from = self.local.id;
        match self.request(addr, |tx| DhtMessage::Ping { tx, from }).await? {
            DhtMessage::Pong { from, .. } => Ok(from),
            _ => Err(OverlayError::UnexpectedReply(addr)),
        }
    }

    fn announce(&self, key: Key, port: u16) -> Result<AnnounceHandle, OverlayError> {
        if self.shutdown.is_cancelled() {
            return Err(OverlayError::Closed);
        }

        let (done, handle) = AnnounceHandle::channel();
        let node = self.clone();
        tokio::spawn(async move {
            let result = node.announce_traversal(key, port).await;
            match &result {
                Ok(stats) => tracing::debug!(
                    "Announced {} (queried={}, announced={})",
                    key,
                    stats.queried,
                    stats.announced
                ),
                Err(e) => tracing::warn!("Announce of {} failed: {}", key, e),
            }
            let _ = done.send(result);
        });

        Ok(handle)
    }

    async fn fetch(&self, peer: PeerRecord, key: Key) -> Result<Option<Vec<u8>>, OverlayError> {
        let from = self.local.id;
        let wire = key.to_wire();
        match self
            .request(peer.addr, |tx| DhtMessage::GetValue { tx, from, key: wire })
            .await?
        {
            DhtMessage::Value { value, .. } => Ok(value),
            _ => Err(OverlayError::UnexpectedReply(peer.addr)),
        }
    }

    fn local_port(&self) -> u16 {
        self.local.addr.port()
    }

    fn nodes(&self) -> Vec<Contact> {
        self.routing.all()
    }

    fn status(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "node id: {}", self.local.id);
        let _ = writeln!(out, "address: {}", self.local.addr);
        let _ = writeln!(out, "local items: {}", self.store.len());

        let _ = writeln!(out, "routing table: {} contacts", self.routing.len());
        for (contact, age) in self.routing.ages() {
            let _ = writeln!(out, "  {} {} (seen {}s ago)", contact.id, contact.addr, age);
        }

        let _ = writeln!(
            out,
            "peer index: {} keys, {} peers",
            self.peers.key_count(),
            self.peers.peer_count()
        );
        for (key, peers) in self.peers.all() {
            let peers: Vec<String> = peers.iter().map(|p| p.to_string()).collect();
            let _ = writeln!(out, "  {} -> [{}]", key, peers.join(", "));
        }

        out
    }
}
