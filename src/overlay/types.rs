use crate::storage::key::{KEY_SIZE, Key};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;

/// Identifier of an overlay node. Lives in the same 160-bit space as keys.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub [u8; KEY_SIZE]);

impl NodeId {
    pub fn random() -> Self {
        Self(rand::random())
    }

    /// The point in id space a key is stored around.
    pub fn from_key(key: &Key) -> Self {
        Self(key.to_wire())
    }

    pub fn distance(&self, other: &NodeId) -> [u8; KEY_SIZE] {
        let mut out = [0u8; KEY_SIZE];
        for (i, byte) in out.iter_mut().enumerate() {
            *byte = self.0[i] ^ other.0[i];
        }
        out
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", hex::encode(&self.0[..6]))
    }
}

/// A reachable overlay node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Contact {
    pub id: NodeId,
    pub addr: SocketAddr,
}

/// An endpoint believed to hold a value for some key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeerRecord {
    pub addr: SocketAddr,
}

impl fmt::Display for PeerRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.addr)
    }
}

/// Outcome of a bootstrap run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BootstrapStats {
    pub attempted: usize,
    pub responded: usize,
}

/// Outcome of an announce traversal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnnounceStats {
    pub queried: usize,
    pub announced: usize,
}

/// The wire protocol between overlay nodes.
///
/// Every message carries a transaction id `tx`; a response echoes the id of
/// the request it answers. Keys are sent in their padded 20-byte form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DhtMessage {
    Ping {
        tx: u64,
        from: NodeId,
    },

    Pong {
        tx: u64,
        from: NodeId,
    },

    FindNode {
        tx: u64,
        from: NodeId,
        target: NodeId,
    },

    Nodes {
        tx: u64,
        from: NodeId,
        nodes: Vec<Contact>,
    },

    GetPeers {
        tx: u64,
        from: NodeId,
        key: [u8; KEY_SIZE],
    },

    Peers {
        tx: u64,
        from: NodeId,
        peers: Vec<PeerRecord>,
        nodes: Vec<Contact>,
    },

    AnnouncePeer {
        tx: u64,
        from: NodeId,
        key: [u8; KEY_SIZE],
        port: u16,
    },

    AnnounceAck {
        tx: u64,
        from: NodeId,
    },

    GetValue {
        tx: u64,
        from: NodeId,
        key: [u8; KEY_SIZE],
    },

    Value {
        tx: u64,
        from: NodeId,
        value: Option<Vec<u8>>,
    },
}

impl DhtMessage {
    pub fn tx(&self) -> u64 {
        match self {
            DhtMessage::Ping { tx, .. }
            | DhtMessage::Pong { tx, .. }
            | DhtMessage::FindNode { tx, .. }
            | DhtMessage::Nodes { tx, .. }
            | DhtMessage::GetPeers { tx, .. }
            | DhtMessage::Peers { tx, .. }
            | DhtMessage::AnnouncePeer { tx, .. }
            | DhtMessage::AnnounceAck { tx, .. }
            | DhtMessage::GetValue { tx, .. }
            | DhtMessage::Value { tx, .. } => *tx,
        }
    }

    pub fn sender(&self) -> NodeId {
        match self {
            DhtMessage::Ping { from, .. }
            | DhtMessage::Pong { from, .. }
            | DhtMessage::FindNode { from, .. }
            | DhtMessage::Nodes { from, .. }
            | DhtMessage::GetPeers { from, .. }
            | DhtMessage::Peers { from, .. }
            | DhtMessage::AnnouncePeer { from, .. }
            | DhtMessage::AnnounceAck { from, .. }
            | DhtMessage::GetValue { from, .. }
            | DhtMessage::Value { from, .. } => *from,
        }
    }

    pub fn is_response(&self) -> bool {
        matches!(
            self,
            DhtMessage::Pong { .. }
                | DhtMessage::Nodes { .. }
                | DhtMessage::Peers { .. }
                | DhtMessage::AnnounceAck { .. }
                | DhtMessage::Value { .. }
        )
    }
}
