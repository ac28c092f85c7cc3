//! Overlay Module
//!
//! A small Kademlia-flavoured DHT over UDP. The rest of the crate reaches it
//! only through the [`Overlay`] and [`PeerIndexView`] traits.
//!
//! ## Core Mechanisms
//! - **Wire protocol**: `bincode`-encoded [`DhtMessage`]s, each tagged with a
//!   transaction id so replies can be matched to waiting requests.
//! - **Routing**: a flat XOR-metric contact table refreshed by every inbound message.
//! - **Announce**: advertises this node as a holder of a key to the closest known nodes.
//! - **Peer index**: inbound announces are recorded per key; lookups and
//!   replication read it to find peers to fetch from.

pub mod handlers;
pub mod peers;
pub mod routing;
pub mod service;
pub mod types;

pub use peers::{PeerIndex, PeerIndexView};
pub use service::{
    AnnounceHandle, DhtNode, MAX_VALUE_SIZE, Overlay, OverlayConfig, OverlayError,
};
pub use types::{AnnounceStats, BootstrapStats, Contact, DhtMessage, NodeId, PeerRecord};

#[cfg(test)]
mod tests;
