//! Lookup Module
//!
//! Prefix queries over everything the node knows about: its own store plus
//! keys other peers announced. Peer-held values are fetched on demand and are
//! best-effort; see [`FetchFailurePolicy`] for how transport failures are handled.

pub mod handlers;
pub mod service;

pub use service::{FederatedLookup, FetchFailurePolicy, LookupError};
