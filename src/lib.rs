//! Write-Once Key/Value Namespace on a DHT Overlay
//!
//! This library crate defines the modules that make up a namespace node.
//! It serves as the foundation for the binary executable (`main.rs`).
//!
//! ## Architecture Modules
//! - **`storage`**: keys with an explicit valid length, the write-once local
//!   store and the HTTP wire types.
//! - **`overlay`**: the UDP DHT engine, the peer index it fills from inbound
//!   announces, and the overlay debug endpoints.
//! - **`publication`**: the write path. Accepts a key only if nobody holds it,
//!   commits locally, then announces it.
//! - **`lookup`**: prefix queries merging local values with values fetched live
//!   from announcing peers.
//! - **`maintenance`**: background reannounce and replicate loops.
//! - **`server`**: the axum router and the serve loop.
//! - **`client`**: HTTP client and a chat transport built on prefix queries.
//! - **`config`**: flags and environment settings of a node.

pub mod client;
pub mod config;
pub mod lookup;
pub mod maintenance;
pub mod overlay;
pub mod publication;
pub mod server;
pub mod storage;

#[cfg(test)]
mod testing;
