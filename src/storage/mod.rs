//! Local Storage Module
//!
//! Holds the values this node is authoritative for.
//!
//! ## Core Concepts
//! - **Keys**: fixed 20-byte identifiers with an explicit valid length (`key`).
//! - **Write-once**: `KeyedStore::put` refuses a key that is already present,
//!   which makes it the final arbiter when two writers race on one key.
//! - **Snapshots**: readers receive copies, never references into the map.

pub mod key;
pub mod memory;
pub mod protocol;

pub use key::{KEY_SIZE, Key, KeyError};
pub use memory::{Item, KeyedStore, StoreError};
