//! Client Module
//!
//! HTTP clients for a running node.
//!
//! - [`NamespaceClient`]: thin wrapper over the put and prefix-query endpoints.
//! - [`MessageTransport`]: chat channels stored as write-once keys of the form
//!   `{channel}.{parent_id}.{message_id}`, so the replies to a message are
//!   found with one prefix query.

pub mod api;
pub mod transport;

pub use api::{NamespaceClient, PutOutcome};
pub use transport::{ChatMessage, MessageTransport};
