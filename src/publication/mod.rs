//! Publication Module
//!
//! The write path of the namespace. A key is write-once: once it exists in the
//! local store or any peer has announced it, every further write is refused.
//! The local store's own `put` settles races between writers that both passed
//! the pre-checks.

pub mod handlers;
pub mod service;

pub use service::{PublicationCoordinator, PublishError};
