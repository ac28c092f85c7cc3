//! Maintenance Module
//!
//! Background upkeep that runs independently of request traffic.
//!
//! ## Loops
//! - **Reannounce**: every stored key is announced again so the overlay does
//!   not forget who holds it. Announces are fire-and-forget.
//! - **Replicate**: keys known only from the peer index are fetched from their
//!   first peer and committed locally through the write-once path.
//!
//! Both loops stop when the shutdown token is cancelled.

pub mod service;

pub use service::MaintenanceScheduler;
