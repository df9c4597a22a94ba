//! A minimal zoned blockchain node.
//!
//! Provides a proof-of-work ledger, signed transactions, an encrypted peer
//! network, and a cross-zone packet relay.

pub mod config;
pub mod core;
pub mod crypto;
pub mod network;
pub mod relay;
pub mod types;
pub mod utils;
