//! Primitive types shared across the node.
//!
//! - [`hash`]: fixed-size SHA3-256 content hashes and the incremental builder

pub mod hash;
