//! Cross-zone packet type.

use crate::types::hash::Hash;
use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// One unit of cross-zone traffic. Immutable once built; the id commits to
/// the routing fields, creation time, and a random salt so two packets with
/// identical content still get distinct ids.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Packet {
    packet_id: String,
    source_zone: String,
    destination_zone: String,
    payload: serde_json::Value,
    created_at: u64,
}

impl Packet {
    pub fn new(source_zone: &str, destination_zone: &str, payload: serde_json::Value) -> Self {
        let created_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let mut salt = [0u8; 16];
        OsRng.fill_bytes(&mut salt);

        let packet_id = Hash::sha3()
            .chain(b"ZONE_PACKET")
            .chain(source_zone.as_bytes())
            .chain(destination_zone.as_bytes())
            .chain(payload.to_string().as_bytes())
            .chain(&created_at.to_le_bytes())
            .chain(&salt)
            .finalize()
            .to_string();

        Self {
            packet_id,
            source_zone: source_zone.to_string(),
            destination_zone: destination_zone.to_string(),
            payload,
            created_at,
        }
    }

    pub fn packet_id(&self) -> &str {
        &self.packet_id
    }

    pub fn source_zone(&self) -> &str {
        &self.source_zone
    }

    pub fn destination_zone(&self) -> &str {
        &self.destination_zone
    }

    pub fn payload(&self) -> &serde_json::Value {
        &self.payload
    }

    pub fn created_at(&self) -> u64 {
        self.created_at
    }
}
