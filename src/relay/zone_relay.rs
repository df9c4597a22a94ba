//! Zone-to-zone packet relay with bounded redelivery.

use crate::relay::packet::Packet;
use crate::{info, warn};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Default number of delivery attempts per packet, first try included.
pub const DEFAULT_RETRY_LIMIT: u32 = 3;
/// Default fixed pause between delivery attempts.
pub const DEFAULT_BACKOFF: Duration = Duration::from_millis(200);

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("channel for zone {0} already exists")]
    ChannelExists(String),

    #[error("no channel for zone {0}")]
    ChannelMissing(String),

    #[error("no handler registered for zone {0}")]
    HandlerMissing(String),

    #[error("packet {0} carries a malformed payload")]
    MalformedPayload(String),

    #[error("packet {packet_id} dropped after {attempts} delivery attempts")]
    RetryLimitExceeded { packet_id: String, attempts: u32 },
}

/// Zone-specific packet processing, opaque to the relay. Installed per
/// destination zone; whatever the zone does with an accepted packet happens
/// here.
pub trait ZoneHandler: Send + Sync {
    fn handle(&self, packet: &Packet);
}

/// Queues and retries delivery of opaque packets between named zones.
///
/// Each registered zone owns one ordered backlog of packets awaiting
/// processing. Delivery into a missing channel is retried a fixed number of
/// times with a fixed backoff, then dropped and reported; nothing is queued
/// forever.
pub struct ZoneRelay {
    channels: DashMap<String, Vec<Packet>>,
    handlers: DashMap<String, Arc<dyn ZoneHandler>>,
    retry_limit: u32,
    backoff: Duration,
}

impl ZoneRelay {
    pub fn new(retry_limit: u32, backoff: Duration) -> Self {
        Self {
            channels: DashMap::new(),
            handlers: DashMap::new(),
            retry_limit: retry_limit.max(1),
            backoff,
        }
    }

    /// Registers an empty packet queue for a zone.
    ///
    /// Re-creating an existing channel is rejected, not silently accepted.
    pub fn create_channel(&self, zone: &str) -> Result<(), RelayError> {
        match self.channels.entry(zone.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                Err(RelayError::ChannelExists(zone.to_string()))
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(Vec::new());
                info!("opened relay channel for zone {zone}");
                Ok(())
            }
        }
    }

    /// Installs the processing hook for a zone, replacing any previous one.
    pub fn register_handler(&self, zone: &str, handler: Arc<dyn ZoneHandler>) {
        self.handlers.insert(zone.to_string(), handler);
    }

    /// Attempts to deliver a packet to its destination zone's channel.
    ///
    /// Succeeds immediately when the channel exists. Otherwise retries up to
    /// the configured limit with a fixed backoff between attempts, covering
    /// channels created concurrently, then logs the drop and returns `false`.
    pub async fn send_packet(&self, packet: Packet) -> bool {
        let zone = packet.destination_zone().to_string();
        for attempt in 1..=self.retry_limit {
            if let Some(mut backlog) = self.channels.get_mut(&zone) {
                backlog.push(packet.clone());
                info!(
                    "queued packet {} for zone {zone} (attempt {attempt})",
                    packet.packet_id()
                );
                return true;
            }
            if attempt < self.retry_limit {
                tokio::time::sleep(self.backoff).await;
            }
        }

        warn!(
            "{}",
            RelayError::RetryLimitExceeded {
                packet_id: packet.packet_id().to_string(),
                attempts: self.retry_limit,
            }
        );
        false
    }

    /// Validates an inbound packet and hands it to the destination zone's
    /// hook.
    ///
    /// The payload must be a JSON object, array, or string; anything else
    /// (null, bare numbers, booleans) is malformed. Rejected packets are
    /// logged and dropped without being enqueued anywhere.
    pub fn receive_packet(&self, packet: &Packet) -> Result<(), RelayError> {
        let payload = packet.payload();
        if !(payload.is_object() || payload.is_array() || payload.is_string()) {
            let err = RelayError::MalformedPayload(packet.packet_id().to_string());
            warn!("{err}");
            return Err(err);
        }
        match self.handlers.get(packet.destination_zone()) {
            Some(handler) => {
                handler.handle(packet);
                Ok(())
            }
            None => {
                let err = RelayError::HandlerMissing(packet.destination_zone().to_string());
                warn!("{err}");
                Err(err)
            }
        }
    }

    /// Snapshot of a zone's backlog, oldest first.
    pub fn get_channel_packets(&self, zone: &str) -> Result<Vec<Packet>, RelayError> {
        self.channels
            .get(zone)
            .map(|backlog| backlog.clone())
            .ok_or_else(|| RelayError::ChannelMissing(zone.to_string()))
    }

    /// Empties a zone's backlog without closing the channel, typically after
    /// the zone has processed everything in it.
    pub fn clear_channel_packets(&self, zone: &str) -> Result<(), RelayError> {
        self.channels
            .get_mut(zone)
            .map(|mut backlog| backlog.clear())
            .ok_or_else(|| RelayError::ChannelMissing(zone.to_string()))
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }
}

impl Default for ZoneRelay {
    fn default() -> Self {
        Self::new(DEFAULT_RETRY_LIMIT, DEFAULT_BACKOFF)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Counts packets handed to it.
    struct Counting(AtomicU32);

    impl ZoneHandler for Counting {
        fn handle(&self, _packet: &Packet) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn fast_relay() -> ZoneRelay {
        ZoneRelay::new(DEFAULT_RETRY_LIMIT, Duration::from_millis(10))
    }

    #[test]
    fn create_channel_rejects_duplicate() {
        let relay = fast_relay();
        relay.create_channel("zone-b").unwrap();
        assert!(matches!(
            relay.create_channel("zone-b"),
            Err(RelayError::ChannelExists(_))
        ));
        assert!(relay.create_channel("zone-c").is_ok());
    }

    #[tokio::test]
    async fn send_queues_onto_existing_channel() {
        let relay = fast_relay();
        relay.create_channel("zone-b").unwrap();

        let packet = Packet::new("zone-a", "zone-b", json!({"transfer": 5}));
        assert!(relay.send_packet(packet.clone()).await);

        let backlog = relay.get_channel_packets("zone-b").unwrap();
        assert_eq!(backlog.len(), 1);
        assert_eq!(backlog[0].packet_id(), packet.packet_id());
    }

    #[tokio::test]
    async fn send_preserves_arrival_order() {
        let relay = fast_relay();
        relay.create_channel("zone-b").unwrap();

        let first = Packet::new("zone-a", "zone-b", json!(1));
        let second = Packet::new("zone-a", "zone-b", json!(2));
        relay.send_packet(first.clone()).await;
        relay.send_packet(second.clone()).await;

        let backlog = relay.get_channel_packets("zone-b").unwrap();
        let ids: Vec<&str> = backlog.iter().map(|p| p.packet_id()).collect();
        assert_eq!(ids, vec![first.packet_id(), second.packet_id()]);
    }

    #[tokio::test]
    async fn send_to_unregistered_zone_exhausts_retries() {
        let relay = fast_relay();
        relay.create_channel("zone-b").unwrap();

        let start = std::time::Instant::now();
        let delivered = relay
            .send_packet(Packet::new("zone-a", "zone-nowhere", json!(1)))
            .await;

        assert!(!delivered);
        // Two backoffs between three attempts.
        assert!(start.elapsed() >= Duration::from_millis(20));
        // No backlog anywhere picked up the dropped packet.
        assert!(relay.get_channel_packets("zone-b").unwrap().is_empty());
        assert!(matches!(
            relay.get_channel_packets("zone-nowhere"),
            Err(RelayError::ChannelMissing(_))
        ));
    }

    #[tokio::test]
    async fn send_succeeds_once_channel_appears() {
        let relay = Arc::new(fast_relay());
        let relay_for_creator = Arc::clone(&relay);
        let creator = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            relay_for_creator.create_channel("zone-late").unwrap();
        });

        let delivered = relay
            .send_packet(Packet::new("zone-a", "zone-late", json!(1)))
            .await;
        creator.await.unwrap();

        assert!(delivered);
        assert_eq!(relay.get_channel_packets("zone-late").unwrap().len(), 1);
    }

    #[test]
    fn receive_dispatches_to_handler() {
        let relay = fast_relay();
        let handler = Arc::new(Counting(AtomicU32::new(0)));
        relay.register_handler("zone-b", Arc::clone(&handler) as Arc<dyn ZoneHandler>);

        assert!(relay
            .receive_packet(&Packet::new("zone-a", "zone-b", json!({"k": 1})))
            .is_ok());
        assert_eq!(handler.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn receive_rejects_malformed_payloads() {
        let relay = fast_relay();
        let handler = Arc::new(Counting(AtomicU32::new(0)));
        relay.register_handler("zone-b", Arc::clone(&handler) as Arc<dyn ZoneHandler>);

        for payload in [json!(null), json!(42), json!(true)] {
            assert!(matches!(
                relay.receive_packet(&Packet::new("zone-a", "zone-b", payload)),
                Err(RelayError::MalformedPayload(_))
            ));
        }
        assert_eq!(handler.0.load(Ordering::SeqCst), 0);

        // Objects, arrays, and strings all pass the shape check.
        for payload in [json!({"k": 1}), json!([1, 2]), json!("ping")] {
            assert!(relay
                .receive_packet(&Packet::new("zone-a", "zone-b", payload))
                .is_ok());
        }
        assert_eq!(handler.0.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn receive_without_handler_drops_packet() {
        let relay = fast_relay();
        relay.create_channel("zone-b").unwrap();

        assert!(matches!(
            relay.receive_packet(&Packet::new("zone-a", "zone-b", json!("ping"))),
            Err(RelayError::HandlerMissing(_))
        ));
        assert!(relay.get_channel_packets("zone-b").unwrap().is_empty());
    }

    #[tokio::test]
    async fn clear_resets_backlog_but_keeps_channel() {
        let relay = fast_relay();
        relay.create_channel("zone-b").unwrap();
        relay.send_packet(Packet::new("zone-a", "zone-b", json!(1))).await;

        relay.clear_channel_packets("zone-b").unwrap();
        assert!(relay.get_channel_packets("zone-b").unwrap().is_empty());
        assert!(relay.send_packet(Packet::new("zone-a", "zone-b", json!(2))).await);
    }

    #[test]
    fn missing_channel_errors() {
        let relay = fast_relay();
        assert!(matches!(
            relay.get_channel_packets("zone-x"),
            Err(RelayError::ChannelMissing(_))
        ));
        assert!(matches!(
            relay.clear_channel_packets("zone-x"),
            Err(RelayError::ChannelMissing(_))
        ));
    }
}
