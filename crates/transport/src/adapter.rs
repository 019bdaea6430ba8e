// crates/transport/src/adapter.rs
//! The `Transport` trait

use crate::error::TransportResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tether_codec::SyncPayload;
use tokio::sync::watch;
use uuid::Uuid;

/// Delivery acknowledgment for one payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ack {
    /// Transmission the acknowledged chunk belongs to
    pub transmission_id: Uuid,
    /// Acknowledged chunk index
    pub chunk_index: u32,
    /// When the delivery was confirmed
    pub acked_at: DateTime<Utc>,
}

impl Ack {
    /// Builds an acknowledgment for a payload delivered now
    pub fn for_payload(payload: &SyncPayload) -> Self {
        Self {
            transmission_id: payload.transmission_id,
            chunk_index: payload.chunk_index,
            acked_at: Utc::now(),
        }
    }
}

/// Bidirectional channel to the companion device
///
/// Send semantics are at-least-once: the same payload may reach the peer
/// more than once, and downstream apply must be idempotent. Ordering is
/// only meaningful within one transmission id; payloads of different
/// transmissions may interleave arbitrarily.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Point-in-time reachability of the peer
    ///
    /// May flip at any moment; subscribe to [`Transport::reachability`] for
    /// transitions.
    fn is_reachable(&self) -> bool;

    /// Watch channel signalling reachability transitions
    fn reachability(&self) -> watch::Receiver<bool>;

    /// Sends one payload, resolving once the peer acknowledged delivery
    async fn send(&self, payload: SyncPayload) -> TransportResult<Ack>;

    /// Sends a whole transmission over the bulk (file-transfer) lane
    ///
    /// Used when the encoded changeset exceeds the message-size threshold;
    /// framing is identical to per-payload sends. Resolves with the ack of
    /// the final chunk.
    async fn transfer_bulk(&self, payloads: Vec<SyncPayload>) -> TransportResult<Ack>;

    /// Waits for the next payload from the peer
    async fn recv(&self) -> TransportResult<SyncPayload>;
}
