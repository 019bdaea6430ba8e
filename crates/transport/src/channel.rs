// crates/transport/src/channel.rs
//! In-process channel transport
//!
//! Two linked endpoints over tokio channels, used by tests and demos.
//! Reachability is shared link state either side can flip, and a failure
//! script lets tests make the next sends fail deterministically.

use crate::adapter::{Ack, Transport};
use crate::error::{TransportError, TransportResult};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tether_codec::SyncPayload;
use tokio::sync::{mpsc, watch};
use tokio::sync::Mutex as AsyncMutex;

/// One endpoint of an in-process transport pair
pub struct ChannelTransport {
    outbound: mpsc::UnboundedSender<SyncPayload>,
    inbound: AsyncMutex<mpsc::UnboundedReceiver<SyncPayload>>,
    reachable_tx: Arc<watch::Sender<bool>>,
    reachable_rx: watch::Receiver<bool>,
    failure_script: Mutex<VecDeque<TransportError>>,
}

impl ChannelTransport {
    /// Creates two linked endpoints, initially reachable
    pub fn pair() -> (Self, Self) {
        let (a_to_b_tx, a_to_b_rx) = mpsc::unbounded_channel();
        let (b_to_a_tx, b_to_a_rx) = mpsc::unbounded_channel();
        let (reachable_tx, reachable_rx) = watch::channel(true);
        let reachable_tx = Arc::new(reachable_tx);

        let a = Self {
            outbound: a_to_b_tx,
            inbound: AsyncMutex::new(b_to_a_rx),
            reachable_tx: Arc::clone(&reachable_tx),
            reachable_rx: reachable_rx.clone(),
            failure_script: Mutex::new(VecDeque::new()),
        };
        let b = Self {
            outbound: b_to_a_tx,
            inbound: AsyncMutex::new(a_to_b_rx),
            reachable_tx,
            reachable_rx,
            failure_script: Mutex::new(VecDeque::new()),
        };
        (a, b)
    }

    /// Flips the shared link reachability
    pub fn set_reachable(&self, reachable: bool) {
        // send_replace never fails even with no active receivers
        self.reachable_tx.send_replace(reachable);
    }

    /// Queues an error the next send/transfer on this endpoint will return
    ///
    /// Scripted failures fire once each, in order, before any delivery.
    pub fn script_failure(&self, error: TransportError) {
        if let Ok(mut script) = self.failure_script.lock() {
            script.push_back(error);
        }
    }

    fn take_scripted_failure(&self) -> Option<TransportError> {
        self.failure_script
            .lock()
            .ok()
            .and_then(|mut script| script.pop_front())
    }

    fn deliver(&self, payload: SyncPayload) -> TransportResult<Ack> {
        let ack = Ack::for_payload(&payload);
        self.outbound
            .send(payload)
            .map_err(|_| TransportError::ChannelClosed)?;
        Ok(ack)
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    fn is_reachable(&self) -> bool {
        *self.reachable_rx.borrow()
    }

    fn reachability(&self) -> watch::Receiver<bool> {
        self.reachable_rx.clone()
    }

    async fn send(&self, payload: SyncPayload) -> TransportResult<Ack> {
        if let Some(error) = self.take_scripted_failure() {
            log::debug!("Scripted send failure: {error}");
            return Err(error);
        }
        if !self.is_reachable() {
            return Err(TransportError::Unreachable);
        }
        self.deliver(payload)
    }

    async fn transfer_bulk(&self, payloads: Vec<SyncPayload>) -> TransportResult<Ack> {
        if let Some(error) = self.take_scripted_failure() {
            log::debug!("Scripted bulk transfer failure: {error}");
            return Err(error);
        }
        if !self.is_reachable() {
            return Err(TransportError::Unreachable);
        }

        let mut last_ack = None;
        for payload in payloads {
            last_ack = Some(self.deliver(payload)?);
        }
        last_ack.ok_or(TransportError::ChannelClosed)
    }

    async fn recv(&self) -> TransportResult<SyncPayload> {
        let mut inbound = self.inbound.lock().await;
        inbound.recv().await.ok_or(TransportError::ChannelClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use chrono::Utc;
    use uuid::Uuid;

    fn payload(index: u32, count: u32) -> SyncPayload {
        SyncPayload {
            schema_version: 1,
            transmission_id: Uuid::new_v4(),
            chunk_index: index,
            chunk_count: count,
            fragment: Bytes::from_static(b"fragment"),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_send_reaches_peer() {
        let (primary, companion) = ChannelTransport::pair();
        let sent = payload(0, 1);

        let ack = primary.send(sent.clone()).await.unwrap();
        assert_eq!(ack.transmission_id, sent.transmission_id);

        let received = companion.recv().await.unwrap();
        assert_eq!(received, sent);
    }

    #[tokio::test]
    async fn test_unreachable_link_fails_send() {
        let (primary, companion) = ChannelTransport::pair();
        primary.set_reachable(false);

        assert_eq!(
            primary.send(payload(0, 1)).await,
            Err(TransportError::Unreachable)
        );
        // Link state is shared
        assert!(!companion.is_reachable());
    }

    #[tokio::test]
    async fn test_reachability_watch_signals_transition() {
        let (primary, _companion) = ChannelTransport::pair();
        let mut watch = primary.reachability();

        primary.set_reachable(false);
        watch.changed().await.unwrap();
        assert!(!*watch.borrow());
    }

    #[tokio::test]
    async fn test_scripted_failures_fire_in_order() {
        let (primary, companion) = ChannelTransport::pair();
        primary.script_failure(TransportError::Timeout);
        primary.script_failure(TransportError::Unreachable);

        assert_eq!(
            primary.send(payload(0, 1)).await,
            Err(TransportError::Timeout)
        );
        assert_eq!(
            primary.send(payload(0, 1)).await,
            Err(TransportError::Unreachable)
        );
        assert!(primary.send(payload(0, 1)).await.is_ok());
        assert!(companion.recv().await.is_ok());
    }

    #[tokio::test]
    async fn test_bulk_transfer_delivers_all_chunks() {
        let (primary, companion) = ChannelTransport::pair();
        let chunks = vec![payload(0, 3), payload(1, 3), payload(2, 3)];

        let ack = primary.transfer_bulk(chunks).await.unwrap();
        assert_eq!(ack.chunk_index, 2);

        for _ in 0..3 {
            companion.recv().await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_duplicate_delivery_possible() {
        // At-least-once semantics: nothing stops the same chunk arriving twice
        let (primary, companion) = ChannelTransport::pair();
        let chunk = payload(0, 1);

        primary.send(chunk.clone()).await.unwrap();
        primary.send(chunk.clone()).await.unwrap();

        assert_eq!(companion.recv().await.unwrap(), chunk);
        assert_eq!(companion.recv().await.unwrap(), chunk);
    }
}
