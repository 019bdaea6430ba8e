// crates/sync/src/orchestrator.rs
//! Drives sync cycles end to end
//!
//! One cycle: gather local changes, encode, transmit with retry, await the
//! peer's changeset, apply it, advance the watermark. At most one cycle
//! runs at a time, cancellation is checked at every state boundary, and
//! the watermark only moves on full confirmed success.

use crate::config::SyncConfig;
use crate::error::{FailureReason, SyncError, SyncResult};
use crate::events::{SyncEvent, SyncStatus};
use crate::merge::{MergeEngine, MergeReport};
use crate::registry::SchemaRegistry;
use crate::session::{SyncPhase, SyncSession};
use crate::tracker::ChangeTracker;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tether_codec::{encode, SyncPayload};
use tether_core::{Changeset, DeviceId, EntityKind, Watermark};
use tether_resilience::{deadline, retry_async, RetryError, RetryPolicy};
use tether_store::{DeviceStore, WatermarkFile};
use tether_transport::{Transport, TransportError};
use tokio::sync::{broadcast, mpsc, Mutex as AsyncMutex};

/// Outcome of one successful sync cycle
#[derive(Debug, Clone)]
pub struct SyncReport {
    /// Outbound records confirmed plus inbound records applied
    pub changed_count: usize,
    /// Wall-clock duration of the cycle
    pub duration: std::time::Duration,
    /// Records sent to the peer
    pub outbound_records: usize,
    /// How the inbound changeset was absorbed
    pub merge: MergeReport,
    /// True if the outbound batch hit the per-cycle cap
    pub truncated: bool,
}

enum Trigger {
    DataChanged(EntityKind),
    Manual,
}

/// Coordinates sync cycles between the local store and the companion peer
pub struct SyncOrchestrator {
    config: SyncConfig,
    device_id: DeviceId,
    transport: Arc<dyn Transport>,
    tracker: ChangeTracker,
    merge: MergeEngine,
    watermark_file: WatermarkFile,
    watermark: Mutex<Watermark>,
    status: Mutex<SyncStatus>,
    cancel: AtomicBool,
    events: broadcast::Sender<SyncEvent>,
    triggers: mpsc::UnboundedSender<Trigger>,
    trigger_rx: AsyncMutex<mpsc::UnboundedReceiver<Trigger>>,
}

impl SyncOrchestrator {
    /// Creates an orchestrator with the default entity kind registry
    pub fn new(
        config: SyncConfig,
        device_id: DeviceId,
        store: Arc<dyn DeviceStore>,
        transport: Arc<dyn Transport>,
        watermark_file: WatermarkFile,
    ) -> SyncResult<Self> {
        Self::with_registry(
            config,
            device_id,
            store,
            transport,
            watermark_file,
            SchemaRegistry::with_defaults(),
        )
    }

    /// Creates an orchestrator with an explicit registry
    ///
    /// The registry is shared between the change tracker and the merge
    /// engine, so registering a kind enables it in both directions at once.
    pub fn with_registry(
        config: SyncConfig,
        device_id: DeviceId,
        store: Arc<dyn DeviceStore>,
        transport: Arc<dyn Transport>,
        watermark_file: WatermarkFile,
        registry: SchemaRegistry,
    ) -> SyncResult<Self> {
        let watermark = watermark_file.load()?;
        let registry = Arc::new(registry);
        let tracker = ChangeTracker::new(
            Arc::clone(&store),
            Arc::clone(&registry),
            config.max_changes_per_cycle,
        );
        let merge = MergeEngine::new(store, registry);
        let (events, _) = broadcast::channel(32);
        let (triggers, trigger_rx) = mpsc::unbounded_channel();

        Ok(Self {
            config,
            device_id,
            transport,
            tracker,
            merge,
            watermark_file,
            watermark: Mutex::new(watermark),
            status: Mutex::new(SyncStatus::default()),
            cancel: AtomicBool::new(false),
            events,
            triggers,
            trigger_rx: AsyncMutex::new(trigger_rx),
        })
    }

    /// Device this orchestrator runs on
    pub fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    /// Current watermark value
    pub fn watermark(&self) -> Watermark {
        *self
            .watermark
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Current user-visible status
    pub fn status(&self) -> SyncStatus {
        self.status
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Subscribes to cycle completion/failure events
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    /// Signals that domain data of `kind` changed (debounced trigger)
    pub fn data_changed(&self, kind: EntityKind) {
        let _ = self.triggers.send(Trigger::DataChanged(kind));
    }

    /// Requests an immediate sync (manual retry); skips the debounce window
    pub fn request_sync(&self) {
        let _ = self.triggers.send(Trigger::Manual);
    }

    /// Cancels the in-flight cycle at its next state boundary
    ///
    /// In-flight transport operations are not forcibly aborted; their
    /// results are discarded. No partial watermark advancement happens.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    /// Background trigger loop: debounce, coalesce, wait for reachability,
    /// run cycles
    ///
    /// Returns when all trigger senders are gone. Intended to be spawned
    /// once at application start; never blocks the interactive path.
    pub async fn run(&self) {
        loop {
            let trigger = {
                let mut rx = self.trigger_rx.lock().await;
                rx.recv().await
            };
            let Some(trigger) = trigger else {
                return;
            };

            if let Trigger::DataChanged(kind) = &trigger {
                log::debug!("Data changed for {kind}, debouncing");
                tokio::time::sleep(self.config.debounce_window).await;
            }
            // Coalesce the burst that accumulated during the window
            {
                let mut rx = self.trigger_rx.lock().await;
                while rx.try_recv().is_ok() {}
            }

            self.wait_reachable().await;

            match self.sync_once().await {
                Ok(report) => {
                    if report.truncated {
                        // More changes are pending beyond the cap
                        let _ = self.triggers.send(Trigger::Manual);
                    }
                }
                Err(SyncError::SyncInProgress) => {}
                Err(err) => log::warn!("Sync cycle failed: {err}"),
            }
        }
    }

    /// Runs exactly one sync cycle
    pub async fn sync_once(&self) -> SyncResult<SyncReport> {
        self.begin()?;
        let clock = Instant::now();
        let mut session = SyncSession::new(Utc::now());

        let result = self.run_cycle(&mut session, clock).await;
        match result {
            Ok(report) => {
                self.finish_success(&report);
                Ok(report)
            }
            Err(SyncError::Cancelled) => {
                session.discard_buffers();
                let _ = session.transition(SyncPhase::Cancelled);
                self.finish_cancelled();
                Err(SyncError::Cancelled)
            }
            Err(err) => {
                session.discard_buffers();
                let _ = session.transition(SyncPhase::Failed);
                self.finish_failure(&err);
                Err(err)
            }
        }
    }

    async fn run_cycle(
        &self,
        session: &mut SyncSession,
        clock: Instant,
    ) -> SyncResult<SyncReport> {
        self.check_cancel()?;
        session.transition(SyncPhase::Preparing)?;

        // Snapshot once; later local edits belong to the next cycle
        let watermark = self.watermark();
        let batch = self.tracker.changes_since(&watermark).await?;
        let outbound_records = batch.changeset.len();
        let payloads = encode(&batch.changeset, self.config.max_fragment_bytes)?;
        session.set_outbound(payloads);

        self.check_cancel()?;
        if outbound_records == 0 {
            // Nothing local; the single empty chunk still goes out so the
            // peer answers with its side of the cycle
            session.transition(SyncPhase::AwaitingRemote)?;
            self.transmit(session).await?;
        } else {
            session.transition(SyncPhase::Transmitting)?;
            self.transmit(session).await?;
            session.transition(SyncPhase::AwaitingRemote)?;
        }

        self.check_cancel()?;
        let remote = self.await_remote(session).await?;

        self.check_cancel()?;
        session.transition(SyncPhase::Applying)?;
        let merge = self.merge.apply(&remote).await?;

        // Terminal state of a successful cycle: advance and persist the
        // watermark. A truncated batch only advances to its last confirmed
        // record so the remainder is re-fetched next cycle.
        let advance_to = if batch.truncated {
            batch
                .changeset
                .records()
                .last()
                .map(|r| r.recorded_at)
                .unwrap_or_else(|| session.started_at())
        } else {
            session.started_at()
        };
        {
            let mut mark = self
                .watermark
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            mark.advance_to(advance_to);
            self.watermark_file.save(&mark)?;
        }

        session.transition(SyncPhase::Idle)?;
        log::info!(
            "Sync cycle complete: {} outbound, {} applied, {} retries",
            outbound_records,
            merge.applied,
            session.retry_count()
        );

        Ok(SyncReport {
            changed_count: outbound_records + merge.applied,
            duration: clock.elapsed(),
            outbound_records,
            merge,
            truncated: batch.truncated,
        })
    }

    async fn transmit(&self, session: &mut SyncSession) -> SyncResult<()> {
        let payloads = session.outbound().to_vec();
        let encoded_bytes: usize = payloads.iter().map(|p| p.fragment_len()).sum();

        if encoded_bytes > self.config.bulk_transfer_threshold {
            log::info!("Encoded changeset is {encoded_bytes} bytes, using bulk transfer lane");
            let failed = self
                .with_send_retry(|| self.transport.transfer_bulk(payloads.clone()))
                .await?;
            session.record_failed_attempts(failed);
        } else {
            for payload in payloads {
                self.check_cancel()?;
                let failed = self
                    .with_send_retry(|| self.transport.send(payload.clone()))
                    .await?;
                session.record_failed_attempts(failed);
            }
        }
        Ok(())
    }

    /// Runs one send operation under timeout, backoff and the attempt
    /// budget; returns the number of failed attempts on success
    async fn with_send_retry<F, Fut>(&self, mut operation: F) -> SyncResult<usize>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<tether_transport::Ack, TransportError>>,
    {
        let policy = RetryPolicy::new(self.config.max_retry_attempts)
            .with_initial_delay(self.config.retry_initial_delay)
            .with_max_delay(self.config.retry_max_delay);
        let send_timeout = self.config.send_timeout;
        let invocations = AtomicUsize::new(0);

        let result = retry_async(&policy, TransportError::is_retryable, || {
            invocations.fetch_add(1, Ordering::Relaxed);
            let bounded = deadline(send_timeout, operation());
            async move {
                match bounded.await {
                    Ok(send_result) => send_result,
                    Err(_) => Err(TransportError::Timeout),
                }
            }
        })
        .await;

        let failed = invocations.load(Ordering::Relaxed).saturating_sub(1);
        match result {
            Ok(_ack) => Ok(failed),
            Err(RetryError::Exhausted { attempts, last }) => {
                log::warn!("Chunk send exhausted after {attempts} attempts: {last}");
                Err(SyncError::TransportExhausted { attempts })
            }
            Err(RetryError::Aborted { error, .. }) => Err(SyncError::Transport(error)),
        }
    }

    async fn await_remote(&self, session: &mut SyncSession) -> SyncResult<Changeset> {
        let wait = async {
            loop {
                let payload: SyncPayload = self.transport.recv().await?;
                if let Some(changeset) = session.inbound_mut().accept(payload)? {
                    return Ok::<_, SyncError>(changeset);
                }
            }
        };

        match deadline(self.config.sync_timeout, wait).await {
            Ok(inner) => inner,
            Err(_) => Err(SyncError::RemoteTimeout),
        }
    }

    fn begin(&self) -> SyncResult<()> {
        let mut status = self
            .status
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if status.in_progress {
            return Err(SyncError::SyncInProgress);
        }
        status.in_progress = true;
        self.cancel.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn check_cancel(&self) -> SyncResult<()> {
        if self.cancel.load(Ordering::SeqCst) {
            Err(SyncError::Cancelled)
        } else {
            Ok(())
        }
    }

    fn finish_success(&self, report: &SyncReport) {
        {
            let mut status = self
                .status
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            status.in_progress = false;
            status.last_sync = Some(Utc::now());
            status.clear_error();
        }
        let _ = self.events.send(SyncEvent::Completed {
            changed_count: report.changed_count,
            duration: report.duration,
        });
    }

    fn finish_failure(&self, err: &SyncError) {
        let reason = FailureReason::from(err);
        {
            let mut status = self
                .status
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            status.in_progress = false;
            status.last_error = Some((reason, Utc::now()));
        }
        log::warn!("Sync failed ({reason}): {err}");
        let _ = self.events.send(SyncEvent::Failed {
            reason,
            message: err.to_string(),
        });
    }

    fn finish_cancelled(&self) {
        {
            let mut status = self
                .status
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            status.in_progress = false;
        }
        log::info!("Sync cycle cancelled");
        let _ = self.events.send(SyncEvent::Cancelled);
    }

    async fn wait_reachable(&self) {
        let mut watch = self.transport.reachability();
        loop {
            if *watch.borrow() {
                return;
            }
            if watch.changed().await.is_err() {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_store::MemoryStore;
    use tether_transport::ChannelTransport;

    fn test_config() -> SyncConfig {
        SyncConfig::default()
            .with_sync_timeout(std::time::Duration::from_secs(2))
            .with_send_timeout(std::time::Duration::from_millis(500))
            .with_retry_initial_delay(std::time::Duration::from_millis(1))
            .with_debounce_window(std::time::Duration::from_millis(10))
    }

    fn orchestrator_over(
        transport: ChannelTransport,
        store: MemoryStore,
    ) -> (SyncOrchestrator, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = SyncOrchestrator::new(
            test_config(),
            DeviceId::from_string("primary".to_string()),
            Arc::new(store),
            Arc::new(transport),
            WatermarkFile::new(dir.path().join("watermark.json")),
        )
        .unwrap();
        (orchestrator, dir)
    }

    /// Minimal companion: acks implicitly, answers every complete inbound
    /// transmission with an empty changeset
    fn spawn_empty_responder(peer: ChannelTransport) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut buffer = tether_codec::ChunkBuffer::new();
            loop {
                let Ok(payload) = peer.recv().await else {
                    return;
                };
                if let Ok(Some(_)) = buffer.accept(payload) {
                    let reply = encode(&Changeset::new(), 16 * 1024).unwrap();
                    for chunk in reply {
                        if peer.send(chunk).await.is_err() {
                            return;
                        }
                    }
                }
            }
        })
    }

    #[tokio::test]
    async fn test_empty_cycle_completes() {
        let (local, peer) = ChannelTransport::pair();
        let responder = spawn_empty_responder(peer);
        let (orchestrator, _dir) = orchestrator_over(local, MemoryStore::new());

        let report = orchestrator.sync_once().await.unwrap();
        assert_eq!(report.changed_count, 0);
        assert!(!report.truncated);

        let status = orchestrator.status();
        assert!(!status.in_progress);
        assert!(status.last_sync.is_some());
        responder.abort();
    }

    #[tokio::test]
    async fn test_second_cycle_rejected_while_first_runs() {
        let (local, _peer) = ChannelTransport::pair();
        let (orchestrator, _dir) = orchestrator_over(local, MemoryStore::new());
        let orchestrator = Arc::new(orchestrator);

        // First cycle parks in AwaitingRemote (peer never answers)
        let first = {
            let orchestrator = Arc::clone(&orchestrator);
            tokio::spawn(async move { orchestrator.sync_once().await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;

        let second = orchestrator.sync_once().await;
        assert!(matches!(second, Err(SyncError::SyncInProgress)));

        orchestrator.cancel();
        let _ = first.await;
    }

    #[tokio::test]
    async fn test_watermark_advances_on_success() {
        let (local, peer) = ChannelTransport::pair();
        let responder = spawn_empty_responder(peer);
        let (orchestrator, _dir) = orchestrator_over(local, MemoryStore::new());

        let before = orchestrator.watermark();
        orchestrator.sync_once().await.unwrap();
        assert!(orchestrator.watermark() > before);
        responder.abort();
    }

    #[tokio::test]
    async fn test_remote_timeout_fails_cycle() {
        let (local, _peer) = ChannelTransport::pair();
        let config = test_config().with_sync_timeout(std::time::Duration::from_millis(100));
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = SyncOrchestrator::new(
            config,
            DeviceId::from_string("primary".to_string()),
            Arc::new(MemoryStore::new()),
            Arc::new(local),
            WatermarkFile::new(dir.path().join("watermark.json")),
        )
        .unwrap();

        let before = orchestrator.watermark();
        let result = orchestrator.sync_once().await;
        assert!(matches!(result, Err(SyncError::RemoteTimeout)));
        assert_eq!(orchestrator.watermark(), before);
        assert!(orchestrator.status().has_error());
    }

    #[tokio::test]
    async fn test_peer_rejection_is_terminal() {
        let (local, _peer) = ChannelTransport::pair();
        local.script_failure(TransportError::PeerRejected("schema v9".to_string()));
        let (orchestrator, _dir) = orchestrator_over(local, MemoryStore::new());

        let result = orchestrator.sync_once().await;
        assert!(matches!(
            result,
            Err(SyncError::Transport(TransportError::PeerRejected(_)))
        ));
        assert_eq!(
            orchestrator.status().last_error.map(|(reason, _)| reason),
            Some(FailureReason::PeerRejected)
        );
    }

    #[tokio::test]
    async fn test_failure_event_emitted() {
        let (local, _peer) = ChannelTransport::pair();
        let config = test_config().with_sync_timeout(std::time::Duration::from_millis(50));
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = SyncOrchestrator::new(
            config,
            DeviceId::from_string("primary".to_string()),
            Arc::new(MemoryStore::new()),
            Arc::new(local),
            WatermarkFile::new(dir.path().join("watermark.json")),
        )
        .unwrap();

        let mut events = orchestrator.subscribe();
        let _ = orchestrator.sync_once().await;

        match events.recv().await.unwrap() {
            SyncEvent::Failed { reason, .. } => assert_eq!(reason, FailureReason::Timeout),
            other => panic!("Expected Failed event, got {other:?}"),
        }
    }
}
