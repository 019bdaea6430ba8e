// crates/sync/src/session.rs
//! Per-cycle session state machine

use crate::error::{SyncError, SyncResult};
use chrono::{DateTime, Utc};
use tether_codec::{ChunkBuffer, SyncPayload};

/// States of one sync cycle
///
/// Success path: `Idle → Preparing → Transmitting → AwaitingRemote →
/// Applying → Idle`. `Cancelled` and `Failed` absorb from any non-terminal
/// state. An empty outbound changeset short-circuits `Preparing →
/// AwaitingRemote` (inbound still gets checked).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// No cycle running
    Idle,
    /// Gathering and encoding the local changeset
    Preparing,
    /// Sending chunks to the peer
    Transmitting,
    /// Waiting for the peer's changeset
    AwaitingRemote,
    /// Applying the remote changeset locally
    Applying,
    /// Cycle cancelled; terminal
    Cancelled,
    /// Cycle failed; terminal
    Failed,
}

impl SyncPhase {
    /// Returns true if the machine allows moving to `next`
    pub fn can_transition_to(self, next: SyncPhase) -> bool {
        use SyncPhase::*;
        match (self, next) {
            // Absorbing states are reachable from any non-terminal state
            (Idle | Preparing | Transmitting | AwaitingRemote | Applying, Cancelled) => true,
            (Preparing | Transmitting | AwaitingRemote | Applying, Failed) => true,
            (Idle, Preparing) => true,
            (Preparing, Transmitting) => true,
            // Empty-changeset short circuit
            (Preparing, AwaitingRemote) => true,
            (Transmitting, AwaitingRemote) => true,
            (AwaitingRemote, Applying) => true,
            (Applying, Idle) => true,
            _ => false,
        }
    }

    /// Returns true for the two absorbing states plus `Idle`
    pub fn is_terminal(self) -> bool {
        matches!(self, SyncPhase::Idle | SyncPhase::Cancelled | SyncPhase::Failed)
    }
}

/// Ephemeral state owned by one sync cycle
///
/// Created when a cycle starts, destroyed at its terminal state. Holds the
/// in-flight encoded changeset (so retries resend identical chunks) and the
/// partial inbound chunk buffer.
pub struct SyncSession {
    started_at: DateTime<Utc>,
    phase: SyncPhase,
    retry_count: usize,
    outbound: Vec<SyncPayload>,
    inbound: ChunkBuffer,
}

impl SyncSession {
    /// Opens a session; `started_at` becomes the watermark candidate
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            phase: SyncPhase::Idle,
            retry_count: 0,
            outbound: Vec::new(),
            inbound: ChunkBuffer::new(),
        }
    }

    /// Cycle start instant
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Current phase
    pub fn phase(&self) -> SyncPhase {
        self.phase
    }

    /// Total failed send attempts across the cycle
    pub fn retry_count(&self) -> usize {
        self.retry_count
    }

    /// Counts failed send attempts
    pub fn record_failed_attempts(&mut self, count: usize) {
        self.retry_count += count;
    }

    /// Moves to `next`, rejecting transitions the machine does not allow
    pub fn transition(&mut self, next: SyncPhase) -> SyncResult<()> {
        if !self.phase.can_transition_to(next) {
            return Err(SyncError::IllegalTransition {
                from: self.phase,
                to: next,
            });
        }
        log::debug!("Sync phase {:?} -> {next:?}", self.phase);
        self.phase = next;
        Ok(())
    }

    /// Stores the encoded outbound transmission for this cycle
    pub fn set_outbound(&mut self, payloads: Vec<SyncPayload>) {
        self.outbound = payloads;
    }

    /// Encoded outbound chunks
    pub fn outbound(&self) -> &[SyncPayload] {
        &self.outbound
    }

    /// Inbound reassembly buffer
    pub fn inbound_mut(&mut self) -> &mut ChunkBuffer {
        &mut self.inbound
    }

    /// Discards in-flight chunk buffers (cancellation / teardown)
    pub fn discard_buffers(&mut self) {
        self.outbound.clear();
        self.inbound.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_path_transitions() {
        let mut session = SyncSession::new(Utc::now());
        for phase in [
            SyncPhase::Preparing,
            SyncPhase::Transmitting,
            SyncPhase::AwaitingRemote,
            SyncPhase::Applying,
            SyncPhase::Idle,
        ] {
            session.transition(phase).unwrap();
        }
        assert_eq!(session.phase(), SyncPhase::Idle);
    }

    #[test]
    fn test_empty_changeset_short_circuit() {
        let mut session = SyncSession::new(Utc::now());
        session.transition(SyncPhase::Preparing).unwrap();
        session.transition(SyncPhase::AwaitingRemote).unwrap();
    }

    #[test]
    fn test_cancel_from_any_active_phase() {
        for phase in [
            SyncPhase::Preparing,
            SyncPhase::Transmitting,
            SyncPhase::AwaitingRemote,
            SyncPhase::Applying,
        ] {
            assert!(phase.can_transition_to(SyncPhase::Cancelled));
        }
    }

    #[test]
    fn test_illegal_transition_rejected() {
        let mut session = SyncSession::new(Utc::now());
        let result = session.transition(SyncPhase::Applying);
        assert!(matches!(
            result,
            Err(SyncError::IllegalTransition {
                from: SyncPhase::Idle,
                to: SyncPhase::Applying,
            })
        ));
    }

    #[test]
    fn test_terminal_states_absorb() {
        assert!(!SyncPhase::Failed.can_transition_to(SyncPhase::Preparing));
        assert!(!SyncPhase::Cancelled.can_transition_to(SyncPhase::Preparing));
        assert!(SyncPhase::Failed.is_terminal());
        assert!(SyncPhase::Cancelled.is_terminal());
    }

    #[test]
    fn test_retry_counter() {
        let mut session = SyncSession::new(Utc::now());
        session.record_failed_attempts(2);
        assert_eq!(session.retry_count(), 2);
    }

    #[test]
    fn test_discard_buffers() {
        let mut session = SyncSession::new(Utc::now());
        session.set_outbound(Vec::new());
        session.discard_buffers();
        assert!(session.outbound().is_empty());
    }
}
