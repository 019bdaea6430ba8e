// crates/sync/src/error.rs
//! Error types for sync operations

use crate::session::SyncPhase;
use thiserror::Error;

/// Result type for sync operations
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during synchronization
#[derive(Debug, Error)]
pub enum SyncError {
    /// Local store cannot be read or written
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Transport-level failure
    #[error("Transport error: {0}")]
    Transport(#[from] tether_transport::TransportError),

    /// Every send attempt for a chunk failed
    #[error("Transport exhausted after {attempts} attempts")]
    TransportExhausted { attempts: usize },

    /// Malformed or inconsistent chunk framing from the peer
    #[error("Protocol error: {0}")]
    Protocol(#[from] tether_codec::CodecError),

    /// Inbound changeset could not be applied
    #[error("Merge failed: {0}")]
    Merge(String),

    /// No remote changeset arrived within the sync timeout
    #[error("Timed out waiting for remote changes")]
    RemoteTimeout,

    /// A cycle is already running
    #[error("Sync already in progress")]
    SyncInProgress,

    /// The cycle was cancelled
    #[error("Sync cycle cancelled")]
    Cancelled,

    /// Watermark could not be persisted
    #[error("Watermark persistence failed: {0}")]
    Watermark(String),

    /// A state transition the machine does not allow
    #[error("Illegal sync state transition: {from:?} -> {to:?}")]
    IllegalTransition { from: SyncPhase, to: SyncPhase },
}

impl From<tether_store::StoreError> for SyncError {
    fn from(err: tether_store::StoreError) -> Self {
        use tether_store::StoreError;
        match err {
            StoreError::Unavailable(message) => SyncError::StoreUnavailable(message),
            StoreError::Constraint { object, message } => {
                SyncError::Merge(format!("constraint violation on {object}: {message}"))
            }
            StoreError::WatermarkRead { .. }
            | StoreError::WatermarkWrite { .. }
            | StoreError::WatermarkCorrupted { .. } => SyncError::Watermark(err.to_string()),
        }
    }
}

/// Compact failure classification carried by status and events
///
/// Splits transient failures (retried automatically on the next trigger)
/// from terminal ones that need schema reconciliation or user attention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    /// Local store outage
    StoreUnavailable,
    /// Retries exhausted against the transport
    TransportExhausted,
    /// Peer refused the payload; schema reconciliation needed
    PeerRejected,
    /// Chunk framing was inconsistent
    Protocol,
    /// Remote side never answered in time
    Timeout,
    /// Inbound changes could not be applied
    Merge,
    /// Watermark could not be persisted
    Watermark,
    /// Anything else
    Other,
}

impl FailureReason {
    /// Returns true if the next sync trigger may simply retry
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            FailureReason::StoreUnavailable
                | FailureReason::TransportExhausted
                | FailureReason::Timeout
        )
    }
}

impl From<&SyncError> for FailureReason {
    fn from(err: &SyncError) -> Self {
        use tether_transport::TransportError;
        match err {
            SyncError::StoreUnavailable(_) => FailureReason::StoreUnavailable,
            SyncError::TransportExhausted { .. } => FailureReason::TransportExhausted,
            SyncError::Transport(TransportError::PeerRejected(_)) => FailureReason::PeerRejected,
            SyncError::Transport(TransportError::Timeout) => FailureReason::Timeout,
            SyncError::Transport(_) => FailureReason::TransportExhausted,
            SyncError::Protocol(_) => FailureReason::Protocol,
            SyncError::Merge(_) => FailureReason::Merge,
            SyncError::RemoteTimeout => FailureReason::Timeout,
            SyncError::Watermark(_) => FailureReason::Watermark,
            SyncError::SyncInProgress | SyncError::Cancelled | SyncError::IllegalTransition { .. } => {
                FailureReason::Other
            }
        }
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FailureReason::StoreUnavailable => "store unavailable",
            FailureReason::TransportExhausted => "transport exhausted",
            FailureReason::PeerRejected => "peer rejected",
            FailureReason::Protocol => "protocol error",
            FailureReason::Timeout => "timeout",
            FailureReason::Merge => "merge failure",
            FailureReason::Watermark => "watermark persistence",
            FailureReason::Other => "other",
        };
        write!(f, "{name}")
    }
}
