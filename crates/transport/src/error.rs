// crates/transport/src/error.rs
//! Error types for transport operations

use thiserror::Error;

/// Result type for transport operations
pub type TransportResult<T> = Result<T, TransportError>;

/// Errors that can occur on the companion channel
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Companion device is not reachable right now
    #[error("Peer unreachable")]
    Unreachable,

    /// Send or receive did not complete in time
    #[error("Transport operation timed out")]
    Timeout,

    /// Peer refused the payload (e.g. schema version mismatch)
    #[error("Peer rejected payload: {0}")]
    PeerRejected(String),

    /// Channel to the peer is gone for good
    #[error("Transport channel closed")]
    ChannelClosed,
}

impl TransportError {
    /// Returns true if retrying with backoff can help
    ///
    /// `PeerRejected` needs schema reconciliation and a closed channel
    /// needs re-establishment; neither is worth burning retry attempts on.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TransportError::Unreachable | TransportError::Timeout)
    }
}
