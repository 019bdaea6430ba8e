// crates/sync/src/events.rs
//! Outward-facing sync events and status

use crate::error::FailureReason;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Event emitted at the end of a sync cycle
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// Cycle finished; watermark advanced
    Completed {
        /// Outbound records confirmed plus inbound records applied
        changed_count: usize,
        /// Wall-clock cycle duration
        duration: Duration,
    },
    /// Cycle failed; watermark untouched, next trigger retries
    Failed {
        /// Failure classification
        reason: FailureReason,
        /// Human-readable detail
        message: String,
    },
    /// Cycle was cancelled before reaching a terminal state
    Cancelled,
}

/// Queryable sync status for the host application
#[derive(Debug, Clone, Default)]
pub struct SyncStatus {
    /// Whether a cycle is currently running
    pub in_progress: bool,
    /// When the last successful cycle completed
    pub last_sync: Option<DateTime<Utc>>,
    /// Last failure, if the most recent cycle did not succeed
    pub last_error: Option<(FailureReason, DateTime<Utc>)>,
}

impl SyncStatus {
    /// Returns true if the most recent cycle failed
    pub fn has_error(&self) -> bool {
        self.last_error.is_some()
    }

    /// Clears the error marker (set on a later successful cycle)
    pub fn clear_error(&mut self) {
        self.last_error = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_status_is_idle() {
        let status = SyncStatus::default();
        assert!(!status.in_progress);
        assert!(status.last_sync.is_none());
        assert!(!status.has_error());
    }

    #[test]
    fn test_error_set_and_cleared() {
        let mut status = SyncStatus {
            last_error: Some((FailureReason::Timeout, Utc::now())),
            ..Default::default()
        };
        assert!(status.has_error());
        status.clear_error();
        assert!(!status.has_error());
    }
}
