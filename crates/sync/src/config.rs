// crates/sync/src/config.rs
//! Sync engine configuration

use std::time::Duration;

/// Policy constants for the sync orchestrator
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Attempts per chunk before the cycle fails (including the first)
    pub max_retry_attempts: usize,
    /// Window for coalescing bursts of data-changed signals
    pub debounce_window: Duration,
    /// Upper bound on the whole wait for remote changes
    pub sync_timeout: Duration,
    /// Per-chunk send timeout; expiry counts as one failed attempt
    pub send_timeout: Duration,
    /// Cap on changeset size per cycle; overflow is reported, not dropped
    pub max_changes_per_cycle: usize,
    /// Per-message fragment size limit
    pub max_fragment_bytes: usize,
    /// Encoded size above which the bulk (file-transfer) lane is used
    pub bulk_transfer_threshold: usize,
    /// First retry backoff delay
    pub retry_initial_delay: Duration,
    /// Retry backoff ceiling
    pub retry_max_delay: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_retry_attempts: 3,
            debounce_window: Duration::from_secs(1),
            sync_timeout: Duration::from_secs(30),
            send_timeout: Duration::from_secs(5),
            max_changes_per_cycle: 500,
            max_fragment_bytes: 16 * 1024,
            bulk_transfer_threshold: 256 * 1024,
            retry_initial_delay: Duration::from_millis(100),
            retry_max_delay: Duration::from_secs(30),
        }
    }
}

impl SyncConfig {
    /// Sets the per-chunk attempt budget
    pub fn with_max_retry_attempts(mut self, attempts: usize) -> Self {
        self.max_retry_attempts = attempts;
        self
    }

    /// Sets the debounce window
    pub fn with_debounce_window(mut self, window: Duration) -> Self {
        self.debounce_window = window;
        self
    }

    /// Sets the remote-wait timeout
    pub fn with_sync_timeout(mut self, timeout: Duration) -> Self {
        self.sync_timeout = timeout;
        self
    }

    /// Sets the per-chunk send timeout
    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    /// Sets the changeset size cap
    pub fn with_max_changes_per_cycle(mut self, max: usize) -> Self {
        self.max_changes_per_cycle = max;
        self
    }

    /// Sets the fragment size limit
    pub fn with_max_fragment_bytes(mut self, bytes: usize) -> Self {
        self.max_fragment_bytes = bytes;
        self
    }

    /// Sets the bulk lane threshold
    pub fn with_bulk_transfer_threshold(mut self, bytes: usize) -> Self {
        self.bulk_transfer_threshold = bytes;
        self
    }

    /// Sets the initial retry backoff delay
    pub fn with_retry_initial_delay(mut self, delay: Duration) -> Self {
        self.retry_initial_delay = delay;
        self
    }
}
