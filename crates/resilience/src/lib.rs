// crates/resilience/src/lib.rs
//! Resilience patterns for fault-tolerant sync operations
//!
//! This crate provides the retry and timeout building blocks the sync
//! orchestrator leans on:
//! - Retry with exponential backoff and optional jitter
//! - Async timeout handling
//!
//! # Example
//!
//! ```rust
//! use tether_resilience::RetryPolicy;
//! use std::time::Duration;
//!
//! let policy = RetryPolicy::new(3)
//!     .with_initial_delay(Duration::from_millis(100))
//!     .with_max_delay(Duration::from_secs(30));
//! assert_eq!(policy.max_attempts(), 3);
//! ```

mod error;
mod retry;
mod timeout;

pub use error::{ResilienceError, ResilienceResult};
pub use retry::{retry_async, RetryError, RetryPolicy};
pub use timeout::deadline;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_exports_accessible() {
        let _: RetryPolicy = RetryPolicy::default();
    }
}
