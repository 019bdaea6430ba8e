// crates/core/src/watermark.rs
//! The sync watermark

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Boundary between already-synchronized and pending changes
///
/// The single source of truth for "what has already been synchronized".
/// It only ever moves forward: `advance_to` silently ignores regressions,
/// so a failed or cancelled cycle can never roll it back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Watermark(DateTime<Utc>);

impl Watermark {
    /// Watermark of a device that has never synced
    pub fn origin() -> Self {
        Self(Utc.timestamp_opt(0, 0).single().unwrap_or_default())
    }

    /// Wraps an instant
    pub fn at(instant: DateTime<Utc>) -> Self {
        Self(instant)
    }

    /// The instant this watermark marks
    pub fn instant(&self) -> DateTime<Utc> {
        self.0
    }

    /// Advances to `instant` if it is newer; returns true if it moved
    pub fn advance_to(&mut self, instant: DateTime<Utc>) -> bool {
        if instant > self.0 {
            self.0 = instant;
            true
        } else {
            false
        }
    }
}

impl Default for Watermark {
    fn default() -> Self {
        Self::origin()
    }
}

impl std::fmt::Display for Watermark {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}
