// crates/store/src/error.rs
//! Error types for store operations

use std::path::PathBuf;
use thiserror::Error;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur against the local store
#[derive(Debug, Error)]
pub enum StoreError {
    /// The underlying store cannot be reached right now
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A write violated a store constraint
    #[error("Constraint violation on {object}: {message}")]
    Constraint { object: String, message: String },

    /// Watermark file could not be read
    #[error("Failed to read watermark file {path}: {source}")]
    WatermarkRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Watermark file could not be written
    #[error("Failed to write watermark file {path}: {source}")]
    WatermarkWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Watermark file held invalid data
    #[error("Corrupted watermark file {path}: {message}")]
    WatermarkCorrupted { path: PathBuf, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_display() {
        let err = StoreError::Unavailable("database locked".to_string());
        assert!(err.to_string().contains("unavailable"));
        assert!(err.to_string().contains("database locked"));
    }

    #[test]
    fn test_constraint_display() {
        let err = StoreError::Constraint {
            object: "reminder-1".to_string(),
            message: "title required".to_string(),
        };
        assert!(err.to_string().contains("Constraint violation"));
    }

    #[test]
    fn test_watermark_corrupted_display() {
        let err = StoreError::WatermarkCorrupted {
            path: PathBuf::from("/tmp/watermark.json"),
            message: "not json".to_string(),
        };
        assert!(err.to_string().contains("Corrupted"));
    }
}
