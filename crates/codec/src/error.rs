// crates/codec/src/error.rs
//! Error types for payload encoding and decoding

use thiserror::Error;
use uuid::Uuid;

/// Result type for codec operations
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur while encoding or decoding sync payloads
#[derive(Debug, Error)]
pub enum CodecError {
    /// Fragment size limit is unusable
    #[error("Invalid fragment size: {0} bytes")]
    InvalidFragmentSize(usize),

    /// Changeset could not be serialized
    #[error("Failed to serialize changeset: {0}")]
    Serialize(#[source] serde_json::Error),

    /// Reassembled bytes were not a valid changeset
    #[error("Malformed changeset payload: {0}")]
    Malformed(#[source] serde_json::Error),

    /// Peer speaks a schema version this build does not understand
    #[error("Unsupported schema version {got} (this build speaks {supported})")]
    UnsupportedSchema { got: u32, supported: u32 },

    /// Payloads from different transmissions were mixed
    #[error("Transmission id mismatch: expected {expected}, got {got}")]
    TransmissionMismatch { expected: Uuid, got: Uuid },

    /// Fragments of one transmission disagree on the chunk count
    #[error("Chunk count mismatch in transmission {transmission_id}: {expected} vs {got}")]
    ChunkCountMismatch {
        transmission_id: Uuid,
        expected: u32,
        got: u32,
    },

    /// A chunk index is outside the declared count
    #[error("Chunk index {index} out of range for {count} chunks")]
    ChunkIndexOutOfRange { index: u32, count: u32 },

    /// Decode was asked to reassemble an incomplete transmission
    #[error("Transmission {transmission_id} is missing chunk {index}")]
    MissingChunk { transmission_id: Uuid, index: u32 },

    /// Decode was given no payloads at all
    #[error("Cannot decode an empty payload list")]
    Empty,
}
