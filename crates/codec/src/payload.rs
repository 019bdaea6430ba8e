// crates/codec/src/payload.rs
//! The wire unit

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One transmitted fragment of an encoded changeset
///
/// All chunks of one changeset share a `transmission_id`; a receiver must
/// hold them until all `chunk_count` fragments are present before
/// reassembling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncPayload {
    /// Wire schema version
    pub schema_version: u32,
    /// Shared id of all chunks in this transmission
    pub transmission_id: Uuid,
    /// Position of this chunk, 0-based
    pub chunk_index: u32,
    /// Total number of chunks in the transmission
    pub chunk_count: u32,
    /// This chunk's slice of the encoded changeset
    pub fragment: Bytes,
    /// When the payload was created on the sender
    pub created_at: DateTime<Utc>,
}

impl SyncPayload {
    /// Returns true if this is the final chunk of its transmission
    pub fn is_last(&self) -> bool {
        self.chunk_index + 1 == self.chunk_count
    }

    /// Fragment size in bytes
    pub fn fragment_len(&self) -> usize {
        self.fragment.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(index: u32, count: u32) -> SyncPayload {
        SyncPayload {
            schema_version: 1,
            transmission_id: Uuid::new_v4(),
            chunk_index: index,
            chunk_count: count,
            fragment: Bytes::from_static(b"abc"),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_is_last() {
        assert!(payload(2, 3).is_last());
        assert!(!payload(1, 3).is_last());
        assert!(payload(0, 1).is_last());
    }

    #[test]
    fn test_fragment_len() {
        assert_eq!(payload(0, 1).fragment_len(), 3);
    }

    #[test]
    fn test_payload_serializes() {
        let p = payload(0, 1);
        let json = serde_json::to_string(&p).unwrap();
        let back: SyncPayload = serde_json::from_str(&json).unwrap();
        assert_eq!(p, back);
    }
}
