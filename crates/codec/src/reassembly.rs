// crates/codec/src/reassembly.rs
//! Out-of-order chunk reassembly

use crate::codec::{decode, SCHEMA_VERSION};
use crate::error::{CodecError, CodecResult};
use crate::payload::SyncPayload;
use std::collections::{BTreeMap, HashMap};
use tether_core::Changeset;
use uuid::Uuid;

struct Transmission {
    chunk_count: u32,
    chunks: BTreeMap<u32, SyncPayload>,
}

/// Buffers arriving chunks until a transmission is complete
///
/// Chunks may arrive in any order and more than once; duplicates are
/// absorbed. Only transmission-internal consistency is enforced here;
/// cross-transmission ordering is neither guaranteed nor needed.
#[derive(Default)]
pub struct ChunkBuffer {
    transmissions: HashMap<Uuid, Transmission>,
}

impl ChunkBuffer {
    /// Creates an empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepts one chunk; returns the decoded changeset once its
    /// transmission is complete
    ///
    /// A completed transmission is removed from the buffer, so the same
    /// changeset is never handed out twice.
    pub fn accept(&mut self, payload: SyncPayload) -> CodecResult<Option<Changeset>> {
        if payload.schema_version != SCHEMA_VERSION {
            return Err(CodecError::UnsupportedSchema {
                got: payload.schema_version,
                supported: SCHEMA_VERSION,
            });
        }
        if payload.chunk_index >= payload.chunk_count {
            return Err(CodecError::ChunkIndexOutOfRange {
                index: payload.chunk_index,
                count: payload.chunk_count,
            });
        }

        let transmission = self
            .transmissions
            .entry(payload.transmission_id)
            .or_insert_with(|| Transmission {
                chunk_count: payload.chunk_count,
                chunks: BTreeMap::new(),
            });

        if transmission.chunk_count != payload.chunk_count {
            let err = CodecError::ChunkCountMismatch {
                transmission_id: payload.transmission_id,
                expected: transmission.chunk_count,
                got: payload.chunk_count,
            };
            // Inconsistent framing poisons the whole transmission
            self.transmissions.remove(&payload.transmission_id);
            return Err(err);
        }

        if transmission.chunks.contains_key(&payload.chunk_index) {
            log::debug!(
                "Duplicate chunk {}/{} for transmission {}, ignoring",
                payload.chunk_index,
                payload.chunk_count,
                payload.transmission_id
            );
            return Ok(None);
        }

        let transmission_id = payload.transmission_id;
        transmission.chunks.insert(payload.chunk_index, payload);

        if transmission.chunks.len() as u32 == transmission.chunk_count {
            let complete = self
                .transmissions
                .remove(&transmission_id)
                .map(|t| t.chunks.into_values().collect::<Vec<_>>())
                .unwrap_or_default();
            return decode(&complete).map(Some);
        }

        Ok(None)
    }

    /// Drops all partial transmissions (cycle teardown)
    pub fn clear(&mut self) {
        self.transmissions.clear();
    }

    /// Number of transmissions still incomplete
    pub fn pending_transmissions(&self) -> usize {
        self.transmissions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode;
    use tether_core::{ChangeRecord, DeviceId, EntityKind, FieldMap, ObjectId, Operation};

    fn changeset(records: usize) -> Changeset {
        let origin = DeviceId::from_string("companion".to_string());
        let mut set = Changeset::new();
        for _ in 0..records {
            set.push(ChangeRecord::new(
                EntityKind::WeatherCache,
                ObjectId::new(),
                Operation::Update,
                FieldMap::new(),
                origin.clone(),
            ));
        }
        set
    }

    #[test]
    fn test_single_chunk_completes_immediately() {
        let set = changeset(1);
        let payloads = encode(&set, 1024 * 1024).unwrap();

        let mut buffer = ChunkBuffer::new();
        let result = buffer.accept(payloads[0].clone()).unwrap();
        assert_eq!(result, Some(set));
        assert_eq!(buffer.pending_transmissions(), 0);
    }

    #[test]
    fn test_out_of_order_arrival() {
        let set = changeset(8);
        let payloads = encode(&set, 64).unwrap();
        assert!(payloads.len() >= 3);

        let mut buffer = ChunkBuffer::new();
        let mut decoded = None;
        for payload in payloads.iter().rev() {
            decoded = buffer.accept(payload.clone()).unwrap();
        }
        assert_eq!(decoded, Some(set));
    }

    #[test]
    fn test_incomplete_transmission_stays_pending() {
        let payloads = encode(&changeset(8), 64).unwrap();

        let mut buffer = ChunkBuffer::new();
        assert!(buffer.accept(payloads[0].clone()).unwrap().is_none());
        assert_eq!(buffer.pending_transmissions(), 1);
    }

    #[test]
    fn test_duplicate_chunk_ignored() {
        let set = changeset(8);
        let payloads = encode(&set, 64).unwrap();

        let mut buffer = ChunkBuffer::new();
        assert!(buffer.accept(payloads[0].clone()).unwrap().is_none());
        assert!(buffer.accept(payloads[0].clone()).unwrap().is_none());

        let mut decoded = None;
        for payload in payloads.iter().skip(1) {
            decoded = buffer.accept(payload.clone()).unwrap();
        }
        assert_eq!(decoded, Some(set));
    }

    #[test]
    fn test_chunk_count_disagreement_poisons_transmission() {
        let payloads = encode(&changeset(8), 64).unwrap();

        let mut buffer = ChunkBuffer::new();
        buffer.accept(payloads[0].clone()).unwrap();

        let mut bad = payloads[1].clone();
        bad.chunk_count += 7;
        let result = buffer.accept(bad);
        assert!(matches!(result, Err(CodecError::ChunkCountMismatch { .. })));
        assert_eq!(buffer.pending_transmissions(), 0);
    }

    #[test]
    fn test_interleaved_transmissions() {
        let set_a = changeset(8);
        let set_b = changeset(8);
        let payloads_a = encode(&set_a, 64).unwrap();
        let payloads_b = encode(&set_b, 64).unwrap();

        let mut buffer = ChunkBuffer::new();
        let mut completed = Vec::new();
        for (a, b) in payloads_a.iter().zip(payloads_b.iter()) {
            if let Some(set) = buffer.accept(a.clone()).unwrap() {
                completed.push(set);
            }
            if let Some(set) = buffer.accept(b.clone()).unwrap() {
                completed.push(set);
            }
        }
        assert_eq!(completed, vec![set_a, set_b]);
    }

    #[test]
    fn test_clear_discards_partials() {
        let payloads = encode(&changeset(8), 64).unwrap();

        let mut buffer = ChunkBuffer::new();
        buffer.accept(payloads[0].clone()).unwrap();
        buffer.clear();
        assert_eq!(buffer.pending_transmissions(), 0);
    }

    #[test]
    fn test_index_out_of_range_rejected() {
        let payloads = encode(&changeset(1), 1024).unwrap();
        let mut bad = payloads[0].clone();
        bad.chunk_index = 5;

        let mut buffer = ChunkBuffer::new();
        assert!(matches!(
            buffer.accept(bad),
            Err(CodecError::ChunkIndexOutOfRange { .. })
        ));
    }
}
