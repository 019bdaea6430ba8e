// crates/codec/src/codec.rs
//! Deterministic chunked encode / validated decode

use crate::error::{CodecError, CodecResult};
use crate::payload::SyncPayload;
use bytes::Bytes;
use chrono::Utc;
use tether_core::{ChangeRecord, Changeset};
use uuid::Uuid;

/// Wire schema version this build speaks
pub const SCHEMA_VERSION: u32 = 1;

/// Encodes a changeset into ordered, size-bounded chunks
///
/// Pure and deterministic: field maps iterate in stable order, so the same
/// changeset always yields the same bytes and the same chunk boundaries.
/// An empty changeset still encodes to a single zero-record chunk, which is
/// how a peer says "nothing new".
pub fn encode(changeset: &Changeset, max_fragment_bytes: usize) -> CodecResult<Vec<SyncPayload>> {
    if max_fragment_bytes == 0 {
        return Err(CodecError::InvalidFragmentSize(max_fragment_bytes));
    }

    let encoded = serde_json::to_vec(changeset.records()).map_err(CodecError::Serialize)?;
    let body = Bytes::from(encoded);

    let chunk_count = body.len().div_ceil(max_fragment_bytes).max(1) as u32;
    let transmission_id = Uuid::new_v4();
    let created_at = Utc::now();

    let payloads = (0..chunk_count)
        .map(|index| {
            let start = index as usize * max_fragment_bytes;
            let end = (start + max_fragment_bytes).min(body.len());
            SyncPayload {
                schema_version: SCHEMA_VERSION,
                transmission_id,
                chunk_index: index,
                chunk_count,
                fragment: body.slice(start..end),
                created_at,
            }
        })
        .collect();

    Ok(payloads)
}

/// Reassembles and decodes a complete transmission
///
/// Requires every chunk of exactly one transmission. Mixed transmission
/// ids, disagreeing chunk counts, out-of-range indexes, gaps and unknown
/// schema versions are all protocol errors; nothing partial is ever
/// returned.
pub fn decode(payloads: &[SyncPayload]) -> CodecResult<Changeset> {
    let first = payloads.first().ok_or(CodecError::Empty)?;

    if first.schema_version != SCHEMA_VERSION {
        return Err(CodecError::UnsupportedSchema {
            got: first.schema_version,
            supported: SCHEMA_VERSION,
        });
    }

    let transmission_id = first.transmission_id;
    let chunk_count = first.chunk_count;

    let mut fragments: Vec<Option<&Bytes>> = vec![None; chunk_count as usize];
    for payload in payloads {
        if payload.transmission_id != transmission_id {
            return Err(CodecError::TransmissionMismatch {
                expected: transmission_id,
                got: payload.transmission_id,
            });
        }
        if payload.chunk_count != chunk_count {
            return Err(CodecError::ChunkCountMismatch {
                transmission_id,
                expected: chunk_count,
                got: payload.chunk_count,
            });
        }
        if payload.chunk_index >= chunk_count {
            return Err(CodecError::ChunkIndexOutOfRange {
                index: payload.chunk_index,
                count: chunk_count,
            });
        }
        // Duplicate delivery of the same chunk is harmless
        fragments[payload.chunk_index as usize] = Some(&payload.fragment);
    }

    let mut body = Vec::new();
    for (index, fragment) in fragments.iter().enumerate() {
        match fragment {
            Some(bytes) => body.extend_from_slice(bytes),
            None => {
                return Err(CodecError::MissingChunk {
                    transmission_id,
                    index: index as u32,
                })
            }
        }
    }

    let records: Vec<ChangeRecord> = serde_json::from_slice(&body).map_err(CodecError::Malformed)?;
    Ok(Changeset::from_records(records))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_core::{DeviceId, EntityKind, FieldMap, ObjectId, Operation, ScalarValue};

    fn sample_changeset(record_count: usize) -> Changeset {
        let origin = DeviceId::from_string("primary".to_string());
        let mut set = Changeset::new();
        for i in 0..record_count {
            let mut fields = FieldMap::new();
            fields.insert("title".to_string(), ScalarValue::from("call the vet"));
            fields.insert("priority".to_string(), ScalarValue::from(i as f64));
            set.push(ChangeRecord::new(
                EntityKind::Reminder,
                ObjectId::new(),
                Operation::Update,
                fields,
                origin.clone(),
            ));
        }
        set
    }

    #[test]
    fn test_round_trip_single_chunk() {
        let set = sample_changeset(3);
        let payloads = encode(&set, 1024 * 1024).unwrap();
        assert_eq!(payloads.len(), 1);
        assert_eq!(decode(&payloads).unwrap(), set);
    }

    #[test]
    fn test_round_trip_many_chunks() {
        let set = sample_changeset(10);
        let payloads = encode(&set, 64).unwrap();
        assert!(payloads.len() > 1);
        assert_eq!(decode(&payloads).unwrap(), set);
    }

    #[test]
    fn test_round_trip_shuffled_chunks() {
        let set = sample_changeset(10);
        let mut payloads = encode(&set, 64).unwrap();
        payloads.reverse();
        let mid = payloads.len() / 2;
        payloads.swap(0, mid);
        assert_eq!(decode(&payloads).unwrap(), set);
    }

    #[test]
    fn test_empty_changeset_encodes_to_one_chunk() {
        let payloads = encode(&Changeset::new(), 1024).unwrap();
        assert_eq!(payloads.len(), 1);
        let decoded = decode(&payloads).unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn test_deterministic_boundaries() {
        let set = sample_changeset(10);
        let first = encode(&set, 64).unwrap();
        let second = encode(&set, 64).unwrap();

        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.fragment, b.fragment);
            assert_eq!(a.chunk_index, b.chunk_index);
        }
        // Distinct transmissions still get distinct ids
        assert_ne!(first[0].transmission_id, second[0].transmission_id);
    }

    #[test]
    fn test_zero_fragment_size_rejected() {
        let result = encode(&sample_changeset(1), 0);
        assert!(matches!(result, Err(CodecError::InvalidFragmentSize(0))));
    }

    #[test]
    fn test_decode_empty_list_rejected() {
        assert!(matches!(decode(&[]), Err(CodecError::Empty)));
    }

    #[test]
    fn test_decode_missing_chunk_rejected() {
        let set = sample_changeset(10);
        let mut payloads = encode(&set, 64).unwrap();
        payloads.remove(1);
        assert!(matches!(
            decode(&payloads),
            Err(CodecError::MissingChunk { index: 1, .. })
        ));
    }

    #[test]
    fn test_decode_duplicate_chunk_tolerated() {
        let set = sample_changeset(10);
        let mut payloads = encode(&set, 64).unwrap();
        payloads.push(payloads[0].clone());
        assert_eq!(decode(&payloads).unwrap(), set);
    }

    #[test]
    fn test_decode_mixed_transmissions_rejected() {
        let mut payloads = encode(&sample_changeset(2), 1024).unwrap();
        payloads.extend(encode(&sample_changeset(2), 1024).unwrap());
        assert!(matches!(
            decode(&payloads),
            Err(CodecError::TransmissionMismatch { .. })
        ));
    }

    #[test]
    fn test_decode_chunk_count_disagreement_rejected() {
        let set = sample_changeset(10);
        let mut payloads = encode(&set, 64).unwrap();
        payloads[1].chunk_count += 1;
        assert!(matches!(
            decode(&payloads),
            Err(CodecError::ChunkCountMismatch { .. })
        ));
    }

    #[test]
    fn test_decode_unsupported_schema_rejected() {
        let mut payloads = encode(&sample_changeset(1), 1024).unwrap();
        payloads[0].schema_version = 99;
        assert!(matches!(
            decode(&payloads),
            Err(CodecError::UnsupportedSchema { got: 99, .. })
        ));
    }
}
