// crates/core/src/change.rs
//! Change records and changesets

use crate::types::{DeviceId, EntityKind, FieldMap, ObjectId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of mutation a change record describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    /// Object was created
    Insert,
    /// One or more fields were updated
    Update,
    /// Object was removed
    Delete,
}

/// One mutation to one domain object
///
/// Immutable once created. `recorded_at` is the mutation timestamp used for
/// field-level last-writer-wins; `origin` is the device that produced the
/// mutation and breaks timestamp ties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecord {
    /// Domain type of the mutated object
    pub entity_kind: EntityKind,
    /// Object the mutation applies to
    pub object_id: ObjectId,
    /// Insert, update or delete
    pub operation: Operation,
    /// Mutated fields (empty for deletes)
    pub fields: FieldMap,
    /// Device that produced the mutation
    pub origin: DeviceId,
    /// When the mutation happened on the origin device
    pub recorded_at: DateTime<Utc>,
}

impl ChangeRecord {
    /// Creates a new change record stamped with the current time
    pub fn new(
        entity_kind: EntityKind,
        object_id: ObjectId,
        operation: Operation,
        fields: FieldMap,
        origin: DeviceId,
    ) -> Self {
        Self {
            entity_kind,
            object_id,
            operation,
            fields,
            origin,
            recorded_at: Utc::now(),
        }
    }

    /// Returns true if this is a deletion
    pub fn is_delete(&self) -> bool {
        matches!(self.operation, Operation::Delete)
    }

    /// Returns true if this record's stamp beats `other_at` from `other_origin`
    ///
    /// Equal timestamps fall back to comparing device IDs so both peers
    /// resolve the tie identically.
    pub fn wins_over(&self, other_at: DateTime<Utc>, other_origin: &DeviceId) -> bool {
        match self.recorded_at.cmp(&other_at) {
            std::cmp::Ordering::Greater => true,
            std::cmp::Ordering::Less => false,
            std::cmp::Ordering::Equal => self.origin > *other_origin,
        }
    }
}

/// Ordered batch of change records produced for one sync cycle
///
/// Owned exclusively by the in-flight sync session; discarded on completion
/// or failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Changeset {
    records: Vec<ChangeRecord>,
}

impl Changeset {
    /// Creates an empty changeset
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
        }
    }

    /// Creates a changeset from records, preserving their order
    pub fn from_records(records: Vec<ChangeRecord>) -> Self {
        Self { records }
    }

    /// Appends a record
    pub fn push(&mut self, record: ChangeRecord) {
        self.records.push(record);
    }

    /// Records in order
    pub fn records(&self) -> &[ChangeRecord] {
        &self.records
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if there is nothing to sync
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Consumes the changeset, yielding its records
    pub fn into_records(self) -> Vec<ChangeRecord> {
        self.records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ScalarValue;
    use chrono::Duration;

    fn record(origin: &str, at: DateTime<Utc>) -> ChangeRecord {
        let mut fields = FieldMap::new();
        fields.insert("title".to_string(), ScalarValue::from("note"));
        ChangeRecord {
            entity_kind: EntityKind::Reminder,
            object_id: ObjectId::new(),
            operation: Operation::Update,
            fields,
            origin: DeviceId::from_string(origin.to_string()),
            recorded_at: at,
        }
    }

    #[test]
    fn test_record_creation() {
        let rec = ChangeRecord::new(
            EntityKind::Reminder,
            ObjectId::new(),
            Operation::Insert,
            FieldMap::new(),
            DeviceId::from_string("primary".to_string()),
        );
        assert_eq!(rec.operation, Operation::Insert);
        assert!(!rec.is_delete());
    }

    #[test]
    fn test_newer_timestamp_wins() {
        let now = Utc::now();
        let rec = record("companion", now);
        let origin = rec.origin.clone();
        assert!(rec.wins_over(now - Duration::seconds(1), &origin));
        assert!(!rec.wins_over(now + Duration::seconds(1), &origin));
    }

    #[test]
    fn test_tie_breaks_by_device_id() {
        let now = Utc::now();
        let rec = record("device-b", now);
        let smaller = DeviceId::from_string("device-a".to_string());
        let larger = DeviceId::from_string("device-c".to_string());
        assert!(rec.wins_over(now, &smaller));
        assert!(!rec.wins_over(now, &larger));
    }

    #[test]
    fn test_changeset_preserves_order() {
        let now = Utc::now();
        let mut set = Changeset::new();
        set.push(record("a", now));
        set.push(record("b", now));
        assert_eq!(set.len(), 2);
        assert_eq!(set.records()[0].origin.as_str(), "a");
        assert_eq!(set.records()[1].origin.as_str(), "b");
    }

    #[test]
    fn test_empty_changeset() {
        let set = Changeset::new();
        assert!(set.is_empty());
        assert_eq!(set.len(), 0);
    }
}
