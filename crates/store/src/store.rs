// crates/store/src/store.rs
//! The `DeviceStore` trait and its row types

use crate::error::StoreResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tether_core::{DeviceId, EntityKind, FieldMap, ObjectId, ScalarValue};

/// One field of a stored object, with its modification stamp
///
/// The stamp is what field-level last-writer-wins compares against.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldState {
    /// Current value
    pub value: ScalarValue,
    /// When the field was last modified
    pub modified_at: DateTime<Utc>,
    /// Device that made the modification
    pub modified_by: DeviceId,
}

/// A domain object as the store holds it
#[derive(Debug, Clone, PartialEq)]
pub struct StoredObject {
    /// Object identifier
    pub id: ObjectId,
    /// Domain type
    pub kind: EntityKind,
    /// When the object was first created
    pub created_at: DateTime<Utc>,
    /// Fields with their modification stamps
    pub fields: BTreeMap<String, FieldState>,
}

impl StoredObject {
    /// Fields modified strictly after `since`, in stable name order
    pub fn fields_modified_since(&self, since: DateTime<Utc>) -> Vec<(&str, &FieldState)> {
        self.fields
            .iter()
            .filter(|(_, state)| state.modified_at > since)
            .map(|(name, state)| (name.as_str(), state))
            .collect()
    }

    /// Plain name → value view of all fields
    pub fn field_values(&self) -> FieldMap {
        self.fields
            .iter()
            .map(|(name, state)| (name.clone(), state.value.clone()))
            .collect()
    }
}

/// Marker left behind by a deletion so it can be synchronized
#[derive(Debug, Clone, PartialEq)]
pub struct Tombstone {
    /// Deleted object
    pub id: ObjectId,
    /// Domain type it had
    pub kind: EntityKind,
    /// When it was deleted
    pub deleted_at: DateTime<Utc>,
    /// Device that deleted it
    pub deleted_by: DeviceId,
}

/// One store mutation visible to the change tracker
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// Object exists and had fields modified
    Upsert(StoredObject),
    /// Object was deleted
    Tombstone(Tombstone),
}

/// The local store as the sync core sees it
///
/// Implementations serialize writes internally (single-writer discipline),
/// so the merge engine and the domain's normal write path cannot interleave
/// mid-object.
#[async_trait]
pub trait DeviceStore: Send + Sync {
    /// All mutations with stamps strictly newer than `since`
    ///
    /// A point-in-time read: the result reflects one consistent snapshot.
    async fn query_mutated_since(&self, since: DateTime<Utc>) -> StoreResult<Vec<Mutation>>;

    /// Fetches one object with its field stamps, if present
    async fn get(&self, id: &ObjectId) -> StoreResult<Option<StoredObject>>;

    /// Writes fields of an object, stamping each with `stamped_at`/`stamped_by`
    ///
    /// Creates the object if it does not exist. Clears any tombstone for it.
    async fn write_fields(
        &self,
        id: ObjectId,
        kind: EntityKind,
        fields: &FieldMap,
        stamped_at: DateTime<Utc>,
        stamped_by: &DeviceId,
    ) -> StoreResult<()>;

    /// Deletes an object, leaving a tombstone; absent objects are a no-op
    async fn delete(
        &self,
        id: &ObjectId,
        kind: EntityKind,
        deleted_at: DateTime<Utc>,
        deleted_by: &DeviceId,
    ) -> StoreResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_fields_modified_since() {
        let now = Utc::now();
        let device = DeviceId::from_string("primary".to_string());
        let mut fields = BTreeMap::new();
        fields.insert(
            "old".to_string(),
            FieldState {
                value: ScalarValue::from("stale"),
                modified_at: now - Duration::minutes(10),
                modified_by: device.clone(),
            },
        );
        fields.insert(
            "fresh".to_string(),
            FieldState {
                value: ScalarValue::from("new"),
                modified_at: now,
                modified_by: device.clone(),
            },
        );

        let object = StoredObject {
            id: ObjectId::new(),
            kind: EntityKind::Reminder,
            created_at: now - Duration::minutes(10),
            fields,
        };

        let changed = object.fields_modified_since(now - Duration::minutes(1));
        assert_eq!(changed.len(), 1);
        assert_eq!(changed[0].0, "fresh");
    }

    #[test]
    fn test_field_values_view() {
        let now = Utc::now();
        let device = DeviceId::from_string("primary".to_string());
        let mut fields = BTreeMap::new();
        fields.insert(
            "title".to_string(),
            FieldState {
                value: ScalarValue::from("walk the dog"),
                modified_at: now,
                modified_by: device,
            },
        );

        let object = StoredObject {
            id: ObjectId::new(),
            kind: EntityKind::Reminder,
            created_at: now,
            fields,
        };

        let values = object.field_values();
        assert_eq!(values.get("title"), Some(&ScalarValue::from("walk the dog")));
    }
}
