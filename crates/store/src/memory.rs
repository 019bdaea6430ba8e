// crates/store/src/memory.rs
//! In-memory reference implementation of `DeviceStore`

use crate::error::{StoreError, StoreResult};
use crate::store::{DeviceStore, FieldState, Mutation, StoredObject, Tombstone};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tether_core::{DeviceId, EntityKind, FieldMap, ObjectId};
use tokio::sync::RwLock;

#[derive(Default)]
struct Inner {
    objects: HashMap<ObjectId, StoredObject>,
    tombstones: HashMap<ObjectId, Tombstone>,
}

/// In-memory store with per-field stamps and delete tombstones
///
/// Writes are serialized by a single async lock, matching the single-writer
/// discipline a production store provides. `set_unavailable` simulates a
/// store outage for failure-path tests.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
    unavailable: Arc<AtomicBool>,
}

impl MemoryStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggles simulated unavailability
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable(
                "store marked unavailable".to_string(),
            ))
        } else {
            Ok(())
        }
    }

    /// Number of live objects (test/demo helper)
    pub async fn object_count(&self) -> usize {
        self.inner.read().await.objects.len()
    }
}

#[async_trait]
impl DeviceStore for MemoryStore {
    async fn query_mutated_since(&self, since: DateTime<Utc>) -> StoreResult<Vec<Mutation>> {
        self.check_available()?;
        let inner = self.inner.read().await;

        let mut mutations: Vec<Mutation> = inner
            .objects
            .values()
            .filter(|object| !object.fields_modified_since(since).is_empty())
            .cloned()
            .map(Mutation::Upsert)
            .collect();

        mutations.extend(
            inner
                .tombstones
                .values()
                .filter(|t| t.deleted_at > since)
                .cloned()
                .map(Mutation::Tombstone),
        );

        // Stable order so repeated snapshots agree
        mutations.sort_by_key(|m| match m {
            Mutation::Upsert(o) => (o.created_at, o.id),
            Mutation::Tombstone(t) => (t.deleted_at, t.id),
        });

        Ok(mutations)
    }

    async fn get(&self, id: &ObjectId) -> StoreResult<Option<StoredObject>> {
        self.check_available()?;
        Ok(self.inner.read().await.objects.get(id).cloned())
    }

    async fn write_fields(
        &self,
        id: ObjectId,
        kind: EntityKind,
        fields: &FieldMap,
        stamped_at: DateTime<Utc>,
        stamped_by: &DeviceId,
    ) -> StoreResult<()> {
        self.check_available()?;
        let mut inner = self.inner.write().await;

        inner.tombstones.remove(&id);
        let object = inner.objects.entry(id).or_insert_with(|| StoredObject {
            id,
            kind,
            created_at: stamped_at,
            fields: Default::default(),
        });

        for (name, value) in fields {
            object.fields.insert(
                name.clone(),
                FieldState {
                    value: value.clone(),
                    modified_at: stamped_at,
                    modified_by: stamped_by.clone(),
                },
            );
        }

        Ok(())
    }

    async fn delete(
        &self,
        id: &ObjectId,
        kind: EntityKind,
        deleted_at: DateTime<Utc>,
        deleted_by: &DeviceId,
    ) -> StoreResult<()> {
        self.check_available()?;
        let mut inner = self.inner.write().await;

        inner.objects.remove(id);
        inner.tombstones.insert(
            *id,
            Tombstone {
                id: *id,
                kind,
                deleted_at,
                deleted_by: deleted_by.clone(),
            },
        );

        Ok(())
    }
}
