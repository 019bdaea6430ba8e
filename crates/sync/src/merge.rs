// crates/sync/src/merge.rs
//! Applies remote changesets with field-level last-writer-wins

use crate::error::{SyncError, SyncResult};
use crate::registry::SchemaRegistry;
use chrono::{DateTime, Utc};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::sync::Mutex;
use tether_core::{ChangeRecord, Changeset, DeviceId, FieldMap, ObjectId};
use tether_store::{DeviceStore, StoreError};

/// Cap on the duplicate-delivery memory
const DEDUP_CAPACITY: usize = 4096;

/// Outcome of applying one changeset
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Records whose changes reached the store
    pub applied: usize,
    /// Records already applied earlier (duplicate delivery)
    pub deduplicated: usize,
    /// Records of a kind this build does not know
    pub skipped_unknown_kind: usize,
    /// Records that violated the kind's field schema
    pub skipped_invalid: usize,
    /// Records whose every field lost the timestamp comparison
    pub superseded: usize,
}

impl MergeReport {
    /// Records that did not fail: everything except schema violations
    pub fn total_processed(&self) -> usize {
        self.applied + self.deduplicated + self.skipped_unknown_kind + self.superseded
    }
}

/// Identity of one applied record
///
/// The origin is part of the key: two devices stamping the same object at
/// the same instant are distinct records that must both reach the
/// tie-break, not alias as a duplicate delivery.
type DedupKey = (ObjectId, DateTime<Utc>, DeviceId);

/// Tracks records already applied, bounded in size
struct DedupWindow {
    seen: HashSet<DedupKey>,
    order: VecDeque<DedupKey>,
}

impl DedupWindow {
    fn new() -> Self {
        Self {
            seen: HashSet::new(),
            order: VecDeque::new(),
        }
    }

    fn contains(&self, key: &DedupKey) -> bool {
        self.seen.contains(key)
    }

    fn insert(&mut self, key: DedupKey) {
        if self.seen.insert(key.clone()) {
            self.order.push_back(key);
            while self.order.len() > DEDUP_CAPACITY {
                if let Some(oldest) = self.order.pop_front() {
                    self.seen.remove(&oldest);
                }
            }
        }
    }
}

/// Applies incoming changesets to the local store
///
/// Apply is idempotent (duplicate deliveries are absorbed) and records are
/// independent: one bad record is skipped and logged, the rest of the batch
/// still lands. Only a store outage aborts the whole apply.
pub struct MergeEngine {
    store: Arc<dyn DeviceStore>,
    registry: Arc<SchemaRegistry>,
    dedup: Mutex<DedupWindow>,
}

impl MergeEngine {
    /// Creates a merge engine over the given store
    pub fn new(store: Arc<dyn DeviceStore>, registry: Arc<SchemaRegistry>) -> Self {
        Self {
            store,
            registry,
            dedup: Mutex::new(DedupWindow::new()),
        }
    }

    /// Applies a remote changeset record by record
    pub async fn apply(&self, changeset: &Changeset) -> SyncResult<MergeReport> {
        let mut report = MergeReport::default();

        for record in changeset.records() {
            if !record.entity_kind.is_known() || !self.registry.is_registered(record.entity_kind) {
                log::warn!(
                    "Skipping record for unknown entity kind (object {})",
                    record.object_id
                );
                report.skipped_unknown_kind += 1;
                continue;
            }

            let dedup_key = (record.object_id, record.recorded_at, record.origin.clone());
            if self.is_duplicate(&dedup_key) {
                log::debug!(
                    "Record for {} at {} already applied, skipping",
                    record.object_id,
                    record.recorded_at
                );
                report.deduplicated += 1;
                continue;
            }

            match self.apply_record(record).await {
                Ok(RecordOutcome::Applied) => {
                    self.remember(dedup_key);
                    report.applied += 1;
                }
                Ok(RecordOutcome::Superseded) => {
                    self.remember(dedup_key);
                    report.superseded += 1;
                }
                Ok(RecordOutcome::Invalid(detail)) => {
                    log::warn!(
                        "Skipping invalid record for {} ({}): {detail}",
                        record.object_id,
                        record.entity_kind
                    );
                    report.skipped_invalid += 1;
                }
                Err(err) => return Err(err),
            }
        }

        Ok(report)
    }

    fn is_duplicate(&self, key: &DedupKey) -> bool {
        self.dedup.lock().map(|d| d.contains(key)).unwrap_or(false)
    }

    fn remember(&self, key: DedupKey) {
        if let Ok(mut dedup) = self.dedup.lock() {
            dedup.insert(key);
        }
    }

    async fn apply_record(&self, record: &ChangeRecord) -> SyncResult<RecordOutcome> {
        if record.is_delete() {
            // Deleting an absent object is a no-op by contract
            self.store
                .delete(
                    &record.object_id,
                    record.entity_kind,
                    record.recorded_at,
                    &record.origin,
                )
                .await?;
            return Ok(RecordOutcome::Applied);
        }

        let unknown = self
            .registry
            .unknown_fields(record.entity_kind, &record.fields);
        if !unknown.is_empty() {
            return Ok(RecordOutcome::Invalid(format!(
                "fields not in schema: {}",
                unknown.join(", ")
            )));
        }

        let local = self.store.get(&record.object_id).await?;
        let winners = self.winning_fields(record, local.as_ref());
        if winners.is_empty() {
            return Ok(RecordOutcome::Superseded);
        }

        match self
            .store
            .write_fields(
                record.object_id,
                record.entity_kind,
                &winners,
                record.recorded_at,
                &record.origin,
            )
            .await
        {
            Ok(()) => Ok(RecordOutcome::Applied),
            Err(StoreError::Constraint { message, .. }) => Ok(RecordOutcome::Invalid(message)),
            Err(err) => Err(err.into()),
        }
    }

    /// Field-level last-writer-wins against the local object
    ///
    /// Each incoming field wins independently iff its record stamp beats
    /// the local field's stamp (ties broken by origin device id). A missing
    /// local object or field means the incoming value wins outright.
    fn winning_fields(
        &self,
        record: &ChangeRecord,
        local: Option<&tether_store::StoredObject>,
    ) -> FieldMap {
        let Some(local) = local else {
            return record.fields.clone();
        };

        record
            .fields
            .iter()
            .filter(|(name, _)| match local.fields.get(*name) {
                Some(state) => record.wins_over(state.modified_at, &state.modified_by),
                None => true,
            })
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }
}

enum RecordOutcome {
    Applied,
    Superseded,
    Invalid(String),
}
