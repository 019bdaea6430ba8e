// crates/sync/src/tracker.rs
//! Change tracking against the local store

use crate::error::SyncResult;
use crate::registry::SchemaRegistry;
use std::collections::BTreeMap;
use std::sync::Arc;
use tether_core::{ChangeRecord, Changeset, Operation, Watermark};
use tether_store::{DeviceStore, Mutation};

/// One batch of local changes, capped at the per-cycle maximum
///
/// The cap applies at stamp-group granularity: every record sharing the
/// batch's last stamp is either fully included or fully deferred, so a
/// watermark advanced to that stamp never strands records behind it.
#[derive(Debug, Clone)]
pub struct ChangeBatch {
    /// Records in mutation-time order
    pub changeset: Changeset,
    /// True if more changes remained beyond the cap
    pub truncated: bool,
}

/// Produces changesets by diffing the store against the watermark
///
/// Thin by design: the store does the heavy lifting, the tracker scopes
/// the query to registered kinds and shapes the result into records.
#[derive(Clone)]
pub struct ChangeTracker {
    store: Arc<dyn DeviceStore>,
    registry: Arc<SchemaRegistry>,
    max_changes: usize,
}

impl ChangeTracker {
    /// Creates a tracker over the given store
    pub fn new(store: Arc<dyn DeviceStore>, registry: Arc<SchemaRegistry>, max_changes: usize) -> Self {
        Self {
            store,
            registry,
            max_changes,
        }
    }

    /// All local changes with stamps strictly newer than the watermark
    ///
    /// A point-in-time read against one store snapshot; fails whole (never
    /// partial) if the store is unavailable. Fields of one object that were
    /// stamped together become one record, so per-field timestamps survive
    /// the trip through the single-stamp record format.
    pub async fn changes_since(&self, watermark: &Watermark) -> SyncResult<ChangeBatch> {
        let since = watermark.instant();
        let mutations = self.store.query_mutated_since(since).await?;

        let mut records: Vec<ChangeRecord> = Vec::new();
        for mutation in mutations {
            match mutation {
                Mutation::Upsert(object) => {
                    if !self.registry.is_registered(object.kind) {
                        log::debug!("Skipping unregistered kind {} for {}", object.kind, object.id);
                        continue;
                    }

                    let operation = if object.created_at > since {
                        Operation::Insert
                    } else {
                        Operation::Update
                    };

                    // Group changed fields by their stamp
                    let mut groups: BTreeMap<_, (tether_core::FieldMap, _)> = BTreeMap::new();
                    for (name, state) in object.fields_modified_since(since) {
                        let entry = groups
                            .entry(state.modified_at)
                            .or_insert_with(|| (tether_core::FieldMap::new(), state.modified_by.clone()));
                        entry.0.insert(name.to_string(), state.value.clone());
                    }

                    for (stamped_at, (fields, stamped_by)) in groups {
                        records.push(ChangeRecord {
                            entity_kind: object.kind,
                            object_id: object.id,
                            operation,
                            fields,
                            origin: stamped_by,
                            recorded_at: stamped_at,
                        });
                    }
                }
                Mutation::Tombstone(tombstone) => {
                    if !self.registry.is_registered(tombstone.kind) {
                        continue;
                    }
                    records.push(ChangeRecord {
                        entity_kind: tombstone.kind,
                        object_id: tombstone.id,
                        operation: Operation::Delete,
                        fields: tether_core::FieldMap::new(),
                        origin: tombstone.deleted_by,
                        recorded_at: tombstone.deleted_at,
                    });
                }
            }
        }

        records.sort_by_key(|r| (r.recorded_at, r.object_id));

        let total = records.len();
        if total > self.max_changes {
            // Cut at a stamp-group boundary: the watermark later advances to
            // the last included stamp, and the query above is strictly
            // greater-than, so splitting a group of identical stamps across
            // the cap would strand its tail forever. A single group larger
            // than the cap is included whole so the cycle still progresses.
            let boundary = records[self.max_changes].recorded_at;
            let mut cut = self.max_changes;
            while cut > 0 && records[cut - 1].recorded_at == boundary {
                cut -= 1;
            }
            if cut == 0 {
                cut = self.max_changes;
                while cut < total && records[cut].recorded_at == boundary {
                    cut += 1;
                }
            }
            if cut < total {
                log::info!("Changeset capped at {cut} of {total} pending records");
            }
            records.truncate(cut);
        }

        Ok(ChangeBatch {
            truncated: records.len() < total,
            changeset: Changeset::from_records(records),
        })
    }
}
