// crates/sync/src/registry.rs
//! Entity kind schema registry
//!
//! One registry serves both sides of the pipeline: the change tracker only
//! picks up kinds registered here, and the merge engine validates incoming
//! field names against the same entry. Adding a synchronized kind is
//! therefore a single registration.

use std::collections::{BTreeSet, HashMap};
use tether_core::{EntityKind, FieldMap};

/// Known fields per synchronized entity kind
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    schemas: HashMap<EntityKind, BTreeSet<String>>,
}

impl SchemaRegistry {
    /// Empty registry; nothing synchronizes until kinds are registered
    pub fn new() -> Self {
        Self {
            schemas: HashMap::new(),
        }
    }

    /// Registry pre-populated with every kind this build ships
    pub fn with_defaults() -> Self {
        Self::new()
            .register(
                EntityKind::UserPreference,
                &["key", "value"],
            )
            .register(
                EntityKind::HealthMetric,
                &["metric", "value", "unit", "sampled_at"],
            )
            .register(
                EntityKind::WorkoutSession,
                &["activity", "started_at", "ended_at", "calories", "distance_m"],
            )
            .register(
                EntityKind::Reminder,
                &["title", "notes", "due_at", "completed"],
            )
            .register(
                EntityKind::Message,
                &["sender", "body", "sent_at", "read"],
            )
            .register(
                EntityKind::WeatherCache,
                &["location", "condition", "temperature_c", "fetched_at"],
            )
            .register(
                EntityKind::VoiceCommandLog,
                &["utterance", "intent", "issued_at"],
            )
    }

    /// Registers a kind with its known field names
    pub fn register(mut self, kind: EntityKind, fields: &[&str]) -> Self {
        self.schemas
            .insert(kind, fields.iter().map(|f| f.to_string()).collect());
        self
    }

    /// Returns true if the kind participates in sync
    pub fn is_registered(&self, kind: EntityKind) -> bool {
        self.schemas.contains_key(&kind)
    }

    /// Kinds currently registered, in stable order
    pub fn kinds(&self) -> Vec<EntityKind> {
        let mut kinds: Vec<_> = self.schemas.keys().copied().collect();
        kinds.sort();
        kinds
    }

    /// Returns the incoming field names that are not in the kind's schema
    pub fn unknown_fields<'a>(&self, kind: EntityKind, fields: &'a FieldMap) -> Vec<&'a str> {
        match self.schemas.get(&kind) {
            Some(known) => fields
                .keys()
                .filter(|name| !known.contains(*name))
                .map(|name| name.as_str())
                .collect(),
            None => fields.keys().map(|name| name.as_str()).collect(),
        }
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
