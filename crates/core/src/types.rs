// crates/core/src/types.rs
//! Identifiers, entity kinds and the tagged scalar value type

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Unique identifier of a synchronized domain object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(Uuid);

impl ObjectId {
    /// Creates a fresh object ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps an existing UUID
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Returns the underlying UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique device identifier
///
/// Also serves as the deterministic tie-breaker when two peers stamp the
/// same field with an identical timestamp: the lexicographically greater
/// device ID wins on both sides.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceId(String);

impl DeviceId {
    /// Creates a new random device ID
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Creates a device ID from a string
    pub fn from_string(s: String) -> Self {
        Self(s)
    }

    /// Returns the device ID as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for DeviceId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Closed enumeration of synchronized domain types
///
/// `Unknown` is the catch-all a newer peer schema deserializes into; the
/// merge engine skips such records instead of failing the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKind {
    /// User preference setting
    UserPreference,
    /// Health sample (heart rate, steps, ...)
    HealthMetric,
    /// Recorded workout session
    WorkoutSession,
    /// Reminder entry
    Reminder,
    /// Text message
    Message,
    /// Cached weather snapshot
    WeatherCache,
    /// Voice command history entry
    VoiceCommandLog,
    /// Entity kind this build does not know about
    #[serde(other)]
    Unknown,
}

impl EntityKind {
    /// All kinds this build synchronizes
    pub const KNOWN: [EntityKind; 7] = [
        EntityKind::UserPreference,
        EntityKind::HealthMetric,
        EntityKind::WorkoutSession,
        EntityKind::Reminder,
        EntityKind::Message,
        EntityKind::WeatherCache,
        EntityKind::VoiceCommandLog,
    ];

    /// Returns true if this build can merge records of this kind
    pub fn is_known(&self) -> bool {
        !matches!(self, EntityKind::Unknown)
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EntityKind::UserPreference => "user_preference",
            EntityKind::HealthMetric => "health_metric",
            EntityKind::WorkoutSession => "workout_session",
            EntityKind::Reminder => "reminder",
            EntityKind::Message => "message",
            EntityKind::WeatherCache => "weather_cache",
            EntityKind::VoiceCommandLog => "voice_command_log",
            EntityKind::Unknown => "unknown",
        };
        write!(f, "{name}")
    }
}

/// Tagged scalar value carried by a synchronized field
///
/// Explicit tags keep encode/decode total: a decoder on another
/// implementation can reconstruct every value unambiguously.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum ScalarValue {
    /// UTF-8 text
    Text(String),
    /// 64-bit float (covers integers the domain produces)
    Number(f64),
    /// Boolean flag
    Flag(bool),
    /// UTC timestamp
    Timestamp(DateTime<Utc>),
    /// Opaque binary blob
    Binary(Vec<u8>),
}

impl ScalarValue {
    /// Short tag name, used in log output
    pub fn tag(&self) -> &'static str {
        match self {
            ScalarValue::Text(_) => "text",
            ScalarValue::Number(_) => "number",
            ScalarValue::Flag(_) => "flag",
            ScalarValue::Timestamp(_) => "timestamp",
            ScalarValue::Binary(_) => "binary",
        }
    }
}

impl From<&str> for ScalarValue {
    fn from(s: &str) -> Self {
        ScalarValue::Text(s.to_string())
    }
}

impl From<f64> for ScalarValue {
    fn from(n: f64) -> Self {
        ScalarValue::Number(n)
    }
}

impl From<bool> for ScalarValue {
    fn from(b: bool) -> Self {
        ScalarValue::Flag(b)
    }
}

/// Ordered field name → value map
///
/// `BTreeMap` keeps iteration order stable, which the codec relies on for
/// deterministic chunk boundaries.
pub type FieldMap = BTreeMap<String, ScalarValue>;
