// crates/core/src/lib.rs
//! Shared domain types for the Tether sync engine
//!
//! This crate defines the vocabulary every other Tether crate speaks:
//! - Object, device and entity-kind identifiers
//! - The tagged scalar value type used for synchronized fields
//! - Change records and changesets
//! - The sync watermark

mod change;
mod types;
mod watermark;

pub use change::{ChangeRecord, Changeset, Operation};
pub use types::{DeviceId, EntityKind, FieldMap, ObjectId, ScalarValue};
pub use watermark::Watermark;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_exports_accessible() {
        let _: ObjectId = ObjectId::new();
        let _: DeviceId = DeviceId::from_string("primary".to_string());
        let _: EntityKind = EntityKind::Reminder;
        let _: Watermark = Watermark::origin();
    }
}
