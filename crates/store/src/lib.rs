// crates/store/src/lib.rs
//! Local store seam for the Tether sync engine
//!
//! The sync core never talks to a concrete database. It goes through the
//! [`DeviceStore`] trait, which exposes the only three operations sync
//! needs: query mutations since an instant, write stamped fields, delete.
//! The [`MemoryStore`] implementation backs tests and demos and doubles as
//! the reference for what a production store must provide (per-field
//! modification stamps and delete tombstones).
//!
//! The watermark lives next to the store and survives restarts via
//! [`WatermarkFile`].

mod error;
mod memory;
mod store;
mod watermark_file;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use store::{DeviceStore, FieldState, Mutation, StoredObject, Tombstone};
pub use watermark_file::WatermarkFile;
