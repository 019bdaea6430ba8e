// crates/sync/src/lib.rs
//! Cross-device synchronization engine for Tether
//!
//! Keeps the primary device's local store consistent with one companion
//! device over an intermittent, bandwidth-constrained channel:
//! - Change tracking against a durable watermark
//! - Field-level last-writer-wins merge with idempotent apply
//! - A sync-cycle state machine with retry, backoff, timeout and
//!   cooperative cancellation
//! - Debounced triggering from domain "data changed" signals
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tether_store::{MemoryStore, WatermarkFile};
//! use tether_sync::{SyncConfig, SyncOrchestrator};
//! use tether_transport::ChannelTransport;
//! use tether_core::DeviceId;
//!
//! # async fn wire() -> tether_sync::SyncResult<()> {
//! let (local_end, _peer_end) = ChannelTransport::pair();
//! let orchestrator = SyncOrchestrator::new(
//!     SyncConfig::default(),
//!     DeviceId::from_string("primary".to_string()),
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(local_end),
//!     WatermarkFile::new("/tmp/tether/watermark.json".into()),
//! )?;
//! let report = orchestrator.sync_once().await?;
//! println!("synced {} changes", report.changed_count);
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod events;
mod merge;
mod orchestrator;
mod registry;
mod session;
mod tracker;

pub use config::SyncConfig;
pub use error::{FailureReason, SyncError, SyncResult};
pub use events::{SyncEvent, SyncStatus};
pub use merge::{MergeEngine, MergeReport};
pub use orchestrator::{SyncOrchestrator, SyncReport};
pub use registry::SchemaRegistry;
pub use session::{SyncPhase, SyncSession};
pub use tracker::{ChangeBatch, ChangeTracker};
