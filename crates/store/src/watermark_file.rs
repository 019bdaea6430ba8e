// crates/store/src/watermark_file.rs
//! Durable watermark persistence
//!
//! The watermark is stored as a small JSON file next to the local database
//! and written atomically (temp file + rename) so a crash mid-write can
//! never leave a corrupted value behind.

use crate::error::{StoreError, StoreResult};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tether_core::Watermark;

#[derive(Serialize, Deserialize)]
struct WatermarkRecord {
    version: u32,
    watermark: Watermark,
}

const WATERMARK_FILE_VERSION: u32 = 1;

/// File-backed watermark storage
pub struct WatermarkFile {
    path: PathBuf,
}

impl WatermarkFile {
    /// Creates a handler for the given file path
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the persisted watermark
    ///
    /// A missing file means the device has never synced and yields
    /// [`Watermark::origin`]. An unreadable or malformed file is an error,
    /// not a silent reset, because resetting would re-send everything.
    pub fn load(&self) -> StoreResult<Watermark> {
        if !self.path.exists() {
            log::info!(
                "No watermark file at {}, starting from origin",
                self.path.display()
            );
            return Ok(Watermark::origin());
        }

        let contents =
            std::fs::read_to_string(&self.path).map_err(|e| StoreError::WatermarkRead {
                path: self.path.clone(),
                source: e,
            })?;

        let record: WatermarkRecord =
            serde_json::from_str(&contents).map_err(|e| StoreError::WatermarkCorrupted {
                path: self.path.clone(),
                message: e.to_string(),
            })?;

        if record.version != WATERMARK_FILE_VERSION {
            return Err(StoreError::WatermarkCorrupted {
                path: self.path.clone(),
                message: format!("unsupported file version {}", record.version),
            });
        }

        Ok(record.watermark)
    }

    /// Persists the watermark atomically
    pub fn save(&self, watermark: &Watermark) -> StoreResult<()> {
        let record = WatermarkRecord {
            version: WATERMARK_FILE_VERSION,
            watermark: *watermark,
        };
        let json = serde_json::to_string(&record).map_err(|e| StoreError::WatermarkWrite {
            path: self.path.clone(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
        })?;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::WatermarkWrite {
                path: self.path.clone(),
                source: e,
            })?;
        }

        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let mut temp = NamedTempFile::new_in(dir).map_err(|e| StoreError::WatermarkWrite {
            path: self.path.clone(),
            source: e,
        })?;
        temp.write_all(json.as_bytes())
            .map_err(|e| StoreError::WatermarkWrite {
                path: self.path.clone(),
                source: e,
            })?;
        temp.persist(&self.path)
            .map_err(|e| StoreError::WatermarkWrite {
                path: self.path.clone(),
                source: e.error,
            })?;

        log::debug!("Watermark persisted: {watermark}");
        Ok(())
    }
}
