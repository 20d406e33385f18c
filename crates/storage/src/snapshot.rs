// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Snapshot persistence: the whole aggregate as one compressed JSON
//! document, written atomically with rotating backups.

use crate::repository::{StateRepository, StorageError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use sw_core::CollabState;

/// Current snapshot schema version
const CURRENT_SNAPSHOT_VERSION: u32 = 1;

/// How many rotated backups survive alongside the live snapshot.
const BACKUP_SLOTS: u32 = 3;

/// A snapshot of the aggregate at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Snapshot {
    /// Schema version for migrations
    #[serde(rename = "v")]
    version: u32,
    state: CollabState,
    created_at: DateTime<Utc>,
}

/// Repository backend storing a zstd-compressed JSON snapshot.
///
/// Saves go through a temp file and rename so a crash mid-write leaves
/// the previous snapshot intact; the previous file rotates into `.bak`.
pub struct JsonSnapshotRepository {
    path: PathBuf,
}

impl JsonSnapshotRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateRepository for JsonSnapshotRepository {
    fn load(&self) -> Result<CollabState, StorageError> {
        if !self.path.exists() {
            // First boot: nothing persisted yet.
            return Ok(CollabState::new());
        }
        let bytes = fs::read(&self.path)?;
        let decompressed = zstd::decode_all(bytes.as_slice())?;
        let snapshot: Snapshot = serde_json::from_slice(&decompressed)?;
        if snapshot.version > CURRENT_SNAPSHOT_VERSION {
            return Err(StorageError::Corrupt(format!(
                "snapshot version {} is newer than supported {}",
                snapshot.version, CURRENT_SNAPSHOT_VERSION
            )));
        }
        Ok(snapshot.state)
    }

    fn save(&self, state: &CollabState) -> Result<(), StorageError> {
        let snapshot = Snapshot {
            version: CURRENT_SNAPSHOT_VERSION,
            state: state.clone(),
            created_at: Utc::now(),
        };
        let json = serde_json::to_vec(&snapshot)?;
        let compressed = zstd::encode_all(json.as_slice(), 3)?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, &compressed)?;
        if self.path.exists() {
            let _ = fs::rename(&self.path, shift_backups(&self.path));
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// Backup slot `n` (1-based, newest first): `.bak`, then `.bak.2` and up.
fn backup_slot(path: &Path, n: u32) -> PathBuf {
    match n {
        1 => path.with_extension("bak"),
        n => path.with_extension(format!("bak.{n}")),
    }
}

/// Age every backup by one slot and return the freed newest slot.
///
/// Whatever sat in slot [`BACKUP_SLOTS`] falls off the end; each younger
/// backup moves one slot up. A failed rename leaves a gap in the chain
/// and nothing more.
fn shift_backups(path: &Path) -> PathBuf {
    let _ = fs::remove_file(backup_slot(path, BACKUP_SLOTS));
    for n in (2..=BACKUP_SLOTS).rev() {
        let younger = backup_slot(path, n - 1);
        if younger.exists() {
            let _ = fs::rename(&younger, backup_slot(path, n));
        }
    }
    backup_slot(path, 1)
}

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod tests;
