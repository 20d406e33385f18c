// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cross-process spawn lockfiles.
//!
//! Two coordinator processes watching the same state directory must not
//! launch the same worker twice. An `O_CREAT|O_EXCL` lockfile in the
//! system temp dir arbitrates; a file older than the stale threshold is
//! treated as debris from a crashed coordinator and replaced.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

/// Lockfiles older than this are stale.
pub const STALE_AFTER: Duration = Duration::from_secs(300);

/// Held while a spawn attempt (including retries) is in flight; the file
/// is removed on drop.
#[derive(Debug)]
pub struct SpawnLock {
    path: PathBuf,
}

impl SpawnLock {
    /// Lockfile path for an instance id, with unsafe characters replaced.
    pub fn path_for(instance_id: &str) -> PathBuf {
        let safe: String = instance_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '-' })
            .collect();
        std::env::temp_dir().join(format!("stringwork-worker-{safe}.lock"))
    }

    /// Try to take the lock. `None` means another process holds a fresh
    /// lock and this spawn attempt should be skipped.
    pub fn acquire(instance_id: &str) -> Option<Self> {
        let path = Self::path_for(instance_id);
        for attempt in 0..2 {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    let _ = write!(file, "{}", std::process::id());
                    return Some(Self { path });
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists && attempt == 0 => {
                    if is_stale(&path) {
                        tracing::warn!(path = %path.display(), "replacing stale spawn lockfile");
                        let _ = std::fs::remove_file(&path);
                        continue;
                    }
                    return None;
                }
                Err(_) => return None,
            }
        }
        None
    }
}

fn is_stale(path: &std::path::Path) -> bool {
    let Ok(meta) = std::fs::metadata(path) else {
        return false;
    };
    let Ok(modified) = meta.modified() else {
        return false;
    };
    SystemTime::now().duration_since(modified).map(|age| age > STALE_AFTER).unwrap_or(false)
}

impl Drop for SpawnLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

#[cfg(test)]
#[path = "lockfile_tests.rs"]
mod tests;
