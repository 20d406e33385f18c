// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Advisory file locks shared between agents.

use serde::{Deserialize, Serialize};

/// Default lock duration in minutes, and the hard cap.
pub const DEFAULT_LOCK_MINUTES: u64 = 30;
pub const MAX_LOCK_MINUTES: u64 = 120;

/// An advisory lock on a workspace path.
///
/// `path` is normalized by the workspace policy before storage. Expired
/// locks are evicted implicitly by any read or write that visits the map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileLock {
    pub path: String,
    pub locked_by: String,
    #[serde(default)]
    pub reason: String,
    pub locked_at: u64,
    pub expires_at: u64,
}

impl FileLock {
    pub fn expired(&self, now_ms: u64) -> bool {
        self.expires_at <= now_ms
    }
}
