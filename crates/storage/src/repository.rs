// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The repository port: load and save the whole aggregate.

use sw_core::CollabState;
use thiserror::Error;

/// Errors from repository backends.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("corrupt snapshot: {0}")]
    Corrupt(String),
}

/// Two operations own all durable bytes. Backends are swappable; the
/// state service is the only caller.
pub trait StateRepository: Send + Sync {
    fn load(&self) -> Result<CollabState, StorageError>;
    fn save(&self, state: &CollabState) -> Result<(), StorageError>;
}

/// In-memory repository for tests.
#[cfg(any(test, feature = "test-support"))]
pub struct MemoryRepository {
    state: parking_lot::Mutex<CollabState>,
    fail_next_save: parking_lot::Mutex<bool>,
    fail_load: parking_lot::Mutex<bool>,
}

#[cfg(any(test, feature = "test-support"))]
impl MemoryRepository {
    pub fn new(initial: CollabState) -> Self {
        Self {
            state: parking_lot::Mutex::new(initial),
            fail_next_save: parking_lot::Mutex::new(false),
            fail_load: parking_lot::Mutex::new(false),
        }
    }

    /// Make the next `save` fail with an IO error.
    pub fn fail_next_save(&self) {
        *self.fail_next_save.lock() = true;
    }

    /// Make every `load` fail until cleared.
    pub fn set_fail_load(&self, fail: bool) {
        *self.fail_load.lock() = fail;
    }

    /// Snapshot of the stored state, for assertions.
    pub fn stored(&self) -> CollabState {
        self.state.lock().clone()
    }
}

#[cfg(any(test, feature = "test-support"))]
impl Default for MemoryRepository {
    fn default() -> Self {
        Self::new(CollabState::new())
    }
}

#[cfg(any(test, feature = "test-support"))]
impl StateRepository for MemoryRepository {
    fn load(&self) -> Result<CollabState, StorageError> {
        if *self.fail_load.lock() {
            return Err(StorageError::Corrupt("load failure injected".into()));
        }
        Ok(self.state.lock().clone())
    }

    fn save(&self, state: &CollabState) -> Result<(), StorageError> {
        let mut fail = self.fail_next_save.lock();
        if *fail {
            *fail = false;
            return Err(StorageError::Io(std::io::Error::other("save failure injected")));
        }
        *self.state.lock() = state.clone();
        Ok(())
    }
}
