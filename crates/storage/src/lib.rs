// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! sw-storage: durable bytes for the Stringwork coordinator.
//!
//! The repository port owns persistence of the whole aggregate; the signal
//! file carries the monotone revision other processes watch for changes.

mod repository;
mod signal;
mod snapshot;

pub use repository::{StateRepository, StorageError};
pub use signal::SignalFile;
pub use snapshot::JsonSnapshotRepository;

#[cfg(any(test, feature = "test-support"))]
pub use repository::MemoryRepository;
