// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for engine tests.

use crate::registry::SessionRegistry;
use crate::service::StateService;
use std::sync::Arc;
use sw_core::test_support::sample_config;
use sw_core::{FakeClock, OrchestrationConfig};
use sw_storage::{MemoryRepository, SignalFile};

pub(crate) struct Harness {
    pub service: Arc<StateService<FakeClock>>,
    pub registry: Arc<SessionRegistry<FakeClock>>,
    pub repo: Arc<MemoryRepository>,
    pub clock: FakeClock,
    pub signal: SignalFile,
    // Held for the signal file's lifetime.
    #[allow(dead_code)]
    pub dir: tempfile::TempDir,
}

pub(crate) fn harness() -> Harness {
    harness_with(sample_config())
}

pub(crate) fn harness_with(config: OrchestrationConfig) -> Harness {
    let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
    let signal = SignalFile::new(dir.path().join("state.signal"));
    let clock = FakeClock::new();
    let repo = Arc::new(MemoryRepository::default());
    let service = Arc::new(StateService::new(
        Arc::clone(&repo) as Arc<dyn sw_storage::StateRepository>,
        signal.clone(),
        Arc::new(config),
        clock.clone(),
    ));
    let registry = Arc::new(SessionRegistry::new(clock.clone()));
    Harness { service, registry, repo, clock, signal, dir }
}
