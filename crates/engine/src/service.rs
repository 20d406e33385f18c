// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The state service: the single writer of the shared aggregate.
//!
//! Every mutation funnels through [`StateService::run`], which holds an
//! exclusive lock for `load → normalize → mutate → save → touch signal →
//! trigger notifier`. Readers use [`StateService::query`] under the same
//! lock, so a mid-mutation snapshot is impossible. No caller may retain a
//! reference into the state beyond its closure.

use crate::error::ServiceError;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use sw_core::{Clock, CollabState, OrchestrationConfig};
use sw_storage::{SignalFile, StateRepository};

/// Cross-wiring hook so a commit can poke the notifier without the
/// service depending on it.
pub trait Triggerable: Send + Sync {
    fn trigger(&self);
}

pub struct StateService<C: Clock> {
    repo: Arc<dyn StateRepository>,
    signal: SignalFile,
    config: Arc<OrchestrationConfig>,
    clock: C,
    lock: Mutex<()>,
    notifier: RwLock<Option<Arc<dyn Triggerable>>>,
}

impl<C: Clock> StateService<C> {
    pub fn new(
        repo: Arc<dyn StateRepository>,
        signal: SignalFile,
        config: Arc<OrchestrationConfig>,
        clock: C,
    ) -> Self {
        Self { repo, signal, config, clock, lock: Mutex::new(()), notifier: RwLock::new(None) }
    }

    /// Attach the notifier after construction (service and notifier
    /// reference each other only through this hook).
    pub fn attach_notifier(&self, notifier: Arc<dyn Triggerable>) {
        *self.notifier.write() = Some(notifier);
    }

    pub fn config(&self) -> &OrchestrationConfig {
        &self.config
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Run a mutation. On success the new state is saved, the signal file
    /// advances, and the notifier fires. Errors from `fn` abort the commit
    /// with no partial write.
    pub fn run<T>(
        &self,
        f: impl FnOnce(&mut CollabState) -> Result<T, ServiceError>,
    ) -> Result<T, ServiceError> {
        let _guard = self.lock.lock();
        let mut state = self.repo.load()?;
        state.normalize();
        state.seed_instances(&self.config);

        let out = f(&mut state)?;

        self.repo.save(&state)?;
        if let Err(e) = self.signal.touch(self.clock.epoch_nanos()) {
            // The commit is durable; a missing signal only delays pickup
            // until the next poll.
            tracing::warn!(error = %e, "failed to touch signal file");
        }
        let notifier = self.notifier.read().clone();
        if let Some(notifier) = notifier {
            notifier.trigger();
        }
        Ok(out)
    }

    /// Run a read. No save, no signal write, no trigger. A failed load
    /// falls back to an empty state with a logged warning.
    pub fn query<T>(&self, f: impl FnOnce(&CollabState) -> T) -> T {
        let _guard = self.lock.lock();
        let mut state = match self.repo.load() {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!(error = %e, "state load failed, querying empty state");
                CollabState::new()
            }
        };
        state.normalize();
        state.seed_instances(&self.config);
        f(&state)
    }
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod tests;
