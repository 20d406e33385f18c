// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! sw-engine: the Stringwork orchestration engine.
//!
//! The state service serializes every mutation of the shared aggregate;
//! the notifier turns committed writes into wake-ups; the supervisor
//! keeps worker subprocesses running against pending work; the watchdog
//! heals whatever crashes leave behind.

#[cfg(test)]
mod test_helpers;

pub mod assign;
pub mod error;
pub mod liveness;
pub mod notifier;
pub mod registry;
pub mod service;
pub mod supervisor;
pub mod watchdog;

pub use assign::{apply_assignment, pick_instance};
pub use error::ServiceError;
pub use liveness::is_agent_alive;
pub use notifier::{Notifier, PushFn, SpawnChecker, PAIR_UPDATE_METHOD};
pub use registry::SessionRegistry;
pub use service::{StateService, Triggerable};
pub use supervisor::{
    classify, format_duration, Backoff, FailureClass, SpawnLock, WorkerCanceller, WorkerSupervisor,
    MCP_SERVER_NAME,
};
pub use watchdog::Watchdog;
