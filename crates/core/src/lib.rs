// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! sw-core: state model and configuration for the Stringwork coordinator

pub mod clock;
pub mod config;
pub mod state;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use clock::{Clock, FakeClock, SystemClock};
pub use config::{
    AssignStrategy, ConfigError, DriverDef, NotifierConfig, OrchestrationConfig, RetentionPolicy,
    SpawnPolicy, WatchdogConfig, WorkerDef, WorktreeStrategy,
};
pub use state::{
    is_reserved_name, AgentContext, AgentInstance, AgentRole, CollabState, FileLock, InstanceMatch,
    InstanceStatus, Message, Note, Plan, PlanItem, PlanItemStatus, PlanStatus, Presence,
    PresenceStatus, RegisteredAgent, Task, TaskStatus, WorkContext, BROADCAST, CLAIMABLE,
    DEFAULT_LOCK_MINUTES, DEFAULT_PRIORITY, MAX_LOCK_MINUTES, RESERVED_NAMES, SYSTEM_SENDER,
};
