// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! sw-adapters: the coordinator's edges.
//!
//! Subprocess plumbing for worker CLIs, assistant-CLI MCP registration,
//! git worktree isolation, and the workspace path policy. Everything here
//! is reachable only through narrow interfaces so the engine stays
//! testable without touching the host system.

pub mod cli_config;
pub mod env;
pub mod process;
pub mod workspace;
pub mod worktree;

pub use cli_config::{AssistantCli, CliConfigError, McpTarget};
pub use env::build_worker_env;
pub use process::{
    run_with_timeout, run_worker_process, OutputTail, ProcessInfo, SpawnError, SpawnSpec,
    OUTPUT_TAIL_BYTES,
};
pub use workspace::{PolicyError, WorkspacePolicy};
pub use worktree::{GitWorktreeManager, WorktreeError, WorktreeManager};
