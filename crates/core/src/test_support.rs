// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Builders and fixtures shared by other crates' tests.

use crate::config::{DriverDef, OrchestrationConfig, WorkerDef};
use crate::state::{AgentRole, CollabState, Task, TaskStatus};

/// A two-worker orchestration: driver `cursor`, workers `claude-code`
/// and `codex` (one instance each).
pub fn sample_config() -> OrchestrationConfig {
    OrchestrationConfig {
        driver: DriverDef { name: "cursor".into(), display_name: "Cursor".into() },
        workers: vec![
            WorkerDef {
                agent_type: "claude-code".into(),
                command: vec!["claude".into(), "--workspace".into(), "{workspace}".into()],
                count: 1,
                capabilities: vec!["code".into()],
                max_tasks: 2,
                env: Default::default(),
                inherit_env: Vec::new(),
            },
            WorkerDef {
                agent_type: "codex".into(),
                command: vec!["codex".into(), "exec".into(), "--cd".into(), "{workspace}".into()],
                count: 1,
                capabilities: vec!["code".into(), "review".into()],
                max_tasks: 1,
                env: Default::default(),
                inherit_env: Vec::new(),
            },
        ],
        ..blank_config()
    }
}

/// A config with a driver and no workers.
pub fn blank_config() -> OrchestrationConfig {
    OrchestrationConfig {
        driver: DriverDef { name: "cursor".into(), display_name: String::new() },
        workers: Vec::new(),
        assignment: Default::default(),
        spawn: Default::default(),
        watchdog: Default::default(),
        notifier: Default::default(),
        retention: Default::default(),
        worktrees: Default::default(),
        mcp_url: None,
        dashboard_url: None,
        workspace: None,
    }
}

/// A state seeded from [`sample_config`].
pub fn seeded_state() -> CollabState {
    let mut state = CollabState::new();
    state.seed_instances(&sample_config());
    state
}

/// A pending task with sensible defaults.
pub fn task(id: u64, title: &str, assigned_to: &str, now_ms: u64) -> Task {
    Task {
        id,
        title: title.into(),
        description: String::new(),
        status: TaskStatus::Pending,
        assigned_to: assigned_to.into(),
        created_by: "cursor".into(),
        created_at: now_ms,
        updated_at: now_ms,
        priority: crate::state::DEFAULT_PRIORITY,
        dependencies: Vec::new(),
        blocked_by: String::new(),
        context_id: None,
        expected_duration_secs: 0,
        progress_description: String::new(),
        progress_percent: 0,
        last_progress_at: None,
        result_summary: String::new(),
        worker_type: None,
        required_capabilities: Vec::new(),
    }
}

/// Role of a seeded instance, for assertions.
pub fn role_of(state: &CollabState, id: &str) -> Option<AgentRole> {
    state.instances.get(id).map(|i| i.role)
}
