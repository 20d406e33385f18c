// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent instances: the runtime identity of a driver or worker.

use serde::{Deserialize, Serialize};

/// The two agent roles. At most one driver per deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    Driver,
    Worker,
}

/// Instance availability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    Idle,
    Busy,
    Offline,
}

fn default_max_tasks() -> usize {
    1
}

/// A uniquely named runtime of an agent type.
///
/// Workers of the same type may have multiple instances, named
/// `<type>-<n>` (1-based) when more than one is configured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentInstance {
    pub instance_id: String,
    pub agent_type: String,
    pub role: AgentRole,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default = "default_max_tasks")]
    pub max_tasks: usize,
    pub status: InstanceStatus,
    /// Invariant: `status == Busy ⇔ !current_tasks.is_empty()`.
    #[serde(default)]
    pub current_tasks: Vec<u64>,
    #[serde(default)]
    pub last_heartbeat: Option<u64>,
    #[serde(default)]
    pub progress: String,
    #[serde(default)]
    pub progress_step: u32,
    #[serde(default)]
    pub progress_total_steps: u32,
    #[serde(default)]
    pub progress_updated_at: Option<u64>,
}

impl AgentInstance {
    pub fn new(instance_id: impl Into<String>, agent_type: impl Into<String>, role: AgentRole) -> Self {
        Self {
            instance_id: instance_id.into(),
            agent_type: agent_type.into(),
            role,
            capabilities: Vec::new(),
            max_tasks: 1,
            status: InstanceStatus::Idle,
            current_tasks: Vec::new(),
            last_heartbeat: None,
            progress: String::new(),
            progress_step: 0,
            progress_total_steps: 0,
            progress_updated_at: None,
        }
    }

    /// Add a task id and flip to busy. Idempotent per task id.
    pub fn attach_task(&mut self, task_id: u64) {
        if !self.current_tasks.contains(&task_id) {
            self.current_tasks.push(task_id);
        }
        self.status = InstanceStatus::Busy;
    }

    /// Remove a task id; flip to idle when nothing remains.
    pub fn detach_task(&mut self, task_id: u64) {
        self.current_tasks.retain(|id| *id != task_id);
        if self.current_tasks.is_empty() && self.status == InstanceStatus::Busy {
            self.status = InstanceStatus::Idle;
        }
    }

    pub fn has_capacity(&self) -> bool {
        self.current_tasks.len() < self.max_tasks
    }

    /// Whether this instance covers every capability in `required`.
    pub fn covers(&self, required: &[String]) -> bool {
        required.iter().all(|cap| self.capabilities.contains(cap))
    }
}
