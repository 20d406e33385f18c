// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tasks and their status machine.

use serde::{Deserialize, Serialize};

/// Task lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Blocked,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Blocked => "blocked",
            TaskStatus::Cancelled => "cancelled",
        }
    }

    /// Parse a status argument from a tool call.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(TaskStatus::Pending),
            "in_progress" => Some(TaskStatus::InProgress),
            "completed" => Some(TaskStatus::Completed),
            "blocked" => Some(TaskStatus::Blocked),
            "cancelled" => Some(TaskStatus::Cancelled),
            _ => None,
        }
    }
}

/// Default priority: normal (1 is highest, 4 lowest).
pub const DEFAULT_PRIORITY: u8 = 3;

fn default_priority() -> u8 {
    DEFAULT_PRIORITY
}

/// A unit of work created by the driver and executed by a worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Monotone id assigned from `CollabState::next_task_id`.
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub status: TaskStatus,
    /// Agent name, agent type, or `"any"`.
    #[serde(default)]
    pub assigned_to: String,
    pub created_by: String,
    pub created_at: u64,
    /// Invariant: `updated_at >= created_at`.
    pub updated_at: u64,
    #[serde(default = "default_priority")]
    pub priority: u8,
    /// Ids of tasks that must be `completed` before this one may start.
    #[serde(default)]
    pub dependencies: Vec<u64>,
    /// Free-form blocker description; non-empty forces `status = blocked`.
    #[serde(default)]
    pub blocked_by: String,
    /// Linked `WorkContext` id, when context fields were supplied at creation.
    #[serde(default)]
    pub context_id: Option<String>,
    #[serde(default)]
    pub expected_duration_secs: u64,
    #[serde(default)]
    pub progress_description: String,
    /// Clamped to 0..=100.
    #[serde(default)]
    pub progress_percent: u8,
    #[serde(default)]
    pub last_progress_at: Option<u64>,
    #[serde(default)]
    pub result_summary: String,
    /// Pin assignment to a specific agent type.
    #[serde(default)]
    pub worker_type: Option<String>,
    /// Capabilities a candidate instance must cover.
    #[serde(default)]
    pub required_capabilities: Vec<String>,
}

impl Task {
    /// Whether `agent` (an instance id or agent type) can pick this task up.
    pub fn assignable_to(&self, instance_id: &str, agent_type: &str) -> bool {
        self.assigned_to == instance_id
            || self.assigned_to == agent_type
            || self.assigned_to == super::message::CLAIMABLE
    }
}
