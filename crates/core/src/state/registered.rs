// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Registered agents and per-agent read cursors.

use serde::{Deserialize, Serialize};

/// An agent that announced itself by name, independent of any configured
/// instance. Reserved names (`all`, `any`, `system`) are refused.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisteredAgent {
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub workspace: String,
    #[serde(default)]
    pub project: String,
    pub registered_at: u64,
    pub last_seen: u64,
}

/// Read cursor per agent: what the agent has already checked.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentContext {
    pub agent: String,
    #[serde(default)]
    pub last_checked_msg_id: u64,
    #[serde(default)]
    pub last_checked_task_id: u64,
    #[serde(default)]
    pub last_check_time: u64,
}
