// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plans: structured multi-item work outlines.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    Active,
    Completed,
    Abandoned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanItemStatus {
    Pending,
    InProgress,
    Completed,
    Blocked,
}

impl PlanItemStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(PlanItemStatus::Pending),
            "in_progress" => Some(PlanItemStatus::InProgress),
            "completed" => Some(PlanItemStatus::Completed),
            "blocked" => Some(PlanItemStatus::Blocked),
            _ => None,
        }
    }
}

/// One item inside a plan. `id` is unique within its plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanItem {
    pub id: u32,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub status: PlanItemStatus,
    /// Agent name, or empty for unassigned.
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub dependencies: Vec<u32>,
    #[serde(default)]
    pub blockers: Vec<String>,
    #[serde(default)]
    pub notes: Vec<String>,
    #[serde(default)]
    pub priority: u8,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub acceptance: Vec<String>,
    #[serde(default)]
    pub constraints: Vec<String>,
}

/// A structured work outline. `CollabState::active_plan_id` points to at
/// most one plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub goal: String,
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    pub items: Vec<PlanItem>,
    pub created_by: String,
    pub created_at: u64,
    pub updated_at: u64,
    pub status: PlanStatus,
}

impl Plan {
    pub fn item_mut(&mut self, item_id: u32) -> Option<&mut PlanItem> {
        self.items.iter_mut().find(|i| i.id == item_id)
    }

    /// First pending item owned by `agent` or unassigned.
    pub fn next_item_for(&self, agent: &str) -> Option<&PlanItem> {
        self.items
            .iter()
            .find(|i| i.status == PlanItemStatus::Pending && (i.owner == agent || i.owner.is_empty()))
    }
}
