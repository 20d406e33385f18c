// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Work contexts: shared scope metadata attached to tasks.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Shared scope metadata (files, constraints, notes) attached to a task
/// and inherited by subtasks via `parent_ctx_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkContext {
    pub id: String,
    pub task_id: u64,
    #[serde(default)]
    pub relevant_files: Vec<String>,
    #[serde(default)]
    pub background: String,
    #[serde(default)]
    pub constraints: Vec<String>,
    #[serde(default)]
    pub shared_notes: HashMap<String, String>,
    #[serde(default)]
    pub parent_ctx_id: Option<String>,
}

impl WorkContext {
    /// Canonical id for the context of a given task.
    pub fn id_for_task(task_id: u64) -> String {
        format!("ctx-{task_id}")
    }
}

/// A free-form note shared between agents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    /// Monotone id assigned from `CollabState::next_note_id`.
    pub id: u64,
    pub author: String,
    pub content: String,
    #[serde(default)]
    pub task_id: Option<u64>,
    pub created_at: u64,
}
