// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Git worktree isolation for spawned workers.
//!
//! Workers can run in a per-instance worktree so parallel agents do not
//! trample one checkout. The supervisor only sees the narrow
//! [`WorktreeManager`] interface; failures fall back to the plain
//! workspace.

use crate::process::run_with_timeout;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const GIT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum WorktreeError {
    #[error("git failed: {0}")]
    Git(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Narrow interface the supervisor spawns through.
#[async_trait]
pub trait WorktreeManager: Send + Sync {
    /// Produce a per-instance worktree under `workspace`.
    async fn acquire(&self, instance_id: &str, workspace: &Path) -> Result<PathBuf, WorktreeError>;

    /// Remove whatever `acquire` produced for `instance_id`, if anything.
    async fn cleanup(&self, instance_id: &str);
}

/// `git worktree add` under `<workspace>/.stringwork/worktrees/<instance>`.
pub struct GitWorktreeManager {
    created: Mutex<HashMap<String, (PathBuf, PathBuf)>>,
}

impl GitWorktreeManager {
    pub fn new() -> Self {
        Self { created: Mutex::new(HashMap::new()) }
    }
}

impl Default for GitWorktreeManager {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WorktreeManager for GitWorktreeManager {
    async fn acquire(&self, instance_id: &str, workspace: &Path) -> Result<PathBuf, WorktreeError> {
        let dir = workspace.join(".stringwork").join("worktrees").join(instance_id);
        if dir.join(".git").exists() {
            return Ok(dir);
        }
        if let Some(parent) = dir.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut cmd = tokio::process::Command::new("git");
        cmd.arg("-C")
            .arg(workspace)
            .args(["worktree", "add", "--detach"])
            .arg(&dir);
        let output = run_with_timeout(cmd, GIT_TIMEOUT, "git worktree add").await?;
        if !output.status.success() {
            return Err(WorktreeError::Git(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        self.created
            .lock()
            .insert(instance_id.to_string(), (workspace.to_path_buf(), dir.clone()));
        Ok(dir)
    }

    async fn cleanup(&self, instance_id: &str) {
        let Some((workspace, dir)) = self.created.lock().remove(instance_id) else {
            return;
        };
        let mut cmd = tokio::process::Command::new("git");
        cmd.arg("-C")
            .arg(&workspace)
            .args(["worktree", "remove", "--force"])
            .arg(&dir);
        match run_with_timeout(cmd, GIT_TIMEOUT, "git worktree remove").await {
            Ok(output) if output.status.success() => {}
            _ => {
                tracing::warn!(instance = instance_id, dir = %dir.display(), "worktree remove failed, deleting directory");
                let _ = std::fs::remove_dir_all(&dir);
            }
        }
    }
}

#[cfg(test)]
#[path = "worktree_tests.rs"]
mod tests;
