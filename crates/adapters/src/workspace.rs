// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace path policy.
//!
//! Tracks the active workspace root and normalizes lock paths before they
//! reach shared state. The root follows the driver's presence: when an
//! agent reports a new workspace, the daemon updates the policy after the
//! commit.

use parking_lot::RwLock;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("path escapes the workspace: {0}")]
    Escapes(String),

    #[error("empty path")]
    Empty,
}

pub struct WorkspacePolicy {
    root: RwLock<PathBuf>,
}

impl WorkspacePolicy {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: RwLock::new(root.into()) }
    }

    pub fn root(&self) -> PathBuf {
        self.root.read().clone()
    }

    pub fn set_root(&self, root: impl Into<PathBuf>) {
        let root = root.into();
        tracing::info!(root = %root.display(), "workspace root updated");
        *self.root.write() = root;
    }

    /// Normalize a lock path to a workspace-relative form.
    ///
    /// Lexically cleans `.` and `..` segments and rejects anything that
    /// climbs out of the workspace. Absolute paths are accepted when they
    /// sit under the current root and are stored relative to it.
    pub fn normalize(&self, raw: &str) -> Result<String, PolicyError> {
        if raw.trim().is_empty() {
            return Err(PolicyError::Empty);
        }
        let path = Path::new(raw.trim());
        let relative = if path.is_absolute() {
            let root = self.root();
            match path.strip_prefix(&root) {
                Ok(rel) => rel.to_path_buf(),
                Err(_) => return Err(PolicyError::Escapes(raw.to_string())),
            }
        } else {
            path.to_path_buf()
        };

        let mut clean = PathBuf::new();
        for component in relative.components() {
            match component {
                Component::Normal(part) => clean.push(part),
                Component::CurDir => {}
                Component::ParentDir => {
                    if !clean.pop() {
                        return Err(PolicyError::Escapes(raw.to_string()));
                    }
                }
                Component::RootDir | Component::Prefix(_) => {}
            }
        }
        if clean.as_os_str().is_empty() {
            return Err(PolicyError::Empty);
        }
        Ok(clean.to_string_lossy().replace('\\', "/"))
    }
}

#[cfg(test)]
#[path = "workspace_tests.rs"]
mod tests;
