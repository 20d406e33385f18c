// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! MCP registration for recognized assistant CLIs.
//!
//! Each supported CLI stores MCP server entries in its own config file.
//! Registration is idempotent: when the on-disk entry already matches the
//! target exactly (URL comparison is path-sensitive; `/mcp` and `/sse`
//! are different endpoints), nothing runs. Otherwise the CLI's own
//! `mcp remove` / `mcp add` subcommands rewrite the entry, which keeps
//! the file in whatever shape that CLI expects. User config files are
//! inherently racy with other tools; re-registration tolerates that.

mod claude;
mod codex;
mod gemini;

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Deadline for one `mcp remove` / `mcp add` invocation.
const REGISTER_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Error)]
pub enum CliConfigError {
    #[error("no home directory")]
    NoHome,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{cli} registration failed: {message}")]
    RegistrationFailed { cli: &'static str, message: String },
}

/// What the worker CLI should connect to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum McpTarget {
    Http { url: String },
    Stdio { command: String, args: Vec<String>, env: HashMap<String, String> },
}

/// A CLI whose MCP configuration we know how to manage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssistantCli {
    Claude,
    Codex,
    Gemini,
}

impl AssistantCli {
    /// Recognize a CLI from the first argv token of a worker command.
    pub fn detect(argv0: &str) -> Option<Self> {
        let stem = std::path::Path::new(argv0)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(argv0);
        if stem.contains("claude") {
            Some(AssistantCli::Claude)
        } else if stem.contains("codex") {
            Some(AssistantCli::Codex)
        } else if stem.contains("gemini") {
            Some(AssistantCli::Gemini)
        } else {
            None
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AssistantCli::Claude => "claude",
            AssistantCli::Codex => "codex",
            AssistantCli::Gemini => "gemini",
        }
    }

    /// Path of this CLI's config file under `home`.
    pub fn config_path(&self, home: &std::path::Path) -> PathBuf {
        match self {
            AssistantCli::Claude => home.join(".claude.json"),
            AssistantCli::Codex => home.join(".codex").join("config.toml"),
            AssistantCli::Gemini => home.join(".gemini").join("settings.json"),
        }
    }

    /// Whether the on-disk config already names `server_name` with exactly
    /// this target.
    pub fn matches_existing(
        &self,
        home: &std::path::Path,
        server_name: &str,
        target: &McpTarget,
    ) -> bool {
        let path = self.config_path(home);
        match self {
            AssistantCli::Claude => claude::matches(&path, server_name, target),
            AssistantCli::Codex => codex::matches(&path, server_name, target),
            AssistantCli::Gemini => gemini::matches(&path, server_name, target),
        }
    }

    /// Make sure `server_name` is registered with this CLI.
    ///
    /// Returns `true` when a registration actually ran, `false` when the
    /// existing config already matched.
    pub async fn ensure_registered(
        &self,
        server_name: &str,
        target: &McpTarget,
    ) -> Result<bool, CliConfigError> {
        let home = dirs::home_dir().ok_or(CliConfigError::NoHome)?;
        if self.matches_existing(&home, server_name, target) {
            tracing::debug!(cli = self.name(), server = server_name, "mcp config already current");
            return Ok(false);
        }
        tracing::info!(cli = self.name(), server = server_name, "registering mcp server");
        match self {
            AssistantCli::Claude => claude::register(server_name, target).await?,
            AssistantCli::Codex => codex::register(server_name, target).await?,
            AssistantCli::Gemini => gemini::register(server_name, target).await?,
        }
        Ok(true)
    }
}

/// Run one registration subcommand, surfacing stderr on failure.
pub(crate) async fn run_cli(
    cli: &'static str,
    args: &[String],
    required: bool,
) -> Result<(), CliConfigError> {
    let mut cmd = tokio::process::Command::new(cli);
    cmd.args(args);
    match crate::process::run_with_timeout(cmd, REGISTER_TIMEOUT, cli).await {
        Ok(output) if output.status.success() => Ok(()),
        Ok(output) => {
            if required {
                Err(CliConfigError::RegistrationFailed {
                    cli,
                    message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
                })
            } else {
                // `mcp remove` of a missing entry is expected to fail.
                Ok(())
            }
        }
        Err(e) => {
            if required {
                Err(CliConfigError::RegistrationFailed { cli, message: e.to_string() })
            } else {
                Ok(())
            }
        }
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
