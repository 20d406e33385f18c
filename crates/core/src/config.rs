// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Orchestration configuration: the driver, the worker fleet, and the
//! timing knobs of the background components. Loaded from TOML.

use crate::state::is_reserved_name;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Task assignment strategy.
///
/// `round_robin` is accepted for compatibility and behaves as
/// `least_loaded`; no rotation index is persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignStrategy {
    #[default]
    CapabilityMatch,
    LeastLoaded,
    RoundRobin,
}

/// When worker worktrees are cleaned up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorktreeStrategy {
    #[default]
    Disabled,
    OnExit,
    OnCancel,
}

/// The driver agent (IDE-resident; never spawned by the supervisor).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverDef {
    pub name: String,
    #[serde(default)]
    pub display_name: String,
}

fn default_count() -> usize {
    1
}

fn default_max_tasks() -> usize {
    1
}

/// One worker type: the CLI to spawn and how many instances to run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerDef {
    /// Agent type, e.g. `claude-code`.
    #[serde(rename = "type")]
    pub agent_type: String,
    /// Argv template; `{workspace}` and `{agent}` tokens are replaced.
    pub command: Vec<String>,
    #[serde(default = "default_count")]
    pub count: usize,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default = "default_max_tasks")]
    pub max_tasks: usize,
    /// Worker-specific environment overlay; values support `${VAR}`
    /// expansion from the parent environment.
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Glob patterns selecting which parent variables to inherit.
    /// Empty = inherit everything; `["none"]` = clean environment.
    #[serde(default)]
    pub inherit_env: Vec<String>,
}

impl WorkerDef {
    /// Instance ids for this worker type: the bare type for a single
    /// instance, `<type>-<n>` (1-based) for multi-instance workers.
    pub fn instance_ids(&self) -> Vec<String> {
        if self.count <= 1 {
            vec![self.agent_type.clone()]
        } else {
            (1..=self.count).map(|n| format!("{}-{}", self.agent_type, n)).collect()
        }
    }
}

fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}

/// Per-spawn policy for worker subprocesses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpawnPolicy {
    /// Minimum interval between successful spawns of one instance.
    pub cooldown_secs: u64,
    /// Hard deadline for one subprocess run.
    pub timeout_secs: u64,
    /// Retries after the first attempt of a transient failure.
    pub max_retries: u32,
    /// Initial retry delay; doubled per retry, capped at 2 minutes.
    pub retry_delay_secs: u64,
}

impl Default for SpawnPolicy {
    fn default() -> Self {
        Self { cooldown_secs: 30, timeout_secs: 300, max_retries: 2, retry_delay_secs: 15 }
    }
}

impl SpawnPolicy {
    pub fn cooldown(&self) -> Duration {
        secs(self.cooldown_secs)
    }

    pub fn timeout(&self) -> Duration {
        secs(self.timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        secs(self.retry_delay_secs)
    }
}

/// Watchdog thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchdogConfig {
    pub interval_secs: u64,
    pub session_stale_secs: u64,
    pub heartbeat_secs: u64,
    pub task_stuck_secs: u64,
    pub progress_warning_secs: u64,
    pub progress_critical_secs: u64,
    pub presence_ttl_secs: u64,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            session_stale_secs: 300,
            heartbeat_secs: 300,
            task_stuck_secs: 600,
            progress_warning_secs: 180,
            progress_critical_secs: 300,
            presence_ttl_secs: 600,
        }
    }
}

impl WatchdogConfig {
    pub fn interval(&self) -> Duration {
        secs(self.interval_secs)
    }

    pub fn session_stale(&self) -> Duration {
        secs(self.session_stale_secs)
    }

    pub fn heartbeat_threshold(&self) -> Duration {
        secs(self.heartbeat_secs)
    }

    pub fn task_stuck(&self) -> Duration {
        secs(self.task_stuck_secs)
    }

    pub fn progress_warning(&self) -> Duration {
        secs(self.progress_warning_secs)
    }

    pub fn progress_critical(&self) -> Duration {
        secs(self.progress_critical_secs)
    }

    pub fn presence_ttl(&self) -> Duration {
        secs(self.presence_ttl_secs)
    }
}

/// Change-notifier timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifierConfig {
    pub debounce_ms: u64,
    pub poll_interval_secs: u64,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self { debounce_ms: 500, poll_interval_secs: 10 }
    }
}

impl NotifierConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        secs(self.poll_interval_secs)
    }
}

/// Message retention for opportunistic pruning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionPolicy {
    /// Cap on stored messages; 0 disables the cap.
    pub max_messages: usize,
    /// Drop messages older than this many days; 0 disables the age limit.
    pub max_age_days: u64,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self { max_messages: 500, max_age_days: 14 }
    }
}

/// The whole orchestration configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationConfig {
    pub driver: DriverDef,
    #[serde(default)]
    pub workers: Vec<WorkerDef>,
    #[serde(default)]
    pub assignment: AssignStrategy,
    #[serde(default)]
    pub spawn: SpawnPolicy,
    #[serde(default)]
    pub watchdog: WatchdogConfig,
    #[serde(default)]
    pub notifier: NotifierConfig,
    #[serde(default)]
    pub retention: RetentionPolicy,
    #[serde(default)]
    pub worktrees: WorktreeStrategy,
    /// MCP HTTP endpoint the spawned workers connect back to.
    #[serde(default)]
    pub mcp_url: Option<String>,
    #[serde(default)]
    pub dashboard_url: Option<String>,
    /// Fallback workspace when no presence or registration names one.
    #[serde(default)]
    pub workspace: Option<PathBuf>,
}

impl OrchestrationConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.driver.name.is_empty() {
            return Err(ConfigError::Invalid("driver.name must not be empty".into()));
        }
        if is_reserved_name(&self.driver.name) {
            return Err(ConfigError::Invalid(format!(
                "driver.name {:?} is reserved",
                self.driver.name
            )));
        }
        let mut seen = std::collections::HashSet::new();
        for worker in &self.workers {
            if worker.agent_type.is_empty() {
                return Err(ConfigError::Invalid("worker type must not be empty".into()));
            }
            if is_reserved_name(&worker.agent_type) {
                return Err(ConfigError::Invalid(format!(
                    "worker type {:?} is reserved",
                    worker.agent_type
                )));
            }
            if !seen.insert(worker.agent_type.clone()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate worker type {:?}",
                    worker.agent_type
                )));
            }
            if worker.command.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "worker {:?} has an empty command",
                    worker.agent_type
                )));
            }
            if worker.count == 0 {
                return Err(ConfigError::Invalid(format!(
                    "worker {:?} count must be >= 1",
                    worker.agent_type
                )));
            }
            if worker.max_tasks == 0 {
                return Err(ConfigError::Invalid(format!(
                    "worker {:?} max_tasks must be >= 1",
                    worker.agent_type
                )));
            }
        }
        Ok(())
    }

    pub fn worker(&self, agent_type: &str) -> Option<&WorkerDef> {
        self.workers.iter().find(|w| w.agent_type == agent_type)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
