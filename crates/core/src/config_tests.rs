// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

const SAMPLE: &str = r#"
[driver]
name = "cursor"
display_name = "Cursor"

[[workers]]
type = "claude-code"
command = ["claude", "--workspace", "{workspace}"]
count = 2
capabilities = ["code"]
max_tasks = 2

[workers.env]
CLAUDE_PROJECT = "${HOME}/src"

[[workers]]
type = "codex"
command = ["codex", "exec"]
inherit_env = ["PATH", "HOME", "SW_*"]

[spawn]
cooldown_secs = 10

[watchdog]
heartbeat_secs = 60

[notifier]
debounce_ms = 250
"#;

#[test]
fn parses_sample_config() {
    let config: OrchestrationConfig = toml::from_str(SAMPLE).unwrap();
    config.validate().unwrap();

    assert_eq!(config.driver.name, "cursor");
    assert_eq!(config.workers.len(), 2);
    assert_eq!(config.workers[0].count, 2);
    assert_eq!(config.workers[0].instance_ids(), vec!["claude-code-1", "claude-code-2"]);
    assert_eq!(config.workers[1].instance_ids(), vec!["codex"]);
    assert_eq!(config.spawn.cooldown_secs, 10);
    assert_eq!(config.spawn.timeout_secs, 300);
    assert_eq!(config.watchdog.heartbeat_secs, 60);
    assert_eq!(config.watchdog.task_stuck_secs, 600);
    assert_eq!(config.notifier.debounce_ms, 250);
    assert_eq!(config.notifier.poll_interval_secs, 10);
    assert_eq!(config.assignment, AssignStrategy::CapabilityMatch);
    assert_eq!(config.worktrees, WorktreeStrategy::Disabled);
}

#[test]
fn load_reads_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("orchestration.toml");
    std::fs::write(&path, SAMPLE).unwrap();

    let config = OrchestrationConfig::load(&path).unwrap();
    assert_eq!(config.workers[1].agent_type, "codex");
}

#[parameterized(
    reserved_driver = { "[driver]\nname = \"system\"\n" },
    empty_driver = { "[driver]\nname = \"\"\n" },
    empty_command = { "[driver]\nname = \"d\"\n[[workers]]\ntype = \"w\"\ncommand = []\n" },
    zero_count = { "[driver]\nname = \"d\"\n[[workers]]\ntype = \"w\"\ncommand = [\"w\"]\ncount = 0\n" },
    duplicate_type = { "[driver]\nname = \"d\"\n[[workers]]\ntype = \"w\"\ncommand = [\"w\"]\n[[workers]]\ntype = \"w\"\ncommand = [\"w\"]\n" },
)]
fn validation_rejects(text: &str) {
    let config: OrchestrationConfig = toml::from_str(text).unwrap();
    assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
}

#[test]
fn round_robin_parses_as_strategy() {
    let text = "[driver]\nname = \"d\"\nassignment = \"round_robin\"\n";
    let config: OrchestrationConfig = toml::from_str(text).unwrap();
    assert_eq!(config.assignment, AssignStrategy::RoundRobin);
}
