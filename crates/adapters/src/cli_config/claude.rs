// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Claude Code MCP config: `~/.claude.json`.

use super::{run_cli, CliConfigError, McpTarget};
use serde_json::{json, Value};
use std::path::Path;

/// Exact-match check against `mcpServers[<name>]`.
pub(crate) fn matches(path: &Path, server_name: &str, target: &McpTarget) -> bool {
    let Ok(text) = std::fs::read_to_string(path) else {
        return false;
    };
    let Ok(root) = serde_json::from_str::<Value>(&text) else {
        return false;
    };
    let Some(entry) = root.get("mcpServers").and_then(|s| s.get(server_name)) else {
        return false;
    };
    entry_matches(entry, target)
}

fn entry_matches(entry: &Value, target: &McpTarget) -> bool {
    match target {
        McpTarget::Http { url } => {
            entry.get("type").and_then(Value::as_str) == Some("http")
                && entry.get("url").and_then(Value::as_str) == Some(url.as_str())
        }
        McpTarget::Stdio { command, args, env } => {
            let type_ok = matches!(entry.get("type").and_then(Value::as_str), None | Some("stdio"));
            let command_ok = entry.get("command").and_then(Value::as_str) == Some(command.as_str());
            let args_ok = entry
                .get("args")
                .and_then(Value::as_array)
                .map(|a| {
                    a.iter().map(|v| v.as_str().unwrap_or_default()).eq(args.iter().map(String::as_str))
                })
                .unwrap_or(args.is_empty());
            let env_ok = env.iter().all(|(k, v)| {
                entry.get("env").and_then(|e| e.get(k)).and_then(Value::as_str) == Some(v.as_str())
            });
            type_ok && command_ok && args_ok && env_ok
        }
    }
}

/// `claude mcp remove --scope user <name>` then
/// `claude mcp add-json --scope user <name> <json>`.
pub(crate) async fn register(server_name: &str, target: &McpTarget) -> Result<(), CliConfigError> {
    let spec = match target {
        McpTarget::Http { url } => json!({ "type": "http", "url": url }),
        McpTarget::Stdio { command, args, env } => {
            json!({ "type": "stdio", "command": command, "args": args, "env": env })
        }
    };

    let remove: Vec<String> =
        ["mcp", "remove", "--scope", "user", server_name].iter().map(|s| s.to_string()).collect();
    run_cli("claude", &remove, false).await?;

    let add: Vec<String> = ["mcp", "add-json", "--scope", "user", server_name, &spec.to_string()]
        .iter()
        .map(|s| s.to_string())
        .collect();
    run_cli("claude", &add, true).await
}

#[cfg(test)]
#[path = "claude_tests.rs"]
mod tests;
