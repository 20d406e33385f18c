// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Gemini CLI MCP config: `~/.gemini/settings.json`.

use super::{run_cli, CliConfigError, McpTarget};
use serde_json::Value;
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
    match target {
        McpTarget::Http { url } => {
            entry.get("url").and_then(Value::as_str) == Some(url.as_str())
                || entry.get("httpUrl").and_then(Value::as_str) == Some(url.as_str())
        }
        McpTarget::Stdio { command, args, .. } => {
            let command_ok = entry.get("command").and_then(Value::as_str) == Some(command.as_str());
            let args_ok = entry
                .get("args")
                .and_then(Value::as_array)
                .map(|a| {
                    a.iter()
                        .map(|v| v.as_str().unwrap_or_default())
                        .eq(args.iter().map(String::as_str))
                })
                .unwrap_or(args.is_empty());
            command_ok && args_ok
        }
    }
}

/// `gemini mcp remove -s user <name>` then
/// `gemini mcp add -s user [--transport http] <name> <url|command> [-- args…] [-e K=V …]`.
pub(crate) async fn register(server_name: &str, target: &McpTarget) -> Result<(), CliConfigError> {
    let remove: Vec<String> =
        ["mcp", "remove", "-s", "user", server_name].iter().map(|s| s.to_string()).collect();
    run_cli("gemini", &remove, false).await?;

    let mut add: Vec<String> = vec!["mcp".into(), "add".into(), "-s".into(), "user".into()];
    match target {
        McpTarget::Http { url } => {
            add.push("--transport".into());
            add.push("http".into());
            add.push(server_name.into());
            add.push(url.clone());
        }
        McpTarget::Stdio { command, args, env } => {
            add.push(server_name.into());
            add.push(command.clone());
            if !args.is_empty() {
                add.push("--".into());
                add.extend(args.iter().cloned());
            }
            let mut env: Vec<_> = env.iter().collect();
            env.sort_by(|a, b| a.0.cmp(b.0));
            for (key, value) in env {
                add.push("-e".into());
                add.push(format!("{key}={value}"));
            }
        }
    }
    run_cli("gemini", &add, true).await
}
