// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Codex MCP config: `~/.codex/config.toml`.

use super::{run_cli, CliConfigError, McpTarget};
use std::path::Path;

/// Exact-match check against `[mcp_servers.<name>]`.
///
/// The file is parsed as TOML, so matching is scoped to the named table;
/// an identical URL under some other section never counts.
pub(crate) fn matches(path: &Path, server_name: &str, target: &McpTarget) -> bool {
    let Ok(text) = std::fs::read_to_string(path) else {
        return false;
    };
    let Ok(root) = text.parse::<toml::Value>() else {
        return false;
    };
    let Some(entry) = root.get("mcp_servers").and_then(|s| s.get(server_name)) else {
        return false;
    };
    match target {
        McpTarget::Http { url } => {
            entry.get("url").and_then(toml::Value::as_str) == Some(url.as_str())
        }
        McpTarget::Stdio { command, args, .. } => {
            let command_ok =
                entry.get("command").and_then(toml::Value::as_str) == Some(command.as_str());
            let args_ok = entry
                .get("args")
                .and_then(toml::Value::as_array)
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

/// `codex mcp remove <name>` then
/// `codex mcp add <name> (--url <url> | -- <cmd> <args…>)`.
pub(crate) async fn register(server_name: &str, target: &McpTarget) -> Result<(), CliConfigError> {
    let remove: Vec<String> = ["mcp", "remove", server_name].iter().map(|s| s.to_string()).collect();
    run_cli("codex", &remove, false).await?;

    let mut add: Vec<String> = vec!["mcp".into(), "add".into(), server_name.into()];
    match target {
        McpTarget::Http { url } => {
            add.push("--url".into());
            add.push(url.clone());
        }
        McpTarget::Stdio { command, args, .. } => {
            add.push("--".into());
            add.push(command.clone());
            add.extend(args.iter().cloned());
        }
    }
    run_cli("codex", &add, true).await
}

#[cfg(test)]
#[path = "codex_tests.rs"]
mod tests;
