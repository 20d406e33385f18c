// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker environment assembly.

use glob::Pattern;
use std::collections::HashMap;
use std::path::Path;

/// Injected so the spawned CLI can identify itself back to the daemon.
pub const ENV_AGENT: &str = "STRINGWORK_AGENT";
pub const ENV_WORKSPACE: &str = "STRINGWORK_WORKSPACE";

/// Sentinel in `inherit_env` meaning a clean environment.
const INHERIT_NONE: &str = "none";

/// Build the complete child environment for a worker spawn.
///
/// Inheritance: empty `inherit_patterns` inherits the parent environment
/// fully; `["none"]` starts clean; anything else inherits variables whose
/// names match at least one glob pattern. `STRINGWORK_AGENT` and
/// `STRINGWORK_WORKSPACE` are always injected, and the worker overlay is
/// applied last with `${VAR}` expansion from the parent environment.
pub fn build_worker_env(
    inherit_patterns: &[String],
    overlay: &HashMap<String, String>,
    instance_id: &str,
    workspace: &Path,
) -> Vec<(String, String)> {
    let mut env: Vec<(String, String)> = Vec::new();

    let clean = inherit_patterns.len() == 1 && inherit_patterns[0] == INHERIT_NONE;
    if !clean {
        let patterns: Vec<Pattern> =
            inherit_patterns.iter().filter_map(|p| Pattern::new(p).ok()).collect();
        for (key, value) in std::env::vars() {
            if inherit_patterns.is_empty() || patterns.iter().any(|p| p.matches(&key)) {
                env.push((key, value));
            }
        }
    }

    set(&mut env, ENV_AGENT, instance_id.to_string());
    set(&mut env, ENV_WORKSPACE, workspace.display().to_string());

    let mut overlay: Vec<_> = overlay.iter().collect();
    overlay.sort_by(|a, b| a.0.cmp(b.0));
    for (key, value) in overlay {
        set(&mut env, key, expand(value));
    }

    env
}

fn set(env: &mut Vec<(String, String)>, key: &str, value: String) {
    env.retain(|(k, _)| k != key);
    env.push((key.to_string(), value));
}

/// Replace every `${NAME}` with the parent process's value for `NAME`
/// (empty when unset).
fn expand(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        match rest[start + 2..].find('}') {
            Some(end) => {
                let name = &rest[start + 2..start + 2 + end];
                out.push_str(&std::env::var(name).unwrap_or_default());
                rest = &rest[start + 2 + end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
