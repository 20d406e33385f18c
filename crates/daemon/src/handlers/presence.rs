// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `set_presence` and `lock_file`.

use super::{parse_args, require_known_agent};
use crate::dispatch::HandlerCtx;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use sw_core::{
    Clock, FileLock, Presence, PresenceStatus, DEFAULT_LOCK_MINUTES, MAX_LOCK_MINUTES,
};
use sw_engine::ServiceError;

#[derive(Deserialize)]
struct PresenceArgs {
    agent: String,
    status: String,
    #[serde(default)]
    workspace: Option<String>,
    #[serde(default)]
    current_task_id: Option<u64>,
    #[serde(default)]
    note: Option<String>,
}

pub async fn set_presence<C: Clock>(
    ctx: &HandlerCtx<C>,
    args: Value,
) -> Result<String, ServiceError> {
    let args: PresenceArgs = parse_args(args)?;
    let status = PresenceStatus::parse(&args.status)
        .ok_or_else(|| ServiceError::Validation(format!("unknown presence status {:?}", args.status)))?;
    let now_ms = ctx.now_ms();
    let agent = args.agent.clone();

    let workspace_change = ctx.service.run(move |state| {
        require_known_agent(state, &args.agent)?;
        let prior_workspace =
            state.presence.get(&args.agent).map(|p| p.workspace.clone()).unwrap_or_default();
        let entry = state.presence.entry(args.agent.clone()).or_insert_with(|| Presence {
            agent: args.agent.clone(),
            status,
            current_task_id: None,
            note: String::new(),
            workspace: String::new(),
            last_seen: now_ms,
        });
        entry.status = status;
        entry.last_seen = now_ms;
        if let Some(task_id) = args.current_task_id {
            entry.current_task_id = Some(task_id);
        }
        if let Some(note) = &args.note {
            entry.note = note.clone();
        }
        let mut changed = None;
        if let Some(workspace) = &args.workspace {
            entry.workspace = workspace.clone();
            if *workspace != prior_workspace && !workspace.is_empty() {
                changed = Some(workspace.clone());
            }
        }
        Ok(changed)
    })?;

    // Side effect deferred until after the commit: the workspace policy
    // follows the agent's reported root.
    if let Some(workspace) = workspace_change {
        ctx.policy.set_root(&workspace);
    }
    Ok(format!("Presence updated for {agent}"))
}

#[derive(Deserialize)]
struct LockArgs {
    action: String,
    #[serde(default)]
    agent: Option<String>,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    duration_minutes: Option<u64>,
    #[serde(default)]
    force: bool,
}

pub async fn lock_file<C: Clock>(ctx: &HandlerCtx<C>, args: Value) -> Result<String, ServiceError> {
    let args: LockArgs = parse_args(args)?;
    let now_ms = ctx.now_ms();
    let policy = Arc::clone(&ctx.policy);

    match args.action.as_str() {
        "lock" => {
            let agent = required(&args.agent, "agent")?;
            let raw = required(&args.path, "path")?;
            let path = policy
                .normalize(&raw)
                .map_err(|e| ServiceError::Validation(e.to_string()))?;
            let minutes = args.duration_minutes.unwrap_or(DEFAULT_LOCK_MINUTES).clamp(1, MAX_LOCK_MINUTES);
            let reason = args.reason.clone().unwrap_or_default();

            ctx.service.run(move |state| {
                require_known_agent(state, &agent)?;
                state.evict_expired_locks(now_ms);
                if let Some(existing) = state.file_locks.get(&path) {
                    if existing.locked_by != agent {
                        return Err(ServiceError::Conflict(format!(
                            "{path} is locked by {} until {}",
                            existing.locked_by, existing.expires_at
                        )));
                    }
                }
                let expires_at = now_ms + minutes * 60 * 1000;
                state.file_locks.insert(
                    path.clone(),
                    FileLock { path: path.clone(), locked_by: agent.clone(), reason, locked_at: now_ms, expires_at },
                );
                Ok(format!("Locked {path} for {agent} ({minutes}m)"))
            })
        }
        "unlock" => {
            let agent = required(&args.agent, "agent")?;
            let raw = required(&args.path, "path")?;
            let path = policy
                .normalize(&raw)
                .map_err(|e| ServiceError::Validation(e.to_string()))?;
            let force = args.force;

            ctx.service.run(move |state| {
                state.evict_expired_locks(now_ms);
                let Some(existing) = state.file_locks.get(&path) else {
                    return Err(ServiceError::NotFound(format!("{path} is not locked")));
                };
                if existing.locked_by != agent && !force {
                    return Err(ServiceError::Conflict(format!(
                        "{path} is locked by {}; pass force to override",
                        existing.locked_by
                    )));
                }
                state.file_locks.remove(&path);
                Ok(format!("Unlocked {path}"))
            })
        }
        "check" => {
            let raw = required(&args.path, "path")?;
            let path = policy
                .normalize(&raw)
                .map_err(|e| ServiceError::Validation(e.to_string()))?;
            // Read-only, but expiry still applies: report an expired lock
            // as free.
            let result = ctx.service.query(move |state| match state.file_locks.get(&path) {
                Some(lock) if !lock.expired(now_ms) => json!({
                    "locked": true,
                    "path": path,
                    "owner": lock.locked_by,
                    "reason": lock.reason,
                    "expires_at": lock.expires_at,
                }),
                _ => json!({ "locked": false, "path": path }),
            });
            render(&result)
        }
        "list" => {
            let filter = args.agent.clone();
            let result = ctx.service.query(move |state| {
                let mut locks: Vec<&FileLock> = state
                    .file_locks
                    .values()
                    .filter(|l| !l.expired(now_ms))
                    .filter(|l| filter.as_deref().map(|a| l.locked_by == a).unwrap_or(true))
                    .collect();
                locks.sort_by(|a, b| a.path.cmp(&b.path));
                json!({
                    "locks": locks
                        .iter()
                        .map(|l| {
                            json!({
                                "path": l.path,
                                "owner": l.locked_by,
                                "reason": l.reason,
                                "expires_at": l.expires_at,
                            })
                        })
                        .collect::<Vec<_>>()
                })
            });
            render(&result)
        }
        other => Err(ServiceError::Validation(format!("unknown lock action {other:?}"))),
    }
}

fn required(value: &Option<String>, name: &str) -> Result<String, ServiceError> {
    match value {
        Some(v) if !v.is_empty() => Ok(v.clone()),
        _ => Err(ServiceError::Validation(format!("{name} is required"))),
    }
}

fn render(value: &Value) -> Result<String, ServiceError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| ServiceError::Validation(format!("render failed: {e}")))
}
