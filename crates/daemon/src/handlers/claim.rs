// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `claim_next`: one call that answers "what should I do now?".
//!
//! Priority order: oldest unread message, then an already-running task,
//! then the best pending task, then the active plan's next item.

use super::{parse_args, require_known_agent};
use crate::dispatch::HandlerCtx;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use sw_adapters::WorkspacePolicy;
use sw_core::{Clock, CollabState, FileLock, InstanceMatch, PlanItemStatus, TaskStatus};
use sw_engine::ServiceError;

/// Auto-locks taken on a claimed task's relevant files.
const AUTO_LOCK_MINUTES: u64 = 60;

#[derive(Deserialize)]
struct ClaimArgs {
    agent: String,
    #[serde(default)]
    dry_run: bool,
}

pub async fn claim_next<C: Clock>(
    ctx: &HandlerCtx<C>,
    args: Value,
) -> Result<String, ServiceError> {
    let args: ClaimArgs = parse_args(args)?;
    let now_ms = ctx.now_ms();
    let policy = Arc::clone(&ctx.policy);

    let result = ctx.service.run(move |state| {
        require_known_agent(state, &args.agent)?;
        let (instance_id, agent_type) = match state.resolve_instance(&args.agent) {
            InstanceMatch::Unique(id) => {
                let ty = state.instances[&id].agent_type.clone();
                (id, ty)
            }
            InstanceMatch::Ambiguous(n) => {
                return Err(ServiceError::Validation(format!(
                    "{:?} names {n} instances; claim with a specific instance id",
                    args.agent
                )));
            }
            InstanceMatch::None => (args.agent.clone(), args.agent.clone()),
        };

        // (1) Oldest unread message: reading comes before new work.
        if let Some(message) = state
            .messages
            .iter()
            .filter(|m| !m.read && (m.addressed_to(&args.agent) || m.to == instance_id))
            .min_by_key(|m| m.id)
        {
            return Ok(json!({
                "action": "read_messages",
                "message_id": message.id,
                "from": message.from,
                "preview": preview(&message.content),
            }));
        }

        // (2) Work already in progress continues.
        if let Some(task) = state
            .tasks
            .values()
            .filter(|t| {
                t.status == TaskStatus::InProgress
                    && (t.assigned_to == args.agent || t.assigned_to == instance_id)
            })
            .min_by_key(|t| t.id)
        {
            return Ok(json!({
                "action": "continue_task",
                "task_id": task.id,
                "title": task.title,
                "progress_percent": task.progress_percent,
            }));
        }

        // (3) Highest-priority pending task with its dependencies done.
        let mut candidates: Vec<_> = state
            .tasks
            .values()
            .filter(|t| t.status == TaskStatus::Pending)
            .filter(|t| t.assignable_to(&instance_id, &agent_type) || t.assigned_to == args.agent)
            .filter(|t| {
                t.dependencies.iter().all(|dep| {
                    state.tasks.get(dep).map(|d| d.status == TaskStatus::Completed).unwrap_or(false)
                })
            })
            .collect();
        candidates.sort_by_key(|t| (t.priority, t.created_at, t.id));

        if let Some(task) = candidates.first() {
            let task_id = task.id;
            let title = task.title.clone();
            let context_id = task.context_id.clone();
            if !args.dry_run {
                claim_task(state, task_id, &instance_id, &policy, now_ms);
            }
            return Ok(json!({
                "action": "start_task",
                "task_id": task_id,
                "title": title,
                "context_id": context_id,
                "claimed": !args.dry_run,
            }));
        }

        // (4) Fall through to the active plan.
        if let Some(plan_id) = state.active_plan_id.clone() {
            let item = state
                .plans
                .get(&plan_id)
                .and_then(|plan| plan.next_item_for(&args.agent))
                .map(|item| (item.id, item.title.clone()));
            if let Some((item_id, title)) = item {
                if !args.dry_run {
                    if let Some(plan) = state.plans.get_mut(&plan_id) {
                        if let Some(item) = plan.item_mut(item_id) {
                            item.status = PlanItemStatus::InProgress;
                            item.owner = args.agent.clone();
                        }
                        plan.updated_at = now_ms;
                    }
                }
                return Ok(json!({
                    "action": "plan_item",
                    "plan_id": plan_id,
                    "item_id": item_id,
                    "title": title,
                    "claimed": !args.dry_run,
                }));
            }
        }

        Ok(json!({ "action": "none", "detail": "no unread messages, tasks, or plan items" }))
    })?;

    serde_json::to_string_pretty(&result)
        .map_err(|e| ServiceError::Validation(format!("render failed: {e}")))
}

/// Transition the claimed task to in-progress and auto-lock its context
/// files for the claimer, skipping anything locked by someone else.
fn claim_task(
    state: &mut CollabState,
    task_id: u64,
    instance_id: &str,
    policy: &WorkspacePolicy,
    now_ms: u64,
) {
    let context_id = match state.tasks.get_mut(&task_id) {
        Some(task) => {
            task.status = TaskStatus::InProgress;
            task.assigned_to = instance_id.to_string();
            task.updated_at = now_ms;
            task.context_id.clone()
        }
        None => return,
    };
    if let Some(inst) = state.instances.get_mut(instance_id) {
        inst.attach_task(task_id);
        inst.last_heartbeat = Some(now_ms);
    }

    let Some(context_id) = context_id else {
        return;
    };
    let files = state
        .contexts
        .get(&context_id)
        .map(|c| c.relevant_files.clone())
        .unwrap_or_default();
    if files.is_empty() {
        return;
    }

    state.evict_expired_locks(now_ms);
    let expires_at = now_ms + AUTO_LOCK_MINUTES * 60 * 1000;
    for file in files {
        let Ok(path) = policy.normalize(&file) else {
            continue;
        };
        match state.file_locks.get(&path) {
            Some(existing) if existing.locked_by != instance_id => continue,
            _ => {}
        }
        state.file_locks.insert(
            path.clone(),
            FileLock {
                path,
                locked_by: instance_id.to_string(),
                reason: format!("working on task #{task_id}"),
                locked_at: now_ms,
                expires_at,
            },
        );
    }
}

fn preview(content: &str) -> String {
    let mut text: String = content.chars().take(120).collect();
    if text.len() < content.len() {
        text.push('…');
    }
    text
}
