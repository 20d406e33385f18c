// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `create_task` and `update_task`.

use super::{parse_args, require_known_agent};
use crate::dispatch::HandlerCtx;
use serde::Deserialize;
use serde_json::Value;
use sw_core::{Clock, InstanceMatch, Task, TaskStatus, WorkContext, CLAIMABLE, DEFAULT_PRIORITY};
use sw_engine::{apply_assignment, pick_instance, ServiceError};

fn validate_priority(priority: u8) -> Result<u8, ServiceError> {
    if (1..=4).contains(&priority) {
        Ok(priority)
    } else {
        Err(ServiceError::Validation(format!("priority must be 1..4, got {priority}")))
    }
}

#[derive(Deserialize)]
struct CreateArgs {
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    assigned_to: Option<String>,
    created_by: String,
    #[serde(default)]
    priority: Option<u8>,
    #[serde(default)]
    relevant_files: Vec<String>,
    #[serde(default)]
    background: String,
    #[serde(default)]
    constraints: Vec<String>,
    #[serde(default)]
    depends_on: Vec<u64>,
    #[serde(default)]
    expected_duration_seconds: u64,
    #[serde(default)]
    parent_context_id: Option<String>,
    #[serde(default)]
    worker_type: Option<String>,
    #[serde(default)]
    required_capabilities: Vec<String>,
}

pub async fn create_task<C: Clock>(
    ctx: &HandlerCtx<C>,
    args: Value,
) -> Result<String, ServiceError> {
    let args: CreateArgs = parse_args(args)?;
    if args.title.is_empty() {
        return Err(ServiceError::validation("title must not be empty"));
    }
    let priority = validate_priority(args.priority.unwrap_or(DEFAULT_PRIORITY))?;
    let now_ms = ctx.now_ms();
    let driver = ctx.service.config().driver.name.clone();
    let strategy = ctx.service.config().assignment;

    ctx.service.run(move |state| {
        require_known_agent(state, &args.created_by)?;
        let assigned_to = args.assigned_to.clone().unwrap_or_else(|| CLAIMABLE.to_string());
        if assigned_to != CLAIMABLE {
            require_known_agent(state, &assigned_to)?;
        }
        for dep in &args.depends_on {
            if !state.tasks.contains_key(dep) {
                return Err(ServiceError::Validation(format!("unknown dependency task #{dep}")));
            }
        }
        if let Some(parent) = &args.parent_context_id {
            if !state.contexts.contains_key(parent) {
                return Err(ServiceError::NotFound(format!("unknown context {parent:?}")));
            }
        }

        let task = Task {
            id: 0,
            title: args.title.clone(),
            description: args.description.clone(),
            status: TaskStatus::Pending,
            assigned_to: assigned_to.clone(),
            created_by: args.created_by.clone(),
            created_at: now_ms,
            updated_at: now_ms,
            priority,
            dependencies: args.depends_on.clone(),
            blocked_by: String::new(),
            context_id: None,
            expected_duration_secs: args.expected_duration_seconds,
            progress_description: String::new(),
            progress_percent: 0,
            last_progress_at: None,
            result_summary: String::new(),
            worker_type: args.worker_type.clone(),
            required_capabilities: args.required_capabilities.clone(),
        };
        let id = state.push_task(task);

        let has_context = !args.relevant_files.is_empty()
            || !args.background.is_empty()
            || !args.constraints.is_empty();
        if has_context {
            let ctx_id = WorkContext::id_for_task(id);
            state.contexts.insert(
                ctx_id.clone(),
                WorkContext {
                    id: ctx_id.clone(),
                    task_id: id,
                    relevant_files: args.relevant_files.clone(),
                    background: args.background.clone(),
                    constraints: args.constraints.clone(),
                    shared_notes: Default::default(),
                    parent_ctx_id: args.parent_context_id.clone(),
                },
            );
            if let Some(task) = state.tasks.get_mut(&id) {
                task.context_id = Some(ctx_id);
            }
        }

        // Drivers creating claimable tasks get immediate assignment.
        let mut assignment = None;
        if args.created_by == driver && assigned_to == CLAIMABLE {
            if let Some(task) = state.tasks.get(&id).cloned() {
                if let Some(instance) = pick_instance(strategy, &task, state) {
                    apply_assignment(state, id, &instance, now_ms);
                    assignment = Some(instance);
                }
            }
        }

        Ok(match assignment {
            Some(instance) => format!("Task #{id} created and assigned to {instance}"),
            None => format!("Task #{id} created ({})", assigned_to),
        })
    })
}

#[derive(Deserialize)]
struct UpdateArgs {
    id: u64,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    assigned_to: Option<String>,
    updated_by: String,
    #[serde(default)]
    priority: Option<u8>,
    #[serde(default)]
    add_dependency: Option<u64>,
    #[serde(default)]
    remove_dependency: Option<u64>,
    #[serde(default)]
    blocked_by: Option<String>,
    #[serde(default)]
    result_summary: Option<String>,
}

pub async fn update_task<C: Clock>(
    ctx: &HandlerCtx<C>,
    args: Value,
) -> Result<String, ServiceError> {
    let args: UpdateArgs = parse_args(args)?;
    let now_ms = ctx.now_ms();

    ctx.service.run(move |state| {
        require_known_agent(state, &args.updated_by)?;
        if !state.tasks.contains_key(&args.id) {
            return Err(ServiceError::NotFound(format!("unknown task #{}", args.id)));
        }

        if let Some(dep) = args.add_dependency {
            if dep == args.id {
                return Err(ServiceError::Validation(format!(
                    "task #{} cannot depend on itself",
                    args.id
                )));
            }
            if !state.tasks.contains_key(&dep) {
                return Err(ServiceError::Validation(format!("unknown dependency task #{dep}")));
            }
        }
        if let Some(assignee) = &args.assigned_to {
            if assignee != CLAIMABLE {
                require_known_agent(state, assignee)?;
            }
        }
        let priority = args.priority.map(validate_priority).transpose()?;

        // Dependency gate, checked before any mutation commits.
        let mut new_status = args.status.as_deref().map(|s| {
            TaskStatus::parse(s)
                .ok_or_else(|| ServiceError::Validation(format!("unknown status {s:?}")))
        }).transpose()?;
        if let Some(blockers) = &args.blocked_by {
            if !blockers.is_empty() {
                new_status = Some(TaskStatus::Blocked);
            }
        }
        if new_status == Some(TaskStatus::InProgress) {
            let task = &state.tasks[&args.id];
            let incomplete: Vec<u64> = task
                .dependencies
                .iter()
                .filter(|dep| {
                    state.tasks.get(dep).map(|d| d.status != TaskStatus::Completed).unwrap_or(true)
                })
                .copied()
                .collect();
            if !incomplete.is_empty() {
                return Err(ServiceError::Validation(format!(
                    "cannot start task #{}: incomplete dependencies {incomplete:?}",
                    args.id
                )));
            }
        }

        let old_status = state.tasks[&args.id].status;
        let mut assignee_for_attach: Option<String> = None;

        if let Some(task) = state.tasks.get_mut(&args.id) {
            if let Some(dep) = args.add_dependency {
                if !task.dependencies.contains(&dep) {
                    task.dependencies.push(dep);
                }
            }
            if let Some(dep) = args.remove_dependency {
                task.dependencies.retain(|d| *d != dep);
            }
            if let Some(priority) = priority {
                task.priority = priority;
            }
            if let Some(assignee) = &args.assigned_to {
                task.assigned_to = assignee.clone();
            }
            if let Some(blockers) = &args.blocked_by {
                task.blocked_by = blockers.clone();
            }
            if let Some(summary) = &args.result_summary {
                task.result_summary = summary.clone();
            }
            if let Some(status) = new_status {
                task.status = status;
                if status == TaskStatus::InProgress {
                    // A claimable task entering progress belongs to whoever
                    // drove the transition.
                    if task.assigned_to == CLAIMABLE {
                        task.assigned_to = args.updated_by.clone();
                    }
                    assignee_for_attach = Some(task.assigned_to.clone());
                }
            }
            task.updated_at = task.updated_at.max(now_ms);
        }

        if let Some(status) = new_status {
            if old_status == TaskStatus::InProgress && status != TaskStatus::InProgress {
                state.detach_task_everywhere(args.id);
            }
            if let Some(assignee) = assignee_for_attach {
                if let InstanceMatch::Unique(instance_id) = state.resolve_instance(&assignee) {
                    if let Some(task) = state.tasks.get_mut(&args.id) {
                        task.assigned_to = instance_id.clone();
                    }
                    if let Some(inst) = state.instances.get_mut(&instance_id) {
                        inst.attach_task(args.id);
                    }
                }
            }
        }

        Ok(format!("Task #{} updated", args.id))
    })
}
