// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent lifecycle tools: `heartbeat`, `report_progress`, `handoff`,
//! `cancel_agent`, `register_agent`.

use super::{parse_args, require_known_agent};
use crate::dispatch::HandlerCtx;
use serde::Deserialize;
use serde_json::Value;
use sw_core::{
    AgentInstance, AgentRole, Clock, InstanceMatch, InstanceStatus, RegisteredAgent, TaskStatus,
    is_reserved_name,
};
use sw_engine::ServiceError;

#[derive(Deserialize)]
struct HeartbeatArgs {
    agent: String,
    #[serde(default)]
    progress: Option<String>,
    #[serde(default)]
    step: Option<u32>,
    #[serde(default)]
    total_steps: Option<u32>,
}

pub async fn heartbeat<C: Clock>(
    ctx: &HandlerCtx<C>,
    args: Value,
) -> Result<String, ServiceError> {
    let args: HeartbeatArgs = parse_args(args)?;
    let now_ms = ctx.now_ms();

    ctx.service.run(move |state| {
        let instance_id = match state.resolve_instance(&args.agent) {
            InstanceMatch::Unique(id) => id,
            InstanceMatch::Ambiguous(n) => {
                return Err(ServiceError::Validation(format!(
                    "{:?} names {n} instances; heartbeat with a specific instance id",
                    args.agent
                )));
            }
            InstanceMatch::None => {
                // A registered agent with no instance yet materializes an
                // ephemeral worker instance on first heartbeat.
                if !state.registered_agents.contains_key(&args.agent) {
                    return Err(ServiceError::Validation(format!("unknown agent {:?}", args.agent)));
                }
                let mut inst =
                    AgentInstance::new(&args.agent, &args.agent, AgentRole::Worker);
                if let Some(registered) = state.registered_agents.get(&args.agent) {
                    inst.capabilities = registered.capabilities.clone();
                }
                state.instances.insert(args.agent.clone(), inst);
                args.agent.clone()
            }
        };

        if let Some(inst) = state.instances.get_mut(&instance_id) {
            inst.last_heartbeat = Some(now_ms);
            if inst.status == InstanceStatus::Offline {
                inst.status = if inst.current_tasks.is_empty() {
                    InstanceStatus::Idle
                } else {
                    InstanceStatus::Busy
                };
            }
            if let Some(progress) = &args.progress {
                inst.progress = progress.clone();
                inst.progress_updated_at = Some(now_ms);
            }
            if let Some(step) = args.step {
                inst.progress_step = step;
            }
            if let Some(total) = args.total_steps {
                inst.progress_total_steps = total;
            }
        }
        if let Some(registered) = state.registered_agents.get_mut(&args.agent) {
            registered.last_seen = now_ms;
        }
        Ok(format!("Heartbeat recorded for {instance_id}"))
    })
}

#[derive(Deserialize)]
struct ProgressArgs {
    agent: String,
    task_id: u64,
    description: String,
    #[serde(default)]
    percent_complete: Option<u8>,
    #[serde(default)]
    eta_seconds: Option<u64>,
}

pub async fn report_progress<C: Clock>(
    ctx: &HandlerCtx<C>,
    args: Value,
) -> Result<String, ServiceError> {
    let args: ProgressArgs = parse_args(args)?;
    let now_ms = ctx.now_ms();

    ctx.service.run(move |state| {
        require_known_agent(state, &args.agent)?;
        let Some(task) = state.tasks.get_mut(&args.task_id) else {
            return Err(ServiceError::NotFound(format!("unknown task #{}", args.task_id)));
        };
        if task.status != TaskStatus::InProgress {
            return Err(ServiceError::Validation(format!(
                "task #{} is {}, not in_progress",
                args.task_id,
                task.status.as_str()
            )));
        }

        task.progress_description = match args.eta_seconds {
            Some(eta) => format!("{} (eta {eta}s)", args.description),
            None => args.description.clone(),
        };
        if let Some(percent) = args.percent_complete {
            task.progress_percent = percent.min(100);
        }
        task.last_progress_at = Some(now_ms);

        if let InstanceMatch::Unique(instance_id) = state.resolve_instance(&args.agent) {
            if let Some(inst) = state.instances.get_mut(&instance_id) {
                inst.last_heartbeat = Some(now_ms);
                inst.progress = args.description.clone();
                inst.progress_updated_at = Some(now_ms);
                if inst.status == InstanceStatus::Offline {
                    inst.status = InstanceStatus::Busy;
                }
            }
        }
        Ok(format!("Progress recorded on task #{}", args.task_id))
    })
}

#[derive(Deserialize)]
struct HandoffArgs {
    from: String,
    to: String,
    summary: String,
    next_steps: String,
    #[serde(default)]
    task_id: Option<u64>,
}

pub async fn handoff<C: Clock>(ctx: &HandlerCtx<C>, args: Value) -> Result<String, ServiceError> {
    let args: HandoffArgs = parse_args(args)?;
    let now_ms = ctx.now_ms();

    ctx.service.run(move |state| {
        require_known_agent(state, &args.from)?;
        require_known_agent(state, &args.to)?;

        let task_id = match args.task_id {
            Some(id) => {
                if !state.tasks.contains_key(&id) {
                    return Err(ServiceError::NotFound(format!("unknown task #{id}")));
                }
                id
            }
            None => state
                .tasks
                .values()
                .filter(|t| t.status == TaskStatus::InProgress && t.assigned_to == args.from)
                .map(|t| t.id)
                .min()
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("{} has no in_progress task to hand off", args.from))
                })?,
        };

        let title = if let Some(task) = state.tasks.get_mut(&task_id) {
            task.assigned_to = args.to.clone();
            task.status = TaskStatus::Pending;
            task.updated_at = now_ms;
            task.title.clone()
        } else {
            String::new()
        };
        state.detach_task_everywhere(task_id);

        let content = format!(
            "## Handoff: {title} (task #{task_id})\n\n**From:** {}\n**Summary:** {}\n**Next steps:** {}",
            args.from, args.summary, args.next_steps
        );
        state.push_message(&args.from, &args.to, content, now_ms);
        Ok(format!("Task #{task_id} handed off from {} to {}", args.from, args.to))
    })
}

#[derive(Deserialize)]
struct CancelArgs {
    agent: String,
    cancelled_by: String,
    #[serde(default)]
    reason: Option<String>,
}

pub async fn cancel_agent<C: Clock>(
    ctx: &HandlerCtx<C>,
    args: Value,
) -> Result<String, ServiceError> {
    let args: CancelArgs = parse_args(args)?;
    let now_ms = ctx.now_ms();
    let agent = args.agent.clone();

    let cancelled = ctx.service.run(move |state| {
        require_known_agent(state, &args.agent)?;
        require_known_agent(state, &args.cancelled_by)?;

        // Direct assignment, the resolved instance, or any instance of the
        // named agent type all count as "this agent's tasks".
        let mut names: Vec<String> = vec![args.agent.clone()];
        for inst in state.instances.values() {
            if inst.agent_type == args.agent && !names.contains(&inst.instance_id) {
                names.push(inst.instance_id.clone());
            }
        }

        let reason = args.reason.clone().unwrap_or_else(|| "cancelled by driver".to_string());
        let mut cancelled: Vec<u64> = Vec::new();
        for task in state.tasks.values_mut() {
            if task.status == TaskStatus::InProgress && names.contains(&task.assigned_to) {
                task.status = TaskStatus::Cancelled;
                task.updated_at = now_ms;
                if task.result_summary.is_empty() {
                    task.result_summary =
                        format!("Cancelled by {}: {reason}", args.cancelled_by);
                }
                cancelled.push(task.id);
            }
        }
        for id in &cancelled {
            state.detach_task_everywhere(*id);
        }

        state.push_system_message(
            &args.agent,
            format!(
                "🛑 STOP: {} cancelled your current work ({} task(s)). Reason: {reason}",
                args.cancelled_by,
                cancelled.len()
            ),
            now_ms,
        );
        Ok(cancelled)
    })?;

    // Kill the subprocess outside the state lock.
    let killed = match &ctx.canceller {
        Some(canceller) => canceller.cancel_worker(&agent),
        None => false,
    };

    Ok(format!(
        "Cancelled {} task(s) for {agent}{}",
        cancelled.len(),
        if killed { "; running subprocess cancelled" } else { "" }
    ))
}

#[derive(Deserialize)]
struct RegisterArgs {
    name: String,
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    capabilities: Vec<String>,
    #[serde(default)]
    workspace: String,
    #[serde(default)]
    project: String,
}

pub async fn register_agent<C: Clock>(
    ctx: &HandlerCtx<C>,
    args: Value,
) -> Result<String, ServiceError> {
    let args: RegisterArgs = parse_args(args)?;
    if args.name.is_empty() {
        return Err(ServiceError::validation("name must not be empty"));
    }
    if is_reserved_name(&args.name) {
        return Err(ServiceError::Validation(format!("{:?} is a reserved name", args.name)));
    }
    let now_ms = ctx.now_ms();

    ctx.service.run(move |state| {
        let registered_at = state
            .registered_agents
            .get(&args.name)
            .map(|r| r.registered_at)
            .unwrap_or(now_ms);
        state.registered_agents.insert(
            args.name.clone(),
            RegisteredAgent {
                name: args.name.clone(),
                display_name: args.display_name.clone(),
                capabilities: args.capabilities.clone(),
                workspace: args.workspace.clone(),
                project: args.project.clone(),
                registered_at,
                last_seen: now_ms,
            },
        );
        Ok(format!("Agent {} registered", args.name))
    })
}
