// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `get_session_context`: one rich snapshot for an agent joining or
//! resuming a session.

use super::{parse_args, require_known_agent};
use crate::dispatch::HandlerCtx;
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use sw_adapters::run_with_timeout;
use sw_core::{Clock, InstanceMatch, InstanceStatus, TaskStatus};
use sw_engine::ServiceError;

const GIT_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Deserialize)]
struct ContextArgs {
    #[serde(rename = "for")]
    agent: String,
}

pub async fn get_session_context<C: Clock>(
    ctx: &HandlerCtx<C>,
    session_id: &str,
    args: Value,
) -> Result<String, ServiceError> {
    let args: ContextArgs = parse_args(args)?;
    let agent = args.agent;
    let agent_name = agent.clone();
    let now_ms = ctx.now_ms();
    let presence_ttl_ms = ctx.service.config().watchdog.presence_ttl().as_millis() as u64;

    // Blocking probes happen before the service lock.
    let workspace = ctx.policy.root();
    let git_info = git_info(&workspace).await;
    let dashboard = ctx.registry.dashboard_url();

    let snapshot = ctx.service.run(move |state| {
        require_known_agent(state, &agent)?;

        // Touch the heartbeat so joining counts as life.
        if let InstanceMatch::Unique(id) = state.resolve_instance(&agent) {
            if let Some(inst) = state.instances.get_mut(&id) {
                inst.last_heartbeat = Some(now_ms);
                if inst.status == InstanceStatus::Offline {
                    inst.status = InstanceStatus::Idle;
                }
            }
        }
        let entry = state.agent_contexts.entry(agent.clone()).or_default();
        entry.agent = agent.clone();
        entry.last_check_time = now_ms;

        let mut out = String::new();
        out.push_str(&format!("# Session context for {agent}\n\n"));

        out.push_str("## Presence\n");
        if state.presence.is_empty() {
            out.push_str("(nobody has reported presence)\n");
        }
        let mut presences: Vec<_> = state.presence.values().collect();
        presences.sort_by(|a, b| a.agent.cmp(&b.agent));
        for presence in presences {
            let stale = if now_ms.saturating_sub(presence.last_seen) > presence_ttl_ms {
                " (offline)"
            } else {
                ""
            };
            let task = presence
                .current_task_id
                .map(|id| format!(" on task #{id}"))
                .unwrap_or_default();
            out.push_str(&format!(
                "- {}: {}{stale}{task} {}\n",
                presence.agent,
                presence.status.as_str(),
                presence.note
            ));
        }

        let unread: Vec<_> =
            state.messages.iter().rev().filter(|m| !m.read && m.addressed_to(&agent)).collect();
        out.push_str(&format!("\n## Messages\n{} unread\n", unread.len()));
        for message in unread.iter().take(5) {
            let preview: String = message.content.chars().take(80).collect();
            out.push_str(&format!("- #{} from {}: {preview}\n", message.id, message.from));
        }

        let pending = state.pending_count_for(&agent);
        let in_progress = state
            .tasks
            .values()
            .filter(|t| t.status == TaskStatus::InProgress && t.assigned_to == agent)
            .count();
        out.push_str(&format!(
            "\n## Tasks\n{pending} pending, {in_progress} in progress (claim_next to pick up work)\n"
        ));

        if !state.notes.is_empty() {
            out.push_str("\n## Recent notes\n");
            for note in state.notes.iter().rev().take(3) {
                out.push_str(&format!("- #{} {}: {}\n", note.id, note.author, note.content));
            }
        }

        if let Some(plan_id) = &state.active_plan_id {
            if let Some(plan) = state.plans.get(plan_id) {
                let done = plan
                    .items
                    .iter()
                    .filter(|i| i.status == sw_core::PlanItemStatus::Completed)
                    .count();
                out.push_str(&format!(
                    "\n## Active plan\n{} ({done}/{} items done)\n",
                    plan.title,
                    plan.items.len()
                ));
            }
        }

        Ok(out)
    })?;

    // Bind the transport session to this agent.
    ctx.registry.set_agent(session_id, &agent_name);

    let mut out = snapshot;
    out.push_str("\n## Project\n");
    out.push_str(&format!("workspace: {}\n", workspace.display()));
    match git_info {
        Some((branch, remote)) => {
            out.push_str(&format!("git branch: {branch}\n"));
            if !remote.is_empty() {
                out.push_str(&format!("git remote: {remote}\n"));
            }
        }
        None => out.push_str("git: not a repository\n"),
    }
    if let Some(url) = dashboard {
        out.push_str(&format!("dashboard: {url}\n"));
    }
    Ok(out)
}

/// Branch and origin URL, detected outside the state lock.
async fn git_info(workspace: &Path) -> Option<(String, String)> {
    let mut branch_cmd = tokio::process::Command::new("git");
    branch_cmd.arg("-C").arg(workspace).args(["rev-parse", "--abbrev-ref", "HEAD"]);
    let branch = match run_with_timeout(branch_cmd, GIT_PROBE_TIMEOUT, "git branch probe").await {
        Ok(output) if output.status.success() => {
            String::from_utf8_lossy(&output.stdout).trim().to_string()
        }
        _ => return None,
    };

    let mut remote_cmd = tokio::process::Command::new("git");
    remote_cmd.arg("-C").arg(workspace).args(["remote", "get-url", "origin"]);
    let remote = match run_with_timeout(remote_cmd, GIT_PROBE_TIMEOUT, "git remote probe").await {
        Ok(output) if output.status.success() => {
            String::from_utf8_lossy(&output.stdout).trim().to_string()
        }
        _ => String::new(),
    };
    Some((branch, remote))
}
