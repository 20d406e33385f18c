// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tool dispatch and the piggyback banner middleware.
//!
//! Every tool call touches the caller's session first. After a handler
//! commits, non-suppressed tools get a banner appended: a STOP override
//! when the caller has cancelled tasks, otherwise an unread/pending
//! summary, otherwise nothing.

use crate::handlers;
use serde_json::Value;
use std::sync::Arc;
use sw_adapters::WorkspacePolicy;
use sw_core::{Clock, CollabState};
use sw_engine::{ServiceError, SessionRegistry, StateService, WorkerCanceller};

/// Tools that already render unread state; no banner for them.
pub const SUPPRESS_BANNER: [&str; 2] = ["read_messages", "get_session_context"];

/// Shared context for all tool handlers.
pub struct HandlerCtx<C: Clock> {
    pub service: Arc<StateService<C>>,
    pub registry: Arc<SessionRegistry<C>>,
    pub policy: Arc<WorkspacePolicy>,
    pub canceller: Option<Arc<dyn WorkerCanceller>>,
    pub clock: C,
}

impl<C: Clock> HandlerCtx<C> {
    pub fn now_ms(&self) -> u64 {
        self.clock.epoch_ms()
    }
}

/// Run one tool call and append the banner.
pub async fn dispatch_tool<C: Clock>(
    ctx: &HandlerCtx<C>,
    session_id: &str,
    name: &str,
    args: Value,
) -> Result<String, ServiceError> {
    ctx.registry.touch_session(session_id);
    let banner_agent = caller_agent(ctx, session_id, &args);

    let result = match name {
        "send_message" => handlers::messages::send_message(ctx, args).await,
        "read_messages" => handlers::messages::read_messages(ctx, args).await,
        "create_task" => handlers::tasks::create_task(ctx, args).await,
        "update_task" => handlers::tasks::update_task(ctx, args).await,
        "claim_next" => handlers::claim::claim_next(ctx, args).await,
        "handoff" => handlers::agents::handoff(ctx, args).await,
        "cancel_agent" => handlers::agents::cancel_agent(ctx, args).await,
        "heartbeat" => handlers::agents::heartbeat(ctx, args).await,
        "report_progress" => handlers::agents::report_progress(ctx, args).await,
        "register_agent" => handlers::agents::register_agent(ctx, args).await,
        "get_session_context" => handlers::session::get_session_context(ctx, session_id, args).await,
        "set_presence" => handlers::presence::set_presence(ctx, args).await,
        "lock_file" => handlers::presence::lock_file(ctx, args).await,
        "create_plan" => handlers::plans::create_plan(ctx, args).await,
        "update_plan_item" => handlers::plans::update_plan_item(ctx, args).await,
        "add_note" => handlers::notes::add_note(ctx, args).await,
        other => Err(ServiceError::NotFound(format!("unknown tool {other:?}"))),
    };

    let mut content = result?;
    if !SUPPRESS_BANNER.contains(&name) {
        if let Some(agent) = banner_agent {
            let banner = ctx.service.query(|state| banner_for(state, &agent));
            if let Some(banner) = banner {
                content.push_str("\n\n");
                content.push_str(&banner);
            }
        }
    }
    Ok(content)
}

/// The agent this call speaks for: the session binding when present,
/// otherwise whatever agent-ish argument the tool carries.
fn caller_agent<C: Clock>(ctx: &HandlerCtx<C>, session_id: &str, args: &Value) -> Option<String> {
    if let Some(agent) = ctx.registry.agent_for_session(session_id) {
        return Some(agent);
    }
    for key in ["agent", "from", "for", "updated_by", "created_by"] {
        if let Some(value) = args.get(key).and_then(Value::as_str) {
            return Some(value.to_string());
        }
    }
    None
}

/// Banner policy, evaluated after the handler commits.
pub fn banner_for(state: &CollabState, agent: &str) -> Option<String> {
    let cancelled = state.cancelled_count_for(agent);
    if cancelled > 0 {
        return Some(format!(
            "🛑 STOP: {cancelled} of your task(s) have been cancelled. Stop working on them; call read_messages for details."
        ));
    }
    let unread = state.unread_count_for(agent);
    let pending = state.pending_count_for(agent);
    if unread > 0 || pending > 0 {
        return Some(format!(
            "📬 {unread} unread message(s), {pending} pending task(s). Call read_messages or claim_next."
        ));
    }
    None
}

/// Map service errors onto the wire kinds.
pub fn error_kind(err: &ServiceError) -> &'static str {
    match err {
        ServiceError::Validation(_) => "validation",
        ServiceError::NotFound(_) => "not_found",
        ServiceError::Conflict(_) => "conflict",
        ServiceError::Storage(_) => "persistence",
    }
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
