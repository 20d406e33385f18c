// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `send_message` and `read_messages`.

use super::{parse_args, require_known_agent};
use crate::dispatch::HandlerCtx;
use serde::Deserialize;
use serde_json::{json, Value};
use sw_core::{Clock, Message, BROADCAST};
use sw_engine::ServiceError;

#[derive(Deserialize)]
struct SendArgs {
    from: String,
    to: String,
    content: String,
}

pub async fn send_message<C: Clock>(
    ctx: &HandlerCtx<C>,
    args: Value,
) -> Result<String, ServiceError> {
    let args: SendArgs = parse_args(args)?;
    if args.content.is_empty() {
        return Err(ServiceError::validation("content must not be empty"));
    }
    let now_ms = ctx.now_ms();
    let retention = ctx.service.config().retention.clone();

    ctx.service.run(move |state| {
        require_known_agent(state, &args.from)?;
        if args.to != BROADCAST {
            require_known_agent(state, &args.to)?;
        }
        let id = state.push_message(&args.from, &args.to, &args.content, now_ms);
        // Opportunistic retention sweep on every insert.
        let pruned = state.prune_messages(retention.max_messages, retention.max_age_days, now_ms);
        if pruned > 0 {
            tracing::debug!(pruned, "pruned old messages");
        }
        Ok(format!("Message #{id} sent to {}", args.to))
    })
}

fn default_limit() -> usize {
    10
}

fn default_true() -> bool {
    true
}

#[derive(Deserialize)]
struct ReadArgs {
    #[serde(rename = "for")]
    agent: String,
    #[serde(default)]
    unread_only: bool,
    #[serde(default = "default_limit")]
    limit: usize,
    #[serde(default = "default_true")]
    mark_read: bool,
}

/// Newest-first, capped at 100. With `mark_read` the returned messages
/// flip to read and the caller's read cursor advances.
pub async fn read_messages<C: Clock>(
    ctx: &HandlerCtx<C>,
    args: Value,
) -> Result<String, ServiceError> {
    let args: ReadArgs = parse_args(args)?;
    let limit = args.limit.clamp(1, 100);
    let now_ms = ctx.now_ms();
    let agent = args.agent.clone();
    let mark_read = args.mark_read;

    let collect = move |state: &sw_core::CollabState| -> Result<Vec<Message>, ServiceError> {
        require_known_agent(state, &args.agent)?;
        Ok(state
            .messages
            .iter()
            .rev()
            .filter(|m| m.addressed_to(&args.agent))
            .filter(|m| !args.unread_only || !m.read)
            .take(limit)
            .cloned()
            .collect())
    };

    let messages = if mark_read {
        ctx.service.run(move |state| {
            let found = collect(state)?;
            let ids: Vec<u64> = found.iter().map(|m| m.id).collect();
            for message in state.messages.iter_mut() {
                if ids.contains(&message.id) {
                    message.read = true;
                }
            }
            let entry = state.agent_contexts.entry(agent.clone()).or_default();
            entry.agent = agent.clone();
            if let Some(max) = ids.iter().max() {
                entry.last_checked_msg_id = entry.last_checked_msg_id.max(*max);
            }
            entry.last_check_time = now_ms;
            Ok(found)
        })?
    } else {
        ctx.service.query(collect)?
    };

    let rendered: Vec<Value> = messages
        .iter()
        .map(|m| {
            json!({
                "id": m.id,
                "from": m.from,
                "to": m.to,
                "content": m.content,
                "timestamp": m.timestamp,
                "read": m.read,
            })
        })
        .collect();
    serde_json::to_string_pretty(&json!({ "messages": rendered }))
        .map_err(|e| ServiceError::Validation(format!("render failed: {e}")))
}
