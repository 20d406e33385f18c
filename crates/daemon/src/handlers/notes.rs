// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `add_note`.

use super::{parse_args, require_known_agent};
use crate::dispatch::HandlerCtx;
use serde::Deserialize;
use serde_json::Value;
use sw_core::{Clock, Note};
use sw_engine::ServiceError;

#[derive(Deserialize)]
struct NoteArgs {
    author: String,
    content: String,
    #[serde(default)]
    task_id: Option<u64>,
}

pub async fn add_note<C: Clock>(ctx: &HandlerCtx<C>, args: Value) -> Result<String, ServiceError> {
    let args: NoteArgs = parse_args(args)?;
    if args.content.is_empty() {
        return Err(ServiceError::validation("content must not be empty"));
    }
    let now_ms = ctx.now_ms();

    ctx.service.run(move |state| {
        require_known_agent(state, &args.author)?;
        if let Some(task_id) = args.task_id {
            if !state.tasks.contains_key(&task_id) {
                return Err(ServiceError::NotFound(format!("unknown task #{task_id}")));
            }
        }
        let id = state.next_note_id;
        state.next_note_id += 1;
        state.notes.push(Note {
            id,
            author: args.author.clone(),
            content: args.content.clone(),
            task_id: args.task_id,
            created_at: now_ms,
        });
        Ok(format!("Note #{id} added"))
    })
}
