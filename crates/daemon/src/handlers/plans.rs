// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `create_plan` and `update_plan_item`.

use super::{parse_args, require_known_agent};
use crate::dispatch::HandlerCtx;
use serde::Deserialize;
use serde_json::Value;
use sw_core::{Clock, Plan, PlanItem, PlanItemStatus, PlanStatus};
use sw_engine::ServiceError;

#[derive(Deserialize)]
struct PlanItemArgs {
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    owner: String,
    #[serde(default)]
    priority: Option<u8>,
    #[serde(default)]
    dependencies: Vec<u32>,
    #[serde(default)]
    acceptance: Vec<String>,
    #[serde(default)]
    constraints: Vec<String>,
}

#[derive(Deserialize)]
struct CreatePlanArgs {
    title: String,
    #[serde(default)]
    goal: String,
    #[serde(default)]
    context: String,
    #[serde(default)]
    items: Vec<PlanItemArgs>,
    created_by: String,
}

pub async fn create_plan<C: Clock>(
    ctx: &HandlerCtx<C>,
    args: Value,
) -> Result<String, ServiceError> {
    let args: CreatePlanArgs = parse_args(args)?;
    if args.title.is_empty() {
        return Err(ServiceError::validation("title must not be empty"));
    }
    let now_ms = ctx.now_ms();
    let plan_id = format!("plan-{}", uuid::Uuid::new_v4().simple());

    ctx.service.run(move |state| {
        require_known_agent(state, &args.created_by)?;

        let items: Vec<PlanItem> = args
            .items
            .iter()
            .enumerate()
            .map(|(index, item)| PlanItem {
                id: index as u32 + 1,
                title: item.title.clone(),
                description: item.description.clone(),
                status: PlanItemStatus::Pending,
                owner: item.owner.clone(),
                dependencies: item.dependencies.clone(),
                blockers: Vec::new(),
                notes: Vec::new(),
                priority: item.priority.unwrap_or(3),
                reasoning: String::new(),
                acceptance: item.acceptance.clone(),
                constraints: item.constraints.clone(),
            })
            .collect();

        let item_count = items.len();
        state.plans.insert(
            plan_id.clone(),
            Plan {
                id: plan_id.clone(),
                title: args.title.clone(),
                goal: args.goal.clone(),
                context: args.context.clone(),
                items,
                created_by: args.created_by.clone(),
                created_at: now_ms,
                updated_at: now_ms,
                status: PlanStatus::Active,
            },
        );
        state.active_plan_id = Some(plan_id.clone());
        Ok(format!("Plan {plan_id} created with {item_count} item(s) and set active"))
    })
}

#[derive(Deserialize)]
struct UpdateItemArgs {
    plan_id: String,
    item_id: u32,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    owner: Option<String>,
    #[serde(default)]
    note: Option<String>,
}

pub async fn update_plan_item<C: Clock>(
    ctx: &HandlerCtx<C>,
    args: Value,
) -> Result<String, ServiceError> {
    let args: UpdateItemArgs = parse_args(args)?;
    let status = args
        .status
        .as_deref()
        .map(|s| {
            PlanItemStatus::parse(s)
                .ok_or_else(|| ServiceError::Validation(format!("unknown item status {s:?}")))
        })
        .transpose()?;
    let now_ms = ctx.now_ms();

    ctx.service.run(move |state| {
        let Some(plan) = state.plans.get_mut(&args.plan_id) else {
            return Err(ServiceError::NotFound(format!("unknown plan {:?}", args.plan_id)));
        };
        let Some(item) = plan.item_mut(args.item_id) else {
            return Err(ServiceError::NotFound(format!(
                "plan {} has no item #{}",
                args.plan_id, args.item_id
            )));
        };
        if let Some(status) = status {
            item.status = status;
        }
        if let Some(owner) = &args.owner {
            item.owner = owner.clone();
        }
        if let Some(note) = &args.note {
            item.notes.push(note.clone());
        }
        plan.updated_at = now_ms;

        // A fully completed plan stops being the active one.
        let finished = plan.items.iter().all(|i| i.status == PlanItemStatus::Completed);
        if finished {
            plan.status = PlanStatus::Completed;
            if state.active_plan_id.as_deref() == Some(args.plan_id.as_str()) {
                state.active_plan_id = None;
            }
        }
        Ok(format!("Plan item #{} updated", args.item_id))
    })
}
