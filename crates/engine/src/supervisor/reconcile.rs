// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Post-mortem reconciliation after a worker subprocess exits.

use crate::error::ServiceError;
use crate::service::StateService;
use std::path::Path;
use sw_core::{Clock, InstanceStatus, TaskStatus};

/// Reset every `in_progress` task the exited worker still held.
///
/// A worker that exits cleanly should have moved its tasks to a terminal
/// status first; anything left behind goes back to `pending` so another
/// run (or another worker) can pick it up. Returns the reset task ids.
pub fn reconcile_after_exit<C: Clock>(
    service: &StateService<C>,
    instance_id: &str,
    agent_type: &str,
    log_path: &Path,
) -> Result<Vec<u64>, ServiceError> {
    let driver = service.config().driver.name.clone();
    let log_display = log_path.display().to_string();
    let instance = instance_id.to_string();
    let agent_type = agent_type.to_string();
    let now_ms = service.clock().epoch_ms();

    service.run(move |state| {
        let mut reset: Vec<u64> = Vec::new();
        for task in state.tasks.values_mut() {
            if task.status != TaskStatus::InProgress {
                continue;
            }
            if task.assigned_to != instance && task.assigned_to != agent_type {
                continue;
            }
            task.status = TaskStatus::Pending;
            task.updated_at = now_ms;
            if task.result_summary.is_empty() {
                task.result_summary = format!(
                    "worker exited without updating status; check {log_display}"
                );
            }
            reset.push(task.id);
        }

        for id in &reset {
            if let Some(inst) = state.instances.get_mut(&instance) {
                inst.detach_task(*id);
            }
        }
        if let Some(inst) = state.instances.get_mut(&instance) {
            if inst.current_tasks.is_empty() && inst.status == InstanceStatus::Busy {
                inst.status = InstanceStatus::Idle;
            }
        }

        if !reset.is_empty() {
            let ids: Vec<String> = reset.iter().map(|id| format!("#{id}")).collect();
            state.push_system_message(
                &driver,
                format!(
                    "🔧 {instance} exited leaving {} task(s) in progress; reset to pending: {}",
                    reset.len(),
                    ids.join(", ")
                ),
                now_ms,
            );
            tracing::info!(instance = %instance, tasks = ?reset, "reconciled tasks after worker exit");
        }
        Ok(reset)
    })
}

#[cfg(test)]
#[path = "reconcile_tests.rs"]
mod tests;
