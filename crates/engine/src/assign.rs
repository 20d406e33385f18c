// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task assignment: pick a worker instance for a claimable task.

use sw_core::{AgentRole, AssignStrategy, CollabState, Task};

/// Choose a worker instance for `task`, or `None` when nobody qualifies.
///
/// Candidates are worker instances with spare capacity; a `worker_type`
/// pin restricts by agent type, and required capabilities must be
/// covered. `least_loaded` skips the capability filter unless the task
/// names requirements; `round_robin` behaves as `least_loaded`.
pub fn pick_instance(strategy: AssignStrategy, task: &Task, state: &CollabState) -> Option<String> {
    let mut candidates: Vec<_> = state
        .instances
        .values()
        .filter(|inst| inst.role == AgentRole::Worker)
        .filter(|inst| inst.has_capacity())
        .filter(|inst| match &task.worker_type {
            Some(worker_type) => inst.agent_type == *worker_type,
            None => true,
        })
        .filter(|inst| match strategy {
            AssignStrategy::CapabilityMatch => inst.covers(&task.required_capabilities),
            AssignStrategy::LeastLoaded | AssignStrategy::RoundRobin => {
                task.required_capabilities.is_empty() || inst.covers(&task.required_capabilities)
            }
        })
        .collect();

    // Fewest current tasks wins; instance id breaks the remaining tie so
    // selection is deterministic.
    candidates.sort_by(|a, b| {
        a.current_tasks
            .len()
            .cmp(&b.current_tasks.len())
            .then_with(|| a.instance_id.cmp(&b.instance_id))
    });
    candidates.first().map(|inst| inst.instance_id.clone())
}

/// Record an assignment: the task stays pending but is parked on the
/// instance, which counts toward its load and flips it busy.
pub fn apply_assignment(state: &mut CollabState, task_id: u64, instance_id: &str, now_ms: u64) {
    if let Some(task) = state.tasks.get_mut(&task_id) {
        task.assigned_to = instance_id.to_string();
        task.updated_at = task.updated_at.max(now_ms);
    }
    if let Some(inst) = state.instances.get_mut(instance_id) {
        inst.attach_task(task_id);
        inst.last_heartbeat = Some(now_ms);
    }
}

#[cfg(test)]
#[path = "assign_tests.rs"]
mod tests;
