// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use sw_core::test_support::{seeded_state, task};
use sw_core::{AssignStrategy, InstanceStatus, TaskStatus};

#[test]
fn capability_match_requires_cover() {
    let state = seeded_state();
    let mut t = task(1, "review the diff", "any", 0);
    t.required_capabilities = vec!["review".into()];

    // Only codex advertises "review".
    let picked = pick_instance(AssignStrategy::CapabilityMatch, &t, &state);
    assert_eq!(picked.as_deref(), Some("codex"));
}

#[test]
fn worker_type_pin_restricts_candidates() {
    let state = seeded_state();
    let mut t = task(1, "implement", "any", 0);
    t.worker_type = Some("claude-code".into());

    let picked = pick_instance(AssignStrategy::LeastLoaded, &t, &state);
    assert_eq!(picked.as_deref(), Some("claude-code"));
}

#[test]
fn least_loaded_breaks_ties_by_fewest_tasks() {
    let mut state = seeded_state();
    if let Some(inst) = state.instances.get_mut("claude-code") {
        inst.attach_task(99);
    }
    state.tasks.insert(99, {
        let mut t = task(99, "busywork", "claude-code", 0);
        t.status = TaskStatus::InProgress;
        t
    });

    let t = task(1, "next", "any", 0);
    let picked = pick_instance(AssignStrategy::LeastLoaded, &t, &state);
    assert_eq!(picked.as_deref(), Some("codex"));
}

#[test]
fn round_robin_behaves_as_least_loaded() {
    let state = seeded_state();
    let t = task(1, "next", "any", 0);
    assert_eq!(
        pick_instance(AssignStrategy::RoundRobin, &t, &state),
        pick_instance(AssignStrategy::LeastLoaded, &t, &state),
    );
}

#[test]
fn full_instances_are_skipped() {
    let mut state = seeded_state();
    // codex has max_tasks 1; fill it.
    if let Some(inst) = state.instances.get_mut("codex") {
        inst.attach_task(50);
    }
    state.tasks.insert(50, {
        let mut t = task(50, "busy", "codex", 0);
        t.status = TaskStatus::InProgress;
        t
    });

    let mut t = task(1, "review", "any", 0);
    t.required_capabilities = vec!["review".into()];
    assert_eq!(pick_instance(AssignStrategy::CapabilityMatch, &t, &state), None);
}

#[test]
fn driver_is_never_a_candidate() {
    let state = seeded_state();
    let mut t = task(1, "anything", "any", 0);
    t.worker_type = Some("cursor".into());
    assert_eq!(pick_instance(AssignStrategy::LeastLoaded, &t, &state), None);
}

#[test]
fn apply_assignment_parks_the_task_on_the_instance() {
    let mut state = seeded_state();
    let id = state.push_task(task(0, "build", "any", 10));

    apply_assignment(&mut state, id, "claude-code", 20);

    let t = &state.tasks[&id];
    assert_eq!(t.assigned_to, "claude-code");
    assert_eq!(t.status, TaskStatus::Pending);
    let inst = &state.instances["claude-code"];
    assert!(inst.current_tasks.contains(&id));
    assert_eq!(inst.status, InstanceStatus::Busy);
    assert_eq!(inst.last_heartbeat, Some(20));
}
