// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_helpers::{harness_with, Harness};
use std::time::Duration;
use sw_core::test_support::{sample_config, task};
use sw_core::{OrchestrationConfig, SYSTEM_SENDER};

fn fast_config() -> OrchestrationConfig {
    let mut config = sample_config();
    config.watchdog.heartbeat_secs = 60;
    config.watchdog.task_stuck_secs = 300;
    config.watchdog.session_stale_secs = 300;
    config.watchdog.progress_warning_secs = 180;
    config.watchdog.progress_critical_secs = 300;
    config
}

fn watchdog_for(h: &Harness) -> Watchdog<sw_core::FakeClock> {
    Watchdog::new(std::sync::Arc::clone(&h.service), std::sync::Arc::clone(&h.registry), h.clock.clone())
}

fn driver_messages(h: &Harness) -> Vec<String> {
    h.service.query(|s| {
        s.messages
            .iter()
            .filter(|m| m.from == SYSTEM_SENDER && m.to == "cursor")
            .map(|m| m.content.clone())
            .collect()
    })
}

/// Stuck-task recovery: a worker with a long-stale heartbeat loses its
/// in-progress task, goes offline, and the driver gets one summary.
#[test]
fn stale_heartbeat_resets_task_and_marks_offline() {
    let h = harness_with(fast_config());
    let wd = watchdog_for(&h);

    let now_ms = h.clock.epoch_ms();
    h.service
        .run(|state| {
            let mut t = task(0, "fix flaky test", "claude-code", now_ms.saturating_sub(900_000));
            t.status = TaskStatus::InProgress;
            let id = state.push_task(t);
            if let Some(inst) = state.instances.get_mut("claude-code") {
                inst.attach_task(id);
                inst.last_heartbeat = Some(now_ms.saturating_sub(900_000));
            }
            Ok(())
        })
        .unwrap();

    wd.run_cycle();

    h.service.query(|state| {
        let t = &state.tasks[&1];
        assert_eq!(t.status, TaskStatus::Pending);
        assert!(!t.result_summary.is_empty());
        let inst = &state.instances["claude-code"];
        assert_eq!(inst.status, InstanceStatus::Offline);
        assert!(inst.current_tasks.is_empty());
    });

    let messages = driver_messages(&h);
    assert_eq!(messages.len(), 1);
    assert!(messages[0].starts_with("🔧"));
}

#[test]
fn live_agents_keep_their_tasks() {
    let h = harness_with(fast_config());
    let wd = watchdog_for(&h);
    let now_ms = h.clock.epoch_ms();

    h.service
        .run(|state| {
            let mut t = task(0, "ongoing", "claude-code", now_ms);
            t.status = TaskStatus::InProgress;
            let id = state.push_task(t);
            if let Some(inst) = state.instances.get_mut("claude-code") {
                inst.attach_task(id);
                inst.last_heartbeat = Some(now_ms);
            }
            Ok(())
        })
        .unwrap();

    wd.run_cycle();

    h.service.query(|state| {
        assert_eq!(state.tasks[&1].status, TaskStatus::InProgress);
        assert_eq!(state.instances["claude-code"].status, InstanceStatus::Busy);
    });
    assert!(driver_messages(&h).is_empty());
}

#[test]
fn stuck_task_with_unresponsive_assignee_is_reset() {
    let h = harness_with(fast_config());
    let wd = watchdog_for(&h);
    let now_ms = h.clock.epoch_ms();

    h.service
        .run(|state| {
            // Heartbeat missing entirely, so the dead-agent sweep skips it;
            // the stuck check catches it via updated_at.
            let mut t = task(0, "stalled", "claude-code", now_ms.saturating_sub(600_000));
            t.status = TaskStatus::InProgress;
            let id = state.push_task(t);
            if let Some(inst) = state.instances.get_mut("claude-code") {
                inst.attach_task(id);
            }
            Ok(())
        })
        .unwrap();

    wd.run_cycle();

    h.service.query(|state| {
        assert_eq!(state.tasks[&1].status, TaskStatus::Pending);
        assert!(state.tasks[&1].result_summary.contains("unresponsive"));
    });
}

#[test]
fn progress_alerts_escalate_without_repeating() {
    let h = harness_with(fast_config());
    let wd = watchdog_for(&h);
    let now_ms = h.clock.epoch_ms();

    h.service
        .run(|state| {
            let mut t = task(0, "slow burn", "claude-code", now_ms);
            t.status = TaskStatus::InProgress;
            t.last_progress_at = Some(now_ms.saturating_sub(200_000));
            let id = state.push_task(t);
            if let Some(inst) = state.instances.get_mut("claude-code") {
                inst.attach_task(id);
                inst.last_heartbeat = Some(now_ms);
            }
            Ok(())
        })
        .unwrap();

    // 200s without progress: warning tier.
    wd.run_cycle();
    let first = driver_messages(&h);
    assert_eq!(first.len(), 1);
    assert!(first[0].starts_with("⚠️"));

    // Same tier again: no repeat.
    wd.run_cycle();
    assert_eq!(driver_messages(&h).len(), 1);

    // Keep the heartbeat fresh but let progress age past critical.
    h.clock.advance(Duration::from_secs(150));
    let now_ms = h.clock.epoch_ms();
    h.service
        .run(move |state| {
            if let Some(inst) = state.instances.get_mut("claude-code") {
                inst.last_heartbeat = Some(now_ms);
            }
            if let Some(t) = state.tasks.get_mut(&1) {
                t.updated_at = now_ms;
            }
            Ok(())
        })
        .unwrap();
    wd.run_cycle();
    let after = driver_messages(&h);
    assert_eq!(after.len(), 2);
    assert!(after[1].starts_with("🔴"));
}

#[test]
fn sla_breach_outranks_progress_tiers() {
    let h = harness_with(fast_config());
    let wd = watchdog_for(&h);
    let now_ms = h.clock.epoch_ms();

    h.service
        .run(|state| {
            let mut t = task(0, "bounded work", "claude-code", now_ms.saturating_sub(120_000));
            t.status = TaskStatus::InProgress;
            t.updated_at = now_ms.saturating_sub(120_000);
            t.expected_duration_secs = 60;
            t.last_progress_at = Some(now_ms);
            let id = state.push_task(t);
            if let Some(inst) = state.instances.get_mut("claude-code") {
                inst.attach_task(id);
                inst.last_heartbeat = Some(now_ms);
            }
            Ok(())
        })
        .unwrap();

    wd.run_cycle();
    let messages = driver_messages(&h);
    assert_eq!(messages.len(), 1);
    assert!(messages[0].starts_with("⏱️"));

    wd.run_cycle();
    assert_eq!(driver_messages(&h).len(), 1);
}

#[test]
fn stale_worker_sessions_are_pruned_but_not_the_drivers() {
    let h = harness_with(fast_config());
    let wd = watchdog_for(&h);

    h.registry.set_agent("s-driver", "cursor");
    h.registry.set_agent("s-worker", "claude-code");
    h.registry.touch_session("s-driver");
    h.registry.touch_session("s-worker");

    h.clock.advance(Duration::from_secs(600));
    wd.run_cycle();

    assert!(h.registry.has_active_session("cursor"));
    assert!(!h.registry.has_active_session("claude-code"));
}
