// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end scenarios driving the coordinator through its tool surface.

use serde_json::json;
use std::sync::Arc;
use sw_adapters::WorkspacePolicy;
use sw_core::test_support::sample_config;
use sw_core::{Clock, FakeClock, InstanceStatus, OrchestrationConfig, TaskStatus};
use sw_daemon::{dispatch_tool, HandlerCtx};
use sw_engine::{
    classify, FailureClass, ServiceError, SessionRegistry, StateService, Watchdog, WorkerSupervisor,
};
use sw_storage::{MemoryRepository, SignalFile, StateRepository};

struct World {
    ctx: HandlerCtx<FakeClock>,
    service: Arc<StateService<FakeClock>>,
    registry: Arc<SessionRegistry<FakeClock>>,
    clock: FakeClock,
    #[allow(dead_code)]
    dir: tempfile::TempDir,
}

fn world() -> World {
    world_with(sample_config())
}

fn world_with(config: OrchestrationConfig) -> World {
    let dir = tempfile::tempdir().unwrap();
    let clock = FakeClock::new();
    let repo = Arc::new(MemoryRepository::default());
    let service = Arc::new(StateService::new(
        repo as Arc<dyn StateRepository>,
        SignalFile::new(dir.path().join("state.signal")),
        Arc::new(config),
        clock.clone(),
    ));
    let registry = Arc::new(SessionRegistry::new(clock.clone()));
    let ctx = HandlerCtx {
        service: Arc::clone(&service),
        registry: Arc::clone(&registry),
        policy: Arc::new(WorkspacePolicy::new("/p1")),
        canceller: None,
        clock: clock.clone(),
    };
    World { ctx, service, registry, clock, dir }
}

async fn call(world: &World, name: &str, args: serde_json::Value) -> Result<String, ServiceError> {
    dispatch_tool(&world.ctx, "sess-spec", name, args).await
}

/// Ping/pong across the driver and both workers.
#[tokio::test]
async fn s1_ping_pong() {
    let w = world();
    for to in ["claude-code", "codex"] {
        call(&w, "send_message", json!({"from": "cursor", "to": to, "content": "ping"}))
            .await
            .unwrap();
    }

    for worker in ["claude-code", "codex"] {
        let inbox = call(&w, "read_messages", json!({"for": worker, "unread_only": true}))
            .await
            .unwrap();
        assert_eq!(inbox.matches("ping").count(), 1, "{worker} should see exactly one ping");
        call(&w, "send_message", json!({"from": worker, "to": "cursor", "content": "pong"}))
            .await
            .unwrap();
    }

    let driver_inbox =
        call(&w, "read_messages", json!({"for": "cursor", "unread_only": true})).await.unwrap();
    assert_eq!(driver_inbox.matches("pong").count(), 2);

    let total = w.service.query(|state| state.messages.len());
    assert_eq!(total, 4);
}

/// Stuck-task recovery at tight thresholds.
#[tokio::test]
async fn s2_stuck_task_recovery() {
    let mut config = sample_config();
    config.watchdog.heartbeat_secs = 60;
    config.watchdog.task_stuck_secs = 300;
    let w = world_with(config);

    let now_ms = w.clock.epoch_ms();
    w.service
        .run(|state| {
            let mut task = sw_core::test_support::task(
                0,
                "implement parser",
                "claude-code",
                now_ms.saturating_sub(900_000),
            );
            task.status = TaskStatus::InProgress;
            let id = state.push_task(task);
            if let Some(inst) = state.instances.get_mut("claude-code") {
                inst.attach_task(id);
                inst.last_heartbeat = Some(now_ms.saturating_sub(900_000));
            }
            Ok(())
        })
        .unwrap();

    let watchdog =
        Watchdog::new(Arc::clone(&w.service), Arc::clone(&w.registry), w.clock.clone());
    watchdog.run_cycle();

    w.service.query(|state| {
        assert_eq!(state.tasks[&1].status, TaskStatus::Pending);
        let inst = &state.instances["claude-code"];
        assert_eq!(inst.status, InstanceStatus::Offline);
        assert!(inst.current_tasks.is_empty());

        let to_driver: Vec<_> = state
            .messages
            .iter()
            .filter(|m| m.from == "system" && m.to == "cursor")
            .collect();
        assert_eq!(to_driver.len(), 1);
    });
}

/// Quota classification feeds the supervisor's deadline backoff.
#[tokio::test]
async fn s3_quota_backoff() {
    let output = "TerminalQuotaError: request rejected, quota exhausted. \
                  Your quota will reset after 17h29m42s.";
    let class = classify(output);
    let FailureClass::QuotaExhausted { retry_after } = &class else {
        panic!("expected quota classification, got {class:?}");
    };
    let retry_after = retry_after.expect("reset duration should parse");
    assert_eq!(retry_after.as_secs(), 17 * 3600 + 29 * 60 + 42);

    let w = world();
    let supervisor = Arc::new(WorkerSupervisor::new(
        Arc::clone(&w.service),
        Arc::clone(&w.registry),
        w.clock.clone(),
        w.dir.path().join("logs"),
        w.dir.path().to_path_buf(),
    ));
    supervisor.record_terminal_for_tests("claude-code", &class);

    let now_ms = w.clock.epoch_ms();
    assert!(supervisor.backoff_state("claude-code", now_ms).is_blocked());
    let after_reset = now_ms + retry_after.as_millis() as u64 + 1;
    assert!(!supervisor.backoff_state("claude-code", after_reset).is_blocked());

    let rate_limit_note = w.service.query(|state| {
        state.messages.iter().any(|m| m.from == "system" && m.content.starts_with("⏸️"))
    });
    assert!(rate_limit_note);
}

/// In-flight cancel: STOP banner with no unread summary underneath.
#[tokio::test]
async fn s4_in_flight_cancel() {
    let w = world();
    call(
        &w,
        "create_task",
        json!({"title": "migration", "created_by": "cursor", "assigned_to": "claude-code"}),
    )
    .await
    .unwrap();
    call(&w, "update_task", json!({"id": 1, "status": "in_progress", "updated_by": "claude-code"}))
        .await
        .unwrap();

    call(&w, "cancel_agent", json!({"agent": "claude-code", "cancelled_by": "cursor"}))
        .await
        .unwrap();

    w.service.query(|state| {
        assert_eq!(state.tasks[&1].status, TaskStatus::Cancelled);
        assert!(!state.tasks[&1].result_summary.is_empty());
        assert!(state
            .messages
            .iter()
            .any(|m| m.to == "claude-code" && m.content.starts_with("🛑 STOP")));
    });

    let next = call(&w, "heartbeat", json!({"agent": "claude-code"})).await.unwrap();
    let banner = &next[next.find("🛑 STOP").expect("stop banner")..];
    assert!(!banner.contains("unread"));
}

/// Workspace change propagates to the policy after the commit.
#[tokio::test]
async fn s5_workspace_change() {
    let w = world();
    call(
        &w,
        "set_presence",
        json!({"agent": "cursor", "status": "working", "workspace": "/p1"}),
    )
    .await
    .unwrap();
    assert_eq!(w.ctx.policy.root(), std::path::PathBuf::from("/p1"));

    call(
        &w,
        "set_presence",
        json!({"agent": "cursor", "status": "working", "workspace": "/p2"}),
    )
    .await
    .unwrap();

    assert_eq!(w.ctx.policy.root(), std::path::PathBuf::from("/p2"));
    w.service.query(|state| {
        assert_eq!(state.presence["cursor"].workspace, "/p2");
    });
}

/// Dependency gate: in_progress requires completed dependencies.
#[tokio::test]
async fn s6_dependency_gate() {
    let w = world();
    call(&w, "create_task", json!({"title": "schema", "created_by": "cursor", "assigned_to": "codex"}))
        .await
        .unwrap();
    call(
        &w,
        "create_task",
        json!({
            "title": "api",
            "created_by": "cursor",
            "assigned_to": "codex",
            "depends_on": [1],
        }),
    )
    .await
    .unwrap();

    let err = call(&w, "update_task", json!({"id": 2, "status": "in_progress", "updated_by": "codex"}))
        .await
        .unwrap_err();
    match err {
        ServiceError::Validation(message) => assert!(message.contains("[1]")),
        other => panic!("expected validation error, got {other}"),
    }

    call(&w, "update_task", json!({"id": 1, "status": "completed", "updated_by": "codex"}))
        .await
        .unwrap();
    call(&w, "update_task", json!({"id": 2, "status": "in_progress", "updated_by": "codex"}))
        .await
        .unwrap();

    w.service.query(|state| {
        assert_eq!(state.tasks[&2].status, TaskStatus::InProgress);
        assert!(state.check_task_invariants().is_ok());
    });
}

/// Round-trip law: complete lifecycle leaves the worker idle.
#[tokio::test]
async fn task_lifecycle_returns_worker_to_idle() {
    let w = world();
    call(&w, "create_task", json!({"title": "t", "created_by": "cursor", "assigned_to": "codex"}))
        .await
        .unwrap();
    call(&w, "update_task", json!({"id": 1, "status": "in_progress", "updated_by": "codex"}))
        .await
        .unwrap();
    w.service.query(|state| {
        assert_eq!(state.instances["codex"].status, InstanceStatus::Busy);
    });

    call(&w, "update_task", json!({"id": 1, "status": "completed", "updated_by": "codex"}))
        .await
        .unwrap();
    w.service.query(|state| {
        let inst = &state.instances["codex"];
        assert!(inst.current_tasks.is_empty());
        assert_eq!(inst.status, InstanceStatus::Idle);
    });
}

/// claim_next priority: messages beat tasks, tasks beat plan items.
#[tokio::test]
async fn claim_next_priority_order() {
    let w = world();
    call(&w, "create_task", json!({"title": "work", "created_by": "cursor", "assigned_to": "codex"}))
        .await
        .unwrap();
    call(&w, "send_message", json!({"from": "cursor", "to": "codex", "content": "read me first"}))
        .await
        .unwrap();

    let first = call(&w, "claim_next", json!({"agent": "codex", "dry_run": true})).await.unwrap();
    assert!(first.contains("read_messages"));

    call(&w, "read_messages", json!({"for": "codex"})).await.unwrap();
    let second = call(&w, "claim_next", json!({"agent": "codex"})).await.unwrap();
    assert!(second.contains("start_task"));

    // The claimed task now continues instead of being claimed twice.
    let third = call(&w, "claim_next", json!({"agent": "codex"})).await.unwrap();
    assert!(third.contains("continue_task"));
}

/// Claiming a task with context files takes the auto-locks.
#[tokio::test]
async fn claim_next_locks_context_files() {
    let w = world();
    call(
        &w,
        "create_task",
        json!({
            "title": "edit parser",
            "created_by": "cursor",
            "assigned_to": "codex",
            "relevant_files": ["src/parser.rs", "src/lexer.rs"],
        }),
    )
    .await
    .unwrap();

    call(&w, "claim_next", json!({"agent": "codex"})).await.unwrap();

    w.service.query(|state| {
        assert_eq!(state.file_locks.len(), 2);
        assert!(state.file_locks.values().all(|l| l.locked_by == "codex"));
        assert_eq!(state.tasks[&1].context_id.as_deref(), Some("ctx-1"));
    });
}
