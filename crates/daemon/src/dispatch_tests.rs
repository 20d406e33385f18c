// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use parking_lot::Mutex;
use serde_json::json;
use sw_core::test_support::sample_config;
use sw_core::FakeClock;
use sw_storage::{MemoryRepository, SignalFile, StateRepository};

struct FakeCanceller {
    cancelled: Mutex<Vec<String>>,
}

impl WorkerCanceller for FakeCanceller {
    fn cancel_worker(&self, agent: &str) -> bool {
        self.cancelled.lock().push(agent.to_string());
        true
    }

    fn is_worker_running(&self, _agent: &str) -> bool {
        false
    }
}

struct Fixture {
    ctx: HandlerCtx<FakeClock>,
    canceller: Arc<FakeCanceller>,
    #[allow(dead_code)]
    dir: tempfile::TempDir,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let clock = FakeClock::new();
    let repo = Arc::new(MemoryRepository::default());
    let service = Arc::new(sw_engine::StateService::new(
        repo as Arc<dyn StateRepository>,
        SignalFile::new(dir.path().join("state.signal")),
        Arc::new(sample_config()),
        clock.clone(),
    ));
    let registry = Arc::new(sw_engine::SessionRegistry::new(clock.clone()));
    let canceller = Arc::new(FakeCanceller { cancelled: Mutex::new(Vec::new()) });
    let ctx = HandlerCtx {
        service,
        registry,
        policy: Arc::new(sw_adapters::WorkspacePolicy::new("/p1")),
        canceller: Some(Arc::clone(&canceller) as Arc<dyn WorkerCanceller>),
        clock,
    };
    Fixture { ctx, canceller, dir }
}

async fn call(f: &Fixture, name: &str, args: serde_json::Value) -> Result<String, ServiceError> {
    dispatch_tool(&f.ctx, "sess-1", name, args).await
}

#[tokio::test]
async fn unknown_tool_is_not_found() {
    let f = fixture();
    let err = call(&f, "no_such_tool", json!({})).await.unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}

#[tokio::test]
async fn send_then_read_roundtrips_and_marks_read() {
    let f = fixture();
    call(&f, "send_message", json!({"from": "cursor", "to": "codex", "content": "ping"}))
        .await
        .unwrap();

    let first = call(&f, "read_messages", json!({"for": "codex", "unread_only": true}))
        .await
        .unwrap();
    assert!(first.contains("ping"));

    let second = call(&f, "read_messages", json!({"for": "codex", "unread_only": true}))
        .await
        .unwrap();
    assert!(!second.contains("ping"));
}

#[tokio::test]
async fn read_without_mark_keeps_messages_unread() {
    let f = fixture();
    call(&f, "send_message", json!({"from": "cursor", "to": "codex", "content": "ping"}))
        .await
        .unwrap();

    let first = call(
        &f,
        "read_messages",
        json!({"for": "codex", "unread_only": true, "mark_read": false}),
    )
    .await
    .unwrap();
    let second = call(&f, "read_messages", json!({"for": "codex", "unread_only": true}))
        .await
        .unwrap();
    assert!(first.contains("ping"));
    assert!(second.contains("ping"));
}

#[tokio::test]
async fn banner_summarizes_unread_and_pending() {
    let f = fixture();
    call(&f, "send_message", json!({"from": "cursor", "to": "codex", "content": "one"}))
        .await
        .unwrap();

    // codex heartbeats and sees the banner appended.
    let result = call(&f, "heartbeat", json!({"agent": "codex"})).await.unwrap();
    assert!(result.contains("📬 1 unread message(s)"));
}

#[tokio::test]
async fn suppressed_tools_get_no_banner() {
    let f = fixture();
    call(&f, "send_message", json!({"from": "cursor", "to": "codex", "content": "one"}))
        .await
        .unwrap();

    let result = call(
        &f,
        "read_messages",
        json!({"for": "codex", "unread_only": true, "mark_read": false}),
    )
    .await
    .unwrap();
    assert!(!result.contains("📬"));
}

/// In-flight cancel: the cancelled task overrides every other banner and
/// the supervisor's cancel hook fires.
#[tokio::test]
async fn cancel_agent_raises_stop_banner() {
    let f = fixture();
    call(
        &f,
        "create_task",
        json!({"title": "risky change", "created_by": "cursor", "assigned_to": "claude-code"}),
    )
    .await
    .unwrap();
    call(
        &f,
        "update_task",
        json!({"id": 1, "status": "in_progress", "updated_by": "claude-code"}),
    )
    .await
    .unwrap();

    // Unread noise that the STOP banner must override.
    call(&f, "send_message", json!({"from": "cursor", "to": "claude-code", "content": "fyi"}))
        .await
        .unwrap();

    call(&f, "cancel_agent", json!({"agent": "claude-code", "cancelled_by": "cursor"}))
        .await
        .unwrap();
    assert_eq!(*f.canceller.cancelled.lock(), vec!["claude-code".to_string()]);

    let next = call(&f, "heartbeat", json!({"agent": "claude-code"})).await.unwrap();
    let banner_start = next.find("🛑 STOP").unwrap();
    assert!(!next[banner_start..].contains("unread"));

    f.ctx.service.query(|state| {
        assert_eq!(state.tasks[&1].status, sw_core::TaskStatus::Cancelled);
        assert!(!state.tasks[&1].result_summary.is_empty());
        assert!(state.check_task_invariants().is_ok());
    });
}

#[tokio::test]
async fn banner_uses_session_bound_agent() {
    let f = fixture();
    f.ctx.registry.set_agent("sess-1", "codex");
    call(&f, "send_message", json!({"from": "cursor", "to": "codex", "content": "hi"}))
        .await
        .unwrap();

    // The tool speaks for cursor, but the session belongs to codex.
    let result = call(
        &f,
        "create_task",
        json!({"title": "t", "created_by": "cursor", "assigned_to": "claude-code"}),
    )
    .await
    .unwrap();
    assert!(result.contains("📬 1 unread message(s)"));
}

#[test]
fn banner_policy_orders_stop_first() {
    let mut state = sw_core::test_support::seeded_state();
    let mut t = sw_core::test_support::task(0, "dead", "codex", 1);
    t.status = sw_core::TaskStatus::Cancelled;
    state.push_task(t);
    state.push_message("cursor", "codex", "also unread", 2);

    let banner = banner_for(&state, "codex").unwrap();
    assert!(banner.starts_with("🛑 STOP"));
    assert!(!banner.contains("unread"));

    let quiet = banner_for(&state, "claude-code");
    assert!(quiet.is_none());
}
