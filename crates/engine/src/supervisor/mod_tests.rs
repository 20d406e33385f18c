// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_helpers::{harness, Harness};
use sw_core::FakeClock;
use yare::parameterized;

fn supervisor_for(h: &Harness) -> Arc<WorkerSupervisor<FakeClock>> {
    Arc::new(WorkerSupervisor::new(
        Arc::clone(&h.service),
        Arc::clone(&h.registry),
        h.clock.clone(),
        std::env::temp_dir().join("sw-test-logs"),
        std::env::temp_dir(),
    ))
}

#[parameterized(
    seconds = { 59, "59s" },
    minutes = { 120, "2m" },
    mixed = { 3723, "1h2m3s" },
    zero = { 0, "0s" },
)]
fn duration_formatting(secs: u64, expected: &str) {
    assert_eq!(format_duration(Duration::from_secs(secs)), expected);
}

/// Quota backoff: a parsed reset duration blocks respawns until the
/// deadline and posts one rate-limit message.
#[test]
fn quota_failure_sets_deadline_backoff() {
    let h = harness();
    let supervisor = supervisor_for(&h);
    let now_ms = h.clock.epoch_ms();

    let retry_after = Duration::from_secs(17 * 3600 + 30 * 60);
    supervisor.record_terminal_for_tests(
        "claude-code",
        &FailureClass::QuotaExhausted { retry_after: Some(retry_after) },
    );

    match supervisor.backoff_state("claude-code", now_ms) {
        Backoff::Blocked(remaining) => {
            assert!(remaining > Duration::from_secs(17 * 3600));
        }
        other => panic!("expected blocked, got {other:?}"),
    }

    // Past the deadline the worker is eligible again.
    let later = now_ms + retry_after.as_millis() as u64 + 1;
    assert_eq!(supervisor.backoff_state("claude-code", later), Backoff::Clear);

    let messages: Vec<String> = h.service.query(|s| {
        s.messages.iter().filter(|m| m.to == "cursor").map(|m| m.content.clone()).collect()
    });
    assert_eq!(messages.len(), 1);
    assert!(messages[0].starts_with("⏸️"));
    assert!(messages[0].contains("17h30m"));
}

#[test]
fn auth_failure_blocks_permanently() {
    let h = harness();
    let supervisor = supervisor_for(&h);

    supervisor.record_terminal_for_tests("codex", &FailureClass::AuthFailure);
    assert_eq!(supervisor.backoff_state("codex", h.clock.epoch_ms()), Backoff::Permanent);

    let content: Vec<String> =
        h.service.query(|s| s.messages.iter().map(|m| m.content.clone()).collect());
    assert!(content.iter().any(|c| c.starts_with("🔑")));
}

#[test]
fn terminal_message_targets_last_correspondent() {
    let h = harness();
    let supervisor = supervisor_for(&h);

    // The driver last messaged codex, so the driver hears about it even
    // if another agent messaged earlier.
    h.service
        .run(|state| {
            state.push_message("claude-code", "codex", "help me", 1);
            state.push_message("cursor", "codex", "status?", 2);
            Ok(())
        })
        .unwrap();

    supervisor.record_terminal_for_tests("codex", &FailureClass::NotFound);
    let to: Vec<String> = h.service.query(|s| {
        s.messages.iter().filter(|m| m.from == "system").map(|m| m.to.clone()).collect()
    });
    assert_eq!(to, vec!["cursor".to_string()]);
}

/// New work newer than the last failure clears the backoff.
#[test]
fn backoff_resets_when_new_work_arrives() {
    let h = harness();
    let supervisor = supervisor_for(&h);
    let now_ms = h.clock.epoch_ms();

    supervisor.inject_failure("claude-code", 3, now_ms);
    let cfg = supervisor
        .configs
        .iter()
        .find(|c| c.instance_id == "claude-code")
        .cloned()
        .unwrap();

    // Blocked: the schedule demands 4 minutes after 3 failures.
    let quiet = h.service.query(|s| s.clone());
    assert!(supervisor.backoff_blocks(&cfg, &quiet, now_ms + 1_000));

    // A fresh message addressed to the worker resets it.
    h.service
        .run(move |state| {
            state.push_message("cursor", "claude-code", "new work", now_ms + 2_000);
            Ok(())
        })
        .unwrap();
    let with_work = h.service.query(|s| s.clone());
    assert!(!supervisor.backoff_blocks(&cfg, &with_work, now_ms + 3_000));
    assert_eq!(supervisor.backoff_state("claude-code", now_ms + 3_000), Backoff::Clear);
}

#[test]
fn cancel_worker_falls_back_to_agent_type() {
    let h = harness();
    let supervisor = supervisor_for(&h);
    let token = CancellationToken::new();
    supervisor.inner.lock().running.insert("claude-code".to_string(), token.clone());

    assert!(supervisor.is_worker_running("claude-code"));
    assert!(supervisor.cancel_worker("claude-code"));
    assert!(token.is_cancelled());

    // Type-level cancel for a numbered instance.
    let token2 = CancellationToken::new();
    supervisor.inner.lock().running.clear();
    supervisor.inner.lock().running.insert("codex".to_string(), token2.clone());
    assert!(supervisor.cancel_worker("codex"));
    assert!(token2.is_cancelled());

    assert!(!supervisor.cancel_worker("gemini"));
}

#[tokio::test]
async fn restart_clears_failure_bookkeeping() {
    let mut config = sw_core::test_support::sample_config();
    // No workers configured: check() returns immediately.
    config.workers.clear();
    let h = crate::test_helpers::harness_with(config);
    let supervisor = supervisor_for(&h);

    supervisor.inject_failure("claude-code", 9, h.clock.epoch_ms());
    supervisor.restart_workers().await;
    assert_eq!(supervisor.backoff_state("claude-code", h.clock.epoch_ms()), Backoff::Clear);
}
