// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::time::Duration;
use sw_core::FakeClock;

#[test]
fn set_agent_binds_both_directions() {
    let registry = SessionRegistry::new(FakeClock::new());
    registry.set_agent("s1", "cursor");

    assert_eq!(registry.agent_for_session("s1").as_deref(), Some("cursor"));
    assert_eq!(registry.session_for_agent("cursor").as_deref(), Some("s1"));
    assert!(registry.has_active_session("cursor"));
}

#[test]
fn rebinding_an_agent_evicts_the_old_session() {
    let registry = SessionRegistry::new(FakeClock::new());
    registry.set_agent("s1", "codex");
    registry.touch_session("s1");
    registry.set_agent("s2", "codex");

    assert_eq!(registry.agent_for_session("s1"), None);
    assert_eq!(registry.session_for_agent("codex").as_deref(), Some("s2"));
    // The evicted session's activity went with it.
    assert_eq!(registry.last_activity_for_agent("codex"), None);
}

#[test]
fn touch_ignores_unknown_sessions() {
    let registry = SessionRegistry::new(FakeClock::new());
    registry.touch_session("ghost");
    assert_eq!(registry.agent_for_session("ghost"), None);
}

#[test]
fn activity_is_recorded_per_touch() {
    let clock = FakeClock::new();
    let registry = SessionRegistry::new(clock.clone());
    registry.set_agent("s1", "cursor");
    assert_eq!(registry.last_activity_for_agent("cursor"), None);

    registry.touch_session("s1");
    let first = registry.last_activity_for_agent("cursor");
    assert!(first.is_some());

    clock.advance(Duration::from_secs(30));
    registry.touch_session("s1");
    assert!(registry.last_activity_for_agent("cursor") > first);
}

#[test]
fn remove_session_drops_both_directions() {
    let registry = SessionRegistry::new(FakeClock::new());
    registry.set_agent("s1", "cursor");
    registry.remove_session("s1");

    assert!(!registry.has_active_session("cursor"));
    assert_eq!(registry.agent_for_session("s1"), None);
}

#[test]
fn connected_agent_is_most_recently_active() {
    let clock = FakeClock::new();
    let registry = SessionRegistry::new(clock.clone());
    registry.set_agent("s1", "cursor");
    registry.set_agent("s2", "claude-code");

    registry.touch_session("s2");
    clock.advance(Duration::from_secs(1));
    registry.touch_session("s1");

    assert_eq!(registry.connected_agent().as_deref(), Some("cursor"));
    let agents = registry.connected_agents();
    assert_eq!(agents, vec!["cursor".to_string(), "claude-code".to_string()]);
}

#[test]
fn dashboard_url_round_trips() {
    let registry = SessionRegistry::new(FakeClock::new());
    assert_eq!(registry.dashboard_url(), None);
    registry.set_dashboard_url("http://localhost:7420");
    assert_eq!(registry.dashboard_url().as_deref(), Some("http://localhost:7420"));
}
