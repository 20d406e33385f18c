// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use sw_core::test_support::seeded_state;

#[test]
fn load_of_missing_snapshot_is_fresh_state() {
    let dir = tempfile::tempdir().unwrap();
    let repo = JsonSnapshotRepository::new(dir.path().join("state.json.zst"));

    let state = repo.load().unwrap();
    assert!(state.messages.is_empty());
    assert_eq!(state.next_msg_id, 1);
}

#[test]
fn save_then_load_roundtrips() {
    let dir = tempfile::tempdir().unwrap();
    let repo = JsonSnapshotRepository::new(dir.path().join("state.json.zst"));

    let mut state = seeded_state();
    state.push_message("cursor", "codex", "ping", 7);
    repo.save(&state).unwrap();

    let restored = repo.load().unwrap();
    assert_eq!(restored.messages.len(), 1);
    assert_eq!(restored.messages[0].content, "ping");
    assert_eq!(restored.instances.len(), 3);
}

#[test]
fn rewrite_rotates_backup() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json.zst");
    let repo = JsonSnapshotRepository::new(&path);

    repo.save(&seeded_state()).unwrap();
    repo.save(&seeded_state()).unwrap();

    assert!(path.exists());
    assert!(path.with_extension("bak").exists());
}

/// One save per generation, distinguishable by message count, so the
/// whole backup chain can be checked for order and capacity.
#[test]
fn backup_chain_shifts_and_drops_the_oldest() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json.zst");
    let repo = JsonSnapshotRepository::new(&path);

    let mut state = seeded_state();
    for generation in 0..5u64 {
        state.push_message("cursor", "codex", format!("gen {generation}"), generation);
        repo.save(&state).unwrap();
    }

    // Five saves: the live snapshot has all five messages, the three
    // backup slots hold four, three, and two, and the one-message
    // snapshot has fallen off the end.
    let messages_at = |p: &std::path::Path| JsonSnapshotRepository::new(p).load().unwrap().messages.len();
    assert_eq!(messages_at(&path), 5);
    assert_eq!(messages_at(&path.with_extension("bak")), 4);
    assert_eq!(messages_at(&path.with_extension("bak.2")), 3);
    assert_eq!(messages_at(&path.with_extension("bak.3")), 2);
    assert!(!path.with_extension("bak.4").exists());
}

#[test]
fn corrupt_snapshot_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json.zst");
    std::fs::write(&path, b"not a snapshot").unwrap();

    let repo = JsonSnapshotRepository::new(&path);
    assert!(repo.load().is_err());
}
