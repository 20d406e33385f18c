// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn spec(dir: &Path, argv: &[&str]) -> SpawnSpec {
    SpawnSpec {
        argv: argv.iter().map(|s| s.to_string()).collect(),
        cwd: dir.to_path_buf(),
        env: vec![("PATH".into(), std::env::var("PATH").unwrap_or_default())],
        log_path: dir.join("worker.log"),
        log_header: "=== test run ===".into(),
    }
}

fn fresh_info(dir: &Path) -> Arc<Mutex<ProcessInfo>> {
    Arc::new(Mutex::new(ProcessInfo {
        started_at_ms: 0,
        last_output_at_ms: 0,
        output_bytes: 0,
        workspace_dir: dir.to_path_buf(),
    }))
}

use std::path::Path;

#[test]
fn output_tail_keeps_newest_bytes() {
    let mut tail = OutputTail::new(4);
    tail.extend(b"abcdef");
    assert_eq!(tail.as_string(), "cdef");
    tail.extend(b"gh");
    assert_eq!(tail.as_string(), "efgh");
}

#[tokio::test]
async fn successful_run_tees_output() {
    let dir = tempfile::tempdir().unwrap();
    let info = fresh_info(dir.path());
    let tail = Arc::new(Mutex::new(OutputTail::default()));

    let result = run_worker_process(
        spec(dir.path(), &["sh", "-c", "echo hello-worker"]),
        Arc::clone(&info),
        Arc::clone(&tail),
        CancellationToken::new(),
        Duration::from_secs(10),
        || 1234,
    )
    .await;

    assert!(result.is_ok());
    assert!(tail.lock().as_string().contains("hello-worker"));
    let observed = info.lock().clone();
    assert!(observed.output_bytes > 0);
    assert_eq!(observed.last_output_at_ms, 1234);

    let log = std::fs::read_to_string(dir.path().join("worker.log")).unwrap();
    assert!(log.starts_with("=== test run ==="));
    assert!(log.contains("hello-worker"));
}

#[tokio::test]
async fn nonzero_exit_is_reported_with_code() {
    let dir = tempfile::tempdir().unwrap();
    let result = run_worker_process(
        spec(dir.path(), &["sh", "-c", "echo boom >&2; exit 3"]),
        fresh_info(dir.path()),
        Arc::new(Mutex::new(OutputTail::default())),
        CancellationToken::new(),
        Duration::from_secs(10),
        || 0,
    )
    .await;

    match result {
        Err(SpawnError::Exited { code }) => assert_eq!(code, Some(3)),
        other => panic!("expected Exited, got {other:?}"),
    }
}

#[tokio::test]
async fn deadline_kills_the_process() {
    let dir = tempfile::tempdir().unwrap();
    let result = run_worker_process(
        spec(dir.path(), &["sh", "-c", "sleep 30"]),
        fresh_info(dir.path()),
        Arc::new(Mutex::new(OutputTail::default())),
        CancellationToken::new(),
        Duration::from_millis(100),
        || 0,
    )
    .await;

    assert!(matches!(result, Err(SpawnError::Timeout(_))));
}

#[tokio::test]
async fn cancellation_surfaces_as_timeout() {
    let dir = tempfile::tempdir().unwrap();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = run_worker_process(
        spec(dir.path(), &["sh", "-c", "sleep 30"]),
        fresh_info(dir.path()),
        Arc::new(Mutex::new(OutputTail::default())),
        cancel,
        Duration::from_secs(10),
        || 0,
    )
    .await;

    assert!(matches!(result, Err(SpawnError::Timeout(_))));
}

#[tokio::test]
async fn run_with_timeout_labels_the_deadline() {
    let mut cmd = tokio::process::Command::new("sh");
    cmd.args(["-c", "sleep 30"]);
    let err = run_with_timeout(cmd, Duration::from_millis(50), "helper").await.unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::TimedOut);
    assert!(err.to_string().contains("helper"));
}
