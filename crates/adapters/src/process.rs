// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker subprocess execution.
//!
//! A worker run is one CLI invocation in its own process group, with all
//! stdout/stderr teed into a per-instance log file and a small in-memory
//! tail used for post-mortem error classification.

use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

/// Size of the captured output tail kept for classification.
pub const OUTPUT_TAIL_BYTES: usize = 4096;

/// How long a process group gets between SIGTERM and SIGKILL.
const TERM_GRACE: Duration = Duration::from_secs(2);

/// Errors from one worker run.
#[derive(Debug, Error)]
pub enum SpawnError {
    /// Deadline or cancellation; both kill the process group.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("spawn failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("exited with status {code:?}")]
    Exited { code: Option<i32> },
}

/// Live observations about a running worker subprocess.
#[derive(Debug, Clone)]
pub struct ProcessInfo {
    pub started_at_ms: u64,
    pub last_output_at_ms: u64,
    pub output_bytes: u64,
    pub workspace_dir: PathBuf,
}

/// Fixed-size ring over the newest output bytes.
#[derive(Debug)]
pub struct OutputTail {
    buf: VecDeque<u8>,
    cap: usize,
}

impl OutputTail {
    pub fn new(cap: usize) -> Self {
        Self { buf: VecDeque::with_capacity(cap), cap }
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        for &b in bytes {
            if self.buf.len() == self.cap {
                self.buf.pop_front();
            }
            self.buf.push_back(b);
        }
    }

    pub fn as_string(&self) -> String {
        String::from_utf8_lossy(&self.buf.iter().copied().collect::<Vec<_>>()).into_owned()
    }
}

impl Default for OutputTail {
    fn default() -> Self {
        Self::new(OUTPUT_TAIL_BYTES)
    }
}

/// Everything needed to run a worker once. Argv is already
/// token-substituted; env is the complete child environment.
#[derive(Debug, Clone)]
pub struct SpawnSpec {
    pub argv: Vec<String>,
    pub cwd: PathBuf,
    pub env: Vec<(String, String)>,
    pub log_path: PathBuf,
    /// Header line separating runs inside the shared log file.
    pub log_header: String,
}

/// Run the worker subprocess to completion.
///
/// The child runs in its own process group so cancellation and timeout
/// kill the whole tree. Output is appended to the log file and mirrored
/// into `tail`; `info` is updated as output arrives.
pub async fn run_worker_process(
    spec: SpawnSpec,
    info: Arc<Mutex<ProcessInfo>>,
    tail: Arc<Mutex<OutputTail>>,
    cancel: CancellationToken,
    timeout: Duration,
    now_ms: impl Fn() -> u64 + Send + Sync + Clone + 'static,
) -> Result<(), SpawnError> {
    let (program, args) = match spec.argv.split_first() {
        Some(split) => split,
        None => {
            return Err(SpawnError::Io(std::io::Error::other("empty worker argv")));
        }
    };

    if let Some(parent) = spec.log_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut log_file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&spec.log_path)
        .await?;
    log_file.write_all(spec.log_header.as_bytes()).await?;
    log_file.write_all(b"\n").await?;
    let log_file = Arc::new(tokio::sync::Mutex::new(log_file));

    let mut cmd = tokio::process::Command::new(program);
    cmd.args(args)
        .current_dir(&spec.cwd)
        .env_clear()
        .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    cmd.process_group(0);

    let mut child = cmd.spawn()?;
    let pid = child.id();

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let mut pumps = Vec::new();
    if let Some(stream) = stdout {
        pumps.push(tokio::spawn(pump_stream(
            stream,
            Arc::clone(&log_file),
            Arc::clone(&info),
            Arc::clone(&tail),
            now_ms.clone(),
        )));
    }
    if let Some(stream) = stderr {
        pumps.push(tokio::spawn(pump_stream(
            stream,
            Arc::clone(&log_file),
            Arc::clone(&info),
            Arc::clone(&tail),
            now_ms.clone(),
        )));
    }

    let deadline = tokio::time::sleep(timeout);
    tokio::pin!(deadline);

    let wait_status = tokio::select! {
        status = child.wait() => Some(status),
        () = &mut deadline => None,
        () = cancel.cancelled() => None,
    };
    let result = match wait_status {
        Some(Ok(status)) if status.success() => Ok(()),
        Some(Ok(status)) => Err(SpawnError::Exited { code: status.code() }),
        Some(Err(e)) => Err(SpawnError::Io(e)),
        None => {
            kill_group(pid, &mut child).await;
            Err(SpawnError::Timeout(timeout))
        }
    };

    // Drain remaining output so the tail sees the child's last words.
    for pump in pumps {
        let _ = pump.await;
    }
    if let Ok(mut file) = log_file.try_lock() {
        let _ = file.flush().await;
    }

    result
}

async fn pump_stream(
    mut stream: impl AsyncRead + Unpin,
    log_file: Arc<tokio::sync::Mutex<tokio::fs::File>>,
    info: Arc<Mutex<ProcessInfo>>,
    tail: Arc<Mutex<OutputTail>>,
    now_ms: impl Fn() -> u64,
) {
    let mut buf = [0u8; 1024];
    loop {
        match stream.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                let chunk = &buf[..n];
                {
                    let mut file = log_file.lock().await;
                    let _ = file.write_all(chunk).await;
                }
                {
                    let mut info = info.lock();
                    info.last_output_at_ms = now_ms();
                    info.output_bytes += n as u64;
                }
                tail.lock().extend(chunk);
            }
        }
    }
}

/// SIGTERM the process group, give it a moment, then SIGKILL.
async fn kill_group(pid: Option<u32>, child: &mut tokio::process::Child) {
    if let Some(pid) = pid {
        let pgid = Pid::from_raw(pid as i32);
        let _ = killpg(pgid, Signal::SIGTERM);
        tokio::time::sleep(TERM_GRACE).await;
        let _ = killpg(pgid, Signal::SIGKILL);
    }
    let _ = child.start_kill();
    let _ = child.wait().await;
}

/// Run a short helper command with a deadline.
///
/// Used for assistant-CLI registration and git worktree calls; never for
/// worker runs, which go through [`run_worker_process`].
pub async fn run_with_timeout(
    mut cmd: tokio::process::Command,
    timeout: Duration,
    label: &str,
) -> Result<std::process::Output, std::io::Error> {
    cmd.stdin(Stdio::null());
    match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(result) => result,
        Err(_) => Err(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            format!("{label} timed out after {timeout:?}"),
        )),
    }
}

#[cfg(test)]
#[path = "process_tests.rs"]
mod tests;
