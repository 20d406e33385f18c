// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle: paths, single-instance lock, component wiring,
//! shutdown.

use crate::dispatch::HandlerCtx;
use fs2::FileExt;
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use sw_adapters::{GitWorktreeManager, WorkspacePolicy, WorktreeManager};
use sw_core::{OrchestrationConfig, SystemClock, WorktreeStrategy};
use sw_engine::{
    Notifier, SessionRegistry, SpawnChecker, StateService, Triggerable, Watchdog, WorkerCanceller,
    WorkerSupervisor,
};
use sw_storage::{JsonSnapshotRepository, SignalFile, StateRepository};
use thiserror::Error;
use tokio::net::UnixListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Daemon configuration: fixed paths under the state directory.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root state directory (e.g. ~/.local/state/stringwork)
    pub state_dir: PathBuf,
    /// Path to Unix socket
    pub socket_path: PathBuf,
    /// Path to lock/PID file
    pub lock_path: PathBuf,
    /// Path to daemon log file
    pub log_path: PathBuf,
    /// Path to the state snapshot
    pub snapshot_path: PathBuf,
    /// Path to the change signal file
    pub signal_path: PathBuf,
    /// Path to per-worker log files
    pub logs_path: PathBuf,
    /// Path to the orchestration TOML
    pub orchestration_path: PathBuf,
}

impl Config {
    /// Load configuration for the user-level daemon. One daemon serves
    /// all projects for a user.
    pub fn load() -> Result<Self, LifecycleError> {
        let state_dir = crate::env::state_dir()?;
        Ok(Self {
            socket_path: state_dir.join("daemon.sock"),
            lock_path: state_dir.join("daemon.pid"),
            log_path: state_dir.join("daemon.log"),
            snapshot_path: state_dir.join("state.json.zst"),
            signal_path: state_dir.join("state.signal"),
            logs_path: state_dir.join("logs"),
            orchestration_path: state_dir.join("orchestration.toml"),
            state_dir,
        })
    }
}

/// Daemon state during operation.
pub struct DaemonState {
    pub config: Config,
    // NOTE(lifetime): Held to maintain exclusive file lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
    pub ctx: Arc<HandlerCtx<SystemClock>>,
    pub notifier: Arc<Notifier<SystemClock>>,
    pub supervisor: Arc<WorkerSupervisor<SystemClock>>,
    pub watchdog: Arc<Watchdog<SystemClock>>,
    pub cancel: CancellationToken,
}

/// Result of daemon startup: the daemon state plus the bound listener
/// socket, spawned separately.
pub struct StartupResult {
    pub daemon: DaemonState,
    pub listener: UnixListener,
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Could not determine state directory")]
    NoStateDir,

    #[error("Failed to acquire lock: daemon already running?")]
    LockFailed(#[source] std::io::Error),

    #[error("Failed to bind socket at {0}: {1}")]
    BindFailed(PathBuf, std::io::Error),

    #[error("orchestration config missing at {0}")]
    MissingOrchestration(PathBuf),

    #[error("Config error: {0}")]
    Config(#[from] sw_core::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Build and wire every component, then bind the socket.
///
/// Must run inside a tokio runtime: the notifier and watchdog loops are
/// spawned here.
pub fn startup(config: Config) -> Result<StartupResult, LifecycleError> {
    std::fs::create_dir_all(&config.state_dir)?;
    std::fs::create_dir_all(&config.logs_path)?;

    let lock_file = File::create(&config.lock_path)?;
    lock_file.try_lock_exclusive().map_err(LifecycleError::LockFailed)?;
    std::fs::write(&config.lock_path, std::process::id().to_string())?;

    if !config.orchestration_path.exists() {
        return Err(LifecycleError::MissingOrchestration(config.orchestration_path.clone()));
    }
    let orchestration = Arc::new(OrchestrationConfig::load(&config.orchestration_path)?);

    let clock = SystemClock;
    let repo: Arc<dyn StateRepository> =
        Arc::new(JsonSnapshotRepository::new(config.snapshot_path.clone()));
    let signal = SignalFile::new(config.signal_path.clone());
    let service = Arc::new(StateService::new(
        repo,
        signal.clone(),
        Arc::clone(&orchestration),
        clock.clone(),
    ));
    let registry = Arc::new(SessionRegistry::new(clock.clone()));
    if let Some(url) = &orchestration.dashboard_url {
        registry.set_dashboard_url(url);
    }

    let fallback_workspace = orchestration
        .workspace
        .clone()
        .unwrap_or_else(|| config.state_dir.join("workspace"));
    let policy = Arc::new(WorkspacePolicy::new(&fallback_workspace));

    let notifier = Arc::new(Notifier::new(
        Arc::clone(&service),
        Arc::clone(&registry),
        signal,
        orchestration.notifier.clone(),
    ));
    service.attach_notifier(Arc::clone(&notifier) as Arc<dyn Triggerable>);

    let supervisor = Arc::new(WorkerSupervisor::new(
        Arc::clone(&service),
        Arc::clone(&registry),
        clock.clone(),
        config.logs_path.clone(),
        fallback_workspace,
    ));
    if orchestration.worktrees != WorktreeStrategy::Disabled {
        supervisor
            .set_worktree_manager(Arc::new(GitWorktreeManager::new()) as Arc<dyn WorktreeManager>);
    }
    notifier.set_spawn_checker(Arc::new(Arc::clone(&supervisor)) as Arc<dyn SpawnChecker>);

    let watchdog = Arc::new(Watchdog::new(
        Arc::clone(&service),
        Arc::clone(&registry),
        clock.clone(),
    ));

    let cancel = CancellationToken::new();
    notifier.start(cancel.child_token());
    watchdog.start(cancel.child_token());

    let ctx = Arc::new(HandlerCtx {
        service,
        registry,
        policy,
        canceller: Some(Arc::clone(&supervisor) as Arc<dyn WorkerCanceller>),
        clock,
    });

    if config.socket_path.exists() {
        std::fs::remove_file(&config.socket_path)?;
    }
    let listener = UnixListener::bind(&config.socket_path)
        .map_err(|e| LifecycleError::BindFailed(config.socket_path.clone(), e))?;
    info!(socket = %config.socket_path.display(), "daemon listening");

    Ok(StartupResult {
        daemon: DaemonState { config, lock_file, ctx, notifier, supervisor, watchdog, cancel },
        listener,
    })
}

impl DaemonState {
    /// Shutdown the daemon gracefully: stop the background loops and
    /// release the filesystem footprint. Worker subprocesses are left
    /// running; the next startup reconciles whatever they leave behind.
    pub fn shutdown(&mut self) {
        info!("Shutting down daemon...");
        self.cancel.cancel();

        if self.config.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.config.socket_path) {
                warn!("Failed to remove socket file: {}", e);
            }
        }
        if self.config.lock_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.config.lock_path) {
                warn!("Failed to remove PID file: {}", e);
            }
        }
        // Lock is released automatically when self.lock_file drops.
        info!("Daemon shutdown complete");
    }
}
