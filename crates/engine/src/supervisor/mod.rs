// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker supervisor: spawns, throttles, retries, classifies, backs off,
//! cancels, and reconciles worker subprocesses.
//!
//! `check()` is idempotent and cheap; the notifier calls it on every
//! wake-up. A worker is spawned when it has unread work, no active
//! session, no running subprocess, and neither cooldown nor failure
//! backoff blocks it.

mod backoff;
mod classify;
mod lockfile;
mod reconcile;

pub use backoff::{backoff_delay, evaluate as evaluate_backoff, Backoff, PERMANENT_FAILURES};
pub use classify::{classify, parse_reset_duration, FailureClass};
pub use lockfile::SpawnLock;
pub use reconcile::reconcile_after_exit;

use crate::notifier::SpawnChecker;
use crate::registry::SessionRegistry;
use crate::service::StateService;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use sw_adapters::{
    build_worker_env, run_worker_process, AssistantCli, McpTarget, OutputTail, ProcessInfo,
    SpawnError, SpawnSpec, WorktreeManager,
};
use sw_core::{Clock, CollabState, SpawnPolicy, TaskStatus, WorktreeStrategy, BROADCAST, SYSTEM_SENDER};
use tokio_util::sync::CancellationToken;

/// Name under which the coordinator registers itself with assistant CLIs.
pub const MCP_SERVER_NAME: &str = "stringwork";

/// Retry delays double up to this cap.
const RETRY_DELAY_CAP: Duration = Duration::from_secs(120);

/// Readiness probe deadline.
const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// No spawning for this long after startup, so workers surviving a
/// daemon restart can reconnect before being double-launched. The wait
/// is polled: check() simply declines until the grace elapses.
const STARTUP_GRACE: Duration = Duration::from_secs(15);

/// Narrow interface the cancel tool uses.
pub trait WorkerCanceller: Send + Sync {
    /// Cancel the running subprocess for an instance id or agent type.
    /// Returns whether anything was running.
    fn cancel_worker(&self, agent: &str) -> bool;

    fn is_worker_running(&self, agent: &str) -> bool;
}

/// Spawn configuration for one worker instance.
#[derive(Debug, Clone)]
pub struct WorkerSpawnConfig {
    pub instance_id: String,
    pub agent_type: String,
    pub argv: Vec<String>,
    pub env_overlay: std::collections::HashMap<String, String>,
    pub inherit_env: Vec<String>,
}

#[derive(Default)]
struct Inner {
    last_spawn: HashMap<String, Instant>,
    running: HashMap<String, CancellationToken>,
    process_info: HashMap<String, Arc<Mutex<ProcessInfo>>>,
    consecutive_failures: HashMap<String, u32>,
    last_failure_ms: HashMap<String, u64>,
    backoff_until_ms: HashMap<String, u64>,
    mcp_registered: HashSet<String>,
    mcp_ready: bool,
}

pub struct WorkerSupervisor<C: Clock> {
    service: Arc<StateService<C>>,
    registry: Arc<SessionRegistry<C>>,
    clock: C,
    configs: Vec<WorkerSpawnConfig>,
    policy: SpawnPolicy,
    worktree_strategy: WorktreeStrategy,
    worktrees: parking_lot::RwLock<Option<Arc<dyn WorktreeManager>>>,
    mcp_url: Option<String>,
    logs_dir: PathBuf,
    fallback_workspace: PathBuf,
    http: reqwest::Client,
    started_at: Instant,
    inner: Mutex<Inner>,
}

impl<C: Clock> WorkerSupervisor<C> {
    pub fn new(
        service: Arc<StateService<C>>,
        registry: Arc<SessionRegistry<C>>,
        clock: C,
        logs_dir: PathBuf,
        fallback_workspace: PathBuf,
    ) -> Self {
        let config = service.config();
        let mut configs = Vec::new();
        for worker in &config.workers {
            for instance_id in worker.instance_ids() {
                configs.push(WorkerSpawnConfig {
                    instance_id,
                    agent_type: worker.agent_type.clone(),
                    argv: worker.command.clone(),
                    env_overlay: worker.env.clone(),
                    inherit_env: worker.inherit_env.clone(),
                });
            }
        }
        let policy = config.spawn.clone();
        let worktree_strategy = config.worktrees;
        let mcp_url = config.mcp_url.clone();
        let started_at = clock.now();
        Self {
            service,
            registry,
            clock,
            configs,
            policy,
            worktree_strategy,
            worktrees: parking_lot::RwLock::new(None),
            mcp_url,
            logs_dir,
            fallback_workspace,
            http: reqwest::Client::new(),
            started_at,
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn set_worktree_manager(&self, manager: Arc<dyn WorktreeManager>) {
        *self.worktrees.write() = Some(manager);
    }

    /// One supervision pass: spawn every idle worker that has work.
    pub async fn check(self: &Arc<Self>) {
        if self.configs.is_empty() {
            return;
        }
        if self.clock.now().duration_since(self.started_at) < STARTUP_GRACE {
            tracing::debug!("startup grace active, skipping spawn pass");
            return;
        }
        if !self.mcp_endpoint_ready().await {
            return;
        }

        let state = self.service.query(|s| s.clone());
        let connected = self.registry.connected_agent();
        let now_ms = self.clock.epoch_ms();
        let now = self.clock.now();

        for cfg in &self.configs {
            let instance = cfg.instance_id.as_str();

            // Never respawn the agent currently driving this process.
            if connected.as_deref() == Some(instance) || connected.as_deref() == Some(cfg.agent_type.as_str()) {
                continue;
            }
            if self.registry.has_active_session(instance)
                || self.registry.has_active_session(&cfg.agent_type)
            {
                continue;
            }
            {
                let inner = self.inner.lock();
                if inner.running.contains_key(instance) {
                    continue;
                }
            }

            let unread = state
                .messages
                .iter()
                .filter(|m| !m.read && (m.to == instance || m.to == cfg.agent_type || m.to == BROADCAST))
                .count();
            let pending = state
                .tasks
                .values()
                .filter(|t| t.status == TaskStatus::Pending && t.assignable_to(instance, &cfg.agent_type))
                .count();
            if unread == 0 && pending == 0 {
                continue;
            }

            {
                let inner = self.inner.lock();
                if let Some(last) = inner.last_spawn.get(instance) {
                    if now.duration_since(*last) < self.policy.cooldown() {
                        continue;
                    }
                }
            }

            if self.backoff_blocks(cfg, &state, now_ms) {
                continue;
            }

            let Some(lock) = SpawnLock::acquire(instance) else {
                tracing::debug!(instance, "spawn lockfile held elsewhere, skipping");
                continue;
            };

            let workspace = self.resolve_workspace(&state, connected.as_deref());
            let workspace = self.resolve_worktree(instance, workspace).await;

            if let Some(agent) = &connected {
                let agent = agent.clone();
                let banner = format!(
                    "⚡ {instance} is coming online ({unread} unread, {pending} pending)…"
                );
                if let Err(e) = self.service.run(move |s| {
                    s.push_system_message(&agent, banner, now_ms);
                    Ok(())
                }) {
                    tracing::warn!(error = %e, "failed to post coming-online message");
                }
            }

            let token = CancellationToken::new();
            self.inner.lock().running.insert(instance.to_string(), token.clone());
            let this = Arc::clone(self);
            let cfg = cfg.clone();
            let ws = workspace.clone();
            tokio::spawn(async move {
                this.spawn_with_retries(cfg, ws, lock, token).await;
            });
        }
    }

    /// Probe `<base>/health` once; cached after the first success.
    async fn mcp_endpoint_ready(&self) -> bool {
        let Some(url) = &self.mcp_url else {
            return true;
        };
        if self.inner.lock().mcp_ready {
            return true;
        }
        let Ok(mut probe) = reqwest::Url::parse(url) else {
            tracing::warn!(url = %url, "invalid mcp url");
            return false;
        };
        probe.set_path("/health");
        match self.http.get(probe).timeout(PROBE_TIMEOUT).send().await {
            Ok(resp) if resp.status().is_success() => {
                self.inner.lock().mcp_ready = true;
                true
            }
            Ok(resp) => {
                tracing::debug!(status = %resp.status(), "mcp endpoint not ready");
                false
            }
            Err(e) => {
                tracing::debug!(error = %e, "mcp endpoint not reachable");
                false
            }
        }
    }

    /// True when backoff blocks this instance. Genuinely new work (newer
    /// than the last failure) resets the backoff instead.
    fn backoff_blocks(&self, cfg: &WorkerSpawnConfig, state: &CollabState, now_ms: u64) -> bool {
        let mut inner = self.inner.lock();
        let instance = cfg.instance_id.as_str();
        let consecutive = inner.consecutive_failures.get(instance).copied().unwrap_or(0);
        let last_failure = inner.last_failure_ms.get(instance).copied();
        let until = inner.backoff_until_ms.get(instance).copied();
        let verdict = evaluate_backoff(consecutive, last_failure, until, now_ms);
        if !verdict.is_blocked() {
            return false;
        }

        let latest_work = state.latest_work_ms_for(instance, &cfg.agent_type);
        if let (Some(latest), Some(failure)) = (latest_work, last_failure) {
            if latest > failure {
                tracing::info!(instance, "new work arrived, resetting failure backoff");
                inner.consecutive_failures.remove(instance);
                inner.last_failure_ms.remove(instance);
                inner.backoff_until_ms.remove(instance);
                return false;
            }
        }
        match verdict {
            Backoff::Blocked(remaining) => {
                tracing::debug!(instance, remaining_secs = remaining.as_secs(), "failure backoff active");
            }
            Backoff::Permanent => {
                tracing::debug!(instance, "worker permanently blocked until restart or new work");
            }
            Backoff::Clear => {}
        }
        true
    }

    /// Workspace preference: the connected agent's presence workspace,
    /// then any presence workspace, then any registered-agent workspace,
    /// finally the configured fallback.
    fn resolve_workspace(&self, state: &CollabState, connected: Option<&str>) -> PathBuf {
        if let Some(agent) = connected {
            if let Some(presence) = state.presence.get(agent) {
                if !presence.workspace.is_empty() {
                    return PathBuf::from(&presence.workspace);
                }
            }
        }
        let mut agents: Vec<_> = state.presence.values().filter(|p| !p.workspace.is_empty()).collect();
        agents.sort_by(|a, b| a.agent.cmp(&b.agent));
        if let Some(presence) = agents.first() {
            return PathBuf::from(&presence.workspace);
        }
        let mut registered: Vec<_> =
            state.registered_agents.values().filter(|r| !r.workspace.is_empty()).collect();
        registered.sort_by(|a, b| a.name.cmp(&b.name));
        if let Some(agent) = registered.first() {
            return PathBuf::from(&agent.workspace);
        }
        self.fallback_workspace.clone()
    }

    async fn resolve_worktree(&self, instance: &str, workspace: PathBuf) -> PathBuf {
        let manager = self.worktrees.read().clone();
        let Some(manager) = manager else {
            return workspace;
        };
        match manager.acquire(instance, &workspace).await {
            Ok(dir) => dir,
            Err(e) => {
                tracing::warn!(instance, error = %e, "worktree unavailable, using workspace");
                workspace
            }
        }
    }

    async fn spawn_with_retries(
        self: Arc<Self>,
        cfg: WorkerSpawnConfig,
        workspace: PathBuf,
        lock: SpawnLock,
        token: CancellationToken,
    ) {
        let instance = cfg.instance_id.clone();
        let log_path = self.log_path(&instance);
        let mut delay = self.policy.retry_delay();
        let mut success = false;
        let mut attempt: u32 = 0;

        loop {
            let label =
                if attempt == 0 { "spawn".to_string() } else { format!("retry-{attempt}") };
            let tail = Arc::new(Mutex::new(OutputTail::default()));
            let info = Arc::new(Mutex::new(ProcessInfo {
                started_at_ms: self.clock.epoch_ms(),
                last_output_at_ms: 0,
                output_bytes: 0,
                workspace_dir: workspace.clone(),
            }));
            self.inner.lock().process_info.insert(instance.clone(), Arc::clone(&info));

            let result = self.run_once(&cfg, &workspace, &label, info, Arc::clone(&tail), &token).await;
            match result {
                Ok(()) => {
                    success = true;
                    break;
                }
                Err(err) => {
                    if token.is_cancelled() {
                        tracing::info!(instance = %instance, "worker cancelled, stopping retries");
                        break;
                    }
                    let captured = format!("{}\n{err}", tail.lock().as_string());
                    let class = classify(&captured);
                    tracing::warn!(
                        instance = %instance,
                        attempt,
                        class = class.label(),
                        error = %err,
                        "worker run failed"
                    );
                    if class.is_terminal() {
                        self.record_terminal_failure(&cfg, &class);
                        break;
                    }
                    if attempt >= self.policy.max_retries {
                        self.record_transient_exhaustion(&cfg, &log_path);
                        break;
                    }
                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(RETRY_DELAY_CAP);
                    attempt += 1;
                }
            }
        }

        {
            let mut inner = self.inner.lock();
            inner.running.remove(&instance);
            inner.process_info.remove(&instance);
            if success {
                inner.last_spawn.insert(instance.clone(), self.clock.now());
                inner.consecutive_failures.remove(&instance);
                inner.last_failure_ms.remove(&instance);
                inner.backoff_until_ms.remove(&instance);
            }
        }

        if success {
            if let Err(e) =
                reconcile_after_exit(&self.service, &instance, &cfg.agent_type, &log_path)
            {
                tracing::warn!(instance = %instance, error = %e, "post-exit reconciliation failed");
            }
            if self.worktree_strategy == WorktreeStrategy::OnExit {
                let manager = self.worktrees.read().clone();
                if let Some(manager) = manager {
                    manager.cleanup(&instance).await;
                }
            }
        }

        drop(lock);
    }

    async fn run_once(
        &self,
        cfg: &WorkerSpawnConfig,
        workspace: &PathBuf,
        label: &str,
        info: Arc<Mutex<ProcessInfo>>,
        tail: Arc<Mutex<OutputTail>>,
        token: &CancellationToken,
    ) -> Result<(), SpawnError> {
        let argv: Vec<String> = cfg
            .argv
            .iter()
            .map(|arg| {
                arg.replace("{workspace}", &workspace.display().to_string())
                    .replace("{agent}", &cfg.instance_id)
            })
            .collect();

        self.register_mcp_if_needed(cfg, &argv).await;

        let env = build_worker_env(&cfg.inherit_env, &cfg.env_overlay, &cfg.instance_id, workspace);
        let log_path = self.log_path(&cfg.instance_id);
        let header = format!(
            "=== {} {} {} ===",
            chrono::Utc::now().to_rfc3339(),
            label,
            argv.join(" ")
        );

        let spec = SpawnSpec {
            argv,
            cwd: workspace.clone(),
            env,
            log_path,
            log_header: header,
        };
        let clock = self.clock.clone();
        run_worker_process(
            spec,
            info,
            tail,
            token.child_token(),
            self.policy.timeout(),
            move || clock.epoch_ms(),
        )
        .await
    }

    /// Register the MCP endpoint with a recognized assistant CLI, at most
    /// once per agent type per server lifetime.
    async fn register_mcp_if_needed(&self, cfg: &WorkerSpawnConfig, argv: &[String]) {
        let Some(url) = &self.mcp_url else {
            return;
        };
        let Some(program) = argv.first() else {
            return;
        };
        let Some(cli) = AssistantCli::detect(program) else {
            return;
        };
        if self.inner.lock().mcp_registered.contains(&cfg.agent_type) {
            return;
        }
        let target = McpTarget::Http { url: url.clone() };
        match cli.ensure_registered(MCP_SERVER_NAME, &target).await {
            Ok(_) => {
                self.inner.lock().mcp_registered.insert(cfg.agent_type.clone());
            }
            Err(e) => {
                tracing::warn!(cli = cli.name(), error = %e, "mcp registration failed");
            }
        }
    }

    fn record_terminal_failure(&self, cfg: &WorkerSpawnConfig, class: &FailureClass) {
        let now_ms = self.clock.epoch_ms();
        {
            let mut inner = self.inner.lock();
            let instance = cfg.instance_id.clone();
            inner.last_failure_ms.insert(instance.clone(), now_ms);
            match class {
                FailureClass::QuotaExhausted { retry_after } => {
                    let wait = retry_after.unwrap_or(backoff::BACKOFF_CAP);
                    inner.backoff_until_ms.insert(instance.clone(), now_ms + wait.as_millis() as u64);
                    inner.consecutive_failures.insert(instance, 1);
                }
                FailureClass::AuthFailure | FailureClass::NotFound => {
                    inner.backoff_until_ms.remove(&instance);
                    inner.consecutive_failures.insert(instance, PERMANENT_FAILURES);
                }
                FailureClass::Transient => {}
            }
        }

        let content = match class {
            FailureClass::QuotaExhausted { retry_after } => match retry_after {
                Some(wait) => format!(
                    "⏸️ {} hit a rate limit; will not respawn for {}",
                    cfg.instance_id,
                    format_duration(*wait)
                ),
                None => format!("⏸️ {} hit a rate limit; backing off", cfg.instance_id),
            },
            FailureClass::AuthFailure => format!(
                "🔑 {} failed to authenticate (expired or invalid api key); fix credentials and restart workers",
                cfg.instance_id
            ),
            FailureClass::NotFound => format!(
                "⚙️ {} command not found; check the worker command configuration",
                cfg.instance_id
            ),
            FailureClass::Transient => return,
        };
        self.post_operator_message(cfg, content);
    }

    fn record_transient_exhaustion(&self, cfg: &WorkerSpawnConfig, log_path: &std::path::Path) {
        let now_ms = self.clock.epoch_ms();
        {
            let mut inner = self.inner.lock();
            let count = inner.consecutive_failures.entry(cfg.instance_id.clone()).or_insert(0);
            *count += 1;
            inner.last_failure_ms.insert(cfg.instance_id.clone(), now_ms);
        }
        let content = format!(
            "⚠️ {} failed to start after {} attempt(s); see {}",
            cfg.instance_id,
            self.policy.max_retries + 1,
            log_path.display()
        );
        self.post_operator_message(cfg, content);
    }

    /// Send to the last non-system agent that messaged this worker, or
    /// the driver when nobody has.
    fn post_operator_message(&self, cfg: &WorkerSpawnConfig, content: String) {
        let driver = self.service.config().driver.name.clone();
        let instance = cfg.instance_id.clone();
        let agent_type = cfg.agent_type.clone();
        let now_ms = self.clock.epoch_ms();
        let result = self.service.run(move |state| {
            let recipient = state
                .messages
                .iter()
                .rev()
                .find(|m| m.from != SYSTEM_SENDER && (m.to == instance || m.to == agent_type))
                .map(|m| m.from.clone())
                .unwrap_or(driver);
            state.push_system_message(&recipient, content, now_ms);
            Ok(())
        });
        if let Err(e) = result {
            tracing::warn!(error = %e, "failed to post worker failure message");
        }
    }

    fn log_path(&self, instance_id: &str) -> PathBuf {
        let safe: String = instance_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '-' })
            .collect();
        self.logs_dir.join(format!("{safe}.log"))
    }

    /// Cancel every running worker, clear all spawn bookkeeping, and run
    /// a fresh check.
    pub async fn restart_workers(self: &Arc<Self>) {
        {
            let mut inner = self.inner.lock();
            for token in inner.running.values() {
                token.cancel();
            }
            inner.last_spawn.clear();
            inner.consecutive_failures.clear();
            inner.last_failure_ms.clear();
            inner.backoff_until_ms.clear();
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
        self.check().await;
    }

    /// Live process observations, for status queries and tests.
    pub fn process_info(&self, instance_id: &str) -> Option<ProcessInfo> {
        self.inner.lock().process_info.get(instance_id).map(|info| info.lock().clone())
    }

    /// Test hook: record a failure as if a full retry cycle had failed.
    #[doc(hidden)]
    pub fn inject_failure(&self, instance_id: &str, consecutive: u32, last_failure_ms: u64) {
        let mut inner = self.inner.lock();
        inner.consecutive_failures.insert(instance_id.to_string(), consecutive);
        inner.last_failure_ms.insert(instance_id.to_string(), last_failure_ms);
    }

    #[doc(hidden)]
    pub fn backoff_state(&self, instance_id: &str, now_ms: u64) -> Backoff {
        let inner = self.inner.lock();
        evaluate_backoff(
            inner.consecutive_failures.get(instance_id).copied().unwrap_or(0),
            inner.last_failure_ms.get(instance_id).copied(),
            inner.backoff_until_ms.get(instance_id).copied(),
            now_ms,
        )
    }

    #[doc(hidden)]
    pub fn record_terminal_for_tests(&self, instance_id: &str, class: &FailureClass) {
        if let Some(cfg) = self.configs.iter().find(|c| c.instance_id == instance_id).cloned() {
            self.record_terminal_failure(&cfg, class);
        }
    }
}

impl<C: Clock> WorkerCanceller for WorkerSupervisor<C> {
    fn cancel_worker(&self, agent: &str) -> bool {
        let (found, instance) = {
            let inner = self.inner.lock();
            if let Some(token) = inner.running.get(agent) {
                token.cancel();
                (true, agent.to_string())
            } else {
                // Fall back to any running instance of that agent type.
                let by_type = self
                    .configs
                    .iter()
                    .filter(|c| c.agent_type == agent)
                    .find_map(|c| inner.running.get(&c.instance_id).map(|t| (t, c.instance_id.clone())));
                match by_type {
                    Some((token, id)) => {
                        token.cancel();
                        (true, id)
                    }
                    None => (false, String::new()),
                }
            }
        };
        if found {
            tracing::info!(instance = %instance, "worker subprocess cancelled");
            if self.worktree_strategy == WorktreeStrategy::OnCancel {
                let manager = self.worktrees.read().clone();
                if let Some(manager) = manager {
                    tokio::spawn(async move {
                        manager.cleanup(&instance).await;
                    });
                }
            }
        }
        found
    }

    fn is_worker_running(&self, agent: &str) -> bool {
        let inner = self.inner.lock();
        inner.running.contains_key(agent)
            || self
                .configs
                .iter()
                .any(|c| c.agent_type == agent && inner.running.contains_key(&c.instance_id))
    }
}

#[async_trait]
impl<C: Clock> SpawnChecker for Arc<WorkerSupervisor<C>> {
    async fn check(&self) {
        WorkerSupervisor::check(self).await;
    }
}

/// Compact `XhYmZs` rendering, dropping zero components.
pub fn format_duration(d: Duration) -> String {
    let total = d.as_secs();
    let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
    let mut out = String::new();
    if h > 0 {
        out.push_str(&format!("{h}h"));
    }
    if m > 0 {
        out.push_str(&format!("{m}m"));
    }
    if s > 0 || out.is_empty() {
        out.push_str(&format!("{s}s"));
    }
    out
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
