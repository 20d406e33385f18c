// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Watchdog: periodic liveness sweep healing state left behind by
//! crashed or silent workers.
//!
//! Each cycle prunes stale sessions, resets tasks held by dead or stuck
//! agents, marks dead instances offline, and raises tiered progress/SLA
//! alerts to the driver. Alerts are deduplicated in memory per task and
//! cleared when the task leaves `in_progress`.

use crate::liveness::is_agent_alive;
use crate::registry::SessionRegistry;
use crate::service::StateService;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use sw_core::{
    AgentRole, Clock, CollabState, InstanceStatus, TaskStatus, WatchdogConfig,
};
use tokio_util::sync::CancellationToken;

/// Alert tier already raised for a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AlertLevel {
    Warning,
    Critical,
    SlaExceeded,
}

pub struct Watchdog<C: Clock> {
    service: Arc<StateService<C>>,
    registry: Arc<SessionRegistry<C>>,
    clock: C,
    config: WatchdogConfig,
    alerts: Mutex<HashMap<u64, AlertLevel>>,
}

impl<C: Clock> Watchdog<C> {
    pub fn new(service: Arc<StateService<C>>, registry: Arc<SessionRegistry<C>>, clock: C) -> Self {
        let config = service.config().watchdog.clone();
        Self { service, registry, clock, config, alerts: Mutex::new(HashMap::new()) }
    }

    /// Start the ticker loop.
    pub fn start(self: &Arc<Self>, cancel: CancellationToken) {
        let this = Arc::clone(self);
        let interval = self.config.interval();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    _ = ticker.tick() => this.run_cycle(),
                }
            }
        });
    }

    /// One watchdog cycle. Synchronous so tests drive it directly.
    pub fn run_cycle(&self) {
        self.prune_stale_sessions();
        self.recover_and_alert();
    }

    /// Remove sessions of workers that stopped showing life signs. The
    /// driver's session is never pruned.
    fn prune_stale_sessions(&self) {
        let driver = self.service.config().driver.name.clone();
        let state = self.service.query(|s| s.clone());
        let now = self.clock.now();
        let now_ms = self.clock.epoch_ms();

        for agent in self.registry.connected_agents() {
            if agent == driver {
                continue;
            }
            if is_agent_alive(&self.registry, &state, &agent, self.config.session_stale(), now, now_ms) {
                continue;
            }
            if let Some(session) = self.registry.session_for_agent(&agent) {
                tracing::info!(agent = %agent, session = %session, "pruning stale session");
                self.registry.remove_session(&session);
            }
        }
    }

    /// Heartbeat checks, stuck-task recovery, and progress alerts, all
    /// under a single mutation when anything needs to change.
    fn recover_and_alert(&self) {
        let snapshot = self.service.query(|s| s.clone());
        let now = self.clock.now();
        let now_ms = self.clock.epoch_ms();

        // Dedup entries die with their task's in_progress status.
        self.alerts.lock().retain(|task_id, _| {
            snapshot
                .tasks
                .get(task_id)
                .map(|t| t.status == TaskStatus::InProgress)
                .unwrap_or(false)
        });

        let dead = self.dead_agents(&snapshot, now, now_ms);
        let resets = self.plan_resets(&snapshot, &dead, now, now_ms);
        let alerts = self.plan_alerts(&snapshot, &resets, now_ms);

        if dead.is_empty() && resets.is_empty() && alerts.is_empty() {
            return;
        }

        let driver = self.service.config().driver.name.clone();
        let dead_ids = dead;
        let result = self.service.run(move |state| {
            let mut recovered: Vec<u64> = Vec::new();
            for (task_id, reason) in &resets {
                let Some(task) = state.tasks.get_mut(task_id) else {
                    continue;
                };
                if task.status != TaskStatus::InProgress {
                    continue;
                }
                task.status = TaskStatus::Pending;
                task.updated_at = now_ms;
                if task.result_summary.is_empty() {
                    task.result_summary = reason.clone();
                }
                recovered.push(*task_id);
            }
            for id in &recovered {
                state.detach_task_everywhere(*id);
            }

            for agent_id in &dead_ids {
                if let Some(inst) = state.instances.get_mut(agent_id) {
                    inst.status = InstanceStatus::Offline;
                    inst.current_tasks.clear();
                }
            }

            for (_, message) in &alerts {
                state.push_system_message(&driver, message.clone(), now_ms);
            }

            if !recovered.is_empty() {
                let ids: Vec<String> = recovered.iter().map(|id| format!("#{id}")).collect();
                state.push_system_message(
                    &driver,
                    format!(
                        "🔧 Watchdog recovered {} task(s) from unresponsive agents: {}",
                        recovered.len(),
                        ids.join(", ")
                    ),
                    now_ms,
                );
                tracing::info!(tasks = ?recovered, "watchdog reset stuck tasks");
            }
            Ok(())
        });
        if let Err(e) = result {
            tracing::warn!(error = %e, "watchdog cycle failed to commit");
        }
        // The service trigger fires on commit, so freshly pending tasks
        // get workers respawned without further plumbing here.
    }

    /// Worker instances whose stored heartbeat went silent; keyed by both
    /// instance id and agent type.
    fn dead_agents(&self, state: &CollabState, now: std::time::Instant, now_ms: u64) -> Vec<String> {
        let mut dead = Vec::new();
        for inst in state.instances.values() {
            if inst.role != AgentRole::Worker || inst.last_heartbeat.is_none() {
                continue;
            }
            if !is_agent_alive(
                &self.registry,
                state,
                &inst.instance_id,
                self.config.heartbeat_threshold(),
                now,
                now_ms,
            ) {
                dead.push(inst.instance_id.clone());
                if !dead.contains(&inst.agent_type) {
                    dead.push(inst.agent_type.clone());
                }
            }
        }
        dead
    }

    fn plan_resets(
        &self,
        state: &CollabState,
        dead: &[String],
        now: std::time::Instant,
        now_ms: u64,
    ) -> Vec<(u64, String)> {
        let stuck_ms = self.config.task_stuck().as_millis() as u64;
        let mut resets = Vec::new();
        for task in state.tasks.values() {
            if task.status != TaskStatus::InProgress {
                continue;
            }
            if dead.contains(&task.assigned_to) {
                resets.push((task.id, "reset by watchdog: agent heartbeat stale".to_string()));
                continue;
            }
            if now_ms.saturating_sub(task.updated_at) > stuck_ms
                && !is_agent_alive(
                    &self.registry,
                    state,
                    &task.assigned_to,
                    self.config.heartbeat_threshold(),
                    now,
                    now_ms,
                )
            {
                resets.push((
                    task.id,
                    format!(
                        "reset by watchdog: no update for {}s and assignee unresponsive",
                        (now_ms.saturating_sub(task.updated_at)) / 1000
                    ),
                ));
            }
        }
        resets
    }

    /// Tiered progress alerts, deduplicated per task: one SLA breach, one
    /// critical, one warning. Raising a tier records it so the same tier
    /// never repeats while the task stays in progress.
    fn plan_alerts(
        &self,
        state: &CollabState,
        resets: &[(u64, String)],
        now_ms: u64,
    ) -> Vec<(u64, String)> {
        let warning_ms = self.config.progress_warning().as_millis() as u64;
        let critical_ms = self.config.progress_critical().as_millis() as u64;
        let mut alerts = Vec::new();
        let mut levels = self.alerts.lock();

        for task in state.tasks.values() {
            if task.status != TaskStatus::InProgress {
                continue;
            }
            // A task being reset this cycle is no longer anyone's progress
            // problem.
            if resets.iter().any(|(id, _)| *id == task.id) {
                continue;
            }
            let last_activity = task.last_progress_at.unwrap_or(task.updated_at);
            let since_progress = now_ms.saturating_sub(last_activity);
            let since_update = now_ms.saturating_sub(task.updated_at);
            let level = levels.get(&task.id).copied();

            if task.expected_duration_secs > 0
                && since_update > task.expected_duration_secs * 1000
                && level != Some(AlertLevel::SlaExceeded)
            {
                alerts.push((
                    task.id,
                    format!(
                        "⏱️ SLA exceeded on task #{} \"{}\": expected {}s, running {}s",
                        task.id,
                        task.title,
                        task.expected_duration_secs,
                        since_update / 1000
                    ),
                ));
                levels.insert(task.id, AlertLevel::SlaExceeded);
            } else if since_progress > critical_ms
                && !matches!(level, Some(AlertLevel::Critical) | Some(AlertLevel::SlaExceeded))
            {
                alerts.push((
                    task.id,
                    format!(
                        "🔴 Critical: task #{} \"{}\" has made no progress for {}s",
                        task.id,
                        task.title,
                        since_progress / 1000
                    ),
                ));
                levels.insert(task.id, AlertLevel::Critical);
            } else if since_progress > warning_ms && level.is_none() {
                alerts.push((
                    task.id,
                    format!(
                        "⚠️ Warning: task #{} \"{}\" has made no progress for {}s",
                        task.id,
                        task.title,
                        since_progress / 1000
                    ),
                ));
                levels.insert(task.id, AlertLevel::Warning);
            }
        }
        alerts
    }
}

#[cfg(test)]
#[path = "watchdog_tests.rs"]
mod tests;
