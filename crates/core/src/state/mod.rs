// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The shared collaboration state.
//!
//! All entities live inside one aggregate [`CollabState`], owned
//! exclusively by the state service. Inside a mutation closure every
//! reference is live and mutable; outside, callers treat results as
//! immutable snapshots.

mod context;
mod instance;
mod lock;
mod message;
mod plan;
mod presence;
mod registered;
mod task;

pub use context::{Note, WorkContext};
pub use instance::{AgentInstance, AgentRole, InstanceStatus};
pub use lock::{FileLock, DEFAULT_LOCK_MINUTES, MAX_LOCK_MINUTES};
pub use message::{is_reserved_name, Message, BROADCAST, CLAIMABLE, RESERVED_NAMES, SYSTEM_SENDER};
pub use plan::{Plan, PlanItem, PlanItemStatus, PlanStatus};
pub use presence::{Presence, PresenceStatus};
pub use registered::{AgentContext, RegisteredAgent};
pub use task::{Task, TaskStatus, DEFAULT_PRIORITY};

use crate::config::OrchestrationConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Result of resolving an agent name to a configured instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstanceMatch {
    /// No instance carries this name or type.
    None,
    /// Exactly one instance matched; holds its instance id.
    Unique(String),
    /// The name is an agent type with several instances.
    Ambiguous(usize),
}

/// The aggregate state shared by all agents.
///
/// Serialized as one JSON document; every map defaults so that snapshots
/// written by older builds still load.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollabState {
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub tasks: HashMap<u64, Task>,
    #[serde(default)]
    pub instances: HashMap<String, AgentInstance>,
    #[serde(default)]
    pub presence: HashMap<String, Presence>,
    #[serde(default)]
    pub file_locks: HashMap<String, FileLock>,
    #[serde(default)]
    pub contexts: HashMap<String, WorkContext>,
    #[serde(default)]
    pub plans: HashMap<String, Plan>,
    #[serde(default)]
    pub active_plan_id: Option<String>,
    #[serde(default)]
    pub registered_agents: HashMap<String, RegisteredAgent>,
    #[serde(default)]
    pub agent_contexts: HashMap<String, AgentContext>,
    #[serde(default)]
    pub notes: Vec<Note>,
    #[serde(default)]
    pub next_msg_id: u64,
    #[serde(default)]
    pub next_task_id: u64,
    #[serde(default)]
    pub next_note_id: u64,
}

impl CollabState {
    pub fn new() -> Self {
        let mut state = Self::default();
        state.normalize();
        state
    }

    /// Defensive normalization run on every load: counters are strictly
    /// increasing and start at 1.
    pub fn normalize(&mut self) {
        if self.next_msg_id == 0 {
            self.next_msg_id = 1;
        }
        if self.next_task_id == 0 {
            self.next_task_id = 1;
        }
        if self.next_note_id == 0 {
            self.next_note_id = 1;
        }
    }

    /// Seed the instance map from the orchestration configuration when it
    /// is empty: the driver plus one instance per configured worker slot.
    pub fn seed_instances(&mut self, config: &OrchestrationConfig) {
        if !self.instances.is_empty() {
            return;
        }
        let driver = AgentInstance::new(&config.driver.name, &config.driver.name, AgentRole::Driver);
        self.instances.insert(driver.instance_id.clone(), driver);
        for worker in &config.workers {
            for id in worker.instance_ids() {
                let mut inst = AgentInstance::new(&id, &worker.agent_type, AgentRole::Worker);
                inst.capabilities = worker.capabilities.clone();
                inst.max_tasks = worker.max_tasks.max(1);
                self.instances.insert(id, inst);
            }
        }
    }

    /// Append a message, assigning the next monotone id.
    pub fn push_message(
        &mut self,
        from: impl Into<String>,
        to: impl Into<String>,
        content: impl Into<String>,
        now_ms: u64,
    ) -> u64 {
        let id = self.next_msg_id;
        self.next_msg_id += 1;
        self.messages.push(Message {
            id,
            from: from.into(),
            to: to.into(),
            content: content.into(),
            timestamp: now_ms,
            read: false,
        });
        id
    }

    /// Append a system message (supervisor, watchdog, cancellation).
    pub fn push_system_message(&mut self, to: impl Into<String>, content: impl Into<String>, now_ms: u64) -> u64 {
        self.push_message(SYSTEM_SENDER, to, content, now_ms)
    }

    /// Insert a task, assigning the next monotone id.
    pub fn push_task(&mut self, mut task: Task) -> u64 {
        let id = self.next_task_id;
        self.next_task_id += 1;
        task.id = id;
        self.tasks.insert(id, task);
        id
    }

    /// Drop messages older than `max_age_days` (if > 0), then trim from the
    /// oldest end to cap at `max_count` (if > 0). Returns total removed.
    pub fn prune_messages(&mut self, max_count: usize, max_age_days: u64, now_ms: u64) -> usize {
        let before = self.messages.len();
        if max_age_days > 0 {
            let cutoff = now_ms.saturating_sub(max_age_days * 24 * 60 * 60 * 1000);
            self.messages.retain(|m| m.timestamp >= cutoff);
        }
        if max_count > 0 && self.messages.len() > max_count {
            let excess = self.messages.len() - max_count;
            self.messages.drain(..excess);
        }
        before - self.messages.len()
    }

    /// Delete expired file locks. Every read or write that visits the lock
    /// map calls this first.
    pub fn evict_expired_locks(&mut self, now_ms: u64) -> usize {
        let before = self.file_locks.len();
        self.file_locks.retain(|_, lock| !lock.expired(now_ms));
        before - self.file_locks.len()
    }

    /// Whether `name` names a configured instance, an agent type, or a
    /// registered agent.
    pub fn known_agent(&self, name: &str) -> bool {
        self.instances.contains_key(name)
            || self.instances.values().any(|i| i.agent_type == name)
            || self.registered_agents.contains_key(name)
    }

    /// Resolve an agent name to a configured instance.
    ///
    /// An exact instance id wins; otherwise an agent type resolves when it
    /// has exactly one instance.
    pub fn resolve_instance(&self, agent: &str) -> InstanceMatch {
        if self.instances.contains_key(agent) {
            return InstanceMatch::Unique(agent.to_string());
        }
        let mut matches = self.instances.values().filter(|i| i.agent_type == agent);
        match (matches.next(), matches.next()) {
            (None, _) => InstanceMatch::None,
            (Some(only), None) => InstanceMatch::Unique(only.instance_id.clone()),
            (Some(_), Some(_)) => {
                InstanceMatch::Ambiguous(self.instances.values().filter(|i| i.agent_type == agent).count())
            }
        }
    }

    pub fn instances_of_type<'a>(&'a self, agent_type: &'a str) -> impl Iterator<Item = &'a AgentInstance> {
        self.instances.values().filter(move |i| i.agent_type == agent_type)
    }

    /// Remove a task id from every instance's current list.
    pub fn detach_task_everywhere(&mut self, task_id: u64) {
        for inst in self.instances.values_mut() {
            inst.detach_task(task_id);
        }
    }

    /// Unread messages addressed to `agent` (broadcast included).
    pub fn unread_count_for(&self, agent: &str) -> usize {
        self.messages.iter().filter(|m| !m.read && m.addressed_to(agent)).count()
    }

    /// Pending tasks assigned to `agent` directly or claimable by anyone.
    pub fn pending_count_for(&self, agent: &str) -> usize {
        self.tasks
            .values()
            .filter(|t| t.status == TaskStatus::Pending && (t.assigned_to == agent || t.assigned_to == CLAIMABLE))
            .count()
    }

    /// Cancelled tasks still assigned to `agent`; drives the STOP banner.
    pub fn cancelled_count_for(&self, agent: &str) -> usize {
        self.tasks
            .values()
            .filter(|t| t.status == TaskStatus::Cancelled && t.assigned_to == agent)
            .count()
    }

    /// Newest work timestamp addressed to `agent`: max of unread message
    /// timestamps and pending task creation times. Lets failure backoff
    /// reset when genuinely new work appears.
    pub fn latest_work_ms_for(&self, agent: &str, agent_type: &str) -> Option<u64> {
        let msg = self
            .messages
            .iter()
            .filter(|m| !m.read && (m.addressed_to(agent) || m.to == agent_type))
            .map(|m| m.timestamp)
            .max();
        let task = self
            .tasks
            .values()
            .filter(|t| t.status == TaskStatus::Pending && t.assignable_to(agent, agent_type))
            .map(|t| t.created_at)
            .max();
        msg.into_iter().chain(task).max()
    }

    /// Verify the task/instance bookkeeping invariants; used by tests.
    pub fn check_task_invariants(&self) -> Result<(), String> {
        for task in self.tasks.values() {
            if task.status == TaskStatus::InProgress {
                let holder = self
                    .instances
                    .get(&task.assigned_to)
                    .or_else(|| match self.resolve_instance(&task.assigned_to) {
                        InstanceMatch::Unique(id) => self.instances.get(&id),
                        _ => None,
                    });
                match holder {
                    Some(inst) if inst.current_tasks.contains(&task.id) => {}
                    _ => {
                        return Err(format!(
                            "task {} is in_progress but not in {}'s current tasks",
                            task.id, task.assigned_to
                        ))
                    }
                }
            }
        }
        for inst in self.instances.values() {
            let busy = inst.status == InstanceStatus::Busy;
            if busy != !inst.current_tasks.is_empty() {
                return Err(format!(
                    "instance {} status {:?} disagrees with {} current tasks",
                    inst.instance_id,
                    inst.status,
                    inst.current_tasks.len()
                ));
            }
            for id in &inst.current_tasks {
                match self.tasks.get(id) {
                    // Create-time assignment may park a still-pending task on
                    // the chosen instance; terminal tasks must never linger.
                    Some(t) if matches!(t.status, TaskStatus::InProgress | TaskStatus::Pending) => {}
                    _ => {
                        return Err(format!(
                            "instance {} holds task {} which is neither pending nor in_progress",
                            inst.instance_id, id
                        ))
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
