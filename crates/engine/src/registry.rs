// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session registry: transport sessions mapped to agent names.
//!
//! Purely in-memory; rebuilt as agents reconnect. Liveness decisions in
//! the watchdog and supervisor read last-activity from here.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::Instant;
use sw_core::Clock;

#[derive(Default)]
struct Inner {
    by_session: HashMap<String, String>,
    by_agent: HashMap<String, String>,
    activity: HashMap<String, Instant>,
}

pub struct SessionRegistry<C: Clock> {
    clock: C,
    inner: RwLock<Inner>,
    dashboard_url: RwLock<Option<String>>,
}

impl<C: Clock> SessionRegistry<C> {
    pub fn new(clock: C) -> Self {
        Self { clock, inner: RwLock::new(Inner::default()), dashboard_url: RwLock::new(None) }
    }

    /// Bind a session to an agent, evicting any prior session that agent
    /// held. Activity starts blank so a just-connected agent gets grace.
    pub fn set_agent(&self, session_id: &str, agent: &str) {
        let mut inner = self.inner.write();
        if let Some(old_session) = inner.by_agent.insert(agent.to_string(), session_id.to_string()) {
            if old_session != session_id {
                inner.by_session.remove(&old_session);
                inner.activity.remove(&old_session);
            }
        }
        inner.by_session.insert(session_id.to_string(), agent.to_string());
    }

    /// Record activity for a known session; unknown sessions are ignored.
    pub fn touch_session(&self, session_id: &str) {
        let now = self.clock.now();
        let mut inner = self.inner.write();
        if inner.by_session.contains_key(session_id) {
            inner.activity.insert(session_id.to_string(), now);
        }
    }

    /// Drop both directions of a session mapping.
    pub fn remove_session(&self, session_id: &str) {
        let mut inner = self.inner.write();
        if let Some(agent) = inner.by_session.remove(session_id) {
            if inner.by_agent.get(&agent).map(String::as_str) == Some(session_id) {
                inner.by_agent.remove(&agent);
            }
        }
        inner.activity.remove(session_id);
    }

    pub fn agent_for_session(&self, session_id: &str) -> Option<String> {
        self.inner.read().by_session.get(session_id).cloned()
    }

    pub fn session_for_agent(&self, agent: &str) -> Option<String> {
        self.inner.read().by_agent.get(agent).cloned()
    }

    pub fn has_active_session(&self, agent: &str) -> bool {
        self.inner.read().by_agent.contains_key(agent)
    }

    /// Last recorded activity for the agent's current session.
    pub fn last_activity_for_agent(&self, agent: &str) -> Option<Instant> {
        let inner = self.inner.read();
        let session = inner.by_agent.get(agent)?;
        inner.activity.get(session).copied()
    }

    /// Agents with a bound session, most recently active first; agents
    /// with no recorded activity sort last.
    pub fn connected_agents(&self) -> Vec<String> {
        let inner = self.inner.read();
        let mut agents: Vec<(Option<Instant>, String)> = inner
            .by_agent
            .iter()
            .map(|(agent, session)| (inner.activity.get(session).copied(), agent.clone()))
            .collect();
        agents.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
        agents.into_iter().map(|(_, agent)| agent).collect()
    }

    /// The agent the notifier pushes to: the most recently active session.
    pub fn connected_agent(&self) -> Option<String> {
        self.connected_agents().into_iter().next()
    }

    /// Set once at startup when a dashboard is configured.
    pub fn set_dashboard_url(&self, url: impl Into<String>) {
        *self.dashboard_url.write() = Some(url.into());
    }

    pub fn dashboard_url(&self) -> Option<String> {
        self.dashboard_url.read().clone()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
