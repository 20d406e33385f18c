// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Unified agent liveness.

use crate::registry::SessionRegistry;
use std::time::{Duration, Instant};
use sw_core::{Clock, CollabState, InstanceMatch};

/// Whether `agent` looks alive at `threshold`.
///
/// True when any of:
/// - the registry saw activity for the agent name within the threshold,
/// - the same check passes for the resolved instance id or agent type,
/// - the agent holds a session with no recorded activity yet
///   (just-connected grace),
/// - the state-stored heartbeat is within the threshold.
pub fn is_agent_alive<C: Clock>(
    registry: &SessionRegistry<C>,
    state: &CollabState,
    agent: &str,
    threshold: Duration,
    now: Instant,
    now_ms: u64,
) -> bool {
    let mut names: Vec<String> = vec![agent.to_string()];
    if let InstanceMatch::Unique(id) = state.resolve_instance(agent) {
        if let Some(inst) = state.instances.get(&id) {
            if inst.instance_id != agent {
                names.push(inst.instance_id.clone());
            }
            if inst.agent_type != agent {
                names.push(inst.agent_type.clone());
            }
        }
    }

    for name in &names {
        match registry.last_activity_for_agent(name) {
            Some(at) if now.duration_since(at) <= threshold => return true,
            Some(_) => {}
            None if registry.has_active_session(name) => return true,
            None => {}
        }
    }

    let threshold_ms = threshold.as_millis() as u64;
    if let InstanceMatch::Unique(id) = state.resolve_instance(agent) {
        if let Some(inst) = state.instances.get(&id) {
            if let Some(hb) = inst.last_heartbeat {
                if now_ms.saturating_sub(hb) <= threshold_ms {
                    return true;
                }
            }
        }
    }
    false
}

#[cfg(test)]
#[path = "liveness_tests.rs"]
mod tests;
