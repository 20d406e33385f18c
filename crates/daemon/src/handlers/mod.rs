// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tool handlers: the state-machine transitions agents drive.
//!
//! Each handler deserializes its own arguments, validates agents against
//! the shared state, and runs under the state service. Mutating tools use
//! `run`; read-only tools use `query`.

pub mod agents;
pub mod claim;
pub mod messages;
pub mod notes;
pub mod plans;
pub mod presence;
pub mod session;
pub mod tasks;

use serde::de::DeserializeOwned;
use serde_json::Value;
use sw_core::CollabState;
use sw_engine::ServiceError;

/// Deserialize tool arguments with a one-line validation error.
pub(crate) fn parse_args<P: DeserializeOwned>(args: Value) -> Result<P, ServiceError> {
    serde_json::from_value(args).map_err(|e| ServiceError::Validation(format!("invalid arguments: {e}")))
}

/// Strict agent validation: a configured instance, an agent type, or a
/// registered agent.
pub(crate) fn require_known_agent(state: &CollabState, agent: &str) -> Result<(), ServiceError> {
    if agent.is_empty() {
        return Err(ServiceError::validation("agent must not be empty"));
    }
    if state.known_agent(agent) {
        return Ok(());
    }
    Err(ServiceError::Validation(format!("unknown agent {agent:?}")))
}
