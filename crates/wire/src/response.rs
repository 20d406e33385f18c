// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Responses and server-initiated notifications.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    Hello {
        protocol_version: String,
    },
    /// Tool result text, with the piggyback banner already appended.
    Tool {
        content: String,
    },
    /// Structured RPC error with a one-line human message.
    Error {
        kind: String,
        message: String,
    },
    Ok,
}

/// Server push, e.g. `notifications/pair_update`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}
