// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Requests a connected agent can send.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// First message on a connection; `agent` may be empty until the
    /// client identifies itself via `get_session_context`.
    Hello {
        #[serde(default)]
        agent: Option<String>,
    },
    /// One tool invocation.
    Tool {
        name: String,
        #[serde(default)]
        args: serde_json::Value,
    },
    /// Ask the coordinator to stop.
    Shutdown,
}
