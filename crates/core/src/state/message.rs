// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Messages exchanged between agents.

use serde::{Deserialize, Serialize};

/// Recipient value meaning "every agent".
pub const BROADCAST: &str = "all";
/// Recipient value meaning "whoever claims it first".
pub const CLAIMABLE: &str = "any";
/// Sender used by supervisor, watchdog and cancellation messages.
pub const SYSTEM_SENDER: &str = "system";

/// Agent names that can never be registered.
pub const RESERVED_NAMES: [&str; 3] = [BROADCAST, CLAIMABLE, SYSTEM_SENDER];

/// A message from one agent to another (or to `"all"` / `"any"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Monotone id assigned from `CollabState::next_msg_id`.
    pub id: u64,
    pub from: String,
    pub to: String,
    pub content: String,
    /// Epoch milliseconds when the message was appended.
    pub timestamp: u64,
    #[serde(default)]
    pub read: bool,
}

impl Message {
    /// Whether `agent` is an addressee of this message.
    ///
    /// Broadcast (`"all"`) counts for every agent; this is deliberately the
    /// same rule for work selection and for banner counting.
    pub fn addressed_to(&self, agent: &str) -> bool {
        self.to == agent || self.to == BROADCAST
    }
}

/// Whether `name` is one of the reserved agent names.
pub fn is_reserved_name(name: &str) -> bool {
    RESERVED_NAMES.contains(&name)
}
