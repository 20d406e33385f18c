// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent presence: what each agent says it is doing right now.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceStatus {
    Idle,
    Working,
    Reviewing,
    Away,
}

impl PresenceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PresenceStatus::Idle => "idle",
            PresenceStatus::Working => "working",
            PresenceStatus::Reviewing => "reviewing",
            PresenceStatus::Away => "away",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "idle" => Some(PresenceStatus::Idle),
            "working" => Some(PresenceStatus::Working),
            "reviewing" => Some(PresenceStatus::Reviewing),
            "away" => Some(PresenceStatus::Away),
            _ => None,
        }
    }
}

/// Self-reported presence. TTL-relative: a presence older than the
/// configured TTL is reported with an `(offline)` suffix but never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Presence {
    pub agent: String,
    pub status: PresenceStatus,
    #[serde(default)]
    pub current_task_id: Option<u64>,
    #[serde(default)]
    pub note: String,
    #[serde(default)]
    pub workspace: String,
    pub last_seen: u64,
}
