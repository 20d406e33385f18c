// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Failure backoff schedule for worker spawning.
//!
//! Distinct from the spawn cooldown: cooldown is a steady per-instance
//! minimum between spawns, backoff grows with consecutive full-cycle
//! failures.

use std::time::Duration;

/// First backoff step.
pub const BACKOFF_BASE: Duration = Duration::from_secs(60);
/// Exponential cap.
pub const BACKOFF_CAP: Duration = Duration::from_secs(600);
/// At this many consecutive failures the worker is blocked until an
/// operator restart or genuinely new work arrives.
pub const PERMANENT_FAILURES: u32 = 10;

/// Backoff verdict for one instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    Clear,
    /// Blocked for this much longer.
    Blocked(Duration),
    /// Blocked until restart or new work.
    Permanent,
}

impl Backoff {
    pub fn is_blocked(&self) -> bool {
        !matches!(self, Backoff::Clear)
    }
}

/// Delay the schedule demands after `consecutive` full-cycle failures:
/// 1m, 2m, 4m, ... capped at 10m; `None` once permanently blocked.
pub fn backoff_delay(consecutive: u32) -> Option<Duration> {
    if consecutive == 0 {
        return Some(Duration::ZERO);
    }
    if consecutive >= PERMANENT_FAILURES {
        return None;
    }
    let factor = 1u64 << (consecutive - 1).min(16);
    Some((BACKOFF_BASE * factor as u32).min(BACKOFF_CAP))
}

/// Evaluate the backoff for an instance.
///
/// An explicit `backoff_until` deadline (quota reset) takes precedence;
/// otherwise elapsed time since the last failure is compared against the
/// exponential schedule.
pub fn evaluate(
    consecutive: u32,
    last_failure_ms: Option<u64>,
    backoff_until_ms: Option<u64>,
    now_ms: u64,
) -> Backoff {
    if let Some(until) = backoff_until_ms {
        if now_ms < until {
            return Backoff::Blocked(Duration::from_millis(until - now_ms));
        }
        return Backoff::Clear;
    }
    match backoff_delay(consecutive) {
        Some(delay) if delay.is_zero() => Backoff::Clear,
        Some(delay) => {
            let Some(last) = last_failure_ms else {
                return Backoff::Clear;
            };
            let elapsed = Duration::from_millis(now_ms.saturating_sub(last));
            if elapsed < delay {
                Backoff::Blocked(delay - elapsed)
            } else {
                Backoff::Clear
            }
        }
        None => Backoff::Permanent,
    }
}

#[cfg(test)]
#[path = "backoff_tests.rs"]
mod tests;
