// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker failure classification.
//!
//! A pure function of the captured output tail. Terminal classes stop the
//! retry loop immediately; everything else is retried as transient.

use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureClass {
    /// Retryable per the spawn policy.
    Transient,
    /// Provider quota or rate limit; may carry a parsed reset duration.
    QuotaExhausted { retry_after: Option<Duration> },
    /// Expired or invalid credentials.
    AuthFailure,
    /// The worker CLI itself is missing.
    NotFound,
}

impl FailureClass {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, FailureClass::Transient)
    }

    pub fn label(&self) -> &'static str {
        match self {
            FailureClass::Transient => "transient",
            FailureClass::QuotaExhausted { .. } => "quota_exhausted",
            FailureClass::AuthFailure => "auth_failure",
            FailureClass::NotFound => "not_found",
        }
    }
}

/// Classify the tail of a failed worker's output. Case-insensitive
/// substring matching; quota wins over auth wins over not-found.
pub fn classify(output: &str) -> FailureClass {
    let s = output.to_lowercase();

    let quota = s.contains("quotaerror")
        || (s.contains("quota") && s.contains("exhausted"))
        || (s.contains("rate limit") && s.contains("exceeded"))
        || s.contains("too many requests")
        || (s.contains("429") && (s.contains("quota") || s.contains("rate")));
    if quota {
        return FailureClass::QuotaExhausted { retry_after: parse_reset_duration(&s) };
    }

    let auth = s.contains("api key expired")
        || s.contains("invalid api key")
        || s.contains("authentication failed")
        || (s.contains("401") && s.contains("unauthorized"))
        || s.contains("invalid_api_key")
        || (s.contains("permission denied") && s.contains("api"));
    if auth {
        return FailureClass::AuthFailure;
    }

    let not_found = s.contains("command not found")
        || (s.contains("exec") && s.contains("no such file or directory"))
        || s.contains("enoent");
    if not_found {
        return FailureClass::NotFound;
    }

    FailureClass::Transient
}

/// Find a compact duration like `17h29m42s`, `45m`, or `90s` in the
/// output and parse it. The first well-formed token wins.
pub fn parse_reset_duration(s: &str) -> Option<Duration> {
    for token in s.split(|c: char| c.is_whitespace() || c == '"' || c == '(' || c == ')') {
        if let Some(duration) = parse_duration_token(token.trim_matches(|c: char| c == '.' || c == ',')) {
            return Some(duration);
        }
    }
    None
}

fn parse_duration_token(token: &str) -> Option<Duration> {
    if token.is_empty() || !token.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        return None;
    }
    let mut total = 0u64;
    let mut number = 0u64;
    let mut saw_digit = false;
    let mut saw_unit = false;
    for c in token.chars() {
        match c {
            '0'..='9' => {
                number = number.checked_mul(10)?.checked_add(c as u64 - '0' as u64)?;
                saw_digit = true;
            }
            'h' if saw_digit => {
                total = total.checked_add(number.checked_mul(3600)?)?;
                number = 0;
                saw_digit = false;
                saw_unit = true;
            }
            'm' if saw_digit => {
                total = total.checked_add(number.checked_mul(60)?)?;
                number = 0;
                saw_digit = false;
                saw_unit = true;
            }
            's' if saw_digit => {
                total = total.checked_add(number)?;
                number = 0;
                saw_digit = false;
                saw_unit = true;
            }
            _ => return None,
        }
    }
    // Trailing digits without a unit make the token malformed.
    if !saw_unit || saw_digit {
        return None;
    }
    Some(Duration::from_secs(total))
}

#[cfg(test)]
#[path = "classify_tests.rs"]
mod tests;
