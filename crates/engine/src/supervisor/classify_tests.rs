// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::time::Duration;
use yare::parameterized;

#[parameterized(
    quota_error = { "TerminalQuotaError: your plan ran out", "quota_exhausted" },
    quota_exhausted = { "Daily QUOTA has been EXHAUSTED for this key", "quota_exhausted" },
    rate_limit = { "Rate limit exceeded, slow down", "quota_exhausted" },
    too_many = { "HTTP 503: too many requests", "quota_exhausted" },
    status_429 = { "server said 429 rate limited", "quota_exhausted" },
    api_key_expired = { "error: API key expired, renew it", "auth_failure" },
    invalid_key = { "Invalid API key provided", "auth_failure" },
    auth_failed = { "Authentication failed for account", "auth_failure" },
    unauthorized_401 = { "401 Unauthorized", "auth_failure" },
    invalid_api_key_code = { "code=invalid_api_key", "auth_failure" },
    permission_api = { "permission denied while calling api", "auth_failure" },
    cmd_not_found = { "zsh: command not found: clauude", "not_found" },
    exec_enoent = { "exec: \"claude\": no such file or directory", "not_found" },
    enoent = { "spawn ENOENT", "not_found" },
    plain_crash = { "panicked at 'index out of bounds'", "transient" },
    empty = { "", "transient" },
    bare_429 = { "got 429 from upstream", "transient" },
)]
fn classification_cases(output: &str, expected: &str) {
    assert_eq!(classify(output).label(), expected);
}

#[test]
fn quota_reset_duration_is_parsed() {
    let class = classify("TerminalQuotaError: quota exhausted, quota will reset after 17h29m42s");
    match class {
        FailureClass::QuotaExhausted { retry_after } => {
            let expected = Duration::from_secs(17 * 3600 + 29 * 60 + 42);
            assert_eq!(retry_after, Some(expected));
        }
        other => panic!("expected quota, got {other:?}"),
    }
}

#[parameterized(
    full = { "17h29m42s", Some(62982) },
    minutes_seconds = { "45m30s", Some(2730) },
    hours_only = { "2h", Some(7200) },
    seconds_only = { "90s", Some(90) },
    trailing_digits = { "5h3", None },
    not_a_duration = { "hms", None },
    number_only = { "1234", None },
)]
fn reset_duration_tokens(token: &str, expected_secs: Option<u64>) {
    let text = format!("retry after {token} please");
    assert_eq!(parse_reset_duration(&text), expected_secs.map(Duration::from_secs));
}

#[test]
fn quota_outranks_auth_and_not_found() {
    let both = "401 unauthorized and also rate limit exceeded, command not found";
    assert_eq!(classify(both).label(), "quota_exhausted");
}

#[cfg(test)]
mod properties {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Classification is a pure function with a closed codomain.
        #[test]
        fn classify_is_deterministic(s in ".{0,512}") {
            let a = classify(&s);
            let b = classify(&s);
            prop_assert_eq!(a.label(), b.label());
            let is_known_class = matches!(
                a,
                FailureClass::Transient
                    | FailureClass::QuotaExhausted { .. }
                    | FailureClass::AuthFailure
                    | FailureClass::NotFound
            );
            prop_assert!(is_known_class);
        }
    }
}
