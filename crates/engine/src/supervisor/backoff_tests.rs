// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::time::Duration;
use yare::parameterized;

#[parameterized(
    none = { 0, Some(0) },
    first = { 1, Some(60) },
    second = { 2, Some(120) },
    third = { 3, Some(240) },
    fourth = { 4, Some(480) },
    capped = { 5, Some(600) },
    deep = { 9, Some(600) },
    permanent = { 10, None },
    beyond = { 42, None },
)]
fn schedule_doubles_to_cap(consecutive: u32, expected_secs: Option<u64>) {
    assert_eq!(backoff_delay(consecutive), expected_secs.map(Duration::from_secs));
}

#[test]
fn explicit_deadline_takes_precedence() {
    // Deadline in the future blocks even with zero failures recorded.
    let verdict = evaluate(0, None, Some(10_000), 5_000);
    assert_eq!(verdict, Backoff::Blocked(Duration::from_millis(5_000)));

    // Past deadline clears regardless of the counter.
    let verdict = evaluate(7, Some(1_000), Some(4_000), 5_000);
    assert_eq!(verdict, Backoff::Clear);
}

#[test]
fn elapsed_time_clears_the_schedule() {
    let one_min = 60_000u64;
    // One failure 30s ago: still blocked for 30s.
    assert_eq!(
        evaluate(1, Some(0), None, one_min / 2),
        Backoff::Blocked(Duration::from_secs(30))
    );
    // One failure a minute ago: clear.
    assert_eq!(evaluate(1, Some(0), None, one_min), Backoff::Clear);
}

#[test]
fn ten_failures_block_permanently() {
    assert_eq!(evaluate(10, Some(0), None, u64::MAX / 2), Backoff::Permanent);
}
