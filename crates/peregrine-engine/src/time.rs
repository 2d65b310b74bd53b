//! Time management: turn a remaining clock into a thinking budget.

use std::time::Duration;

/// Thinking time for one move given the remaining clock and increment,
/// both in milliseconds.
///
/// Formula: a 55th of the remaining time plus half the increment, capped
/// at half the clock minus a full second of slack, and never under 20 ms.
pub fn think_time(remaining_ms: u64, increment_ms: u64) -> Duration {
    let remaining = remaining_ms as f64;
    let increment = increment_ms as f64;
    let ms = (remaining / 55.0 + increment / 2.0)
        .min(remaining / 2.0 - 1000.0)
        .max(20.0);
    Duration::from_millis(ms as u64)
}
