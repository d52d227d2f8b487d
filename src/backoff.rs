//! Reconnect delay schedule.

use std::time::Duration;

/// Delay before reconnect attempt `attempt` (zero-based).
///
/// `min(base * 2^attempt, ceiling)`, saturating at the ceiling instead of
/// overflowing for large attempt numbers.
#[must_use]
pub fn reconnect_delay(base: Duration, attempt: u32, ceiling: Duration) -> Duration {
    let factor = 1_u32.checked_shl(attempt).unwrap_or(u32::MAX);
    base.checked_mul(factor).map_or(ceiling, |delay| delay.min(ceiling))
}

#[cfg(test)]
#[path = "backoff_test.rs"]
mod tests;
