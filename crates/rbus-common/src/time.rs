//! ---
//! rbus_section: "01-core-functionality"
//! rbus_subsection: "module"
//! rbus_type: "source"
//! rbus_scope: "code"
//! rbus_description: "Shared primitives and utilities for the node runtime."
//! rbus_version: "v0.1.0"
//! rbus_owner: "tbd"
//! ---
//! Device clock helpers. Node timestamps are milliseconds on a monotonic
//! clock local to each node; the two nodes never compare clocks.

use std::time::{Duration, Instant};

/// Milliseconds elapsed since `origin`, saturating at `u64::MAX`.
pub fn elapsed_millis(origin: Instant) -> u64 {
    duration_to_millis(origin.elapsed())
}

/// Convert a duration into milliseconds, saturating at `u64::MAX`.
pub fn duration_to_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Age of a timestamp relative to `now`; a timestamp from the future has age zero.
pub fn age_millis(captured_at: u64, now: u64) -> u64 {
    now.saturating_sub(captured_at)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn millis_conversion_saturates() {
        assert_eq!(duration_to_millis(Duration::from_millis(1500)), 1500);
        assert_eq!(duration_to_millis(Duration::MAX), u64::MAX);
    }

    #[test]
    fn age_never_underflows() {
        assert_eq!(age_millis(100, 250), 150);
        assert_eq!(age_millis(300, 250), 0);
    }
}
