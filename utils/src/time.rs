//! Countdown arithmetic and formatting helpers.

use clipvote_types::Timestamp;

/// Whole seconds left until `deadline`, rounded up.
///
/// 2001 ms left reads as 3, exactly 2000 ms as 2, and 1 ms as 1, so the
/// display only reaches 0 when the deadline itself is reached.
pub fn remaining_whole_secs(deadline: Timestamp, now: Timestamp) -> u64 {
    deadline.millis_until(now).div_ceil(1000)
}

/// Format a millisecond span for log lines.
pub fn format_remaining(ms: u64) -> String {
    if ms < 1_000 {
        format!("{}ms", ms)
    } else if ms < 60_000 {
        format!("{}.{}s", ms / 1_000, (ms % 1_000) / 100)
    } else {
        format!("{}m {}s", ms / 60_000, (ms % 60_000) / 1_000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(ms: u64) -> Timestamp {
        Timestamp::from_millis(ms)
    }

    #[test]
    fn ceiling_division_of_remainder() {
        let deadline = ts(10_000);
        assert_eq!(remaining_whole_secs(deadline, ts(10_000 - 2_001)), 3);
        assert_eq!(remaining_whole_secs(deadline, ts(10_000 - 2_000)), 2);
        assert_eq!(remaining_whole_secs(deadline, ts(10_000 - 1)), 1);
        assert_eq!(remaining_whole_secs(deadline, ts(10_000)), 0);
        assert_eq!(remaining_whole_secs(deadline, ts(12_000)), 0);
    }

    #[test]
    fn format_ranges() {
        assert_eq!(format_remaining(250), "250ms");
        assert_eq!(format_remaining(2_450), "2.4s");
        assert_eq!(format_remaining(61_000), "1m 1s");
    }
}
