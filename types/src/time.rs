//! Timestamp type used throughout the workspace.
//!
//! Timestamps are Unix epoch milliseconds (UTC). The reveal countdown needs
//! sub-second precision, so seconds are not enough here.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// A Unix timestamp in milliseconds since epoch (UTC).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    /// The epoch (time zero).
    pub const EPOCH: Self = Self(0);

    pub const fn from_millis(ms: u64) -> Self {
        Self(ms)
    }

    /// Get the current system time as a `Timestamp`.
    ///
    /// A system clock set before the epoch reads as the epoch.
    pub fn now() -> Self {
        let ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        Self(u64::try_from(ms).unwrap_or(u64::MAX))
    }

    pub fn as_millis(&self) -> u64 {
        self.0
    }

    /// This timestamp moved forward by `ms`.
    pub fn add_millis(&self, ms: u64) -> Self {
        Self(self.0.saturating_add(ms))
    }

    /// This timestamp shifted by a signed offset, clamped at the epoch.
    pub fn offset_by(&self, offset_ms: i64) -> Self {
        if offset_ms >= 0 {
            Self(self.0.saturating_add(offset_ms.unsigned_abs()))
        } else {
            Self(self.0.saturating_sub(offset_ms.unsigned_abs()))
        }
    }

    /// Milliseconds from `now` until this timestamp (0 once reached).
    pub fn millis_until(&self, now: Timestamp) -> u64 {
        self.0.saturating_sub(now.0)
    }

    /// Whether this timestamp has been reached relative to `now`.
    pub fn has_passed(&self, now: Timestamp) -> bool {
        now.0 >= self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_by_clamps_at_epoch() {
        let t = Timestamp::from_millis(500);
        assert_eq!(t.offset_by(-1_000), Timestamp::EPOCH);
        assert_eq!(t.offset_by(250), Timestamp::from_millis(750));
    }

    #[test]
    fn millis_until_saturates() {
        let deadline = Timestamp::from_millis(3_000);
        assert_eq!(deadline.millis_until(Timestamp::from_millis(1_000)), 2_000);
        assert_eq!(deadline.millis_until(Timestamp::from_millis(4_000)), 0);
        assert!(deadline.has_passed(Timestamp::from_millis(3_000)));
        assert!(!deadline.has_passed(Timestamp::from_millis(2_999)));
    }
}
