//! Per-device voter lock.

use crate::{DeviceId, Round};
use serde::{Deserialize, Serialize};

/// Remembers the last round in which a device cast a vote.
///
/// Eligibility is decided purely by comparing `last_voted_round` with the
/// current round, so a new round re-enables every device without touching
/// its lock. This is a convenience against accidental double votes, not a
/// security control: clearing device storage removes it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterLock {
    pub device: DeviceId,
    pub last_voted_round: Option<Round>,
}

impl VoterLock {
    /// A lock for a device that has never voted.
    pub fn fresh(device: DeviceId) -> Self {
        Self {
            device,
            last_voted_round: None,
        }
    }

    /// Whether the device may vote in `current`.
    pub fn is_eligible(&self, current: Round) -> bool {
        self.last_voted_round != Some(current)
    }

    /// Record a vote cast in `round`.
    pub fn record(&mut self, round: Round) {
        self.last_voted_round = Some(round);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eligibility_follows_round_comparison() {
        let mut lock = VoterLock::fresh(DeviceId::new("dev").unwrap());
        assert!(lock.is_eligible(Round::ZERO));

        lock.record(Round::ZERO);
        assert!(!lock.is_eligible(Round::ZERO));
        assert!(lock.is_eligible(Round::ZERO.next()));
    }
}
