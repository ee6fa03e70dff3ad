//! Reveal state machine: manages the synchronized winner countdown.
//!
//! A host arms one shared deadline. Every observer runs its own coordinator,
//! counts down to that deadline on its corrected clock and flips to
//! `Revealed` on its own once the deadline passes. The first observer to get
//! there clears the shared deadline (clear-if-equal, so it is idempotent and
//! never clears a newer reveal) so late joiners do not replay it.

use std::sync::Arc;

use clipvote_store::SharedState;
use clipvote_types::{CandidateId, Round, Timestamp, VoteTally, VotingParams};
use clipvote_utils::{format_remaining, remaining_whole_secs};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{resolve, VotingError};

/// The lifecycle state of one observer's reveal cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RevealState {
    /// No reveal in progress.
    Idle,
    /// Counting down to a shared deadline.
    CountdownArmed { deadline: Timestamp },
    /// The deadline passed. Terminal until the next round.
    Revealed {
        deadline: Timestamp,
        winner: Option<CandidateId>,
    },
}

/// What the presentation layer should show after a tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tick {
    /// Nothing armed.
    Idle,
    /// Countdown running; whole seconds left, rounded up.
    Counting { remaining_secs: u64 },
    /// The deadline was reached on this tick. Emitted once per cycle.
    Reveal { winner: Option<CandidateId> },
    /// Already revealed on an earlier tick.
    Shown { winner: Option<CandidateId> },
}

pub struct RevealCoordinator {
    shared: Arc<dyn SharedState>,
    min_votes: u64,
    countdown_ms: u64,
    round: Round,
    state: RevealState,
}

impl RevealCoordinator {
    pub fn new(shared: Arc<dyn SharedState>, params: &VotingParams) -> Self {
        let round = shared.round();
        Self {
            shared,
            min_votes: params.min_votes_to_reveal,
            countdown_ms: params.countdown_ms,
            round,
            state: RevealState::Idle,
        }
    }

    pub fn state(&self) -> &RevealState {
        &self.state
    }

    /// Whole seconds left on an armed countdown, without advancing it.
    pub fn remaining_secs(&self, now: Timestamp) -> Option<u64> {
        match self.state {
            RevealState::CountdownArmed { deadline } => Some(remaining_whole_secs(deadline, now)),
            _ => None,
        }
    }

    /// Host command: arm the countdown.
    ///
    /// Guards, in order: a reveal must not already be running or done this
    /// round, at least `min_votes_to_reveal` votes must be in, and the tally
    /// must have a unique winner. On success the deadline `now + countdown`
    /// is set on the backend if no other host set one first; the deadline
    /// actually in effect is adopted and returned.
    pub fn reveal(&mut self, tally: &VoteTally, now: Timestamp) -> Result<Timestamp, VotingError> {
        match self.state {
            RevealState::Idle => {}
            RevealState::CountdownArmed { .. } => return Err(VotingError::AlreadyArmed),
            RevealState::Revealed { .. } => return Err(VotingError::AlreadyRevealed),
        }

        let have = tally.total();
        if have < self.min_votes {
            return Err(VotingError::InsufficientVotes {
                have,
                need: self.min_votes,
            });
        }
        if resolve(tally).is_none() {
            return Err(VotingError::NoUniqueWinner);
        }

        let requested = now.add_millis(self.countdown_ms);
        let deadline = self.shared.arm_deadline(requested)?;
        if deadline != requested {
            debug!(%requested, %deadline, "adopting deadline armed by another host");
        }
        info!(
            %deadline,
            "reveal armed, {} to go",
            format_remaining(deadline.millis_until(now))
        );
        self.state = RevealState::CountdownArmed { deadline };
        Ok(deadline)
    }

    /// Apply a pushed deadline value.
    ///
    /// An absent deadline never disarms a running countdown: the observer
    /// that cleared it only got there first, and this one still reveals at
    /// its own deadline.
    pub fn observe_deadline(&mut self, deadline: Option<Timestamp>) {
        let Some(deadline) = deadline else {
            return;
        };
        match self.state {
            RevealState::Idle => {
                debug!(%deadline, "countdown armed remotely");
                self.state = RevealState::CountdownArmed { deadline };
            }
            RevealState::CountdownArmed { deadline: current } if current != deadline => {
                debug!(old = %current, new = %deadline, "countdown deadline replaced");
                self.state = RevealState::CountdownArmed { deadline };
            }
            RevealState::Revealed {
                deadline: revealed, ..
            } if deadline > revealed => {
                debug!(%deadline, "new reveal armed after previous one");
                self.state = RevealState::CountdownArmed { deadline };
            }
            _ => {}
        }
    }

    /// Apply a pushed round value. A new round cancels any reveal cycle.
    pub fn observe_round(&mut self, round: Round) {
        if round == self.round {
            return;
        }
        if self.state != RevealState::Idle {
            debug!(%round, "round changed, reveal cycle reset");
        }
        self.round = round;
        self.state = RevealState::Idle;
    }

    /// Advance the countdown against the corrected clock.
    ///
    /// `tally` is the latest known tally; the winner is resolved from it at
    /// the moment of reveal.
    pub fn tick(&mut self, now: Timestamp, tally: &VoteTally) -> Tick {
        match self.state {
            RevealState::Idle => Tick::Idle,
            RevealState::Revealed { winner, .. } => Tick::Shown { winner },
            RevealState::CountdownArmed { deadline } => {
                if !deadline.has_passed(now) {
                    return Tick::Counting {
                        remaining_secs: remaining_whole_secs(deadline, now),
                    };
                }

                let winner = resolve(tally);
                self.state = RevealState::Revealed { deadline, winner };
                if let Err(e) = self.shared.clear_deadline(deadline) {
                    // Another observer, or the next joiner, will clear it.
                    warn!(%deadline, "failed to clear reveal deadline: {e}");
                }
                match winner {
                    Some(w) => info!(winner = %w, "winner revealed"),
                    None => info!("reveal reached with no unique winner"),
                }
                Tick::Reveal { winner }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clipvote_nullables::{NullSharedState, SharedOp};
    use clipvote_store::StoreError;

    fn c(id: u8) -> CandidateId {
        CandidateId::new(id)
    }

    fn tally(counts: [u64; 3]) -> VoteTally {
        VoteTally::from_counts([(c(1), counts[0]), (c(2), counts[1]), (c(3), counts[2])])
    }

    fn ts(ms: u64) -> Timestamp {
        Timestamp::from_millis(ms)
    }

    fn setup() -> (Arc<NullSharedState>, RevealCoordinator) {
        let params = VotingParams::default();
        let shared = Arc::new(NullSharedState::new(params.candidates.clone()));
        let coordinator = RevealCoordinator::new(shared.clone(), &params);
        (shared, coordinator)
    }

    #[test]
    fn insufficient_votes_stays_idle() {
        let (shared, mut rc) = setup();
        assert_eq!(
            rc.reveal(&tally([0, 0, 0]), ts(0)),
            Err(VotingError::InsufficientVotes { have: 0, need: 2 })
        );
        assert_eq!(rc.state(), &RevealState::Idle);
        assert!(shared.ops().is_empty());
    }

    #[test]
    fn tie_stays_idle() {
        let (shared, mut rc) = setup();
        assert_eq!(
            rc.reveal(&tally([1, 1, 0]), ts(0)),
            Err(VotingError::NoUniqueWinner)
        );
        assert_eq!(rc.state(), &RevealState::Idle);
        assert_eq!(shared.deadline(), None);
    }

    #[test]
    fn countdown_then_reveal_clears_deadline() {
        let (shared, mut rc) = setup();
        let t = tally([3, 1, 0]);
        let deadline = rc.reveal(&t, ts(10_000)).unwrap();
        assert_eq!(deadline, ts(13_000));
        assert_eq!(shared.deadline(), Some(deadline));

        assert_eq!(rc.tick(ts(10_000), &t), Tick::Counting { remaining_secs: 3 });
        assert_eq!(rc.tick(ts(10_999), &t), Tick::Counting { remaining_secs: 3 });
        assert_eq!(rc.tick(ts(11_000), &t), Tick::Counting { remaining_secs: 2 });
        assert_eq!(rc.tick(ts(12_999), &t), Tick::Counting { remaining_secs: 1 });

        assert_eq!(rc.tick(ts(13_000), &t), Tick::Reveal { winner: Some(c(1)) });
        assert_eq!(
            rc.state(),
            &RevealState::Revealed {
                deadline,
                winner: Some(c(1))
            }
        );
        assert_eq!(shared.deadline(), None);

        // Only once.
        assert_eq!(rc.tick(ts(14_000), &t), Tick::Shown { winner: Some(c(1)) });
        assert_eq!(
            shared.count_ops(|op| matches!(op, SharedOp::ClearDeadline(_))),
            1
        );
    }

    #[test]
    fn reveal_while_armed_or_revealed_is_rejected() {
        let (_shared, mut rc) = setup();
        let t = tally([2, 0, 0]);
        rc.reveal(&t, ts(0)).unwrap();
        assert_eq!(rc.reveal(&t, ts(1)), Err(VotingError::AlreadyArmed));
        rc.tick(ts(5_000), &t);
        assert_eq!(rc.reveal(&t, ts(5_001)), Err(VotingError::AlreadyRevealed));
    }

    #[test]
    fn remote_deadline_arms_idle_observer() {
        let (_shared, mut rc) = setup();
        rc.observe_deadline(Some(ts(5_000)));
        assert_eq!(
            rc.state(),
            &RevealState::CountdownArmed { deadline: ts(5_000) }
        );
        assert_eq!(
            rc.tick(ts(4_500), &tally([2, 0, 0])),
            Tick::Counting { remaining_secs: 1 }
        );
    }

    #[test]
    fn cleared_deadline_does_not_disarm() {
        let (_shared, mut rc) = setup();
        rc.observe_deadline(Some(ts(5_000)));
        rc.observe_deadline(None);
        assert_eq!(
            rc.state(),
            &RevealState::CountdownArmed { deadline: ts(5_000) }
        );
    }

    #[test]
    fn round_change_cancels_countdown() {
        let (_shared, mut rc) = setup();
        rc.observe_deadline(Some(ts(5_000)));
        rc.observe_round(Round::new(1));
        assert_eq!(rc.state(), &RevealState::Idle);
        assert_eq!(rc.tick(ts(6_000), &tally([2, 0, 0])), Tick::Idle);
    }

    #[test]
    fn later_deadline_rearms_after_reveal() {
        let (_shared, mut rc) = setup();
        let t = tally([2, 0, 0]);
        rc.observe_deadline(Some(ts(1_000)));
        rc.tick(ts(1_000), &t);

        rc.observe_deadline(Some(ts(1_000)));
        assert!(matches!(rc.state(), RevealState::Revealed { .. }));

        rc.observe_deadline(Some(ts(9_000)));
        assert_eq!(
            rc.state(),
            &RevealState::CountdownArmed { deadline: ts(9_000) }
        );
    }

    #[test]
    fn clear_failure_still_reveals() {
        let (shared, mut rc) = setup();
        let t = tally([0, 2, 0]);
        rc.reveal(&t, ts(0)).unwrap();
        shared.fail_next(StoreError::Disconnected);
        assert_eq!(rc.tick(ts(3_000), &t), Tick::Reveal { winner: Some(c(2)) });
        assert!(shared.deadline().is_some());
    }

    #[test]
    fn arm_failure_stays_idle() {
        let (shared, mut rc) = setup();
        shared.fail_next(StoreError::Disconnected);
        assert_eq!(
            rc.reveal(&tally([2, 0, 0]), ts(0)),
            Err(VotingError::Store(StoreError::Disconnected))
        );
        assert_eq!(rc.state(), &RevealState::Idle);
    }
}
