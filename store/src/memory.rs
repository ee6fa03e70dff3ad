//! In-process shared state backend.
//!
//! Serializes every operation under one mutex and publishes each key through
//! its own `tokio::sync::watch` channel. This is the authoritative state
//! behind the WebSocket hub and the backend used by in-process tests.

use std::sync::{Mutex, MutexGuard};

use clipvote_types::{CandidateId, Round, RoundTally, Timestamp};
use tokio::sync::watch;
use tracing::debug;

use crate::{SharedState, StoreError};

pub struct MemorySharedState {
    candidates: Vec<CandidateId>,
    /// Held for the duration of each mutation so multi-key updates (round
    /// advance touches all three keys) are never observed half-applied by
    /// another writer.
    write_lock: Mutex<()>,
    tally_tx: watch::Sender<RoundTally>,
    round_tx: watch::Sender<Round>,
    deadline_tx: watch::Sender<Option<Timestamp>>,
}

impl MemorySharedState {
    /// Start at round 0 with an all-zero tally and no deadline.
    pub fn new(candidates: Vec<CandidateId>) -> Self {
        Self::starting_at(candidates, Round::ZERO)
    }

    /// Start at an arbitrary round, e.g. when resuming a hub.
    pub fn starting_at(candidates: Vec<CandidateId>, round: Round) -> Self {
        let (tally_tx, _) = watch::channel(RoundTally::zeroed(round, &candidates));
        let (round_tx, _) = watch::channel(round);
        let (deadline_tx, _) = watch::channel(None);
        Self {
            candidates,
            write_lock: Mutex::new(()),
            tally_tx,
            round_tx,
            deadline_tx,
        }
    }

    pub fn candidates(&self) -> &[CandidateId] {
        &self.candidates
    }

    /// Compare-and-advance from `previous`. Returns the round now current and
    /// whether this call performed the advance.
    pub fn advance_from(&self, previous: Round) -> (Round, bool) {
        let _guard = self.guard();
        let current = *self.round_tx.borrow();
        if current != previous {
            debug!(%previous, %current, "round already advanced");
            return (current, false);
        }
        let next = previous.next();
        self.tally_tx
            .send_replace(RoundTally::zeroed(next, &self.candidates));
        self.deadline_tx.send_replace(None);
        self.round_tx.send_replace(next);
        debug!(round = %next, "new round started");
        (next, true)
    }

    /// The current round and its deadline, read together.
    ///
    /// Every writer holds the write lock, so the pair is never split across a
    /// round advance.
    pub fn round_and_deadline(&self) -> (Round, Option<Timestamp>) {
        let _guard = self.guard();
        (*self.round_tx.borrow(), *self.deadline_tx.borrow())
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        // The guarded value is `()`, so a poisoned lock carries no broken state.
        self.write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SharedState for MemorySharedState {
    fn increment_vote(&self, round: Round, candidate: CandidateId) -> Result<(), StoreError> {
        let _guard = self.guard();
        let current = self.tally_tx.borrow().round;
        if current != round {
            return Err(StoreError::StaleRound {
                requested: round,
                current,
            });
        }
        let mut result = Ok(());
        self.tally_tx.send_if_modified(|rt| match rt.tally.increment(candidate) {
            Ok(count) => {
                debug!(%round, %candidate, count, "vote counted");
                true
            }
            Err(_) => {
                result = Err(StoreError::InvalidCandidate(candidate.get()));
                false
            }
        });
        result
    }

    fn advance_round(&self, previous: Round) -> Result<Round, StoreError> {
        Ok(self.advance_from(previous).0)
    }

    fn arm_deadline(&self, deadline: Timestamp) -> Result<Timestamp, StoreError> {
        let _guard = self.guard();
        let mut effective = deadline;
        self.deadline_tx.send_if_modified(|current| match current {
            Some(existing) => {
                effective = *existing;
                false
            }
            None => {
                *current = Some(deadline);
                true
            }
        });
        debug!(requested = %deadline, effective = %effective, "reveal deadline armed");
        Ok(effective)
    }

    fn clear_deadline(&self, expected: Timestamp) -> Result<(), StoreError> {
        let _guard = self.guard();
        let cleared = self.deadline_tx.send_if_modified(|current| {
            if *current == Some(expected) {
                *current = None;
                true
            } else {
                false
            }
        });
        if cleared {
            debug!(deadline = %expected, "reveal deadline cleared");
        }
        Ok(())
    }

    fn round_tally(&self) -> RoundTally {
        self.tally_tx.borrow().clone()
    }

    fn round(&self) -> Round {
        *self.round_tx.borrow()
    }

    fn deadline(&self) -> Option<Timestamp> {
        *self.deadline_tx.borrow()
    }

    fn subscribe_tally(&self) -> watch::Receiver<RoundTally> {
        self.tally_tx.subscribe()
    }

    fn subscribe_round(&self) -> watch::Receiver<Round> {
        self.round_tx.subscribe()
    }

    fn subscribe_deadline(&self) -> watch::Receiver<Option<Timestamp>> {
        self.deadline_tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn ids() -> Vec<CandidateId> {
        vec![CandidateId::new(1), CandidateId::new(2), CandidateId::new(3)]
    }

    fn c(id: u8) -> CandidateId {
        CandidateId::new(id)
    }

    #[test]
    fn starts_at_round_zero_with_zero_tally() {
        let state = MemorySharedState::new(ids());
        assert_eq!(state.round(), Round::ZERO);
        assert_eq!(state.round_tally().tally.total(), 0);
        assert_eq!(state.deadline(), None);
    }

    #[test]
    fn advance_from_reports_only_the_real_advance() {
        let state = MemorySharedState::new(ids());
        state.arm_deadline(Timestamp::from_millis(4_000)).unwrap();
        assert_eq!(
            state.round_and_deadline(),
            (Round::ZERO, Some(Timestamp::from_millis(4_000)))
        );

        assert_eq!(state.advance_from(Round::ZERO), (Round::new(1), true));
        assert_eq!(state.advance_from(Round::ZERO), (Round::new(1), false));
        assert_eq!(state.round_and_deadline(), (Round::new(1), None));
    }

    #[test]
    fn increment_rejects_stale_round_and_unknown_candidate() {
        let state = MemorySharedState::new(ids());
        assert_eq!(
            state.increment_vote(Round::new(1), c(1)),
            Err(StoreError::StaleRound {
                requested: Round::new(1),
                current: Round::ZERO
            })
        );
        assert_eq!(
            state.increment_vote(Round::ZERO, c(7)),
            Err(StoreError::InvalidCandidate(7))
        );
        assert_eq!(state.round_tally().tally.total(), 0);
    }

    #[test]
    fn advance_round_is_compare_and_advance() {
        let state = MemorySharedState::new(ids());
        state.increment_vote(Round::ZERO, c(2)).unwrap();
        state.arm_deadline(Timestamp::from_millis(5_000)).unwrap();

        assert_eq!(state.advance_round(Round::ZERO).unwrap(), Round::new(1));
        // A second host resetting from the same round is a no-op.
        assert_eq!(state.advance_round(Round::ZERO).unwrap(), Round::new(1));

        let rt = state.round_tally();
        assert_eq!(rt.round, Round::new(1));
        assert_eq!(rt.tally.total(), 0);
        assert_eq!(state.deadline(), None);
    }

    #[test]
    fn arm_is_set_if_absent_and_clear_is_clear_if_equal() {
        let state = MemorySharedState::new(ids());
        let first = Timestamp::from_millis(1_000);
        let second = Timestamp::from_millis(2_000);

        assert_eq!(state.arm_deadline(first).unwrap(), first);
        assert_eq!(state.arm_deadline(second).unwrap(), first);

        state.clear_deadline(second).unwrap();
        assert_eq!(state.deadline(), Some(first));

        state.clear_deadline(first).unwrap();
        assert_eq!(state.deadline(), None);
        // Idempotent.
        state.clear_deadline(first).unwrap();
        assert_eq!(state.deadline(), None);
    }

    #[test]
    fn subscribers_see_changes() {
        let state = MemorySharedState::new(ids());
        let mut tally_rx = state.subscribe_tally();
        let mut round_rx = state.subscribe_round();

        state.increment_vote(Round::ZERO, c(3)).unwrap();
        assert!(tally_rx.has_changed().unwrap());
        assert_eq!(tally_rx.borrow_and_update().tally.get(c(3)), 1);

        state.advance_round(Round::ZERO).unwrap();
        assert!(round_rx.has_changed().unwrap());
        assert_eq!(*round_rx.borrow_and_update(), Round::new(1));
    }

    #[test]
    fn concurrent_increments_are_not_lost() {
        let state = Arc::new(MemorySharedState::new(ids()));
        let handles: Vec<_> = (0..64u8)
            .map(|i| {
                let state = state.clone();
                std::thread::spawn(move || {
                    state.increment_vote(Round::ZERO, c(i % 3 + 1)).unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(state.round_tally().tally.total(), 64);
    }
}
