//! Round-scoped vote casting.
//!
//! A device may cast at most one vote per round. Eligibility compares the
//! device's [`VoterLock`](clipvote_types::VoterLock) with the current round,
//! so starting a new round re-enables every device without rewriting any lock.

use std::sync::Arc;

use clipvote_store::{SharedState, VoterLockStore};
use clipvote_types::{CandidateId, DeviceId, Round, RoundTally, VotingParams};
use tracing::{debug, info, warn};

use crate::VotingError;

/// The result of a vote request that was not rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VoteOutcome {
    /// The vote was added to the tally and the device is now locked for the round.
    Counted,
    /// The device already voted this round. Nothing changed; the presentation
    /// layer shows disabled controls.
    AlreadyVoted,
}

/// One device's view of the shared vote tallies.
pub struct VoteStore {
    shared: Arc<dyn SharedState>,
    locks: Arc<dyn VoterLockStore>,
    device: DeviceId,
    params: VotingParams,
}

impl VoteStore {
    pub fn new(
        shared: Arc<dyn SharedState>,
        locks: Arc<dyn VoterLockStore>,
        device: DeviceId,
        params: VotingParams,
    ) -> Self {
        Self {
            shared,
            locks,
            device,
            params,
        }
    }

    pub fn device(&self) -> &DeviceId {
        &self.device
    }

    /// Cast this device's vote for `candidate` in `round`.
    ///
    /// `round` is the round the caller believes is current. The lock is
    /// written before the single atomic add-one on the backend and restored
    /// if the backend refuses it, so a retry after any failure can never
    /// count twice.
    pub fn cast_vote(
        &self,
        candidate: CandidateId,
        round: Round,
    ) -> Result<VoteOutcome, VotingError> {
        if !self.params.is_candidate(candidate) {
            return Err(VotingError::InvalidCandidate(candidate.get()));
        }

        let current = self.shared.round();
        if round != current {
            return Err(VotingError::StaleRound {
                requested: round,
                current,
            });
        }

        let mut lock = self.locks.load(&self.device)?;
        if !lock.is_eligible(round) {
            debug!(device = %self.device, %round, "already voted this round");
            return Ok(VoteOutcome::AlreadyVoted);
        }

        // Lock first: a device must never be counted without being locked.
        let previous = lock.clone();
        lock.record(round);
        self.locks.save(&lock)?;

        if let Err(e) = self.shared.increment_vote(round, candidate) {
            if let Err(rollback) = self.locks.save(&previous) {
                warn!(device = %self.device, %round, "failed to roll back voter lock: {rollback}");
            }
            return Err(e.into());
        }

        info!(device = %self.device, %round, %candidate, "vote cast");
        Ok(VoteOutcome::Counted)
    }

    /// Start the round after `previous`, zeroing the tally.
    ///
    /// If another host already advanced past `previous` this is a no-op and
    /// the already-current round is returned. Voter locks are not touched.
    pub fn reset_round(&self, previous: Round) -> Result<Round, VotingError> {
        let round = self.shared.advance_round(previous)?;
        info!(%previous, %round, "round reset");
        Ok(round)
    }

    /// Snapshot of the current round and tally.
    pub fn tally(&self) -> RoundTally {
        self.shared.round_tally()
    }

    pub fn current_round(&self) -> Round {
        self.shared.round()
    }

    /// Whether this device may vote in the current round.
    pub fn is_eligible(&self) -> Result<bool, VotingError> {
        let lock = self.locks.load(&self.device)?;
        Ok(lock.is_eligible(self.shared.round()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clipvote_nullables::{NullLockStore, NullSharedState, SharedOp};
    use clipvote_store::StoreError;

    fn c(id: u8) -> CandidateId {
        CandidateId::new(id)
    }

    fn setup() -> (Arc<NullSharedState>, Arc<NullLockStore>, VoteStore) {
        let params = VotingParams::default();
        let shared = Arc::new(NullSharedState::new(params.candidates.clone()));
        let locks = Arc::new(NullLockStore::new());
        let store = VoteStore::new(
            shared.clone(),
            locks.clone(),
            DeviceId::new("device-a").unwrap(),
            params,
        );
        (shared, locks, store)
    }

    #[test]
    fn vote_counts_and_locks_device() {
        let (_shared, _locks, store) = setup();
        assert_eq!(store.cast_vote(c(2), Round::ZERO), Ok(VoteOutcome::Counted));

        let rt = store.tally();
        assert_eq!(rt.tally.get(c(1)), 0);
        assert_eq!(rt.tally.get(c(2)), 1);
        assert_eq!(rt.tally.get(c(3)), 0);
        assert!(!store.is_eligible().unwrap());
    }

    #[test]
    fn second_vote_same_round_is_silent_noop() {
        let (shared, _locks, store) = setup();
        store.cast_vote(c(1), Round::ZERO).unwrap();
        assert_eq!(
            store.cast_vote(c(3), Round::ZERO),
            Ok(VoteOutcome::AlreadyVoted)
        );
        assert_eq!(store.tally().tally.total(), 1);
        assert_eq!(
            shared.count_ops(|op| matches!(op, SharedOp::Increment(..))),
            1
        );
    }

    #[test]
    fn unknown_candidate_rejected_without_state_change() {
        let (shared, locks, store) = setup();
        assert_eq!(
            store.cast_vote(c(4), Round::ZERO),
            Err(VotingError::InvalidCandidate(4))
        );
        assert!(shared.ops().is_empty());
        assert_eq!(locks.saved_count(), 0);
        assert!(store.is_eligible().unwrap());
    }

    #[test]
    fn stale_round_rejected_without_state_change() {
        let (shared, _locks, store) = setup();
        assert_eq!(
            store.cast_vote(c(1), Round::new(3)),
            Err(VotingError::StaleRound {
                requested: Round::new(3),
                current: Round::ZERO
            })
        );
        assert!(shared.ops().is_empty());
    }

    #[test]
    fn failed_increment_does_not_lock() {
        let (shared, locks, store) = setup();
        shared.fail_next(StoreError::Disconnected);
        assert_eq!(
            store.cast_vote(c(1), Round::ZERO),
            Err(VotingError::Store(StoreError::Disconnected))
        );
        let lock = locks.load(store.device()).unwrap();
        assert_eq!(lock.last_voted_round, None);
        assert!(store.is_eligible().unwrap());
        assert_eq!(store.tally().tally.total(), 0);
    }

    #[test]
    fn failed_lock_write_counts_nothing() {
        let (shared, locks, store) = setup();
        locks.fail_next_save(StoreError::Backend("disk full".into()));
        assert_eq!(
            store.cast_vote(c(1), Round::ZERO),
            Err(VotingError::Store(StoreError::Backend("disk full".into())))
        );
        assert_eq!(store.tally().tally.total(), 0);
        assert!(shared.ops().is_empty());

        // The retry is counted exactly once.
        assert_eq!(store.cast_vote(c(1), Round::ZERO), Ok(VoteOutcome::Counted));
        assert_eq!(store.cast_vote(c(1), Round::ZERO), Ok(VoteOutcome::AlreadyVoted));
        assert_eq!(store.tally().tally.total(), 1);
    }

    #[test]
    fn reset_reenables_without_touching_lock() {
        let (_shared, locks, store) = setup();
        store.cast_vote(c(2), Round::ZERO).unwrap();
        assert!(!store.is_eligible().unwrap());

        assert_eq!(store.reset_round(Round::ZERO), Ok(Round::new(1)));
        assert_eq!(store.tally().tally.total(), 0);
        assert!(store.is_eligible().unwrap());

        // The saved lock still says round 0.
        let lock = locks.load(store.device()).unwrap();
        assert_eq!(lock.last_voted_round, Some(Round::ZERO));
    }

    #[test]
    fn reset_from_old_round_is_noop() {
        let (_shared, _locks, store) = setup();
        store.reset_round(Round::ZERO).unwrap();
        store.cast_vote(c(1), Round::new(1)).unwrap();

        assert_eq!(store.reset_round(Round::ZERO), Ok(Round::new(1)));
        assert_eq!(store.tally().tally.total(), 1);
    }
}
