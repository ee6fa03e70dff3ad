//! Shared state backend trait.
//!
//! The backend holds the state every observer shares: the current round,
//! the tally for that round and the optional reveal deadline. Each key has
//! its own atomic update and its own change stream.
//!
//! Every mutation is safe under arbitrary interleaving:
//! - [`increment_vote`](SharedState::increment_vote) is an atomic add-one,
//!   never a read-modify-write of the whole tally by the caller.
//! - [`advance_round`](SharedState::advance_round) is compare-and-advance.
//! - [`arm_deadline`](SharedState::arm_deadline) is set-if-absent.
//! - [`clear_deadline`](SharedState::clear_deadline) is clear-if-equal.

use crate::StoreError;
use clipvote_types::{CandidateId, Round, RoundTally, Timestamp};
use tokio::sync::{broadcast, watch};

pub trait SharedState: Send + Sync {
    /// Atomically add one vote for `candidate` in `round`.
    ///
    /// Rejected with [`StoreError::StaleRound`] when `round` is not the
    /// current round and [`StoreError::InvalidCandidate`] for unknown ids.
    /// Remote backends may only be able to detect these on the far side, in
    /// which case the rejection is logged there and the tally is unchanged.
    fn increment_vote(&self, round: Round, candidate: CandidateId) -> Result<(), StoreError>;

    /// Advance to `previous.next()` with a zeroed tally and no deadline, if
    /// the current round is still `previous`. Otherwise a no-op.
    ///
    /// Returns the round the caller should now consider current.
    fn advance_round(&self, previous: Round) -> Result<Round, StoreError>;

    /// Set the reveal deadline if none is set.
    ///
    /// Returns the deadline in effect afterwards, which is an earlier
    /// host's deadline when one was already armed.
    fn arm_deadline(&self, deadline: Timestamp) -> Result<Timestamp, StoreError>;

    /// Clear the reveal deadline if it is still `expected`.
    ///
    /// Clearing an absent or different deadline is a no-op.
    fn clear_deadline(&self, expected: Timestamp) -> Result<(), StoreError>;

    /// Snapshot of the current round and its tally.
    fn round_tally(&self) -> RoundTally;

    /// Snapshot of the current round.
    fn round(&self) -> Round;

    /// Snapshot of the reveal deadline.
    fn deadline(&self) -> Option<Timestamp>;

    fn subscribe_tally(&self) -> watch::Receiver<RoundTally>;

    fn subscribe_round(&self) -> watch::Receiver<Round>;

    fn subscribe_deadline(&self) -> watch::Receiver<Option<Timestamp>>;

    /// Feed of `server - local` clock skew samples in milliseconds. The
    /// value is `None` until the first sample arrives.
    ///
    /// Returns `None` when the backend has no notion of a remote clock.
    fn subscribe_clock_offset(&self) -> Option<watch::Receiver<Option<i64>>> {
        None
    }

    /// Mutations that were accepted locally but refused by the far side
    /// later, as [`StoreError::Refused`].
    ///
    /// Returns `None` when every refusal is reported by the call itself.
    fn subscribe_refusals(&self) -> Option<broadcast::Receiver<StoreError>> {
        None
    }
}
