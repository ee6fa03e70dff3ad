//! Nullable shared state: records every operation and can inject failures.

use clipvote_store::{MemorySharedState, SharedState, StoreError};
use clipvote_types::{CandidateId, Round, RoundTally, Timestamp};
use std::sync::Mutex;
use tokio::sync::{broadcast, watch};

/// One operation issued against the shared state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SharedOp {
    Increment(Round, CandidateId),
    AdvanceRound(Round),
    ArmDeadline(Timestamp),
    ClearDeadline(Timestamp),
}

/// A [`SharedState`] that delegates to an in-memory backend while recording
/// the operations it receives.
///
/// `fail_next` makes the next mutating call return the given error without
/// touching state. `set_clock_offset` drives the clock-offset feed.
pub struct NullSharedState {
    inner: MemorySharedState,
    ops: Mutex<Vec<SharedOp>>,
    next_failure: Mutex<Option<StoreError>>,
    offset_tx: Option<watch::Sender<Option<i64>>>,
    refusals_tx: broadcast::Sender<StoreError>,
}

impl NullSharedState {
    /// A backend without a clock-offset feed.
    pub fn new(candidates: Vec<CandidateId>) -> Self {
        Self {
            inner: MemorySharedState::new(candidates),
            ops: Mutex::new(Vec::new()),
            next_failure: Mutex::new(None),
            offset_tx: None,
            refusals_tx: broadcast::channel(16).0,
        }
    }

    /// A backend whose clock-offset feed starts at `offset_ms`.
    pub fn with_clock_offset(candidates: Vec<CandidateId>, offset_ms: i64) -> Self {
        let (tx, _) = watch::channel(Some(offset_ms));
        Self {
            offset_tx: Some(tx),
            ..Self::new(candidates)
        }
    }

    /// Push a new clock-offset sample. No-op without a feed.
    pub fn set_clock_offset(&self, offset_ms: i64) {
        if let Some(tx) = &self.offset_tx {
            tx.send_replace(Some(offset_ms));
        }
    }

    /// Report a refusal the way a remote backend does after the fact.
    pub fn refuse_later(&self, error: StoreError) {
        let _ = self.refusals_tx.send(error);
    }

    /// Fail the next mutating call with `error`.
    pub fn fail_next(&self, error: StoreError) {
        *self.next_failure.lock().unwrap() = Some(error);
    }

    /// All operations received so far.
    pub fn ops(&self) -> Vec<SharedOp> {
        self.ops.lock().unwrap().clone()
    }

    /// Number of recorded operations matching `pred`.
    pub fn count_ops(&self, pred: impl Fn(&SharedOp) -> bool) -> usize {
        self.ops.lock().unwrap().iter().filter(|op| pred(op)).count()
    }

    fn record(&self, op: SharedOp) -> Result<(), StoreError> {
        self.ops.lock().unwrap().push(op);
        match self.next_failure.lock().unwrap().take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl SharedState for NullSharedState {
    fn increment_vote(&self, round: Round, candidate: CandidateId) -> Result<(), StoreError> {
        self.record(SharedOp::Increment(round, candidate))?;
        self.inner.increment_vote(round, candidate)
    }

    fn advance_round(&self, previous: Round) -> Result<Round, StoreError> {
        self.record(SharedOp::AdvanceRound(previous))?;
        self.inner.advance_round(previous)
    }

    fn arm_deadline(&self, deadline: Timestamp) -> Result<Timestamp, StoreError> {
        self.record(SharedOp::ArmDeadline(deadline))?;
        self.inner.arm_deadline(deadline)
    }

    fn clear_deadline(&self, expected: Timestamp) -> Result<(), StoreError> {
        self.record(SharedOp::ClearDeadline(expected))?;
        self.inner.clear_deadline(expected)
    }

    fn round_tally(&self) -> RoundTally {
        self.inner.round_tally()
    }

    fn round(&self) -> Round {
        self.inner.round()
    }

    fn deadline(&self) -> Option<Timestamp> {
        self.inner.deadline()
    }

    fn subscribe_tally(&self) -> watch::Receiver<RoundTally> {
        self.inner.subscribe_tally()
    }

    fn subscribe_round(&self) -> watch::Receiver<Round> {
        self.inner.subscribe_round()
    }

    fn subscribe_deadline(&self) -> watch::Receiver<Option<Timestamp>> {
        self.inner.subscribe_deadline()
    }

    fn subscribe_clock_offset(&self) -> Option<watch::Receiver<Option<i64>>> {
        self.offset_tx.as_ref().map(|tx| tx.subscribe())
    }

    fn subscribe_refusals(&self) -> Option<broadcast::Receiver<StoreError>> {
        Some(self.refusals_tx.subscribe())
    }
}
