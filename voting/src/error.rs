use clipvote_store::StoreError;
use clipvote_types::Round;
use thiserror::Error;

/// Rejections reported to the initiating device.
///
/// None of these is fatal and every one leaves shared state unchanged.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VotingError {
    #[error("unknown candidate: {0}")]
    InvalidCandidate(u8),

    #[error("vote for {requested} but current is {current}; resynchronize and retry")]
    StaleRound { requested: Round, current: Round },

    #[error("not enough votes to reveal: {have} < {need}")]
    InsufficientVotes { have: u64, need: u64 },

    #[error("no unique winner (tie or no votes)")]
    NoUniqueWinner,

    #[error("a reveal countdown is already running")]
    AlreadyArmed,

    #[error("the winner of this round was already revealed")]
    AlreadyRevealed,

    #[error("store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for VotingError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::StaleRound { requested, current } => {
                VotingError::StaleRound { requested, current }
            }
            StoreError::InvalidCandidate(id) => VotingError::InvalidCandidate(id),
            other => VotingError::Store(other),
        }
    }
}
