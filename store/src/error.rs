use clipvote_types::Round;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("vote for {requested} rejected, current is {current}")]
    StaleRound { requested: Round, current: Round },

    #[error("unknown candidate: {0}")]
    InvalidCandidate(u8),

    #[error("key not found: {0}")]
    NotFound(String),

    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("{action} refused by the hub: {reason}")]
    Refused { action: String, reason: String },

    #[error("shared state backend disconnected")]
    Disconnected,
}
