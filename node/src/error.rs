use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("store error: {0}")]
    Store(#[from] clipvote_store::StoreError),

    #[error("lock store error: {0}")]
    Lmdb(#[from] clipvote_store_lmdb::LmdbError),

    #[error("voting error: {0}")]
    Voting(#[from] clipvote_voting::VotingError),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] clipvote_websocket::WsError),

    #[error("invalid value: {0}")]
    Invalid(#[from] clipvote_types::ClipVoteError),

    #[error("config error: {0}")]
    Config(String),

    #[error("random source unavailable: {0}")]
    Random(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
