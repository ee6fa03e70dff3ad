use thiserror::Error;

#[derive(Debug, Error)]
pub enum WsError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("timed out waiting for initial state")]
    Timeout,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
