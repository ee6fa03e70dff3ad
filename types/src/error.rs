//! Top-level error type shared across crates.

use thiserror::Error;

/// Errors raised while constructing or validating the shared types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClipVoteError {
    #[error("unknown candidate: {0}")]
    InvalidCandidate(u8),

    #[error("invalid candidate id: {0}")]
    UnparsableCandidate(String),

    #[error("invalid device id: {0}")]
    InvalidDeviceId(String),

    #[error("invalid voting parameters: {0}")]
    InvalidParams(String),
}
