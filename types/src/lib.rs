//! Fundamental types for clip voting.
//!
//! This crate defines the types shared across every other crate in the workspace:
//! candidate identifiers, rounds, vote tallies, voter locks, timestamps and
//! the voting policy parameters.

pub mod candidate;
pub mod device;
pub mod error;
pub mod lock;
pub mod params;
pub mod round;
pub mod tally;
pub mod time;

pub use candidate::CandidateId;
pub use device::DeviceId;
pub use error::ClipVoteError;
pub use lock::VoterLock;
pub use params::VotingParams;
pub use round::Round;
pub use tally::{RoundTally, VoteTally};
pub use time::Timestamp;
