//! Candidate (clip) identifier.

use crate::ClipVoteError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of one clip that can be voted for.
///
/// The set of valid candidates is fixed per deployment (see
/// [`VotingParams::candidates`](crate::VotingParams::candidates)); this type
/// only carries the number.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CandidateId(u8);

impl CandidateId {
    pub const fn new(id: u8) -> Self {
        Self(id)
    }

    pub fn get(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for CandidateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u8> for CandidateId {
    fn from(id: u8) -> Self {
        Self(id)
    }
}

impl FromStr for CandidateId {
    type Err = ClipVoteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u8>()
            .map(Self)
            .map_err(|_| ClipVoteError::UnparsableCandidate(s.to_string()))
    }
}
