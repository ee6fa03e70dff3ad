//! Per-candidate vote counts.

use crate::{CandidateId, ClipVoteError, Round};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Vote counts for a fixed set of candidates.
///
/// Every candidate the tally was created with is always present. Counts only
/// grow; a new round starts from a fresh zeroed tally instead of decrementing.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "BTreeMap<String, u64>", try_from = "BTreeMap<String, u64>")]
pub struct VoteTally {
    counts: BTreeMap<CandidateId, u64>,
}

impl VoteTally {
    /// Create an all-zero tally for the given candidates.
    pub fn zeroed(candidates: &[CandidateId]) -> Self {
        Self {
            counts: candidates.iter().map(|&c| (c, 0)).collect(),
        }
    }

    /// Build a tally from explicit `(candidate, count)` pairs.
    pub fn from_counts(counts: impl IntoIterator<Item = (CandidateId, u64)>) -> Self {
        Self {
            counts: counts.into_iter().collect(),
        }
    }

    /// Whether `candidate` is part of this tally.
    pub fn contains(&self, candidate: CandidateId) -> bool {
        self.counts.contains_key(&candidate)
    }

    /// Count for `candidate`, or 0 if unknown.
    pub fn get(&self, candidate: CandidateId) -> u64 {
        self.counts.get(&candidate).copied().unwrap_or(0)
    }

    /// Add one vote for `candidate`, returning the new count.
    pub fn increment(&mut self, candidate: CandidateId) -> Result<u64, ClipVoteError> {
        let count = self
            .counts
            .get_mut(&candidate)
            .ok_or(ClipVoteError::InvalidCandidate(candidate.get()))?;
        *count = count.saturating_add(1);
        Ok(*count)
    }

    /// Sum of all counts.
    pub fn total(&self) -> u64 {
        self.counts.values().fold(0u64, |acc, c| acc.saturating_add(*c))
    }

    /// Candidates in ascending id order.
    pub fn candidates(&self) -> impl Iterator<Item = CandidateId> + '_ {
        self.counts.keys().copied()
    }

    /// `(candidate, count)` pairs in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = (CandidateId, u64)> + '_ {
        self.counts.iter().map(|(&c, &n)| (c, n))
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

// Keys go over the wire as strings so the map survives any serde format,
// including buffered (internally tagged) JSON.
impl From<VoteTally> for BTreeMap<String, u64> {
    fn from(tally: VoteTally) -> Self {
        tally
            .counts
            .into_iter()
            .map(|(c, n)| (c.to_string(), n))
            .collect()
    }
}

impl TryFrom<BTreeMap<String, u64>> for VoteTally {
    type Error = ClipVoteError;

    fn try_from(raw: BTreeMap<String, u64>) -> Result<Self, Self::Error> {
        let counts = raw
            .into_iter()
            .map(|(k, n)| k.parse::<CandidateId>().map(|c| (c, n)))
            .collect::<Result<_, _>>()?;
        Ok(Self { counts })
    }
}

/// A tally together with the round it belongs to.
///
/// Published as one value so an observer never attributes one round's counts
/// to another round.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundTally {
    pub round: Round,
    pub tally: VoteTally,
}

impl RoundTally {
    pub fn new(round: Round, tally: VoteTally) -> Self {
        Self { round, tally }
    }

    /// A fresh all-zero tally for `round`.
    pub fn zeroed(round: Round, candidates: &[CandidateId]) -> Self {
        Self {
            round,
            tally: VoteTally::zeroed(candidates),
        }
    }
}
