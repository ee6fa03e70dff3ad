//! Voting policy parameters.
//!
//! Every field has a serde default, so a partial (or empty) TOML table is a
//! valid configuration.

use crate::{CandidateId, ClipVoteError};
use serde::{Deserialize, Serialize};

/// Policy knobs for one voting deployment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VotingParams {
    /// The fixed set of clips that can be voted for.
    #[serde(default = "default_candidates")]
    pub candidates: Vec<CandidateId>,

    /// Minimum total votes before a reveal may be armed.
    #[serde(default = "default_min_votes_to_reveal")]
    pub min_votes_to_reveal: u64,

    /// Length of the reveal countdown in milliseconds.
    #[serde(default = "default_countdown_ms")]
    pub countdown_ms: u64,

    /// How often an observer re-evaluates the countdown.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// How often an observer asks the hub for its clock.
    #[serde(default = "default_clock_sync_interval_secs")]
    pub clock_sync_interval_secs: u64,

    /// Weight of the existing clock offset in the moving average, out of
    /// `clock_smoothing_denominator`. 7 of 8 keeps one eighth of each new sample.
    #[serde(default = "default_clock_smoothing_numerator")]
    pub clock_smoothing_numerator: i64,

    #[serde(default = "default_clock_smoothing_denominator")]
    pub clock_smoothing_denominator: i64,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_candidates() -> Vec<CandidateId> {
    vec![CandidateId::new(1), CandidateId::new(2), CandidateId::new(3)]
}

fn default_min_votes_to_reveal() -> u64 {
    2
}

fn default_countdown_ms() -> u64 {
    3_000
}

fn default_tick_interval_ms() -> u64 {
    100
}

fn default_clock_sync_interval_secs() -> u64 {
    10
}

fn default_clock_smoothing_numerator() -> i64 {
    7
}

fn default_clock_smoothing_denominator() -> i64 {
    8
}

// ── Impl ───────────────────────────────────────────────────────────────

impl VotingParams {
    /// Whether `candidate` is one of the configured clips.
    pub fn is_candidate(&self, candidate: CandidateId) -> bool {
        self.candidates.contains(&candidate)
    }

    /// Check internal consistency.
    pub fn validate(&self) -> Result<(), ClipVoteError> {
        if self.candidates.is_empty() {
            return Err(ClipVoteError::InvalidParams(
                "at least one candidate is required".into(),
            ));
        }
        let mut sorted = self.candidates.clone();
        sorted.sort();
        sorted.dedup();
        if sorted.len() != self.candidates.len() {
            return Err(ClipVoteError::InvalidParams(
                "candidate ids must be unique".into(),
            ));
        }
        if self.tick_interval_ms == 0 {
            return Err(ClipVoteError::InvalidParams(
                "tick_interval_ms must be positive".into(),
            ));
        }
        if self.clock_smoothing_denominator <= 0
            || self.clock_smoothing_numerator < 0
            || self.clock_smoothing_numerator >= self.clock_smoothing_denominator
        {
            return Err(ClipVoteError::InvalidParams(
                "clock smoothing must satisfy 0 <= numerator < denominator".into(),
            ));
        }
        Ok(())
    }
}

impl Default for VotingParams {
    fn default() -> Self {
        Self {
            candidates: default_candidates(),
            min_votes_to_reveal: default_min_votes_to_reveal(),
            countdown_ms: default_countdown_ms(),
            tick_interval_ms: default_tick_interval_ms(),
            clock_sync_interval_secs: default_clock_sync_interval_secs(),
            clock_smoothing_numerator: default_clock_smoothing_numerator(),
            clock_smoothing_denominator: default_clock_smoothing_denominator(),
        }
    }
}
