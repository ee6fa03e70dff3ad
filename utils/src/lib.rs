//! Shared utilities for clip voting.

pub mod stats;
pub mod time;

pub use stats::StatsCounter;
pub use time::{format_remaining, remaining_whole_secs};
