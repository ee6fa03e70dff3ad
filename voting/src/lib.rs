//! Voting core: round-scoped tallies, winner resolution and a globally
//! synchronized reveal countdown.
//!
//! ## Module overview
//!
//! - [`vote_store`]: one vote per device per round, atomic increments, round reset.
//! - [`winner`]: unique-maximum winner resolution (ties and all-zero yield none).
//! - [`reveal`]: reveal state machine (Idle → CountdownArmed → Revealed).
//! - [`clock_offset`]: server-minus-local skew correction for the countdown.
//! - [`error`]: voting error types.

pub mod clock_offset;
pub mod error;
pub mod reveal;
pub mod vote_store;
pub mod winner;

pub use clock_offset::ClockOffset;
pub use error::VotingError;
pub use reveal::{RevealCoordinator, RevealState, Tick};
pub use vote_store::{VoteOutcome, VoteStore};
pub use winner::resolve;
