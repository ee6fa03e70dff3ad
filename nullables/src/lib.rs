//! Nullable infrastructure for deterministic testing.
//!
//! All external dependencies of the voting core (clock, device lock store,
//! shared state backend) are abstracted behind traits. This crate provides
//! test-friendly implementations that:
//! - Return deterministic values
//! - Can be controlled programmatically
//! - Never touch the filesystem or network
//!
//! Usage: swap real implementations for nullables in tests.

pub mod clock;
pub mod lock_store;
pub mod shared;

pub use clock::NullClock;
pub use lock_store::NullLockStore;
pub use shared::{NullSharedState, SharedOp};
