//! LMDB storage backend for device-local state.
//!
//! Implements [`VoterLockStore`](clipvote_store::VoterLockStore) using the
//! `heed` LMDB bindings so a device's last voted round and its identifier
//! survive restarts.

pub mod environment;
pub mod error;
pub mod voter_lock;

pub use environment::LmdbEnvironment;
pub use error::LmdbError;
pub use voter_lock::LmdbVoterLockStore;
