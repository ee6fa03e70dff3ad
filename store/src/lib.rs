//! Abstract storage traits for clip voting.
//!
//! The voting core depends only on these traits. Backends: the in-process
//! [`MemorySharedState`] (used by the hub), the WebSocket client in
//! `clipvote-websocket`, the LMDB lock store in `clipvote-store-lmdb`, and
//! the test doubles in `clipvote-nullables`.

pub mod clock;
pub mod error;
pub mod lock;
pub mod memory;
pub mod shared;

pub use clock::{Clock, SystemClock};
pub use error::StoreError;
pub use lock::VoterLockStore;
pub use memory::MemorySharedState;
pub use shared::SharedState;
