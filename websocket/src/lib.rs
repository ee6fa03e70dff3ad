//! WebSocket hub for real-time shared voting state.
//!
//! The hub ([`WebSocketServer`]) owns the authoritative
//! [`MemorySharedState`](clipvote_store::MemorySharedState) and lets clients:
//! - subscribe to the tally, round and deadline keys (current value first,
//!   then every change)
//! - cast votes, start rounds, arm and clear the reveal deadline
//! - sample the hub clock for skew correction
//!
//! [`RemoteSharedState`] is the client side: it implements
//! [`SharedState`](clipvote_store::SharedState) on top of a hub connection.

pub mod client;
pub mod error;
pub mod messages;
pub mod server;

pub use client::RemoteSharedState;
pub use error::WsError;
pub use messages::{ClientMessage, ServerMessage, Topic};
pub use server::{WebSocketServer, WsState};
