//! JSON wire messages between hub and clients.

use clipvote_types::{CandidateId, Round, RoundTally};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Shared state keys a client can subscribe to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    /// The current round together with its tally.
    Tally,
    /// The current round number.
    Round,
    /// The reveal deadline, or null.
    Deadline,
}

impl Topic {
    pub const ALL: [Topic; 3] = [Topic::Tally, Topic::Round, Topic::Deadline];
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Topic::Tally => "tally",
            Topic::Round => "round",
            Topic::Deadline => "deadline",
        };
        f.write_str(s)
    }
}

/// Messages sent by clients to the hub.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Subscribe { topic: Topic },
    Unsubscribe { topic: Topic },
    Vote { round: Round, candidate: CandidateId },
    NewRound { previous: Round },
    ArmDeadline { deadline_ms: u64 },
    ClearDeadline { deadline_ms: u64 },
    TimeSync { client_ms: u64 },
    Ping,
}

/// Messages sent by the hub to clients.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Current value of the tally key.
    Tally { value: RoundTally },
    /// Current value of the round key.
    Round { value: Round },
    /// Current value of the deadline key, tagged with the round it was read
    /// in so a client can drop a deadline that outlived its round.
    Deadline {
        round: Round,
        deadline_ms: Option<u64>,
    },
    /// A command was applied (possibly as a no-op).
    Ack { action: String },
    /// A command was refused; shared state is unchanged.
    Rejected { action: String, reason: String },
    /// Reply to `time_sync`: the client's stamp echoed with the hub clock.
    Time { client_ms: u64, server_ms: u64 },
    Pong,
    Error { message: String },
}
