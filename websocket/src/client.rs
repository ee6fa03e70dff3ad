//! Hub client implementing the shared state backend.
//!
//! Commands are queued to a writer task and sent fire-and-forget: every hub
//! operation is commutative or conditional, so the order in which they reach
//! the hub does not matter for correctness. Key values are mirrored locally
//! from the hub's pushes and exposed through `watch` channels.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clipvote_store::{SharedState, StoreError};
use clipvote_types::{CandidateId, Round, RoundTally, Timestamp};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::messages::{ClientMessage, ServerMessage, Topic};
use crate::WsError;

/// How long to wait for the hub to push the first value of every key.
const INITIAL_STATE_TIMEOUT: Duration = Duration::from_secs(5);

/// Refusals kept for a slow observer before the oldest are dropped.
const REFUSAL_BUFFER: usize = 16;

/// Local copies of the hub's keys.
struct Mirror {
    tally_tx: watch::Sender<RoundTally>,
    round_tx: watch::Sender<Round>,
    deadline_tx: watch::Sender<Option<Timestamp>>,
    /// Round the mirrored deadline was read in.
    deadline_round: AtomicU64,
    offset_tx: watch::Sender<Option<i64>>,
    refusals_tx: broadcast::Sender<StoreError>,
    connected: AtomicBool,
}

impl Mirror {
    /// Apply one hub message. Returns false for messages that are not key
    /// updates.
    fn apply(&self, msg: ServerMessage) -> bool {
        match msg {
            ServerMessage::Tally { value } => {
                self.tally_tx.send_replace(value);
            }
            ServerMessage::Round { value } => {
                // The hub clears the deadline when it advances the round; a
                // deadline read in an older round is gone even if its clear
                // has not been pushed yet.
                if self.deadline_round.load(Ordering::SeqCst) < value.get() {
                    self.deadline_tx.send_if_modified(|d| d.take().is_some());
                    self.deadline_round.fetch_max(value.get(), Ordering::SeqCst);
                }
                self.round_tx.send_replace(value);
            }
            ServerMessage::Deadline { round, deadline_ms } => {
                let current = *self.round_tx.borrow();
                if round < current {
                    debug!(%round, %current, "dropping deadline from an old round");
                    return true;
                }
                self.deadline_round.fetch_max(round.get(), Ordering::SeqCst);
                self.deadline_tx
                    .send_replace(deadline_ms.map(Timestamp::from_millis));
            }
            ServerMessage::Time {
                client_ms,
                server_ms,
            } => {
                let sample = offset_sample(client_ms, server_ms, Timestamp::now().as_millis());
                self.offset_tx.send_replace(Some(sample));
            }
            ServerMessage::Rejected { action, reason } => {
                warn!("hub rejected {action}: {reason}");
                // Nobody listening is fine.
                let _ = self.refusals_tx.send(StoreError::Refused { action, reason });
                return false;
            }
            ServerMessage::Error { message } => {
                warn!("hub error: {message}");
                return false;
            }
            ServerMessage::Ack { action } => {
                debug!("hub applied {action}");
                return false;
            }
            ServerMessage::Pong => return false,
        }
        true
    }
}

/// `server - local` skew from one time-sync round trip, taking the local
/// midpoint of send and receive as the moment the server stamped.
fn offset_sample(client_ms: u64, server_ms: u64, recv_ms: u64) -> i64 {
    let midpoint = (client_ms as i128 + recv_ms as i128) / 2;
    (server_ms as i128 - midpoint).clamp(i64::MIN as i128, i64::MAX as i128) as i64
}

/// A [`SharedState`] backed by a connection to the hub.
pub struct RemoteSharedState {
    outbound: mpsc::UnboundedSender<ClientMessage>,
    mirror: Arc<Mirror>,
    tasks: Vec<JoinHandle<()>>,
}

impl RemoteSharedState {
    /// Connect to the hub at `url` (e.g. `ws://127.0.0.1:7080/ws`), subscribe
    /// to every key and wait for their initial values.
    ///
    /// A time-sync request is sent every `clock_sync_interval`.
    pub async fn connect(url: &str, clock_sync_interval: Duration) -> Result<Self, WsError> {
        let (stream, _) = connect_async(url)
            .await
            .map_err(|e| WsError::Connect(e.to_string()))?;
        let (mut sink, mut source) = stream.split();

        let mut hello: Vec<ClientMessage> = Topic::ALL
            .iter()
            .map(|&topic| ClientMessage::Subscribe { topic })
            .collect();
        hello.push(ClientMessage::TimeSync {
            client_ms: Timestamp::now().as_millis(),
        });
        for msg in &hello {
            sink.send(Message::Text(encode(msg)?))
                .await
                .map_err(|e| WsError::Connect(e.to_string()))?;
        }

        let mut tally = None;
        let mut round = None;
        let mut deadline = None;
        let mut early = Vec::new();
        tokio::time::timeout(INITIAL_STATE_TIMEOUT, async {
            while tally.is_none() || round.is_none() || deadline.is_none() {
                let msg = match source.next().await {
                    Some(Ok(msg)) => msg,
                    Some(Err(e)) => return Err(WsError::Protocol(e.to_string())),
                    None => {
                        return Err(WsError::Connect(
                            "hub closed the connection before sending state".into(),
                        ))
                    }
                };
                let Message::Text(text) = msg else {
                    continue;
                };
                match decode(&text)? {
                    ServerMessage::Tally { value } => tally = Some(value),
                    ServerMessage::Round { value } => round = Some(value),
                    ServerMessage::Deadline {
                        round: tag,
                        deadline_ms,
                    } => deadline = Some((tag, deadline_ms.map(Timestamp::from_millis))),
                    other => early.push(other),
                }
            }
            Ok::<(), WsError>(())
        })
        .await
        .map_err(|_| WsError::Timeout)??;

        let (Some(tally), Some(round), Some((deadline_round, deadline))) = (tally, round, deadline)
        else {
            return Err(WsError::Protocol("incomplete initial state".into()));
        };
        let deadline = if deadline_round < round { None } else { deadline };
        info!(%url, %round, "connected to hub");

        let mirror = Arc::new(Mirror {
            tally_tx: watch::channel(tally).0,
            round_tx: watch::channel(round).0,
            deadline_tx: watch::channel(deadline).0,
            deadline_round: AtomicU64::new(deadline_round.max(round).get()),
            offset_tx: watch::channel(None).0,
            refusals_tx: broadcast::channel(REFUSAL_BUFFER).0,
            connected: AtomicBool::new(true),
        });
        for msg in early {
            mirror.apply(msg);
        }

        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<ClientMessage>();

        let writer = tokio::spawn(async move {
            while let Some(msg) = outbound_rx.recv().await {
                let text = match encode(&msg) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!("dropping unencodable message: {e}");
                        continue;
                    }
                };
                if let Err(e) = sink.send(Message::Text(text)).await {
                    warn!("hub send failed: {e}");
                    break;
                }
            }
            let _ = sink.close().await;
        });

        let reader_mirror = mirror.clone();
        let reader = tokio::spawn(async move {
            while let Some(msg) = source.next().await {
                match msg {
                    Ok(Message::Text(text)) => match decode(&text) {
                        Ok(msg) => {
                            reader_mirror.apply(msg);
                        }
                        Err(e) => warn!("ignoring undecodable hub message: {e}"),
                    },
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        warn!("hub receive error: {e}");
                        break;
                    }
                }
            }
            reader_mirror.connected.store(false, Ordering::SeqCst);
            warn!("disconnected from hub");
        });

        let sync_tx = outbound.clone();
        let syncer = tokio::spawn(async move {
            let mut interval = tokio::time::interval(clock_sync_interval);
            interval.tick().await;
            loop {
                interval.tick().await;
                let msg = ClientMessage::TimeSync {
                    client_ms: Timestamp::now().as_millis(),
                };
                if sync_tx.send(msg).is_err() {
                    break;
                }
            }
        });

        Ok(Self {
            outbound,
            mirror,
            tasks: vec![writer, reader, syncer],
        })
    }

    pub fn is_connected(&self) -> bool {
        self.mirror.connected.load(Ordering::SeqCst)
    }

    fn send(&self, msg: ClientMessage) -> Result<(), StoreError> {
        if !self.is_connected() {
            return Err(StoreError::Disconnected);
        }
        self.outbound
            .send(msg)
            .map_err(|_| StoreError::Disconnected)
    }
}

impl Drop for RemoteSharedState {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

impl SharedState for RemoteSharedState {
    fn increment_vote(&self, round: Round, candidate: CandidateId) -> Result<(), StoreError> {
        let current = *self.mirror.round_tx.borrow();
        if current != round {
            return Err(StoreError::StaleRound {
                requested: round,
                current,
            });
        }
        self.send(ClientMessage::Vote { round, candidate })
    }

    fn advance_round(&self, previous: Round) -> Result<Round, StoreError> {
        let current = *self.mirror.round_tx.borrow();
        if current != previous {
            return Ok(current);
        }
        self.send(ClientMessage::NewRound { previous })?;
        Ok(previous.next())
    }

    /// If the mirror already holds a deadline it is returned untouched.
    /// Otherwise the request is sent and assumed to win; if another host won
    /// the race the hub pushes its deadline and observers adopt it.
    fn arm_deadline(&self, deadline: Timestamp) -> Result<Timestamp, StoreError> {
        if let Some(existing) = *self.mirror.deadline_tx.borrow() {
            return Ok(existing);
        }
        self.send(ClientMessage::ArmDeadline {
            deadline_ms: deadline.as_millis(),
        })?;
        Ok(deadline)
    }

    fn clear_deadline(&self, expected: Timestamp) -> Result<(), StoreError> {
        if *self.mirror.deadline_tx.borrow() != Some(expected) {
            return Ok(());
        }
        self.send(ClientMessage::ClearDeadline {
            deadline_ms: expected.as_millis(),
        })
    }

    fn round_tally(&self) -> RoundTally {
        self.mirror.tally_tx.borrow().clone()
    }

    fn round(&self) -> Round {
        *self.mirror.round_tx.borrow()
    }

    fn deadline(&self) -> Option<Timestamp> {
        *self.mirror.deadline_tx.borrow()
    }

    fn subscribe_tally(&self) -> watch::Receiver<RoundTally> {
        self.mirror.tally_tx.subscribe()
    }

    fn subscribe_round(&self) -> watch::Receiver<Round> {
        self.mirror.round_tx.subscribe()
    }

    fn subscribe_deadline(&self) -> watch::Receiver<Option<Timestamp>> {
        self.mirror.deadline_tx.subscribe()
    }

    fn subscribe_clock_offset(&self) -> Option<watch::Receiver<Option<i64>>> {
        Some(self.mirror.offset_tx.subscribe())
    }

    fn subscribe_refusals(&self) -> Option<broadcast::Receiver<StoreError>> {
        Some(self.mirror.refusals_tx.subscribe())
    }
}

fn encode(msg: &ClientMessage) -> Result<String, WsError> {
    serde_json::to_string(msg).map_err(|e| WsError::Protocol(e.to_string()))
}

fn decode(text: &str) -> Result<ServerMessage, WsError> {
    serde_json::from_str(text).map_err(|e| WsError::Protocol(e.to_string()))
}
