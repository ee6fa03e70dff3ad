//! WebSocket hub implementation.
//!
//! Accepts WebSocket connections at `/ws`. Each client may subscribe to the
//! shared state keys and issue commands. Subscriptions are served by one
//! forwarder task per topic that watches the key and pushes its value, first
//! immediately and then on every change.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::State,
    response::IntoResponse,
    routing::get,
    Router,
};
use clipvote_store::{MemorySharedState, SharedState, StoreError};
use clipvote_types::Timestamp;
use clipvote_utils::StatsCounter;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::messages::{ClientMessage, ServerMessage, Topic};
use crate::WsError;

type WsSink = Arc<tokio::sync::Mutex<SplitSink<WebSocket, Message>>>;

/// Counter names kept by the hub.
pub const STAT_CLIENTS: &str = "clients";
pub const STAT_VOTES: &str = "votes";
pub const STAT_REJECTED: &str = "rejected";
pub const STAT_ROUNDS: &str = "rounds";

/// Shared state for the hub: the authoritative voting state plus counters.
pub struct WsState {
    pub shared: Arc<MemorySharedState>,
    pub stats: StatsCounter,
}

impl WsState {
    pub fn new(shared: Arc<MemorySharedState>) -> Self {
        Self {
            shared,
            stats: StatsCounter::new(&[STAT_CLIENTS, STAT_VOTES, STAT_REJECTED, STAT_ROUNDS]),
        }
    }

    /// Current value of a topic as a server message.
    pub fn snapshot(&self, topic: Topic) -> ServerMessage {
        match topic {
            Topic::Tally => ServerMessage::Tally {
                value: self.shared.round_tally(),
            },
            Topic::Round => ServerMessage::Round {
                value: self.shared.round(),
            },
            Topic::Deadline => {
                let (round, deadline) = self.shared.round_and_deadline();
                ServerMessage::Deadline {
                    round,
                    deadline_ms: deadline.map(|d| d.as_millis()),
                }
            }
        }
    }

    /// Apply a command from a client and build the reply.
    ///
    /// Subscriptions are handled by the connection loop, not here.
    pub fn apply(&self, msg: &ClientMessage) -> Option<ServerMessage> {
        match *msg {
            ClientMessage::Vote { round, candidate } => {
                let reply = reply("vote", self.shared.increment_vote(round, candidate));
                match reply {
                    ServerMessage::Ack { .. } => self.stats.increment(STAT_VOTES),
                    _ => self.stats.increment(STAT_REJECTED),
                }
                Some(reply)
            }
            ClientMessage::NewRound { previous } => {
                let (_, advanced) = self.shared.advance_from(previous);
                if advanced {
                    self.stats.increment(STAT_ROUNDS);
                }
                Some(reply("new_round", Ok(())))
            }
            ClientMessage::ArmDeadline { deadline_ms } => Some(reply(
                "arm_deadline",
                self.shared
                    .arm_deadline(Timestamp::from_millis(deadline_ms))
                    .map(|_| ()),
            )),
            ClientMessage::ClearDeadline { deadline_ms } => Some(reply(
                "clear_deadline",
                self.shared
                    .clear_deadline(Timestamp::from_millis(deadline_ms)),
            )),
            ClientMessage::TimeSync { client_ms } => Some(ServerMessage::Time {
                client_ms,
                server_ms: Timestamp::now().as_millis(),
            }),
            ClientMessage::Ping => Some(ServerMessage::Pong),
            ClientMessage::Subscribe { .. } | ClientMessage::Unsubscribe { .. } => None,
        }
    }
}

fn reply(action: &str, result: Result<(), StoreError>) -> ServerMessage {
    match result {
        Ok(()) => ServerMessage::Ack {
            action: action.to_string(),
        },
        Err(e) => {
            debug!("{action} rejected: {e}");
            ServerMessage::Rejected {
                action: action.to_string(),
                reason: e.to_string(),
            }
        }
    }
}

/// The hub, configured with a port and shared state.
pub struct WebSocketServer {
    pub port: u16,
    pub state: Arc<WsState>,
}

impl WebSocketServer {
    pub fn new(port: u16, shared: Arc<MemorySharedState>) -> Self {
        Self {
            port,
            state: Arc::new(WsState::new(shared)),
        }
    }

    /// The axum router serving `/ws`.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/ws", get(ws_handler))
            .with_state(self.state.clone())
    }

    /// Listen on `0.0.0.0:port` until `shutdown` resolves.
    pub async fn start(&self, shutdown: impl Future<Output = ()> + Send + 'static) -> Result<(), WsError> {
        let addr = format!("0.0.0.0:{}", self.port);
        let listener = TcpListener::bind(&addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` resolves.
    pub async fn serve(
        &self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), WsError> {
        info!("WebSocket hub listening on {}", listener.local_addr()?);
        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await?;
        info!(stats = ?self.state.stats.snapshot(), "WebSocket hub stopped");
        Ok(())
    }
}

/// Axum handler that upgrades an HTTP request to a WebSocket connection.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<WsState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle a single WebSocket connection.
///
/// The flow:
/// 1. Split the socket into sender and receiver halves.
/// 2. Listen for client messages (subscriptions and commands).
/// 3. For each active subscription, run a forwarder task that pushes the
///    topic's value on every change.
/// 4. Abort all forwarder tasks when the client disconnects.
async fn handle_socket(socket: WebSocket, state: Arc<WsState>) {
    let (ws_sender, mut ws_receiver) = socket.split();
    let ws_sender: WsSink = Arc::new(tokio::sync::Mutex::new(ws_sender));
    let mut forwarders: HashMap<Topic, JoinHandle<()>> = HashMap::new();

    state.stats.increment(STAT_CLIENTS);
    debug!("New WebSocket client connected");

    while let Some(msg_result) = ws_receiver.next().await {
        let msg = match msg_result {
            Ok(msg) => msg,
            Err(e) => {
                warn!("WebSocket receive error: {}", e);
                break;
            }
        };

        match msg {
            Message::Text(text) => {
                handle_text_message(&text, &state, &mut forwarders, &ws_sender).await;
            }
            Message::Close(_) => {
                debug!("Client sent close frame");
                break;
            }
            Message::Ping(data) => {
                let mut sender = ws_sender.lock().await;
                let _ = sender.send(Message::Pong(data)).await;
            }
            _ => {}
        }
    }

    for (topic, handle) in forwarders.drain() {
        debug!("Aborting forwarder for topic: {}", topic);
        handle.abort();
    }
    debug!("WebSocket client disconnected");
}

/// Process a text message from the client.
async fn handle_text_message(
    text: &str,
    state: &Arc<WsState>,
    forwarders: &mut HashMap<Topic, JoinHandle<()>>,
    ws_sender: &WsSink,
) {
    let client_msg: ClientMessage = match serde_json::from_str(text) {
        Ok(msg) => msg,
        Err(e) => {
            let error_msg = ServerMessage::Error {
                message: format!("Invalid message: {}", e),
            };
            send_json(ws_sender, &error_msg).await;
            return;
        }
    };

    match client_msg {
        ClientMessage::Subscribe { topic } => {
            if let Some(handle) = forwarders.remove(&topic) {
                handle.abort();
            }
            let handle = tokio::spawn(forward_topic(state.clone(), topic, ws_sender.clone()));
            forwarders.insert(topic, handle);
            debug!("Client subscribed to {}", topic);
        }
        ClientMessage::Unsubscribe { topic } => {
            let reply = match forwarders.remove(&topic) {
                Some(handle) => {
                    handle.abort();
                    ServerMessage::Ack {
                        action: "unsubscribe".to_string(),
                    }
                }
                None => ServerMessage::Error {
                    message: format!("Not subscribed to {}", topic),
                },
            };
            send_json(ws_sender, &reply).await;
            debug!("Client unsubscribed from {}", topic);
        }
        ref command => {
            if let Some(reply) = state.apply(command) {
                send_json(ws_sender, &reply).await;
            }
        }
    }
}

/// Forwarder task: pushes the current value of `topic`, then every change,
/// until the client goes away.
async fn forward_topic(state: Arc<WsState>, topic: Topic, ws_sender: WsSink) {
    match topic {
        Topic::Tally => {
            let mut rx = state.shared.subscribe_tally();
            loop {
                let value = rx.borrow_and_update().clone();
                if !send_json(&ws_sender, &ServerMessage::Tally { value }).await
                    || rx.changed().await.is_err()
                {
                    break;
                }
            }
        }
        Topic::Round => {
            let mut rx = state.shared.subscribe_round();
            loop {
                let value = *rx.borrow_and_update();
                if !send_json(&ws_sender, &ServerMessage::Round { value }).await
                    || rx.changed().await.is_err()
                {
                    break;
                }
            }
        }
        Topic::Deadline => {
            let mut rx = state.shared.subscribe_deadline();
            loop {
                drop(rx.borrow_and_update());
                let msg = state.snapshot(Topic::Deadline);
                if !send_json(&ws_sender, &msg).await || rx.changed().await.is_err() {
                    break;
                }
            }
        }
    }
    debug!("Forwarder for {} finished", topic);
}

/// Serialize and send one message. Returns false once the client is gone.
async fn send_json(ws_sender: &WsSink, msg: &ServerMessage) -> bool {
    let text = match serde_json::to_string(msg) {
        Ok(text) => text,
        Err(e) => {
            warn!("failed to encode server message: {e}");
            return true;
        }
    };
    let mut sender = ws_sender.lock().await;
    sender.send(Message::Text(text)).await.is_ok()
}
