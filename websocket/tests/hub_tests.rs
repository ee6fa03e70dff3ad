//! Hub + client tests over a real local socket.

use std::sync::Arc;
use std::time::Duration;

use clipvote_store::{MemorySharedState, SharedState, StoreError};
use clipvote_types::{CandidateId, Round, Timestamp};
use clipvote_websocket::{RemoteSharedState, WebSocketServer};
use tokio::net::TcpListener;
use tokio::sync::{oneshot, watch};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn candidates() -> Vec<CandidateId> {
    vec![CandidateId::new(1), CandidateId::new(2), CandidateId::new(3)]
}

async fn start_hub() -> (String, Arc<MemorySharedState>, oneshot::Sender<()>) {
    let shared = Arc::new(MemorySharedState::new(candidates()));
    let server = WebSocketServer::new(0, shared.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    tokio::spawn(async move {
        server
            .serve(listener, async move {
                let _ = stop_rx.await;
            })
            .await
            .expect("hub");
    });
    (format!("ws://{addr}/ws"), shared, stop_tx)
}

async fn connect(url: &str) -> RemoteSharedState {
    RemoteSharedState::connect(url, Duration::from_secs(60))
        .await
        .expect("connect")
}

async fn wait_until<T>(rx: &mut watch::Receiver<T>, pred: impl Fn(&T) -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if pred(&rx.borrow_and_update()) {
                return;
            }
            rx.changed().await.expect("sender alive");
        }
    })
    .await
    .expect("condition reached in time");
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn connect_mirrors_current_state() {
    let (url, shared, _stop) = start_hub().await;
    shared.advance_round(Round::ZERO).unwrap();
    shared
        .increment_vote(Round::new(1), CandidateId::new(2))
        .unwrap();
    shared.arm_deadline(Timestamp::from_millis(9_000)).unwrap();

    let client = connect(&url).await;
    assert_eq!(client.round(), Round::new(1));
    assert_eq!(client.round_tally().tally.get(CandidateId::new(2)), 1);
    assert_eq!(client.deadline(), Some(Timestamp::from_millis(9_000)));
}

#[tokio::test]
async fn vote_from_one_client_reaches_another() {
    let (url, shared, _stop) = start_hub().await;
    let alice = connect(&url).await;
    let bob = connect(&url).await;
    let mut bob_tally = bob.subscribe_tally();

    alice
        .increment_vote(Round::ZERO, CandidateId::new(3))
        .unwrap();

    wait_until(&mut bob_tally, |rt| rt.tally.get(CandidateId::new(3)) == 1).await;
    assert_eq!(shared.round_tally().tally.total(), 1);
}

#[tokio::test]
async fn new_round_and_deadline_are_pushed() {
    let (url, _shared, _stop) = start_hub().await;
    let host = connect(&url).await;
    let viewer = connect(&url).await;
    let mut viewer_deadline = viewer.subscribe_deadline();
    let mut viewer_round = viewer.subscribe_round();

    let deadline = Timestamp::from_millis(123_456);
    assert_eq!(host.arm_deadline(deadline).unwrap(), deadline);
    wait_until(&mut viewer_deadline, |d| *d == Some(deadline)).await;

    viewer.clear_deadline(deadline).unwrap();
    let mut host_deadline = host.subscribe_deadline();
    wait_until(&mut host_deadline, |d| d.is_none()).await;

    assert_eq!(host.advance_round(Round::ZERO).unwrap(), Round::new(1));
    wait_until(&mut viewer_round, |r| *r == Round::new(1)).await;
}

#[tokio::test]
async fn stale_round_is_rejected_locally() {
    let (url, shared, _stop) = start_hub().await;
    let client = connect(&url).await;
    assert_eq!(
        client.increment_vote(Round::new(4), CandidateId::new(1)),
        Err(StoreError::StaleRound {
            requested: Round::new(4),
            current: Round::ZERO
        })
    );
    assert_eq!(shared.round_tally().tally.total(), 0);
}

#[tokio::test]
async fn clock_offset_feed_produces_samples() {
    let (url, _shared, _stop) = start_hub().await;
    let client = connect(&url).await;
    let mut offsets = client.subscribe_clock_offset().expect("hub has a clock");
    wait_until(&mut offsets, |o| o.is_some()).await;
    // Same machine: the skew is the round-trip noise only.
    let sample = offsets.borrow().expect("sample");
    assert!(sample.abs() < 1_000, "unexpected offset {sample}ms");
}
