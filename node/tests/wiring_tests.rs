//! Observers wired to a real hub over a local socket.

use std::sync::Arc;
use std::time::Duration;

use clipvote_node::{connect_observer, NodeConfig, ObserverChannels, ObserverCommand, ObserverEvent, ShutdownController};
use clipvote_store::MemorySharedState;
use clipvote_types::{CandidateId, VotingParams};
use clipvote_websocket::WebSocketServer;
use tokio::net::TcpListener;

async fn start_hub(shutdown: &ShutdownController) -> String {
    let params = VotingParams::default();
    let shared = Arc::new(MemorySharedState::new(params.candidates));
    let server = WebSocketServer::new(0, shared);
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let mut stop = shutdown.subscribe();
    tokio::spawn(async move {
        server
            .serve(listener, async move {
                let _ = stop.recv().await;
            })
            .await
            .expect("hub");
    });
    format!("ws://{addr}/ws")
}

fn config(url: &str, data_dir: &std::path::Path) -> NodeConfig {
    NodeConfig {
        hub_url: url.to_string(),
        data_dir: data_dir.to_path_buf(),
        voting: VotingParams {
            countdown_ms: 300,
            tick_interval_ms: 10,
            ..VotingParams::default()
        },
        ..NodeConfig::default()
    }
}

async fn next_event(ch: &mut ObserverChannels) -> ObserverEvent {
    tokio::time::timeout(Duration::from_secs(5), ch.events.recv())
        .await
        .expect("event within timeout")
        .expect("observer running")
}

#[tokio::test]
async fn two_devices_vote_and_see_the_same_winner() {
    let shutdown = ShutdownController::new();
    let url = start_hub(&shutdown).await;
    let dir_a = tempfile::tempdir().unwrap();
    let dir_b = tempfile::tempdir().unwrap();

    let (a, mut a_ch) = connect_observer(&config(&url, dir_a.path())).await.unwrap();
    let (b, mut b_ch) = connect_observer(&config(&url, dir_b.path())).await.unwrap();
    assert_ne!(a.device(), b.device());
    let a_task = tokio::spawn(a.run(shutdown.subscribe()));
    let b_task = tokio::spawn(b.run(shutdown.subscribe()));

    let two = CandidateId::new(2);
    a_ch.commands.send(ObserverCommand::Vote(two)).unwrap();
    assert_eq!(next_event(&mut a_ch).await, ObserverEvent::Voted(two));
    b_ch.commands.send(ObserverCommand::Vote(two)).unwrap();
    assert_eq!(next_event(&mut b_ch).await, ObserverEvent::Voted(two));

    let mut view = a_ch.view.clone();
    tokio::time::timeout(Duration::from_secs(5), view.wait_for(|v| v.tally.get(two) == 2))
        .await
        .expect("tally pushed")
        .unwrap();

    a_ch.commands.send(ObserverCommand::Reveal).unwrap();
    assert!(matches!(
        next_event(&mut a_ch).await,
        ObserverEvent::RevealArmed { .. }
    ));
    assert_eq!(next_event(&mut a_ch).await, ObserverEvent::ShowWinner(two));
    assert_eq!(next_event(&mut b_ch).await, ObserverEvent::ShowWinner(two));

    shutdown.shutdown();
    a_task.await.unwrap();
    b_task.await.unwrap();
}

#[tokio::test]
async fn device_id_survives_reconnect() {
    let shutdown = ShutdownController::new();
    let url = start_hub(&shutdown).await;
    let dir = tempfile::tempdir().unwrap();

    let (first, channels) = connect_observer(&config(&url, dir.path())).await.unwrap();
    let device = first.device().clone();
    drop(channels);
    drop(first);

    let (second, _channels) = connect_observer(&config(&url, dir.path())).await.unwrap();
    assert_eq!(second.device(), &device);
    shutdown.shutdown();
}
