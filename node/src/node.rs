//! Hub and observer wiring.

use std::sync::Arc;
use std::time::Duration;

use clipvote_store::{MemorySharedState, SystemClock};
use clipvote_store_lmdb::LmdbVoterLockStore;
use clipvote_websocket::{RemoteSharedState, WebSocketServer};
use tokio::sync::broadcast;
use tracing::info;

use crate::{load_or_create_device_id, NodeConfig, NodeError, Observer, ObserverChannels};

/// Serve the authoritative shared state until `shutdown` fires.
pub async fn run_hub(
    config: &NodeConfig,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<(), NodeError> {
    config.validate()?;
    let shared = Arc::new(MemorySharedState::new(config.voting.candidates.clone()));
    let server = WebSocketServer::new(config.hub_port, shared);
    server
        .start(async move {
            let _ = shutdown.recv().await;
        })
        .await?;
    Ok(())
}

/// Connect to the hub, open the device lock store and build an observer.
pub async fn connect_observer(
    config: &NodeConfig,
) -> Result<(Observer, ObserverChannels), NodeError> {
    config.validate()?;
    let locks = Arc::new(LmdbVoterLockStore::open(&config.data_dir)?);
    let device = load_or_create_device_id(locks.as_ref(), config.device_id.as_deref())?;

    let sync_interval = Duration::from_secs(config.voting.clock_sync_interval_secs.max(1));
    let shared = Arc::new(RemoteSharedState::connect(&config.hub_url, sync_interval).await?);
    info!(%device, url = %config.hub_url, "connected to hub");

    Ok(Observer::new(
        shared,
        locks,
        Arc::new(SystemClock),
        device,
        config.voting.clone(),
    ))
}
