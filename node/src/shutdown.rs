//! Shutdown fan-out for the hub and observer tasks.

use tokio::signal;
use tokio::sync::broadcast;
use tracing::{info, warn};

/// Cheap to clone; every clone triggers the same subscribers.
#[derive(Clone)]
pub struct ShutdownController {
    tx: broadcast::Sender<()>,
}

impl ShutdownController {
    pub fn new() -> Self {
        Self {
            tx: broadcast::channel(1).0,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    pub fn shutdown(&self) {
        // No receivers just means nothing is running yet.
        let _ = self.tx.send(());
    }

    /// Park until the process is asked to stop, then fan the stop out.
    pub async fn shutdown_on_signal(self) {
        let signal = next_signal().await;
        info!(signal, "stopping");
        self.shutdown();
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

/// Name of the first stop signal to arrive.
async fn next_signal() -> &'static str {
    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("SIGTERM handler unavailable: {e}");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        result = signal::ctrl_c() => {
            if let Err(e) = result {
                warn!("SIGINT handler unavailable: {e}");
                std::future::pending::<()>().await;
            }
            "SIGINT"
        }
        _ = terminate => "SIGTERM",
    }
}
