//! Observer runtime and hub wiring.
//!
//! An observer is one connected device running the voting core. It:
//! - Mirrors the shared tally, round and deadline through subscriptions
//! - Applies vote / reveal / new-round commands from the presentation layer
//! - Ticks the reveal countdown on its skew-corrected clock
//! - Publishes a [`View`] snapshot and one-shot [`ObserverEvent`]s
//!
//! The hub side ([`run_hub`]) serves the authoritative shared state.

pub mod config;
pub mod device;
pub mod error;
pub mod logging;
pub mod node;
pub mod observer;
pub mod shutdown;

pub use config::NodeConfig;
pub use device::load_or_create_device_id;
pub use error::NodeError;
pub use logging::{init_logging, LogFormat};
pub use node::{connect_observer, run_hub};
pub use observer::{Observer, ObserverChannels, ObserverCommand, ObserverEvent, View};
pub use shutdown::ShutdownController;
