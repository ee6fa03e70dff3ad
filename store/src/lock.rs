//! Device-local voter lock storage trait.

use crate::StoreError;
use clipvote_types::{DeviceId, VoterLock};

/// Device-local persistent store remembering the last round each device
/// voted in, plus this device's own identifier.
///
/// Must survive process restarts. It is never shared between devices.
pub trait VoterLockStore: Send + Sync {
    /// Load the lock for `device`; a device with no record gets a fresh lock.
    fn load(&self, device: &DeviceId) -> Result<VoterLock, StoreError>;

    /// Persist a lock.
    fn save(&self, lock: &VoterLock) -> Result<(), StoreError>;

    /// The identifier this device registered on first start, if any.
    fn device_id(&self) -> Result<Option<DeviceId>, StoreError>;

    /// Remember this device's identifier.
    fn set_device_id(&self, device: &DeviceId) -> Result<(), StoreError>;
}
