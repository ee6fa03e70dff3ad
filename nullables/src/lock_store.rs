//! Nullable lock store: in-memory device locks.

use clipvote_store::{StoreError, VoterLockStore};
use clipvote_types::{DeviceId, Round, VoterLock};
use std::collections::HashMap;
use std::sync::Mutex;

/// An in-memory [`VoterLockStore`] for testing.
#[derive(Default)]
pub struct NullLockStore {
    locks: Mutex<HashMap<DeviceId, Option<Round>>>,
    device: Mutex<Option<DeviceId>>,
    next_save_failure: Mutex<Option<StoreError>>,
}

impl NullLockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of devices with a saved lock.
    pub fn saved_count(&self) -> usize {
        self.locks.lock().unwrap().len()
    }

    /// Fail the next `save` with `error` without writing anything.
    pub fn fail_next_save(&self, error: StoreError) {
        *self.next_save_failure.lock().unwrap() = Some(error);
    }

    /// Forget every lock, like a user clearing browser storage.
    pub fn wipe(&self) {
        self.locks.lock().unwrap().clear();
    }
}

impl VoterLockStore for NullLockStore {
    fn load(&self, device: &DeviceId) -> Result<VoterLock, StoreError> {
        let last_voted_round = self.locks.lock().unwrap().get(device).copied().flatten();
        Ok(VoterLock {
            device: device.clone(),
            last_voted_round,
        })
    }

    fn save(&self, lock: &VoterLock) -> Result<(), StoreError> {
        if let Some(error) = self.next_save_failure.lock().unwrap().take() {
            return Err(error);
        }
        self.locks
            .lock()
            .unwrap()
            .insert(lock.device.clone(), lock.last_voted_round);
        Ok(())
    }

    fn device_id(&self) -> Result<Option<DeviceId>, StoreError> {
        Ok(self.device.lock().unwrap().clone())
    }

    fn set_device_id(&self, device: &DeviceId) -> Result<(), StoreError> {
        *self.device.lock().unwrap() = Some(device.clone());
        Ok(())
    }
}
