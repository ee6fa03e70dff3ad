//! LMDB implementation of VoterLockStore.

use std::path::Path;

use clipvote_store::{StoreError, VoterLockStore};
use clipvote_types::{DeviceId, Round, VoterLock};
use tracing::debug;

use crate::environment::DEFAULT_MAP_SIZE;
use crate::{LmdbEnvironment, LmdbError};

const DEVICE_ID_KEY: &str = "device_id";

pub struct LmdbVoterLockStore {
    env: LmdbEnvironment,
}

impl LmdbVoterLockStore {
    pub fn new(env: LmdbEnvironment) -> Self {
        Self { env }
    }

    /// Open (or create) a lock store in `dir` with the default map size.
    pub fn open(dir: &Path) -> Result<Self, LmdbError> {
        Ok(Self::new(LmdbEnvironment::open(dir, DEFAULT_MAP_SIZE)?))
    }
}

impl VoterLockStore for LmdbVoterLockStore {
    fn load(&self, device: &DeviceId) -> Result<VoterLock, StoreError> {
        let rtxn = self.env.env.read_txn().map_err(LmdbError::from)?;
        let value = self
            .env
            .voter_locks_db
            .get(&rtxn, device.as_str())
            .map_err(LmdbError::from)?;
        let last_voted_round = match value {
            Some(bytes) => bincode::deserialize::<Option<Round>>(bytes).map_err(LmdbError::from)?,
            None => None,
        };
        Ok(VoterLock {
            device: device.clone(),
            last_voted_round,
        })
    }

    fn save(&self, lock: &VoterLock) -> Result<(), StoreError> {
        let bytes = bincode::serialize(&lock.last_voted_round).map_err(LmdbError::from)?;
        let mut wtxn = self.env.env.write_txn().map_err(LmdbError::from)?;
        self.env
            .voter_locks_db
            .put(&mut wtxn, lock.device.as_str(), &bytes)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        debug!(device = %lock.device, round = ?lock.last_voted_round, "voter lock saved");
        Ok(())
    }

    fn device_id(&self) -> Result<Option<DeviceId>, StoreError> {
        let rtxn = self.env.env.read_txn().map_err(LmdbError::from)?;
        let value = self
            .env
            .meta_db
            .get(&rtxn, DEVICE_ID_KEY)
            .map_err(LmdbError::from)?;
        match value {
            Some(bytes) => {
                let raw = std::str::from_utf8(bytes)
                    .map_err(|e| StoreError::Serialization(e.to_string()))?;
                DeviceId::new(raw)
                    .map(Some)
                    .map_err(|e| StoreError::Serialization(e.to_string()))
            }
            None => Ok(None),
        }
    }

    fn set_device_id(&self, device: &DeviceId) -> Result<(), StoreError> {
        let mut wtxn = self.env.env.write_txn().map_err(LmdbError::from)?;
        self.env
            .meta_db
            .put(&mut wtxn, DEVICE_ID_KEY, device.as_str().as_bytes())
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(name: &str) -> DeviceId {
        DeviceId::new(name).unwrap()
    }

    #[test]
    fn unknown_device_gets_fresh_lock() {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = LmdbVoterLockStore::open(dir.path()).expect("open");
        let lock = store.load(&device("alice")).unwrap();
        assert_eq!(lock, VoterLock::fresh(device("alice")));
    }

    #[test]
    fn lock_survives_reopen() {
        let dir = tempfile::tempdir().expect("temp dir");
        {
            let store = LmdbVoterLockStore::open(dir.path()).expect("open");
            let mut lock = store.load(&device("alice")).unwrap();
            lock.record(Round::new(4));
            store.save(&lock).unwrap();
            store.set_device_id(&device("alice")).unwrap();
        }

        let store = LmdbVoterLockStore::open(dir.path()).expect("reopen");
        let lock = store.load(&device("alice")).unwrap();
        assert_eq!(lock.last_voted_round, Some(Round::new(4)));
        assert_eq!(store.device_id().unwrap(), Some(device("alice")));
    }

    #[test]
    fn locks_are_per_device() {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = LmdbVoterLockStore::open(dir.path()).expect("open");
        let mut alice = store.load(&device("alice")).unwrap();
        alice.record(Round::ZERO);
        store.save(&alice).unwrap();

        assert!(store.load(&device("bob")).unwrap().is_eligible(Round::ZERO));
        assert!(!store.load(&device("alice")).unwrap().is_eligible(Round::ZERO));
    }
}
