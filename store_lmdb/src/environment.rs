//! LMDB environment setup.

use std::path::Path;

use heed::types::{Bytes, Str};
use heed::{Database, Env, EnvOpenOptions};
use tracing::info;

use crate::LmdbError;

/// Default map size: locks are tiny, 16 MiB is plenty.
pub const DEFAULT_MAP_SIZE: usize = 16 * 1024 * 1024;

const MAX_DBS: u32 = 4;
const VOTER_LOCKS_DB: &str = "voter_locks";
const META_DB: &str = "meta";

/// Wraps the LMDB environment and all database handles.
#[derive(Clone)]
pub struct LmdbEnvironment {
    pub(crate) env: Env,
    pub(crate) voter_locks_db: Database<Str, Bytes>,
    pub(crate) meta_db: Database<Str, Bytes>,
}

impl LmdbEnvironment {
    /// Open or create an LMDB environment at the given directory.
    pub fn open(path: &Path, map_size: usize) -> Result<Self, LmdbError> {
        std::fs::create_dir_all(path)?;

        // SAFETY: the environment is opened once per process for this
        // directory and never concurrently re-opened with other flags.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(MAX_DBS)
                .open(path)?
        };

        let mut wtxn = env.write_txn()?;
        let voter_locks_db = env.create_database(&mut wtxn, Some(VOTER_LOCKS_DB))?;
        let meta_db = env.create_database(&mut wtxn, Some(META_DB))?;
        wtxn.commit()?;

        info!("opened lock store at {}", path.display());
        Ok(Self {
            env,
            voter_locks_db,
            meta_db,
        })
    }
}
