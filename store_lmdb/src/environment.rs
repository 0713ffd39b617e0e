//! LMDB environment setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};

use crate::{LmdbError, LmdbTelemetryStore};

/// Default memory map size (1 GiB).
pub const DEFAULT_MAP_SIZE: usize = 1 << 30;

const MAX_DBS: u32 = 4;
const READINGS_DB: &str = "readings";

/// Wraps the LMDB environment and all database handles.
pub struct LmdbEnvironment {
    env: Arc<Env>,
    readings_db: Database<Bytes, Bytes>,
    path: PathBuf,
}

impl LmdbEnvironment {
    /// Open or create an LMDB environment at the given directory.
    pub fn open(path: &Path, map_size: usize) -> Result<Self, LmdbError> {
        std::fs::create_dir_all(path)?;
        // SAFETY: the environment is opened once per directory for the
        // lifetime of the process.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(MAX_DBS)
                .open(path)?
        };
        let mut wtxn = env.write_txn()?;
        let readings_db: Database<Bytes, Bytes> =
            env.create_database(&mut wtxn, Some(READINGS_DB))?;
        wtxn.commit()?;
        tracing::debug!(path = %path.display(), "opened LMDB environment");
        Ok(Self {
            env: Arc::new(env),
            readings_db,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn telemetry_store(&self) -> LmdbTelemetryStore {
        LmdbTelemetryStore {
            env: Arc::clone(&self.env),
            readings_db: self.readings_db,
        }
    }
}
