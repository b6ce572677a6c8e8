//! LMDB environment setup.

use std::path::Path;
use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};

use crate::{LmdbDocumentStore, LmdbError, LmdbMetaStore, LmdbVerificationStore};

/// Named databases inside the environment.
const DOCUMENTS_DB: &str = "documents";
const VERIFICATIONS_DB: &str = "verifications";
const REQUESTER_INDEX_DB: &str = "verifications_by_requester";
const META_DB: &str = "meta";

/// Wraps the LMDB environment and all database handles.
///
/// Constructed once at process start; store handles returned by the
/// `*_store()` accessors share the environment and are cheap to create.
pub struct LmdbEnvironment {
    env: Arc<Env>,
    documents_db: Database<Bytes, Bytes>,
    verifications_db: Database<Bytes, Bytes>,
    requester_index_db: Database<Bytes, Bytes>,
    meta_db: Database<Bytes, Bytes>,
}

impl LmdbEnvironment {
    /// Upper bound on named databases; leaves room for future indexes.
    pub const MAX_DBS: u32 = 8;

    /// Open or create an LMDB environment at the given directory.
    pub fn open(path: &Path, map_size: usize) -> Result<Self, LmdbError> {
        std::fs::create_dir_all(path)?;

        // SAFETY: the environment is opened once per process for a given
        // directory, and the directory is not modified by other programs.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(Self::MAX_DBS)
                .open(path)?
        };

        let mut wtxn = env.write_txn()?;
        let documents_db = env.create_database(&mut wtxn, Some(DOCUMENTS_DB))?;
        let verifications_db = env.create_database(&mut wtxn, Some(VERIFICATIONS_DB))?;
        let requester_index_db = env.create_database(&mut wtxn, Some(REQUESTER_INDEX_DB))?;
        let meta_db = env.create_database(&mut wtxn, Some(META_DB))?;
        wtxn.commit()?;

        tracing::info!(path = %path.display(), map_size, "LMDB environment opened");

        Ok(Self {
            env: Arc::new(env),
            documents_db,
            verifications_db,
            requester_index_db,
            meta_db,
        })
    }

    pub fn document_store(&self) -> LmdbDocumentStore {
        LmdbDocumentStore {
            env: Arc::clone(&self.env),
            documents_db: self.documents_db,
        }
    }

    pub fn verification_store(&self) -> LmdbVerificationStore {
        LmdbVerificationStore {
            env: Arc::clone(&self.env),
            verifications_db: self.verifications_db,
            requester_index_db: self.requester_index_db,
        }
    }

    pub fn meta_store(&self) -> LmdbMetaStore {
        LmdbMetaStore {
            env: Arc::clone(&self.env),
            meta_db: self.meta_db,
        }
    }

    /// Flush all committed transactions to disk.
    pub fn force_sync(&self) -> Result<(), LmdbError> {
        self.env.force_sync()?;
        Ok(())
    }
}
