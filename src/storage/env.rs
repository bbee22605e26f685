//! One open KV environment per database file, and a process-wide pool of
//! them (spec §5). Generalizes `nervusdb-core`'s `DiskHexastore::open`, which
//! opens a fresh `redb::Database` per call site, into an explicitly
//! constructed, reference-counted registry — the spec calls for "a process-
//! wide environment pool... modelled as an explicitly constructed registry
//! passed to façade constructors rather than a hidden singleton."

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use redb::{Database, ReadableDatabase};

use crate::error::Result;
use crate::storage::schema::ALL_TABLES;
use crate::storage::txn::Transaction;

/// A single open database file. Constructed only through `EnvironmentPool`,
/// which is responsible for refcounting and not opening the same file twice.
struct Environment {
    db: Arc<Database>,
}

impl Environment {
    fn open(path: &Path) -> Result<Self> {
        let db = Database::create(path)?;
        {
            let write_txn = db.begin_write()?;
            for table in ALL_TABLES {
                write_txn.open_table(table)?;
            }
            write_txn.commit()?;
        }
        Ok(Environment { db: Arc::new(db) })
    }
}

/// Refcounted registry of open environments, keyed by canonical file path.
/// The last handle to be dropped closes the underlying file.
#[derive(Clone, Default)]
pub struct EnvironmentPool {
    inner: Arc<Mutex<HashMap<PathBuf, Entry>>>,
}

struct Entry {
    env: Arc<Database>,
    refcount: usize,
}

/// A reference to a pooled environment. Drop releases it; when the last
/// handle for a path is dropped, the environment is closed.
pub struct EnvironmentHandle {
    pool: EnvironmentPool,
    path: PathBuf,
    db: Arc<Database>,
}

impl EnvironmentHandle {
    pub fn begin(&self) -> Result<Transaction> {
        Transaction::begin_root(self.db.clone())
    }
}

impl Drop for EnvironmentHandle {
    fn drop(&mut self) {
        let mut inner = self.pool.inner.lock().expect("environment pool poisoned");
        if let Some(entry) = inner.get_mut(&self.path) {
            entry.refcount -= 1;
            if entry.refcount == 0 {
                inner.remove(&self.path);
            }
        }
    }
}

impl EnvironmentPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire a handle to the environment at `path`, opening it if no other
    /// handle in this process currently has it open.
    pub fn acquire<P: AsRef<Path>>(&self, path: P) -> Result<EnvironmentHandle> {
        let path = path.as_ref().to_path_buf();
        let mut inner = self.inner.lock().expect("environment pool poisoned");
        let db = match inner.get_mut(&path) {
            Some(entry) => {
                entry.refcount += 1;
                entry.env.clone()
            }
            None => {
                let env = Environment::open(&path)?;
                let db = env.db;
                inner.insert(
                    path.clone(),
                    Entry {
                        env: db.clone(),
                        refcount: 1,
                    },
                );
                db
            }
        };
        Ok(EnvironmentHandle {
            pool: self.clone(),
            path,
            db,
        })
    }

    pub fn open_count(&self) -> usize {
        self.inner.lock().expect("environment pool poisoned").len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn second_acquire_reuses_open_environment() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("graph.redb");
        let pool = EnvironmentPool::new();

        let a = pool.acquire(&path).unwrap();
        assert_eq!(pool.open_count(), 1);
        let b = pool.acquire(&path).unwrap();
        assert_eq!(pool.open_count(), 1);

        drop(a);
        assert_eq!(pool.open_count(), 1);
        drop(b);
        assert_eq!(pool.open_count(), 0);
    }
}
