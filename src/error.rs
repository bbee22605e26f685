//! Error taxonomy for the graph core (spec §7).
//!
//! Environment-full, write conflict, and aborted-transaction conditions are
//! not given their own variants: `redb` is single-writer, has no LMDB-style
//! write-write conflict detection, and reports out-of-space through its own
//! error types, so these surface through the `#[from]` wraps below unmasked
//! rather than through a variant that would never be constructed.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A vertex/edge/bit index fell outside the current capacity of a bitmap,
    /// vertex set, or adjacency matrix. Mutations treat this as fatal; queries
    /// are expected to map it to `false` at the call site instead of propagating it.
    #[error("index {index} out of range (capacity {capacity})")]
    OutOfRange { index: u64, capacity: u64 },

    /// A directory entry or page did not decode to the expected shape: a
    /// descriptor that isn't 16 bytes, a page that isn't `PAGE_SIZE` bytes, or a
    /// descriptor pointing at a page that does not exist.
    #[error("corrupt storage: {0}")]
    Corrupt(&'static str),

    /// `graph_id == 0` is reserved and may not be used to create a graph.
    #[error("graph id 0 is reserved")]
    InvalidGraphId,

    #[error("database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn out_of_range(index: u64, capacity: u64) -> Self {
        Error::OutOfRange { index, capacity }
    }

    pub fn is_out_of_range(&self) -> bool {
        matches!(self, Error::OutOfRange { .. })
    }
}
