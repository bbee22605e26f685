//! The KV store façade (spec §4.2): named sub-databases, nested child
//! transactions, ordered cursors, over a `redb` backing file.

pub(crate) mod disk;
pub mod env;
pub mod schema;
pub mod txn;

pub use env::{EnvironmentHandle, EnvironmentPool};
pub use txn::{Cursor, Transaction};
