//! A bit-packed, page-oriented graph store layered on a transactional
//! key/value engine: vertex and edge membership, iteration, and feature
//! attribution over ordered keys, nested transactions, and durable commit.
//!
//! Three subsystems compose bottom-up: [`bitmap`] (packed bit arrays over a
//! fixed byte buffer), [`paged_list`] (an append-only linked list of
//! fixed-size pages keyed in [`storage`]), and [`graph`] (a vertex set and
//! square adjacency matrix built from paged lists, plus keyed feature
//! attachments). See `DESIGN.md` for how each module is grounded.

pub mod adjacency;
pub mod bitmap;
pub mod error;
pub mod feature_store;
pub mod graph;
pub mod keys;
pub mod paged_list;
pub mod storage;
pub mod vertex_set;

pub use error::{Error, Result};
pub use graph::{Graph, GraphDb, GraphDbOptions, SizeMode};
pub use storage::{EnvironmentHandle, EnvironmentPool, Transaction};

/// Bytes per fixed-size page (spec GLOSSARY: "PAGE_SIZE"). Changing this is
/// ABI-breaking — it is baked into every on-disk page and directory entry.
pub const PAGE_SIZE: usize = 256;
