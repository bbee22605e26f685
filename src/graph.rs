//! Graph façade (spec §4.7): composes the vertex set, adjacency matrix and
//! feature store under one `graph_id`, and owns the environment/options a
//! caller needs to open a database file.

use std::path::{Path, PathBuf};

use crate::PAGE_SIZE;
use crate::adjacency::{AdjacencyMatrix, EdgeIter};
use crate::error::{Error, Result};
use crate::feature_store::FeatureStore;
use crate::paged_list::BitScanIter;
use crate::storage::env::{EnvironmentHandle, EnvironmentPool};
use crate::storage::txn::Transaction;
use crate::vertex_set::{VertexOutcome, VertexSet};

/// Counting mode for `Graph::size` (spec §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeMode {
    Directed,
    Undirected,
}

/// Options used to open a `GraphDb` (spec `SPEC_FULL.md` §B "Configuration").
/// `page_size` exists for documentation/validation purposes only: this crate
/// hard-codes `PAGE_SIZE` (changing it is ABI-breaking, per the GLOSSARY),
/// so `open` rejects any other value rather than silently reinterpreting an
/// existing file under a different page size.
#[derive(Debug, Clone)]
pub struct GraphDbOptions {
    path: PathBuf,
    page_size: usize,
}

impl GraphDbOptions {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        GraphDbOptions {
            path: path.as_ref().to_path_buf(),
            page_size: PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }
}

/// One open backing file, acquired from a caller-supplied (or crate-default)
/// environment pool (spec §5 "process-wide environment pool... an explicitly
/// constructed registry").
pub struct GraphDb {
    _pool: EnvironmentPool,
    env: EnvironmentHandle,
}

impl GraphDb {
    /// Open (creating if absent) the database file named by `options`,
    /// using a fresh, process-local environment pool.
    pub fn open(options: GraphDbOptions) -> Result<Self> {
        Self::open_with_pool(EnvironmentPool::new(), options)
    }

    /// Open against an explicitly supplied pool, so multiple `GraphDb`
    /// handles to the same file in one process share a single open
    /// environment.
    pub fn open_with_pool(pool: EnvironmentPool, options: GraphDbOptions) -> Result<Self> {
        if options.page_size != PAGE_SIZE {
            return Err(Error::Corrupt("page size does not match this build's PAGE_SIZE"));
        }
        let env = pool.acquire(&options.path)?;
        Ok(GraphDb { _pool: pool, env })
    }

    /// Begin a new top-level transaction.
    pub fn begin(&self) -> Result<Transaction> {
        self.env.begin()
    }
}

/// A graph identified by `graph_id`, bound to one transaction. Every call
/// re-derives whatever state it needs from `txn`; nothing here is cached
/// across calls (spec §9 "Cyclic lifetimes").
pub struct Graph<'a> {
    txn: &'a Transaction,
    graph_id: u64,
}

fn fatal<T>(result: Result<T>) -> T {
    result.unwrap_or_else(|e| panic!("{e}"))
}

impl<'a> Graph<'a> {
    /// Idempotent: if `graph_id`'s directory entry already exists, returns a
    /// handle to the existing graph; otherwise materialises its initial
    /// (one-page) vertex set and adjacency rows.
    pub fn make_graph_db(txn: &'a Transaction, graph_id: u64) -> Result<Graph<'a>> {
        if graph_id == 0 {
            return Err(Error::InvalidGraphId);
        }
        let vs = VertexSet::new(txn, graph_id);
        if vs.directory()?.is_none() {
            vs.create()?;
            let am = AdjacencyMatrix::new(txn, graph_id);
            am.create_initial_rows(PAGE_SIZE as u64 * 8)?;
        }
        Ok(Graph { txn, graph_id })
    }

    /// Open an existing graph, or `None` if `graph_id` has never been
    /// created.
    pub fn open(txn: &'a Transaction, graph_id: u64) -> Result<Option<Graph<'a>>> {
        let vs = VertexSet::new(txn, graph_id);
        if vs.directory()?.is_none() {
            return Ok(None);
        }
        Ok(Some(Graph { txn, graph_id }))
    }

    fn vertex_set(&self) -> VertexSet<'a> {
        VertexSet::new(self.txn, self.graph_id)
    }

    fn adjacency(&self) -> AdjacencyMatrix<'a> {
        AdjacencyMatrix::new(self.txn, self.graph_id)
    }

    fn feature_store(&self) -> FeatureStore<'a> {
        FeatureStore::new(self.txn)
    }

    /// Add or remove vertex `i`. Fatal (panics) on `Error::OutOfRange` per
    /// `spec.md` §7; use `try_vertex` to handle that explicitly.
    pub fn vertex(&self, i: u64, present: bool) -> u64 {
        fatal(self.try_vertex(i, present))
    }

    pub fn try_vertex(&self, i: u64, present: bool) -> Result<u64> {
        let vs = self.vertex_set();
        match vs.vertex(i, present)? {
            VertexOutcome::Set(index) => {
                if !present {
                    let capacity = vs.capacity()?;
                    let am = self.adjacency();
                    am.clear_row(index)?;
                    am.clear_column(capacity, index)?;
                }
                Ok(index)
            }
            VertexOutcome::Full => {
                let pages_before = vs.pages_allocated()?;
                let old_capacity = vs.capacity()?;
                let first_new_index = vs.expand()?;
                self.adjacency().expand(old_capacity, pages_before)?;
                // The newly appended page is all zero, so this bit is free.
                match vs.vertex(first_new_index, true)? {
                    VertexOutcome::Set(index) => Ok(index),
                    VertexOutcome::Full => {
                        unreachable!("a freshly expanded page cannot report Full")
                    }
                }
            }
        }
    }

    pub fn is_vertex(&self, i: u64) -> bool {
        fatal(self.vertex_set().is_vertex(i))
    }

    /// Set or clear directed edge `(src, dst)`. Fatal on `Error::OutOfRange`.
    pub fn edge(&self, src: u64, dst: u64, present: bool) {
        fatal(self.try_edge(src, dst, present))
    }

    pub fn try_edge(&self, src: u64, dst: u64, present: bool) -> Result<()> {
        let capacity = self.vertex_set().capacity()?;
        self.adjacency().edge(capacity, src, dst, present)
    }

    pub fn is_edge(&self, src: u64, dst: u64) -> bool {
        fatal(self.try_is_edge(src, dst))
    }

    fn try_is_edge(&self, src: u64, dst: u64) -> Result<bool> {
        let capacity = self.vertex_set().capacity()?;
        self.adjacency().is_edge(capacity, src, dst)
    }

    /// Count of set bits across the vertex set.
    pub fn order(&self) -> u64 {
        fatal(self.vertex_set().popcount())
    }

    /// Edge count under `mode` (spec §4.7).
    pub fn size(&self, mode: SizeMode) -> u64 {
        fatal(self.try_size(mode))
    }

    fn try_size(&self, mode: SizeMode) -> Result<u64> {
        let capacity = self.vertex_set().capacity()?;
        let am = self.adjacency();
        let total = am.total_popcount(capacity)?;
        match mode {
            SizeMode::Directed => Ok(total),
            SizeMode::Undirected => {
                let diagonal = am.diagonal_popcount(capacity)?;
                Ok((total + diagonal) / 2)
            }
        }
    }

    /// Lazy ascending scan of set vertex indices in `[start, end)` (`end ==
    /// 0` means "to capacity"), stepping by `stride` (minimum 1).
    pub fn vertices(&self, start: u64, end: u64, stride: u64) -> BitScanIter<'a> {
        fatal(self.vertex_set().vertices(start, end, stride))
    }

    pub fn visit_vertices<F: FnMut(u64)>(&self, start: u64, end: u64, stride: u64, mut cb: F) {
        for v in self.vertices(start, end, stride) {
            cb(v);
        }
    }

    /// Lazy ascending scan of `(src, dst)` edges; `[start, end)` (`end == 0`
    /// means "to capacity") bounds `src`, stepping by `stride`.
    pub fn edges(&self, start: u64, end: u64, stride: u64) -> EdgeIter<'a> {
        let capacity = fatal(self.vertex_set().capacity());
        self.adjacency().edges(capacity, start, end, stride)
    }

    pub fn visit_edges<F: FnMut(u64, u64)>(&self, start: u64, end: u64, stride: u64, mut cb: F) {
        for (s, d) in self.edges(start, end, stride) {
            cb(s, d);
        }
    }

    pub fn put_vertex_feature(&self, vertex_id: u64, tag: u32, value: &[u8]) -> Result<()> {
        self.feature_store()
            .put_vertex_feature(self.graph_id, vertex_id, tag, value)
    }

    pub fn get_vertex_feature(&self, vertex_id: u64, tag: u32) -> Result<Option<Vec<u8>>> {
        self.feature_store().get_vertex_feature(self.graph_id, vertex_id, tag)
    }

    pub fn visit_vertex_feature<F: FnMut(u64, u32)>(&self, hash: &[u8], mut cb: F) -> Result<()> {
        self.feature_store().visit_vertex_feature(hash, |_, v, t| cb(v, t))
    }

    pub fn put_edge_feature(&self, src: u64, dst: u64, tag: u32, value: &[u8]) -> Result<()> {
        self.feature_store()
            .put_edge_feature(self.graph_id, src, dst, tag, value)
    }

    pub fn get_edge_feature(&self, src: u64, dst: u64, tag: u32) -> Result<Option<Vec<u8>>> {
        self.feature_store().get_edge_feature(self.graph_id, src, dst, tag)
    }

    pub fn visit_edge_feature<F: FnMut(u64, u64, u32)>(
        &self,
        hash: &[u8],
        mut cb: F,
    ) -> Result<()> {
        self.feature_store()
            .visit_edge_feature(hash, |_, s, d, t| cb(s, d, t))
    }

    /// Destroy this graph: every row page, every directory entry, every
    /// feature attached to it, and its vertex-set metadata (spec §3
    /// "Lifecycle").
    pub fn destroy(self) -> Result<()> {
        let capacity = self.vertex_set().capacity()?;
        self.adjacency().destroy(capacity)?;
        self.vertex_set().destroy()?;
        self.feature_store().destroy_graph_features(self.graph_id)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn open_db() -> (tempfile::TempDir, GraphDb) {
        let dir = tempdir().unwrap();
        let db = GraphDb::open(GraphDbOptions::new(dir.path().join("graph.redb"))).unwrap();
        (dir, db)
    }

    #[test]
    fn graph_id_zero_is_rejected() {
        let (_dir, db) = open_db();
        let txn = db.begin().unwrap();
        assert!(matches!(
            Graph::make_graph_db(&txn, 0),
            Err(Error::InvalidGraphId)
        ));
    }

    #[test]
    fn make_graph_db_is_idempotent() {
        let (_dir, db) = open_db();
        let txn = db.begin().unwrap();
        let g = Graph::make_graph_db(&txn, 0xACE).unwrap();
        g.vertex(0, true);
        drop(g);

        let g2 = Graph::make_graph_db(&txn, 0xACE).unwrap();
        assert!(g2.is_vertex(0));
    }

    #[test]
    fn end_to_end_scenario_from_spec() {
        let (_dir, db) = open_db();
        let txn = db.begin().unwrap();
        let g = Graph::make_graph_db(&txn, 0xACE).unwrap();

        let bits_per_page = PAGE_SIZE as u64 * 8;
        g.vertex(0, true);
        g.vertex(bits_per_page - 1, true);
        assert!(g.is_vertex(0));
        assert!(g.is_vertex(bits_per_page - 1));

        for i in 0..bits_per_page {
            g.vertex(i, true);
        }
        let expanded = g.vertex(0, true);
        assert!(expanded >= bits_per_page);
        assert_eq!(g.order(), bits_per_page + 1);

        g.vertex(1024, false);
        assert!(g.is_vertex(1023));
        assert!(!g.is_vertex(1024));
        assert!(g.is_vertex(1025));

        txn.commit().unwrap();

        let txn2 = db.begin().unwrap();
        let g2 = Graph::open(&txn2, 0xACE).unwrap().unwrap();
        assert_eq!(g2.order(), bits_per_page);
    }

    #[test]
    fn directed_vs_undirected_size() {
        let (_dir, db) = open_db();
        let txn = db.begin().unwrap();
        let g = Graph::make_graph_db(&txn, 1).unwrap();

        g.vertex(1, true);
        g.vertex(2, true);
        g.edge(1, 2, true);
        g.edge(2, 1, true);

        assert_eq!(g.size(SizeMode::Directed), 2);
        assert_eq!(g.size(SizeMode::Undirected), 1);
    }

    #[test]
    fn removing_a_vertex_clears_its_incident_edges() {
        let (_dir, db) = open_db();
        let txn = db.begin().unwrap();
        let g = Graph::make_graph_db(&txn, 1).unwrap();

        g.vertex(1, true);
        g.vertex(2, true);
        g.vertex(3, true);
        g.edge(1, 2, true);
        g.edge(2, 3, true);
        g.edge(3, 3, true);

        g.vertex(2, false);

        assert!(!g.is_edge(1, 2));
        assert!(!g.is_edge(2, 3));
        assert!(g.is_edge(3, 3));
    }

    #[test]
    fn feature_roundtrip_through_graph_facade() {
        let (_dir, db) = open_db();
        let txn = db.begin().unwrap();
        let g = Graph::make_graph_db(&txn, 1).unwrap();

        g.vertex(5, true);
        g.put_vertex_feature(5, 1, b"label").unwrap();

        let mut seen = None;
        g.visit_vertex_feature(b"label", |v, t| seen = Some((v, t))).unwrap();
        assert_eq!(seen, Some((5, 1)));
    }

    #[test]
    fn nested_child_transaction_folds_into_parent_on_commit() {
        let (_dir, db) = open_db();
        let parent = db.begin().unwrap();
        let g = Graph::make_graph_db(&parent, 1).unwrap();
        g.vertex(1, true);

        let child = parent.begin_child();
        let gc = Graph::open(&child, 1).unwrap().unwrap();
        gc.vertex(2, true);
        child.commit().unwrap();

        let g_after = Graph::open(&parent, 1).unwrap().unwrap();
        assert!(g_after.is_vertex(2));
        parent.commit().unwrap();
    }

    #[test]
    fn aborted_child_transaction_is_discarded() {
        let (_dir, db) = open_db();
        let parent = db.begin().unwrap();
        let g = Graph::make_graph_db(&parent, 1).unwrap();
        g.vertex(1, true);

        let child = parent.begin_child();
        let gc = Graph::open(&child, 1).unwrap().unwrap();
        gc.vertex(2, true);
        child.abort();

        let g_after = Graph::open(&parent, 1).unwrap().unwrap();
        assert!(!g_after.is_vertex(2));
    }

    #[test]
    fn destroy_removes_every_directory_entry() {
        let (_dir, db) = open_db();
        let txn = db.begin().unwrap();
        let g = Graph::make_graph_db(&txn, 1).unwrap();
        g.vertex(1, true);
        g.edge(1, 1, true);
        g.put_vertex_feature(1, 0, b"x").unwrap();

        g.destroy().unwrap();

        assert!(Graph::open(&txn, 1).unwrap().is_none());
    }
}
