//! Feature store: opaque binary blobs attached to vertices and edges, plus a
//! content-addressed reverse lookup (spec §4.6).
//!
//! The reverse key is the value's bytes themselves, used directly as a key
//! into the `_H` table (`spec.md` §9 open question (b), resolved in
//! `SPEC_FULL.md` §C — no hash function is introduced). On write, the
//! previous reverse entry for whatever value used to live at the forward key
//! is removed, so a stale blob never survives as a dangling reverse pointer.

use crate::error::Result;
use crate::keys;
use crate::storage::schema;
use crate::storage::txn::Transaction;

pub struct FeatureStore<'a> {
    txn: &'a Transaction,
}

impl<'a> FeatureStore<'a> {
    pub fn new(txn: &'a Transaction) -> Self {
        FeatureStore { txn }
    }

    pub fn put_vertex_feature(
        &self,
        graph_id: u64,
        vertex_id: u64,
        tag: u32,
        value: &[u8],
    ) -> Result<()> {
        let fwd_key = keys::vertex_feature_key(graph_id, vertex_id, tag);
        if let Some(old_value) = self.txn.get(schema::VERTEX_FEATURE, &fwd_key)? {
            self.txn.delete(schema::VERTEX_FEATURE_H, &old_value);
        }
        self.txn.put(schema::VERTEX_FEATURE, &fwd_key, value);
        self.txn.put(schema::VERTEX_FEATURE_H, value, &fwd_key);
        Ok(())
    }

    pub fn get_vertex_feature(
        &self,
        graph_id: u64,
        vertex_id: u64,
        tag: u32,
    ) -> Result<Option<Vec<u8>>> {
        self.txn
            .get(schema::VERTEX_FEATURE, &keys::vertex_feature_key(graph_id, vertex_id, tag))
    }

    /// Invoke `cb(graph_id, vertex_id, tag)` for the forward key whose value
    /// hashes to `hash` (i.e. equals it, under this crate's reverse-key
    /// scheme), if any.
    pub fn visit_vertex_feature<F: FnMut(u64, u64, u32)>(
        &self,
        hash: &[u8],
        mut cb: F,
    ) -> Result<()> {
        if let Some(fwd) = self.txn.get(schema::VERTEX_FEATURE_H, hash)? {
            if fwd.len() != 20 {
                return Err(crate::error::Error::Corrupt(
                    "vertex feature reverse entry is not a 20-byte forward key",
                ));
            }
            let (g, v, t) = keys::parse_vertex_feature_key(&fwd);
            cb(g, v, t);
        }
        Ok(())
    }

    pub fn put_edge_feature(
        &self,
        graph_id: u64,
        src: u64,
        dst: u64,
        tag: u32,
        value: &[u8],
    ) -> Result<()> {
        let fwd_key = keys::edge_feature_key(graph_id, src, dst, tag);
        if let Some(old_value) = self.txn.get(schema::EDGE_FEATURE, &fwd_key)? {
            self.txn.delete(schema::EDGE_FEATURE_H, &old_value);
        }
        self.txn.put(schema::EDGE_FEATURE, &fwd_key, value);
        self.txn.put(schema::EDGE_FEATURE_H, value, &fwd_key);
        Ok(())
    }

    pub fn get_edge_feature(
        &self,
        graph_id: u64,
        src: u64,
        dst: u64,
        tag: u32,
    ) -> Result<Option<Vec<u8>>> {
        self.txn
            .get(schema::EDGE_FEATURE, &keys::edge_feature_key(graph_id, src, dst, tag))
    }

    pub fn visit_edge_feature<F: FnMut(u64, u64, u64, u32)>(
        &self,
        hash: &[u8],
        mut cb: F,
    ) -> Result<()> {
        if let Some(fwd) = self.txn.get(schema::EDGE_FEATURE_H, hash)? {
            if fwd.len() != 28 {
                return Err(crate::error::Error::Corrupt(
                    "edge feature reverse entry is not a 28-byte forward key",
                ));
            }
            let (g, s, d, t) = keys::parse_edge_feature_key(&fwd);
            cb(g, s, d, t);
        }
        Ok(())
    }

    /// Delete every vertex and edge feature (forward and reverse) attached
    /// to `graph_id`.
    pub fn destroy_graph_features(&self, graph_id: u64) -> Result<()> {
        self.delete_prefix(schema::VERTEX_FEATURE, schema::VERTEX_FEATURE_H, graph_id, 12)?;
        self.delete_prefix(schema::EDGE_FEATURE, schema::EDGE_FEATURE_H, graph_id, 20)?;
        Ok(())
    }

    fn delete_prefix(
        &self,
        fwd_table: redb::TableDefinition<&[u8], &[u8]>,
        rev_table: redb::TableDefinition<&[u8], &[u8]>,
        graph_id: u64,
        suffix_len: usize,
    ) -> Result<()> {
        let mut start = graph_id.to_be_bytes().to_vec();
        start.extend(std::iter::repeat(0u8).take(suffix_len));
        let mut end = graph_id.to_be_bytes().to_vec();
        end.extend(std::iter::repeat(0xFFu8).take(suffix_len));

        let entries: Vec<(Vec<u8>, Vec<u8>)> = self.txn.cursor(fwd_table, start, end)?.collect();
        for (key, value) in entries {
            self.txn.delete(rev_table, &value);
            self.txn.delete(fwd_table, &key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::env::EnvironmentPool;
    use tempfile::tempdir;

    fn fixture() -> (tempfile::TempDir, EnvironmentPool) {
        (tempdir().unwrap(), EnvironmentPool::new())
    }

    #[test]
    fn vertex_feature_roundtrip_and_reverse_lookup() {
        let (dir, pool) = fixture();
        let env = pool.acquire(dir.path().join("db.redb")).unwrap();
        let txn = env.begin().unwrap();
        let fs = FeatureStore::new(&txn);

        fs.put_vertex_feature(0xACE, 42, 7, b"hello").unwrap();
        assert_eq!(
            fs.get_vertex_feature(0xACE, 42, 7).unwrap(),
            Some(b"hello".to_vec())
        );

        let mut seen = None;
        fs.visit_vertex_feature(b"hello", |g, v, t| seen = Some((g, v, t)))
            .unwrap();
        assert_eq!(seen, Some((0xACE, 42, 7)));
    }

    #[test]
    fn overwriting_a_value_drops_the_stale_reverse_entry() {
        let (dir, pool) = fixture();
        let env = pool.acquire(dir.path().join("db.redb")).unwrap();
        let txn = env.begin().unwrap();
        let fs = FeatureStore::new(&txn);

        fs.put_vertex_feature(0xACE, 1, 0, b"old").unwrap();
        fs.put_vertex_feature(0xACE, 1, 0, b"new").unwrap();

        let mut seen = None;
        fs.visit_vertex_feature(b"old", |g, v, t| seen = Some((g, v, t)))
            .unwrap();
        assert_eq!(seen, None);

        fs.visit_vertex_feature(b"new", |g, v, t| seen = Some((g, v, t)))
            .unwrap();
        assert_eq!(seen, Some((0xACE, 1, 0)));
    }

    #[test]
    fn edge_feature_roundtrip() {
        let (dir, pool) = fixture();
        let env = pool.acquire(dir.path().join("db.redb")).unwrap();
        let txn = env.begin().unwrap();
        let fs = FeatureStore::new(&txn);

        fs.put_edge_feature(0xACE, 1, 2, 9, b"weight").unwrap();
        assert_eq!(
            fs.get_edge_feature(0xACE, 1, 2, 9).unwrap(),
            Some(b"weight".to_vec())
        );

        let mut seen = None;
        fs.visit_edge_feature(b"weight", |g, s, d, t| seen = Some((g, s, d, t)))
            .unwrap();
        assert_eq!(seen, Some((0xACE, 1, 2, 9)));
    }
}
