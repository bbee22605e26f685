//! Vertex set: a bitmap over one paged list (spec §4.4).
//!
//! No state is cached across calls — every operation re-reads the directory
//! entry and the page(s) it needs from the transaction, mutates, and writes
//! back before returning (per `spec.md` §9 "Cyclic lifetimes": the
//! transaction owns everything, nothing here keeps a long-lived borrow).

use crate::PAGE_SIZE;
use crate::bitmap;
use crate::error::{Error, Result};
use crate::keys;
use crate::paged_list::{self, BitScanIter};
use crate::storage::schema;
use crate::storage::txn::Transaction;

/// Outcome of a present-side `vertex()` call: either the bit was set at
/// `Set(index)`, or every bit in the set's current capacity is already
/// taken and the caller must expand before retrying.
pub enum VertexOutcome {
    Set(u64),
    Full,
}

pub struct VertexSet<'a> {
    txn: &'a Transaction,
    graph_id: u64,
}

impl<'a> VertexSet<'a> {
    pub fn new(txn: &'a Transaction, graph_id: u64) -> Self {
        VertexSet { txn, graph_id }
    }

    /// `(head, tail_max)` of the set's paged list, or `None` if the graph's
    /// vertex set hasn't been created yet.
    pub(crate) fn directory(&self) -> Result<Option<(u64, u64)>> {
        match self
            .txn
            .get(schema::VERTEX_SET, &keys::vertex_set_key(self.graph_id))?
        {
            Some(bytes) if bytes.len() == 16 => Ok(Some(keys::parse_page_key(&bytes))),
            Some(_) => Err(Error::Corrupt("vertex set directory entry is not 16 bytes")),
            None => Ok(None),
        }
    }

    fn set_directory(&self, head: u64, tail_max: u64) {
        self.txn.put(
            schema::VERTEX_SET,
            &keys::vertex_set_key(self.graph_id),
            &keys::page_key(head, tail_max),
        );
    }

    /// Idempotent: materialises the first (zero-filled) page and directory
    /// entry if none exists yet; a no-op if the vertex set already exists.
    pub fn create(&self) -> Result<()> {
        if self.directory()?.is_some() {
            return Ok(());
        }
        let head = paged_list::allocate_list(self.txn, schema::VERTEX_SET_L, PAGE_SIZE)?;
        self.set_directory(head, 0);
        Ok(())
    }

    pub fn pages_allocated(&self) -> Result<u64> {
        Ok(self.directory()?.map(|(_, tail_max)| tail_max + 1).unwrap_or(0))
    }

    pub fn capacity(&self) -> Result<u64> {
        Ok(self.pages_allocated()? * PAGE_SIZE as u64 * 8)
    }

    /// `false` outside current capacity (a query, never fatal).
    pub fn is_vertex(&self, i: u64) -> Result<bool> {
        let capacity = self.capacity()?;
        if i >= capacity {
            return Ok(false);
        }
        let (head, _) = self.directory()?.expect("capacity > 0 implies a directory entry");
        let bpp = PAGE_SIZE as u64 * 8;
        let page = paged_list::read_page(self.txn, schema::VERTEX_SET_L, head, i / bpp, PAGE_SIZE)?;
        bitmap::get(&page, i % bpp)
    }

    fn set_bit(&self, i: u64, value: bool) -> Result<()> {
        let (head, _) = self
            .directory()?
            .ok_or(Error::Corrupt("vertex set directory missing"))?;
        let bpp = PAGE_SIZE as u64 * 8;
        let page_idx = i / bpp;
        let mut page =
            paged_list::read_page(self.txn, schema::VERTEX_SET_L, head, page_idx, PAGE_SIZE)?;
        bitmap::set(&mut page, i % bpp, value)?;
        paged_list::write_page(self.txn, schema::VERTEX_SET_L, head, page_idx, &page);
        Ok(())
    }

    /// First clear bit at or after `from`, wrapping once within capacity.
    fn first_clear_from(&self, from: u64) -> Result<Option<u64>> {
        let capacity = self.capacity()?;
        if capacity == 0 {
            return Ok(None);
        }
        let (head, _) = self.directory()?.expect("capacity > 0 implies a directory entry");
        let bpp = PAGE_SIZE as u64 * 8;
        let mut cached_idx: Option<u64> = None;
        let mut cached_page: Vec<u8> = Vec::new();
        for offset in 0..capacity {
            let i = (from + offset) % capacity;
            let page_idx = i / bpp;
            if cached_idx != Some(page_idx) {
                cached_page =
                    paged_list::read_page(self.txn, schema::VERTEX_SET_L, head, page_idx, PAGE_SIZE)?;
                cached_idx = Some(page_idx);
            }
            if !bitmap::get(&cached_page, i % bpp)? {
                return Ok(Some(i));
            }
        }
        Ok(None)
    }

    /// Add or remove a vertex (spec §4.4). `Err(OutOfRange)` is the fatal
    /// path: `i` is beyond current capacity for either direction. On a
    /// present-side call that finds every bit already taken, returns
    /// `Ok(VertexOutcome::Full)` instead of expanding — expansion must stay
    /// in lockstep with the adjacency matrix, which this module knows
    /// nothing about; `graph::Graph` coordinates that.
    pub fn vertex(&self, i: u64, present: bool) -> Result<VertexOutcome> {
        let capacity = self.capacity()?;
        if i >= capacity {
            return Err(Error::out_of_range(i, capacity));
        }
        if present {
            if !self.is_vertex(i)? {
                self.set_bit(i, true)?;
                return Ok(VertexOutcome::Set(i));
            }
            match self.first_clear_from(i)? {
                Some(found) => {
                    self.set_bit(found, true)?;
                    Ok(VertexOutcome::Set(found))
                }
                None => Ok(VertexOutcome::Full),
            }
        } else {
            self.set_bit(i, false)?;
            Ok(VertexOutcome::Set(i))
        }
    }

    /// Append one zero-filled page, growing capacity by `PAGE_SIZE * 8`
    /// bits. Returns the index of the new page's first bit (always equal to
    /// the capacity just before expansion).
    pub fn expand(&self) -> Result<u64> {
        let (head, tail_max) = self
            .directory()?
            .ok_or(Error::Corrupt("vertex set directory missing"))?;
        let first_new_index = (tail_max + 1) * PAGE_SIZE as u64 * 8;
        let new_tail = tail_max + 1;
        paged_list::write_page(
            self.txn,
            schema::VERTEX_SET_L,
            head,
            new_tail,
            &vec![0u8; PAGE_SIZE],
        );
        self.set_directory(head, new_tail);
        Ok(first_new_index)
    }

    /// Number of set bits across every page (linear scan, spec §4.7 `order`).
    pub fn popcount(&self) -> Result<u64> {
        let Some((head, tail_max)) = self.directory()? else {
            return Ok(0);
        };
        let mut total = 0;
        for tail in 0..=tail_max {
            let page = paged_list::read_page(self.txn, schema::VERTEX_SET_L, head, tail, PAGE_SIZE)?;
            total += bitmap::popcount(&page);
        }
        Ok(total)
    }

    /// Lazy ascending scan of set vertex indices in `[start, end)` (`end ==
    /// 0` means "to capacity"), stepping by `stride` (minimum 1).
    pub fn vertices(&self, start: u64, end: u64, stride: u64) -> Result<BitScanIter<'a>> {
        let capacity = self.capacity()?;
        let head = self.directory()?.map(|(h, _)| h).unwrap_or(0);
        Ok(BitScanIter::new(
            self.txn,
            schema::VERTEX_SET_L,
            head,
            PAGE_SIZE,
            capacity,
            start,
            end,
            stride,
        ))
    }

    /// Delete every page and the directory entry. A no-op if the vertex set
    /// doesn't exist.
    pub fn destroy(&self) -> Result<()> {
        let Some((head, tail_max)) = self.directory()? else {
            return Ok(());
        };
        for tail in 0..=tail_max {
            paged_list::delete_page(self.txn, schema::VERTEX_SET_L, head, tail);
        }
        self.txn
            .delete(schema::VERTEX_SET, &keys::vertex_set_key(self.graph_id));
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
    fn first_add_sets_bit_zero_as_0x80() {
        let (dir, pool) = fixture();
        let env = pool.acquire(dir.path().join("db.redb")).unwrap();
        let txn = env.begin().unwrap();
        let vs = VertexSet::new(&txn, 1);
        vs.create().unwrap();

        match vs.vertex(0, true).unwrap() {
            VertexOutcome::Set(i) => assert_eq!(i, 0),
            VertexOutcome::Full => panic!("fresh set should not be full"),
        }

        let (head, _) = vs.directory().unwrap().unwrap();
        let page =
            paged_list::read_page(&txn, schema::VERTEX_SET_L, head, 0, PAGE_SIZE).unwrap();
        assert_eq!(page[0], 0x80);
    }

    #[test]
    fn re_adding_occupied_bit_finds_next_free_index() {
        let (dir, pool) = fixture();
        let env = pool.acquire(dir.path().join("db.redb")).unwrap();
        let txn = env.begin().unwrap();
        let vs = VertexSet::new(&txn, 1);
        vs.create().unwrap();

        let VertexOutcome::Set(first) = vs.vertex(0, true).unwrap() else {
            panic!()
        };
        let VertexOutcome::Set(second) = vs.vertex(0, true).unwrap() else {
            panic!()
        };
        assert_eq!(first, 0);
        assert_ne!(second, 0);
    }

    #[test]
    fn filling_every_bit_reports_full() {
        let (dir, pool) = fixture();
        let env = pool.acquire(dir.path().join("db.redb")).unwrap();
        let txn = env.begin().unwrap();
        let vs = VertexSet::new(&txn, 1);
        vs.create().unwrap();

        let capacity = vs.capacity().unwrap();
        for i in 0..capacity {
            assert!(matches!(vs.vertex(i, true).unwrap(), VertexOutcome::Set(_)));
        }
        assert!(matches!(vs.vertex(0, true).unwrap(), VertexOutcome::Full));
    }

    #[test]
    fn expand_doubles_capacity_and_returns_old_capacity_as_first_index() {
        let (dir, pool) = fixture();
        let env = pool.acquire(dir.path().join("db.redb")).unwrap();
        let txn = env.begin().unwrap();
        let vs = VertexSet::new(&txn, 1);
        vs.create().unwrap();

        let before = vs.capacity().unwrap();
        let first_new = vs.expand().unwrap();
        assert_eq!(first_new, before);
        assert_eq!(vs.capacity().unwrap(), before * 2);
    }

    #[test]
    fn out_of_range_mutation_is_fatal_kind() {
        let (dir, pool) = fixture();
        let env = pool.acquire(dir.path().join("db.redb")).unwrap();
        let txn = env.begin().unwrap();
        let vs = VertexSet::new(&txn, 1);
        vs.create().unwrap();

        let capacity = vs.capacity().unwrap();
        let err = vs.vertex(capacity, true).unwrap_err();
        assert!(err.is_out_of_range());
    }

    #[test]
    fn out_of_range_query_is_false() {
        let (dir, pool) = fixture();
        let env = pool.acquire(dir.path().join("db.redb")).unwrap();
        let txn = env.begin().unwrap();
        let vs = VertexSet::new(&txn, 1);
        vs.create().unwrap();

        assert!(!vs.is_vertex(vs.capacity().unwrap() + 1).unwrap());
    }
}
