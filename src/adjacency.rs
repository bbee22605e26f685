//! Adjacency matrix: `N` paged lists, one per row, forming a directed square
//! bit matrix (spec §4.5). `N` (the shared side length) always equals the
//! vertex set's capacity; callers pass it in rather than this module trying
//! to infer it, since the two are kept in lockstep by `graph::Graph`.

use crate::PAGE_SIZE;
use crate::bitmap;
use crate::error::{Error, Result};
use crate::keys;
use crate::paged_list::{self, BitScanIter};
use crate::storage::schema;
use crate::storage::txn::Transaction;

pub struct AdjacencyMatrix<'a> {
    txn: &'a Transaction,
    graph_id: u64,
}

impl<'a> AdjacencyMatrix<'a> {
    pub fn new(txn: &'a Transaction, graph_id: u64) -> Self {
        AdjacencyMatrix { txn, graph_id }
    }

    pub(crate) fn row_directory(&self, row: u64) -> Result<Option<(u64, u64)>> {
        match self
            .txn
            .get(schema::ADJACENCY_MATRIX, &keys::adjacency_dir_key(self.graph_id, row))?
        {
            Some(bytes) if bytes.len() == 16 => Ok(Some(keys::parse_page_key(&bytes))),
            Some(_) => Err(Error::Corrupt("adjacency directory entry is not 16 bytes")),
            None => Ok(None),
        }
    }

    fn set_row_directory(&self, row: u64, head: u64, tail_max: u64) {
        self.txn.put(
            schema::ADJACENCY_MATRIX,
            &keys::adjacency_dir_key(self.graph_id, row),
            &keys::page_key(head, tail_max),
        );
    }

    /// Materialise `count` brand-new one-page rows (used when a graph is
    /// first created, with `count == PAGE_SIZE * 8`, matching the vertex
    /// set's initial single page).
    pub fn create_initial_rows(&self, count: u64) -> Result<()> {
        for row in 0..count {
            let head = paged_list::allocate_list(self.txn, schema::ADJACENCY_MATRIX_L, PAGE_SIZE)?;
            self.set_row_directory(row, head, 0);
        }
        Ok(())
    }

    /// `false` outside current capacity (a query, never fatal).
    pub fn is_edge(&self, capacity: u64, src: u64, dst: u64) -> Result<bool> {
        if src >= capacity || dst >= capacity {
            return Ok(false);
        }
        let Some((head, _)) = self.row_directory(src)? else {
            return Ok(false);
        };
        let bpp = PAGE_SIZE as u64 * 8;
        let page =
            paged_list::read_page(self.txn, schema::ADJACENCY_MATRIX_L, head, dst / bpp, PAGE_SIZE)?;
        bitmap::get(&page, dst % bpp)
    }

    /// Set or clear bit `(src, dst)`. `Err(OutOfRange)` (fatal) if either
    /// argument is beyond `capacity`. Directed: independent of `(dst, src)`.
    pub fn edge(&self, capacity: u64, src: u64, dst: u64, present: bool) -> Result<()> {
        if src >= capacity || dst >= capacity {
            return Err(Error::out_of_range(src.max(dst), capacity));
        }
        let (head, _) = self
            .row_directory(src)?
            .ok_or(Error::Corrupt("adjacency row directory missing"))?;
        let bpp = PAGE_SIZE as u64 * 8;
        let page_idx = dst / bpp;
        let mut page =
            paged_list::read_page(self.txn, schema::ADJACENCY_MATRIX_L, head, page_idx, PAGE_SIZE)?;
        bitmap::set(&mut page, dst % bpp, present)?;
        paged_list::write_page(self.txn, schema::ADJACENCY_MATRIX_L, head, page_idx, &page);
        Ok(())
    }

    /// Zero every bit of row `row` (used when its vertex is removed).
    pub fn clear_row(&self, row: u64) -> Result<()> {
        let Some((head, tail_max)) = self.row_directory(row)? else {
            return Ok(());
        };
        let zero = vec![0u8; PAGE_SIZE];
        for tail in 0..=tail_max {
            paged_list::write_page(self.txn, schema::ADJACENCY_MATRIX_L, head, tail, &zero);
        }
        Ok(())
    }

    /// Clear bit `col` in every row `[0, capacity)` (used when its vertex is
    /// removed).
    pub fn clear_column(&self, capacity: u64, col: u64) -> Result<()> {
        for row in 0..capacity {
            self.edge(capacity, row, col, false)?;
        }
        Ok(())
    }

    fn row_popcount(&self, row: u64) -> Result<u64> {
        let Some((head, tail_max)) = self.row_directory(row)? else {
            return Ok(0);
        };
        let mut total = 0;
        for tail in 0..=tail_max {
            let page =
                paged_list::read_page(self.txn, schema::ADJACENCY_MATRIX_L, head, tail, PAGE_SIZE)?;
            total += bitmap::popcount(&page);
        }
        Ok(total)
    }

    /// Total set bits across every row `[0, capacity)` (the directed count).
    pub fn total_popcount(&self, capacity: u64) -> Result<u64> {
        let mut total = 0;
        for row in 0..capacity {
            total += self.row_popcount(row)?;
        }
        Ok(total)
    }

    /// Number of self-loops (`edge(i, i)` set) across `[0, capacity)`.
    pub fn diagonal_popcount(&self, capacity: u64) -> Result<u64> {
        let mut total = 0;
        for i in 0..capacity {
            if self.is_edge(capacity, i, i)? {
                total += 1;
            }
        }
        Ok(total)
    }

    /// Grow every existing row `[0, old_capacity)` by one page, and
    /// materialise `PAGE_SIZE * 8` brand-new rows `[old_capacity,
    /// 2*old_capacity)`, each pre-sized to `pages_before + 1` pages — so
    /// every row, old or new, ends the expansion with the same page count
    /// (spec §4.4 step 2-3, resolved per `SPEC_FULL.md` §C).
    pub fn expand(&self, old_capacity: u64, pages_before: u64) -> Result<()> {
        let zero = vec![0u8; PAGE_SIZE];
        for row in 0..old_capacity {
            let (head, tail_max) = self
                .row_directory(row)?
                .ok_or(Error::Corrupt("adjacency row directory missing"))?;
            let new_tail = tail_max + 1;
            paged_list::write_page(self.txn, schema::ADJACENCY_MATRIX_L, head, new_tail, &zero);
            self.set_row_directory(row, head, new_tail);
        }

        let new_row_count = PAGE_SIZE as u64 * 8;
        for offset in 0..new_row_count {
            let row = old_capacity + offset;
            let head = paged_list::allocate_list(self.txn, schema::ADJACENCY_MATRIX_L, PAGE_SIZE)?;
            for tail in 1..=pages_before {
                paged_list::write_page(self.txn, schema::ADJACENCY_MATRIX_L, head, tail, &zero);
            }
            self.set_row_directory(row, head, pages_before);
        }
        Ok(())
    }

    /// Lazy ascending scan of `(src, dst)` pairs with `is_edge(src, dst)`.
    /// `[start, end)` (`end == 0` means "to capacity") bounds `src`,
    /// stepping by `stride` (minimum 1); every `dst` of a visited row is
    /// yielded.
    pub fn edges(&self, capacity: u64, start: u64, end: u64, stride: u64) -> EdgeIter<'a> {
        let end = if end == 0 { capacity } else { end.min(capacity) };
        EdgeIter {
            txn: self.txn,
            graph_id: self.graph_id,
            capacity,
            end,
            stride: stride.max(1),
            next_src: start,
            current_row: None,
        }
    }

    /// Delete every page of every row `[0, capacity)` and their directory
    /// entries.
    pub fn destroy(&self, capacity: u64) -> Result<()> {
        for row in 0..capacity {
            if let Some((head, tail_max)) = self.row_directory(row)? {
                for tail in 0..=tail_max {
                    paged_list::delete_page(self.txn, schema::ADJACENCY_MATRIX_L, head, tail);
                }
            }
            self.txn.delete(
                schema::ADJACENCY_MATRIX,
                &keys::adjacency_dir_key(self.graph_id, row),
            );
        }
        Ok(())
    }
}

pub struct EdgeIter<'a> {
    txn: &'a Transaction,
    graph_id: u64,
    capacity: u64,
    end: u64,
    stride: u64,
    next_src: u64,
    current_row: Option<(u64, BitScanIter<'a>)>,
}

impl<'a> EdgeIter<'a> {
    fn row_iter(&self, src: u64) -> Result<Option<BitScanIter<'a>>> {
        let am = AdjacencyMatrix::new(self.txn, self.graph_id);
        let Some((head, tail_max)) = am.row_directory(src)? else {
            return Ok(None);
        };
        let row_capacity = (tail_max + 1) * PAGE_SIZE as u64 * 8;
        Ok(Some(BitScanIter::new(
            self.txn,
            schema::ADJACENCY_MATRIX_L,
            head,
            PAGE_SIZE,
            row_capacity.min(self.capacity),
            0,
            0,
            1,
        )))
    }
}

impl<'a> Iterator for EdgeIter<'a> {
    type Item = (u64, u64);

    fn next(&mut self) -> Option<(u64, u64)> {
        loop {
            if self.current_row.is_none() {
                if self.next_src >= self.end {
                    return None;
                }
                let src = self.next_src;
                self.next_src += self.stride;
                match self.row_iter(src) {
                    Ok(Some(iter)) => self.current_row = Some((src, iter)),
                    Ok(None) => continue,
                    Err(_) => return None,
                }
            }
            let (src, iter) = self.current_row.as_mut().unwrap();
            match iter.next() {
                Some(dst) => return Some((*src, dst)),
                None => self.current_row = None,
            }
        }
    }
}
