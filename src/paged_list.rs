//! Paged linked-list store (spec §4.3).
//!
//! A list is an append-only sequence of fixed-size pages living in a shared
//! `_L` table. `head` identifies the list; it is assigned once, by reading
//! and incrementing a single counter kept at the table-wide metadata key
//! `(0, 0)` (`head == 0` is reserved, per spec GLOSSARY). `tail` is the
//! page's ordinal within its own list, starting at 0. Because `head` is
//! list-unique, `(head, tail)` is globally unique in the shared table even
//! though many lists share it — see `SPEC_FULL.md` §C for why this resolves
//! the spec's literal (and self-contradictory) per-page head allocation.
//!
//! A list's own `(head, tail_max)` is not stored here; callers (`vertex_set`,
//! `adjacency`) keep it in their own directory entry and pass `head` down to
//! every call in this module.

use redb::TableDefinition;

use crate::error::{Error, Result};
use crate::keys;
use crate::storage::txn::Transaction;

const METADATA_KEY_HEAD: u64 = 0;
const METADATA_KEY_TAIL: u64 = 0;

/// Reserve a fresh, list-unique `head` by reading-and-incrementing the
/// table's shared counter at `(0, 0)`, then write the list's first
/// (zero-filled) page at `(head, 0)`. Returns `head`.
pub fn allocate_list(
    txn: &Transaction,
    table: TableDefinition<&[u8], &[u8]>,
    page_size: usize,
) -> Result<u64> {
    let head = next_head(txn, table)?;
    let zero_page = vec![0u8; page_size];
    txn.put(table, &keys::page_key(head, 0), &zero_page);
    Ok(head)
}

fn next_head(txn: &Transaction, table: TableDefinition<&[u8], &[u8]>) -> Result<u64> {
    let meta_key = keys::page_key(METADATA_KEY_HEAD, METADATA_KEY_TAIL);
    let current = match txn.get(table, &meta_key)? {
        Some(bytes) => {
            if bytes.len() != 8 {
                return Err(Error::Corrupt("paged list head counter is not 8 bytes"));
            }
            u64::from_be_bytes(bytes.try_into().unwrap())
        }
        // 0 is reserved for the metadata page itself.
        None => 1,
    };
    txn.put(table, &meta_key, &(current + 1).to_be_bytes());
    Ok(current)
}

/// Read page `tail` of the list rooted at `head`. `Err(Corrupt)` if the page
/// is missing or its length doesn't match `page_size`.
pub fn read_page(
    txn: &Transaction,
    table: TableDefinition<&[u8], &[u8]>,
    head: u64,
    tail: u64,
    page_size: usize,
) -> Result<Vec<u8>> {
    match txn.get(table, &keys::page_key(head, tail))? {
        Some(bytes) if bytes.len() == page_size => Ok(bytes),
        Some(_) => Err(Error::Corrupt("page size mismatch")),
        None => Err(Error::Corrupt("descriptor points at a missing page")),
    }
}

/// Write (or overwrite) page `tail` of the list rooted at `head`.
pub fn write_page(
    txn: &Transaction,
    table: TableDefinition<&[u8], &[u8]>,
    head: u64,
    tail: u64,
    page: &[u8],
) {
    txn.put(table, &keys::page_key(head, tail), page);
}

/// Delete page `tail` of the list rooted at `head`.
pub fn delete_page(txn: &Transaction, table: TableDefinition<&[u8], &[u8]>, head: u64, tail: u64) {
    txn.delete(table, &keys::page_key(head, tail));
}

/// Lazy forward scan of bit indices `[start, end)` (stepping by `stride`,
/// minimum 1) that are set in the bitmap formed by the pages of one list.
/// Pages are read on demand, one at a time, and cached only while the scan
/// stays within the same page.
pub struct BitScanIter<'a> {
    txn: &'a Transaction,
    table: TableDefinition<'static, &'static [u8], &'static [u8]>,
    head: u64,
    page_size: usize,
    end: u64,
    stride: u64,
    next: u64,
    cached_page_idx: Option<u64>,
    cached_page: Vec<u8>,
}

impl<'a> BitScanIter<'a> {
    pub fn new(
        txn: &'a Transaction,
        table: TableDefinition<'static, &'static [u8], &'static [u8]>,
        head: u64,
        page_size: usize,
        capacity: u64,
        start: u64,
        end: u64,
        stride: u64,
    ) -> Self {
        let end = if end == 0 { capacity } else { end.min(capacity) };
        BitScanIter {
            txn,
            table,
            head,
            page_size,
            end,
            stride: stride.max(1),
            next: start,
            cached_page_idx: None,
            cached_page: Vec::new(),
        }
    }

    fn bits_per_page(&self) -> u64 {
        self.page_size as u64 * 8
    }
}

impl<'a> Iterator for BitScanIter<'a> {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        let bpp = self.bits_per_page();
        while self.next < self.end {
            let i = self.next;
            self.next += self.stride;
            let page_idx = i / bpp;
            if self.cached_page_idx != Some(page_idx) {
                match read_page(self.txn, self.table, self.head, page_idx, self.page_size) {
                    Ok(page) => {
                        self.cached_page = page;
                        self.cached_page_idx = Some(page_idx);
                    }
                    Err(_) => return None,
                }
            }
            if crate::bitmap::get(&self.cached_page, i % bpp).unwrap_or(false) {
                return Some(i);
            }
        }
        None
    }
}
