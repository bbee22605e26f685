//! Transactions with nested children (spec §4.2).
//!
//! `redb` has no native child-transaction primitive, so nesting is layered on
//! top of it: each transaction in the tree owns an in-memory overlay of
//! pending writes; a child's `get` checks its own overlay, then its parent's,
//! then its parent's parent, and so on, before falling through to the last
//! committed state of the database. `commit` on a child folds its overlay into
//! its parent's and discards the child frame; `commit` on the root applies the
//! fully-folded overlay to a real `redb::WriteTransaction` and commits it.
//! `abort` at any depth simply discards that frame's overlay.
//!
//! This mirrors the nesting the reference engine actually provides (LMDB's
//! `env.begin(db=..., parent=txn, write=True)`, exercised directly by
//! `original_source/extensions/graphdb/test_graphdb.py`), generalized to an
//! engine (`redb`) that does not expose it natively.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::sync::Arc;

use redb::{Database, ReadTransaction, ReadableDatabase};

use crate::error::Result;
use crate::storage::disk::{self, BaseCursor};
use crate::storage::schema::{Table, tag};

#[derive(Debug, Clone)]
enum Op {
    Put(Vec<u8>),
    Delete,
}

#[derive(Default)]
struct Frame {
    writes: BTreeMap<(Table, Vec<u8>), Op>,
}

/// One root transaction's fixed view of the database: `db` for the eventual
/// commit's write transaction, and a `ReadTransaction` pinned at `begin_root`
/// so every base read this transaction (or any of its children) performs
/// sees the same committed snapshot, per spec §5.
struct Root {
    db: Arc<Database>,
    read_txn: ReadTransaction,
}

/// A transaction, possibly nested under a parent.
pub struct Transaction {
    root: Rc<Root>,
    frame: Rc<RefCell<Frame>>,
    parent: Option<Rc<RefCell<Frame>>>,
    ancestors: Vec<Rc<RefCell<Frame>>>,
    live: bool,
}

impl Transaction {
    /// Begin a new top-level transaction against `db`, pinning a read
    /// snapshot of the database's current committed state.
    pub(crate) fn begin_root(db: Arc<Database>) -> Result<Self> {
        let read_txn = db.begin_read()?;
        Ok(Transaction {
            root: Rc::new(Root { db, read_txn }),
            frame: Rc::new(RefCell::new(Frame::default())),
            parent: None,
            ancestors: Vec::new(),
            live: true,
        })
    }

    /// Begin a child transaction nested under `self`.
    pub fn begin_child(&self) -> Transaction {
        let mut ancestors = self.ancestors.clone();
        ancestors.push(self.frame.clone());
        Transaction {
            root: self.root.clone(),
            frame: Rc::new(RefCell::new(Frame::default())),
            parent: Some(self.frame.clone()),
            ancestors,
            live: true,
        }
    }

    fn table_def(t: Table) -> redb::TableDefinition<'static, &'static [u8], &'static [u8]> {
        crate::storage::schema::ALL_TABLES
            .into_iter()
            .find(|def| tag(def) == t)
            .expect("unknown table tag")
    }

    /// Read a value visible to this transaction: its own overlay, then each
    /// ancestor's overlay (nearest first), then the last committed snapshot.
    pub fn get(
        &self,
        table: redb::TableDefinition<&[u8], &[u8]>,
        key: &[u8],
    ) -> Result<Option<Vec<u8>>> {
        let t = tag(&table);
        if let Some(op) = self.frame.borrow().writes.get(&(t, key.to_vec())) {
            return Ok(match op {
                Op::Put(v) => Some(v.clone()),
                Op::Delete => None,
            });
        }
        // `ancestors` is oldest-first (root at index 0); the nearest parent's
        // overlay shadows every older ancestor's, so walk it nearest-first.
        for ancestor in self.ancestors.iter().rev() {
            if let Some(op) = ancestor.borrow().writes.get(&(t, key.to_vec())) {
                return Ok(match op {
                    Op::Put(v) => Some(v.clone()),
                    Op::Delete => None,
                });
            }
        }
        disk::get(&self.root.read_txn, table, key)
    }

    pub fn put(&self, table: redb::TableDefinition<&[u8], &[u8]>, key: &[u8], value: &[u8]) {
        let t = tag(&table);
        self.frame
            .borrow_mut()
            .writes
            .insert((t, key.to_vec()), Op::Put(value.to_vec()));
    }

    pub fn delete(&self, table: redb::TableDefinition<&[u8], &[u8]>, key: &[u8]) {
        let t = tag(&table);
        self.frame
            .borrow_mut()
            .writes
            .insert((t, key.to_vec()), Op::Delete);
    }

    /// Ordered iteration over `[start, end]`, merging this transaction's
    /// overlay (and its ancestors') over the last committed snapshot.
    pub fn cursor(
        &self,
        table: redb::TableDefinition<&[u8], &[u8]>,
        start: Vec<u8>,
        end: Vec<u8>,
    ) -> Result<Cursor> {
        let t = tag(&table);
        let mut merged: BTreeMap<Vec<u8>, Option<Vec<u8>>> = BTreeMap::new();

        let base = BaseCursor::open(&self.root.read_txn, table, start.clone(), end.clone())?;
        for (k, v) in base {
            merged.insert(k, Some(v));
        }

        // Ancestors shadow the base snapshot, self shadows every ancestor.
        // Apply oldest (root) first so each nearer ancestor overwrites it in
        // the merge map, then `self`'s own frame overwrites all of them.
        for ancestor in self.ancestors.iter() {
            for ((_, k), op) in ancestor.borrow().writes.range((t, start.clone())..=(t, end.clone())) {
                match op {
                    Op::Put(v) => {
                        merged.insert(k.clone(), Some(v.clone()));
                    }
                    Op::Delete => {
                        merged.insert(k.clone(), None);
                    }
                }
            }
        }
        for ((_, k), op) in self.frame.borrow().writes.range((t, start.clone())..=(t, end)) {
            match op {
                Op::Put(v) => {
                    merged.insert(k.clone(), Some(v.clone()));
                }
                Op::Delete => {
                    merged.insert(k.clone(), None);
                }
            }
        }

        let items: Vec<(Vec<u8>, Vec<u8>)> = merged
            .into_iter()
            .filter_map(|(k, v)| v.map(|v| (k, v)))
            .collect();
        Ok(Cursor {
            items: items.into_iter(),
        })
    }

    /// Commit this transaction. A child folds its overlay into its parent's;
    /// the root applies the fully-folded overlay to `redb` and commits it.
    pub fn commit(mut self) -> Result<()> {
        self.live = false;
        let writes = std::mem::take(&mut self.frame.borrow_mut().writes);
        match &self.parent {
            Some(parent) => {
                parent.borrow_mut().writes.extend(writes);
                Ok(())
            }
            None => {
                let write_txn = self.root.db.begin_write()?;
                {
                    let mut tables: std::collections::HashMap<Table, redb::Table<&[u8], &[u8]>> =
                        std::collections::HashMap::new();
                    for ((t, key), op) in writes {
                        let table = match tables.entry(t) {
                            std::collections::hash_map::Entry::Occupied(e) => e.into_mut(),
                            std::collections::hash_map::Entry::Vacant(e) => {
                                e.insert(write_txn.open_table(Self::table_def(t))?)
                            }
                        };
                        match op {
                            Op::Put(v) => {
                                table.insert(key.as_slice(), v.as_slice())?;
                            }
                            Op::Delete => {
                                table.remove(key.as_slice())?;
                            }
                        }
                    }
                }
                write_txn.commit()?;
                Ok(())
            }
        }
    }

    /// Abort, discarding every write this transaction (and any of its own
    /// uncommitted children) made. Ancestors are untouched.
    pub fn abort(mut self) {
        self.live = false;
        self.frame.borrow_mut().writes.clear();
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        // An un-committed, un-aborted transaction going out of scope aborts,
        // matching redb's own WriteTransaction drop behaviour.
        if self.live {
            self.frame.borrow_mut().writes.clear();
        }
    }
}

pub struct Cursor {
    items: std::vec::IntoIter<(Vec<u8>, Vec<u8>)>,
}

impl Iterator for Cursor {
    type Item = (Vec<u8>, Vec<u8>);

    fn next(&mut self) -> Option<Self::Item> {
        self.items.next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::env::EnvironmentPool;
    use crate::storage::schema::VERTEX_SET;
    use tempfile::tempdir;

    #[test]
    fn nearer_ancestor_shadows_an_older_one_for_get_and_cursor() {
        let dir = tempdir().unwrap();
        let pool = EnvironmentPool::new();
        let env = pool.acquire(dir.path().join("db.redb")).unwrap();

        let root = env.begin().unwrap();
        root.put(VERTEX_SET, b"k", b"root-value");

        let mid = root.begin_child();
        mid.put(VERTEX_SET, b"k", b"mid-value");

        let leaf = mid.begin_child();

        // The leaf has no write of its own for "k"; it must see the nearest
        // ancestor's (mid's) value, not the older root write.
        assert_eq!(leaf.get(VERTEX_SET, b"k").unwrap(), Some(b"mid-value".to_vec()));

        let found: Vec<_> = leaf
            .cursor(VERTEX_SET, b"k".to_vec(), b"k".to_vec())
            .unwrap()
            .collect();
        assert_eq!(found, vec![(b"k".to_vec(), b"mid-value".to_vec())]);
    }

    #[test]
    fn base_reads_stay_pinned_to_the_snapshot_taken_at_begin() {
        let dir = tempdir().unwrap();
        let pool = EnvironmentPool::new();
        let env = pool.acquire(dir.path().join("db.redb")).unwrap();

        let reader = env.begin().unwrap();
        assert_eq!(reader.get(VERTEX_SET, b"k").unwrap(), None);

        // A second, independent transaction commits after `reader` began.
        let writer = env.begin().unwrap();
        writer.put(VERTEX_SET, b"k", b"late-write");
        writer.commit().unwrap();

        // `reader`'s base reads must still see its own begin-time snapshot,
        // not the write that committed afterward.
        assert_eq!(reader.get(VERTEX_SET, b"k").unwrap(), None);
        let found: Vec<_> = reader
            .cursor(VERTEX_SET, b"k".to_vec(), b"k".to_vec())
            .unwrap()
            .collect();
        assert!(found.is_empty());

        // A transaction begun after the commit does see it.
        let later = env.begin().unwrap();
        assert_eq!(later.get(VERTEX_SET, b"k").unwrap(), Some(b"late-write".to_vec()));
    }
}
