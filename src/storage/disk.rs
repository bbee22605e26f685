//! Lazy, self-referential scan over one `redb` table, generalized from
//! `nervusdb-core`'s original `storage/disk.rs::DiskCursor` (which scanned one
//! of the five hexastore indices) to the single byte-keyed table shape every
//! sub-database in `storage::schema` uses.
//!
//! This scans the *base* snapshot only — it knows nothing about the overlay
//! of an in-flight transaction. `storage::txn::Cursor` merges this with the
//! pending overlay on top. The snapshot itself is a `ReadTransaction` pinned
//! once per root `Transaction` at `begin_root` (spec §5 "readers see a
//! snapshot") and passed in by reference here; this module never opens its
//! own, so two base reads inside one transaction always see the same
//! committed state even if another transaction commits in between.

use ouroboros::self_referencing;
use redb::{ReadOnlyTable, ReadTransaction, ReadableTable, Range, TableDefinition};

use crate::error::Result;

#[self_referencing]
pub(crate) struct BaseCursor {
    table: ReadOnlyTable<&'static [u8], &'static [u8]>,
    #[borrows(table)]
    #[covariant]
    iter: Range<'this, &'static [u8], &'static [u8]>,
}

impl BaseCursor {
    pub(crate) fn open(
        read_txn: &ReadTransaction,
        table_def: TableDefinition<&[u8], &[u8]>,
        start: Vec<u8>,
        end: Vec<u8>,
    ) -> Result<Self> {
        let table = read_txn.open_table(table_def)?;
        Ok(BaseCursorTryBuilder {
            table,
            iter_builder: move |table| -> Result<Range<'_, &[u8], &[u8]>> {
                Ok(table.range(start.as_slice()..=end.as_slice())?)
            },
        }
        .try_build()?)
    }
}

impl Iterator for BaseCursor {
    type Item = (Vec<u8>, Vec<u8>);

    fn next(&mut self) -> Option<Self::Item> {
        self.with_iter_mut(|iter| {
            let entry = iter.next()?.ok()?;
            let (key, value) = entry;
            Some((key.value().to_vec(), value.value().to_vec()))
        })
    }
}

/// A single point lookup against the pinned base snapshot.
pub(crate) fn get(
    read_txn: &ReadTransaction,
    table_def: TableDefinition<&[u8], &[u8]>,
    key: &[u8],
) -> Result<Option<Vec<u8>>> {
    let table = read_txn.open_table(table_def)?;
    Ok(table.get(key)?.map(|guard| guard.value().to_vec()))
}
