//! Named sub-databases (spec §6). Every table is byte-keyed/byte-valued; the
//! fixed-width struct packings live in `crate::keys` so the façade above this
//! layer never has to know redb's generic key/value machinery.

use redb::TableDefinition;

pub const VERTEX_SET: TableDefinition<&[u8], &[u8]> = TableDefinition::new("vertex_set");
pub const VERTEX_SET_L: TableDefinition<&[u8], &[u8]> = TableDefinition::new("vertex_set_l");
pub const ADJACENCY_MATRIX: TableDefinition<&[u8], &[u8]> =
    TableDefinition::new("adjacency_matrix");
pub const ADJACENCY_MATRIX_L: TableDefinition<&[u8], &[u8]> =
    TableDefinition::new("adjacency_matrix_l");
pub const VERTEX_FEATURE: TableDefinition<&[u8], &[u8]> = TableDefinition::new("vertex_feature");
pub const VERTEX_FEATURE_H: TableDefinition<&[u8], &[u8]> =
    TableDefinition::new("vertex_feature_h");
pub const EDGE_FEATURE: TableDefinition<&[u8], &[u8]> = TableDefinition::new("edge_feature");
pub const EDGE_FEATURE_H: TableDefinition<&[u8], &[u8]> = TableDefinition::new("edge_feature_h");

/// All named sub-databases, for `Environment::open`'s eager table creation.
pub const ALL_TABLES: [TableDefinition<&[u8], &[u8]>; 8] = [
    VERTEX_SET,
    VERTEX_SET_L,
    ADJACENCY_MATRIX,
    ADJACENCY_MATRIX_L,
    VERTEX_FEATURE,
    VERTEX_FEATURE_H,
    EDGE_FEATURE,
    EDGE_FEATURE_H,
];

/// Tag identifying a sub-database in the overlay machinery of `storage::txn`,
/// where we cannot keep a live `TableDefinition` around (it borrows a
/// `&'static str`) but do need a cheap, comparable, hashable key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Table(pub &'static str);

pub fn tag(def: &TableDefinition<&[u8], &[u8]>) -> Table {
    Table(def.name())
}
