//! Fixed-width key packing shared by every table in `storage::schema`.
//!
//! All multi-byte integers are packed big-endian, not little-endian as a
//! literal reading of the upstream wire-format description suggests — see
//! `DESIGN.md` / `SPEC_FULL.md` §D. A byte-lexicographic ordered KV store only
//! yields ascending numeric order from raw byte comparison when integers are
//! packed big-endian, and ascending iteration order is load-bearing for
//! `vertex_set`/`adjacency`.

/// `graph_id` key into `VERTEX_SET`.
pub fn vertex_set_key(graph_id: u64) -> [u8; 8] {
    graph_id.to_be_bytes()
}

pub fn parse_vertex_set_key(bytes: &[u8]) -> u64 {
    u64::from_be_bytes(bytes.try_into().expect("VERTEX_SET key is 8 bytes"))
}

/// `(graph_id, row)` key into `ADJACENCY_MATRIX`.
pub fn adjacency_dir_key(graph_id: u64, row: u64) -> [u8; 16] {
    pack_u64_u64(graph_id, row)
}

pub fn parse_adjacency_dir_key(bytes: &[u8]) -> (u64, u64) {
    unpack_u64_u64(bytes)
}

/// `(head, tail)` key into a `_L` paged-list table.
pub fn page_key(head: u64, tail: u64) -> [u8; 16] {
    pack_u64_u64(head, tail)
}

pub fn parse_page_key(bytes: &[u8]) -> (u64, u64) {
    unpack_u64_u64(bytes)
}

/// `(graph_id, vertex_id, feature_tag)` key into `VERTEX_FEATURE`.
pub fn vertex_feature_key(graph_id: u64, vertex_id: u64, tag: u32) -> [u8; 20] {
    let mut out = [0u8; 20];
    out[0..8].copy_from_slice(&graph_id.to_be_bytes());
    out[8..16].copy_from_slice(&vertex_id.to_be_bytes());
    out[16..20].copy_from_slice(&tag.to_be_bytes());
    out
}

pub fn parse_vertex_feature_key(bytes: &[u8]) -> (u64, u64, u32) {
    let graph_id = u64::from_be_bytes(bytes[0..8].try_into().unwrap());
    let vertex_id = u64::from_be_bytes(bytes[8..16].try_into().unwrap());
    let tag = u32::from_be_bytes(bytes[16..20].try_into().unwrap());
    (graph_id, vertex_id, tag)
}

/// `(graph_id, src, dst, feature_tag)` key into `EDGE_FEATURE`.
pub fn edge_feature_key(graph_id: u64, src: u64, dst: u64, tag: u32) -> [u8; 28] {
    let mut out = [0u8; 28];
    out[0..8].copy_from_slice(&graph_id.to_be_bytes());
    out[8..16].copy_from_slice(&src.to_be_bytes());
    out[16..24].copy_from_slice(&dst.to_be_bytes());
    out[24..28].copy_from_slice(&tag.to_be_bytes());
    out
}

pub fn parse_edge_feature_key(bytes: &[u8]) -> (u64, u64, u64, u32) {
    let graph_id = u64::from_be_bytes(bytes[0..8].try_into().unwrap());
    let src = u64::from_be_bytes(bytes[8..16].try_into().unwrap());
    let dst = u64::from_be_bytes(bytes[16..24].try_into().unwrap());
    let tag = u32::from_be_bytes(bytes[24..28].try_into().unwrap());
    (graph_id, src, dst, tag)
}

fn pack_u64_u64(a: u64, b: u64) -> [u8; 16] {
    let mut out = [0u8; 16];
    out[0..8].copy_from_slice(&a.to_be_bytes());
    out[8..16].copy_from_slice(&b.to_be_bytes());
    out
}

fn unpack_u64_u64(bytes: &[u8]) -> (u64, u64) {
    let a = u64::from_be_bytes(bytes[0..8].try_into().unwrap());
    let b = u64::from_be_bytes(bytes[8..16].try_into().unwrap());
    (a, b)
}
