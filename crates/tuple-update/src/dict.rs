//! Name → field index resolution.
//!
//! Top-level fields may be addressed by name; the engine consumes the
//! lookup as a capability keyed by (name, precomputed hash) so a caller
//! with an interned dictionary can skip rehashing.

use std::collections::HashMap;

/// 32-bit FNV-1a over the field name bytes.
pub fn field_name_hash(name: &str) -> u32 {
    let mut hash: u32 = 0x811c_9dc5;
    for &byte in name.as_bytes() {
        hash ^= byte as u32;
        hash = hash.wrapping_mul(0x0100_0193);
    }
    hash
}

/// Resolves a top-level field name to its zero-based index.
pub trait FieldDictionary {
    fn field_no_by_name(&self, name: &str, hash: u32) -> Option<u32>;
}

/// "No names defined": every lookup misses.
impl FieldDictionary for () {
    fn field_no_by_name(&self, _name: &str, _hash: u32) -> Option<u32> {
        None
    }
}

impl FieldDictionary for HashMap<String, u32> {
    fn field_no_by_name(&self, name: &str, _hash: u32) -> Option<u32> {
        self.get(name).copied()
    }
}
