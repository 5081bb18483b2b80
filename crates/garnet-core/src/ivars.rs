//! Instance-variable storage tiers
//!
//! Objects with dedicated ivar capability start with no storage at all, grow
//! a small sorted [`CompactMap`] on first write, and are promoted permanently
//! to a full hash table when the compact map overflows. Receivers without a
//! dedicated slot (immediates, ivar-less types) are handled by side tables in
//! [`crate::memory::MemoryManager`]; this module only defines the storage
//! shapes themselves.

use crate::value::Value;
use rustc_hash::FxHashMap;

/// Capacity of the compact per-object ivar map
///
/// Overflowing this promotes the object to the full-table tier; promotion is
/// one-way.
pub const COMPACT_IVAR_CAPACITY: usize = 8;

/// Interned symbol used as an ivar key
///
/// Interning itself belongs to the interpreter; the memory core only needs a
/// stable, ordered, hashable key.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct SymbolId(pub u32);

/// Small fixed-capacity association, kept sorted by key
#[derive(Clone, Debug, Default)]
pub struct CompactMap {
    entries: Vec<(SymbolId, Value)>,
}

impl CompactMap {
    /// Create an empty compact map
    pub fn new() -> Self {
        Self {
            entries: Vec::with_capacity(2),
        }
    }

    /// Look up a key
    pub fn get(&self, key: SymbolId) -> Option<Value> {
        self.entries
            .binary_search_by_key(&key, |&(k, _)| k)
            .ok()
            .map(|i| self.entries[i].1)
    }

    /// Insert or update a pair
    ///
    /// Returns `false` when the key is new and the map is at capacity; the
    /// caller must promote to the table tier.
    pub fn insert(&mut self, key: SymbolId, value: Value) -> bool {
        match self.entries.binary_search_by_key(&key, |&(k, _)| k) {
            Ok(i) => {
                self.entries[i].1 = value;
                true
            }
            Err(i) => {
                if self.entries.len() >= COMPACT_IVAR_CAPACITY {
                    return false;
                }
                self.entries.insert(i, (key, value));
                true
            }
        }
    }

    /// Number of stored pairs
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the map is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over pairs in key order
    pub fn iter(&self) -> impl Iterator<Item = (SymbolId, Value)> + '_ {
        self.entries.iter().copied()
    }
}

/// Per-object ivar storage tier
#[derive(Clone, Debug, Default)]
pub enum IvarStorage {
    /// No ivars have ever been written
    #[default]
    None,
    /// Compact sorted map, up to [`COMPACT_IVAR_CAPACITY`] pairs
    Compact(CompactMap),
    /// Full hash table; entered on compact overflow, never left
    Table(FxHashMap<SymbolId, Value>),
}

impl IvarStorage {
    /// Look up a key across tiers
    pub fn get(&self, key: SymbolId) -> Option<Value> {
        match self {
            IvarStorage::None => None,
            IvarStorage::Compact(map) => map.get(key),
            IvarStorage::Table(table) => table.get(&key).copied(),
        }
    }

    /// Insert or update a pair, promoting to the table tier on overflow
    ///
    /// Promotion preserves all existing pairs; reads are indistinguishable
    /// across the promotion boundary.
    pub fn set(&mut self, key: SymbolId, value: Value) {
        match self {
            IvarStorage::None => {
                let mut map = CompactMap::new();
                map.insert(key, value);
                *self = IvarStorage::Compact(map);
            }
            IvarStorage::Compact(map) => {
                if !map.insert(key, value) {
                    let mut table: FxHashMap<SymbolId, Value> = FxHashMap::default();
                    for (k, v) in map.iter() {
                        table.insert(k, v);
                    }
                    table.insert(key, value);
                    *self = IvarStorage::Table(table);
                }
            }
            IvarStorage::Table(table) => {
                table.insert(key, value);
            }
        }
    }

    /// Number of stored pairs
    pub fn len(&self) -> usize {
        match self {
            IvarStorage::None => 0,
            IvarStorage::Compact(map) => map.len(),
            IvarStorage::Table(table) => table.len(),
        }
    }

    /// Check whether storage has been promoted to the full-table tier
    pub fn is_table(&self) -> bool {
        matches!(self, IvarStorage::Table(_))
    }

    /// Check whether storage is still in the compact tier
    pub fn is_compact(&self) -> bool {
        matches!(self, IvarStorage::Compact(_))
    }

    /// Snapshot of all pairs (used by the tracer to rewrite values)
    pub fn entries(&self) -> Vec<(SymbolId, Value)> {
        match self {
            IvarStorage::None => Vec::new(),
            IvarStorage::Compact(map) => map.iter().collect(),
            IvarStorage::Table(table) => table.iter().map(|(&k, &v)| (k, v)).collect(),
        }
    }
}
