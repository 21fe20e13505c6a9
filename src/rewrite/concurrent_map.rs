//! A linearizable single-key map with `setdefault`/compare-and-set
//! semantics: a worker writes a hash-to-hash mapping at most once; a
//! conflicting overwrite with a different value is an assertion failure
//! (spec §5, §4.F "Cache coherence under parallelism").
//!
//! Backed by `dashmap`, which gives per-shard locking without needing a
//! coordinator-routed channel — one of the two designs spec §9 explicitly
//! allows ("a lock-protected in-memory map in a single-process design").

use dashmap::DashMap;

use crate::error::GraftError;
use crate::hash::ObjectHash;

#[derive(Default)]
pub struct ConcurrentMap {
    inner: DashMap<ObjectHash, ObjectHash>,
}

impl ConcurrentMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: ObjectHash) -> Option<ObjectHash> {
        self.inner.get(&key).map(|v| *v)
    }

    pub fn contains(&self, key: ObjectHash) -> bool {
        self.inner.contains_key(&key)
    }

    /// Inserts `key -> value` if absent. If already present, the existing
    /// value must equal `value` -- two workers computing the same key must
    /// agree, since the computation is deterministic and content-derived.
    /// A mismatch is a bug in the caller and is reported as
    /// [`GraftError::Consistency`].
    pub fn insert_or_check(&self, key: ObjectHash, value: ObjectHash) -> Result<(), GraftError> {
        match self.inner.entry(key) {
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(value);
                Ok(())
            }
            dashmap::mapref::entry::Entry::Occupied(slot) => {
                let existing = *slot.get();
                if existing == value {
                    Ok(())
                } else {
                    Err(GraftError::Consistency {
                        hash: key,
                        first: existing,
                        second: value,
                    })
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn to_hash_map(&self) -> std::collections::HashMap<ObjectHash, ObjectHash> {
        self.inner.iter().map(|e| (*e.key(), *e.value())).collect()
    }

    pub fn extend_from(&self, entries: impl IntoIterator<Item = (ObjectHash, ObjectHash)>) {
        for (k, v) in entries {
            self.inner.insert(k, v);
        }
    }
}
