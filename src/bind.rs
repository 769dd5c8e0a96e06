//! `BindMap`: a keyed bitmap store with key aliasing.
//!
//! Keys are decimal node IDs. `bind` declares a group of keys equivalent so
//! they share one underlying bitmap slot: reads and writes through any member
//! land on the group's canonical slot. The cache builder uses this to collapse
//! every strongly connected component into a single slot, so a cycle is
//! visited (and its reachability accumulated) exactly once.
//!
//! Internally this is a union-find over keys pointing into one backing store
//! of bitmaps:
//!
//! - `bind(group)` merges the members' key classes under the first key's root
//! - `get`/`set` resolve the key's root slot and read/write there
//!
//! Binding is idempotent and monotonic: groups only grow or stay.

use std::collections::BTreeMap;

use roaring::RoaringBitmap;

use crate::error::{Error, Result};

#[derive(Debug, Default, Clone)]
pub struct BindMap {
    /// Key -> entry slot in the forest.
    key_to_slot: BTreeMap<String, usize>,
    /// Slot forest; `parent[s] == s` marks a root.
    parent: Vec<usize>,
    /// Bitmap values, authoritative only at root slots.
    values: Vec<RoaringBitmap>,
}

impl BindMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct keys (aliases counted individually).
    pub fn len(&self) -> usize {
        self.key_to_slot.len()
    }

    pub fn is_empty(&self) -> bool {
        self.key_to_slot.is_empty()
    }

    /// Declare all `keys` equivalent and return the canonical key (the first).
    ///
    /// Values already stored under any member survive the merge: they are
    /// unioned into the canonical slot.
    pub fn bind(&mut self, keys: &[String]) -> Result<String> {
        let Some((canonical, rest)) = keys.split_first() else {
            return Err(Error::EmptyBindGroup);
        };

        let canonical_slot = self.ensure_slot(canonical);
        let root = self.find_root(canonical_slot);

        for key in rest {
            let slot = self.ensure_slot(key);
            let other = self.find_root(slot);
            if other == root {
                continue;
            }
            let merged = std::mem::take(&mut self.values[other]);
            self.parent[other] = root;
            self.values[root] |= merged;
        }

        Ok(canonical.clone())
    }

    /// Snapshot of the bitmap reachable through `key`; empty if never bound
    /// or set.
    pub fn get(&self, key: &str) -> RoaringBitmap {
        match self.key_to_slot.get(key) {
            Some(&slot) => self.values[self.find_root(slot)].clone(),
            None => RoaringBitmap::new(),
        }
    }

    /// Like [`get`](Self::get), but a missing key is an error. Used where a
    /// prior seeding pass guarantees the key exists.
    pub fn get_checked(&self, key: &str) -> Result<RoaringBitmap> {
        let &slot = self
            .key_to_slot
            .get(key)
            .ok_or_else(|| Error::MissingCacheKey(key.to_string()))?;
        Ok(self.values[self.find_root(slot)].clone())
    }

    /// Replace the bitmap in `key`'s canonical slot. An unbound key gets a
    /// slot of its own.
    pub fn set(&mut self, key: &str, value: RoaringBitmap) {
        let slot = self.ensure_slot(key);
        let root = self.find_root(slot);
        self.values[root] = value;
    }

    /// All keys with their (shared) bitmaps, as parallel lists. Aliased keys
    /// each appear once, carrying a snapshot of the group's bitmap.
    pub fn keys_and_values(&self) -> (Vec<String>, Vec<RoaringBitmap>) {
        let mut keys = Vec::with_capacity(self.key_to_slot.len());
        let mut values = Vec::with_capacity(self.key_to_slot.len());
        for (key, &slot) in &self.key_to_slot {
            keys.push(key.clone());
            values.push(self.values[self.find_root(slot)].clone());
        }
        (keys, values)
    }

    fn ensure_slot(&mut self, key: &str) -> usize {
        if let Some(&slot) = self.key_to_slot.get(key) {
            return slot;
        }
        let slot = self.parent.len();
        self.parent.push(slot);
        self.values.push(RoaringBitmap::new());
        self.key_to_slot.insert(key.to_string(), slot);
        slot
    }

    fn find_root(&self, mut slot: usize) -> usize {
        while self.parent[slot] != slot {
            slot = self.parent[slot];
        }
        slot
    }
}
