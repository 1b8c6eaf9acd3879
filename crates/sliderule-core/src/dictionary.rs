//! Open-addressed, robin-hood-chained hash table from string keys to `T`.
//!
//! This is the table that indexes both the record-definition registry and
//! the queue-name registry (spec §4.1). Keys are owned `Box<str>` rather
//! than raw C strings, since ownership here is just ordinary Rust.
//!
//! Collision chains are materialized through the table itself (`next`/`prev`
//! indices into the same backing `Vec`), not through separately allocated
//! list nodes, to keep iteration and probing cache-local — exactly the
//! original's rationale for this layout.

use thiserror::Error;

const NULL_INDEX: u32 = u32::MAX;
const DEFAULT_HASH_TABLE_SIZE: usize = 256;
const DEFAULT_HASH_TABLE_LOAD: f64 = 0.75;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DictionaryError {
    #[error("key '{0}' not found")]
    KeyNotFound(String),
}

struct Entry<T> {
    key: Box<str>,
    data: T,
    /// Depth of the chain to reach this entry; 0 would mean empty, but an
    /// empty slot is represented by `None` at this index instead.
    chain: u32,
    hash: u32,
    next: u32,
    prev: u32,
}

/// Hashes `key` with the Jenkins one-at-a-time mix used throughout the
/// original registries, so hash-derived behavior (bucket placement, probe
/// order) is reproducible the same way it was in the source material.
#[must_use]
pub fn hash_key(key: &str) -> u32 {
    let mut h: i32 = 0;
    for &b in key.as_bytes() {
        h = h.wrapping_add(i32::from(b));
        h = h.wrapping_add(h.wrapping_shl(10));
        h ^= h >> 6;
    }
    h = h.wrapping_add(h.wrapping_shl(3));
    h ^= h >> 11;
    h = h.wrapping_add(h.wrapping_shl(15));
    h as u32
}

pub struct Dictionary<T> {
    table: Vec<Option<Entry<T>>>,
    hash_size: usize,
    num_entries: usize,
    max_chain: u32,
    hash_load: f64,
    curr_index: i64,
}

impl<T> Dictionary<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_HASH_TABLE_SIZE, DEFAULT_HASH_TABLE_LOAD)
    }

    #[must_use]
    pub fn with_capacity(hash_size: usize, hash_load: f64) -> Self {
        assert!(hash_size > 0, "hash_size must be positive");
        let hash_load = if hash_load <= 0.0 || hash_load > 1.0 {
            DEFAULT_HASH_TABLE_LOAD
        } else {
            hash_load
        };
        let mut table = Vec::with_capacity(hash_size);
        table.resize_with(hash_size, || None);
        Self {
            table,
            hash_size,
            num_entries: 0,
            max_chain: 0,
            hash_load,
            curr_index: -1,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.num_entries
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.num_entries == 0
    }

    #[must_use]
    pub fn hash_size(&self) -> usize {
        self.hash_size
    }

    #[must_use]
    pub fn max_chain(&self) -> u32 {
        self.max_chain
    }

    fn get_node(&self, key: &str) -> Option<usize> {
        let hash = hash_key(key);
        let mut index = hash as usize % self.hash_size;
        loop {
            match &self.table[index] {
                Some(entry) if entry.key.as_ref() == key => return Some(index),
                Some(entry) => {
                    if entry.next == NULL_INDEX {
                        return None;
                    }
                    index = entry.next as usize;
                }
                None => return None,
            }
        }
    }

    /// Inserts `key`/`data` into a fresh slot. Caller guarantees `key` is not
    /// already present and that a rehash has already happened if needed.
    fn add_node(&mut self, key: Box<str>, data: T, hash: u32) {
        let home = hash as usize % self.hash_size;

        if self.table[home].is_none() {
            self.table[home] = Some(Entry {
                key,
                data,
                chain: 1,
                hash,
                next: NULL_INDEX,
                prev: NULL_INDEX,
            });
            return;
        }

        let mut open = (home + 1) % self.hash_size;
        while self.table[open].is_some() {
            assert!(open != home, "hash table has no open slot despite load factor check");
            open = (open + 1) % self.hash_size;
        }

        let home_chain = self.table[home].as_ref().unwrap().chain;
        if home_chain == 1 {
            // `home` is the head of its own chain (possibly a singleton):
            // walk to the tail and append the new entry there.
            let mut prev_idx = home;
            let mut next_idx = self.table[home].as_ref().unwrap().next;
            while next_idx != NULL_INDEX {
                prev_idx = next_idx as usize;
                next_idx = self.table[prev_idx].as_ref().unwrap().next;
            }
            let new_chain = self.table[prev_idx].as_ref().unwrap().chain + 1;
            self.table[prev_idx].as_mut().unwrap().next = open as u32;
            self.table[open] = Some(Entry {
                key,
                data,
                chain: new_chain,
                hash,
                next: NULL_INDEX,
                prev: prev_idx as u32,
            });
            self.max_chain = self.max_chain.max(new_chain);
        } else {
            // `home` is itself a continuation of some other chain. Evict it
            // into the open slot (patching the chain's links and renumbering
            // the remainder), then install the new entry as a fresh head.
            let home_next = self.table[home].as_ref().unwrap().next;
            let home_prev = self.table[home].as_ref().unwrap().prev;

            if home_next != NULL_INDEX {
                self.table[home_next as usize].as_mut().unwrap().prev = home_prev;
            }
            self.table[home_prev as usize].as_mut().unwrap().next = home_next;

            let mut prev_idx = home_prev as usize;
            let mut next_idx = home_next;
            while next_idx != NULL_INDEX {
                let ni = next_idx as usize;
                self.table[ni].as_mut().unwrap().chain -= 1;
                prev_idx = ni;
                next_idx = self.table[ni].as_ref().unwrap().next;
            }

            let evicted = self.table[home].take().unwrap();
            let evicted_chain = self.table[prev_idx].as_ref().unwrap().chain + 1;
            self.table[prev_idx].as_mut().unwrap().next = open as u32;
            self.table[open] = Some(Entry {
                key: evicted.key,
                data: evicted.data,
                chain: evicted_chain,
                hash: evicted.hash,
                next: NULL_INDEX,
                prev: prev_idx as u32,
            });
            self.max_chain = self.max_chain.max(evicted_chain);

            self.table[home] = Some(Entry {
                key,
                data,
                chain: 1,
                hash,
                next: NULL_INDEX,
                prev: NULL_INDEX,
            });
        }
    }

    fn rehash(&mut self) {
        let old_table = std::mem::take(&mut self.table);
        let new_size = self.hash_size * 2;
        self.table = Vec::with_capacity(new_size);
        self.table.resize_with(new_size, || None);
        self.hash_size = new_size;
        self.max_chain = 0;

        for entry in old_table.into_iter().flatten() {
            self.add_node(entry.key, entry.data, entry.hash);
        }
    }

    /// Inserts or overwrites. Returns `false` without modification if
    /// `unique` is set and `key` already exists.
    ///
    /// On overwrite, the evicted value is simply dropped; use
    /// [`ManagedDictionary`] when old values need a teardown hook beyond
    /// their `Drop` impl.
    pub fn add(&mut self, key: &str, value: T, unique: bool) -> bool {
        self.add_returning_evicted(key, value, unique).is_ok()
    }

    /// Like [`Dictionary::add`], but surfaces the evicted value (if any) to
    /// the caller instead of dropping it silently. `Err(value)` means the
    /// insert was refused because `unique` was set and the key existed;
    /// `value` is handed back unmodified.
    pub fn add_returning_evicted(
        &mut self,
        key: &str,
        value: T,
        unique: bool,
    ) -> Result<Option<T>, T> {
        match self.get_node(key) {
            Some(idx) => {
                if unique {
                    Err(value)
                } else {
                    let old = std::mem::replace(&mut self.table[idx].as_mut().unwrap().data, value);
                    Ok(Some(old))
                }
            }
            None => {
                if self.num_entries as f64 > (self.hash_size as f64 * self.hash_load) {
                    self.rehash();
                }
                let hash = hash_key(key);
                self.add_node(key.into(), value, hash);
                self.num_entries += 1;
                Ok(None)
            }
        }
    }

    pub fn get(&self, key: &str) -> Result<&T, DictionaryError> {
        self.get_node(key)
            .map(|idx| &self.table[idx].as_ref().unwrap().data)
            .ok_or_else(|| DictionaryError::KeyNotFound(key.to_string()))
    }

    pub fn get_mut(&mut self, key: &str) -> Result<&mut T, DictionaryError> {
        match self.get_node(key) {
            Some(idx) => Ok(&mut self.table[idx].as_mut().unwrap().data),
            None => Err(DictionaryError::KeyNotFound(key.to_string())),
        }
    }

    #[must_use]
    pub fn find(&self, key: &str) -> Option<&T> {
        self.get_node(key)
            .map(|idx| &self.table[idx].as_ref().unwrap().data)
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.get_node(key).is_some()
    }

    /// Removes `key`, dropping its value. Returns `false` if absent.
    pub fn remove(&mut self, key: &str) -> bool {
        self.remove_returning_evicted(key).is_some()
    }

    /// Like [`Dictionary::remove`] but hands the removed value back.
    pub fn remove_returning_evicted(&mut self, key: &str) -> Option<T> {
        let index = self.get_node(key)?;
        let removed = self.table[index].take().unwrap();

        let next_index = removed.next;
        let prev_index = removed.prev;

        if removed.chain == 1 && next_index != NULL_INDEX {
            // Promote the chain's second link into the head slot so the
            // home bucket always holds the live chain head.
            let mut promoted = self.table[next_index as usize].take().unwrap();
            promoted.prev = NULL_INDEX;
            let promoted_next = promoted.next;
            self.table[index] = Some(promoted);
            if promoted_next != NULL_INDEX {
                self.table[promoted_next as usize].as_mut().unwrap().prev = index as u32;
            }
            self.renumber_chain_from(promoted_next);
        } else {
            if next_index != NULL_INDEX {
                self.table[next_index as usize].as_mut().unwrap().prev = prev_index;
            }
            if prev_index != NULL_INDEX {
                self.table[prev_index as usize].as_mut().unwrap().next = next_index;
            }
            self.renumber_chain_from(next_index);
        }

        self.num_entries -= 1;
        Some(removed.data)
    }

    fn renumber_chain_from(&mut self, mut index: u32) {
        while index != NULL_INDEX {
            let entry = self.table[index as usize].as_mut().unwrap();
            entry.chain -= 1;
            index = entry.next;
        }
    }

    /// Drops every entry, invoking nothing beyond `T`'s own `Drop`.
    pub fn clear(&mut self) {
        for slot in &mut self.table {
            *slot = None;
        }
        self.num_entries = 0;
        self.max_chain = 0;
    }

    fn scan_at_or_after(&self, mut index: i64) -> Option<i64> {
        while index >= 0 && (index as usize) < self.hash_size {
            if self.table[index as usize].is_some() {
                return Some(index);
            }
            index += 1;
        }
        None
    }

    fn scan_at_or_before(&self, mut index: i64) -> Option<i64> {
        while index >= 0 {
            if self.table[index as usize].is_some() {
                return Some(index);
            }
            index -= 1;
        }
        None
    }

    /// Walks bucket storage order (not insertion order), resetting the
    /// cursor to the first occupied slot.
    pub fn first(&mut self) -> Option<(&str, &T)> {
        self.curr_index = self.scan_at_or_after(0)?;
        let entry = self.table[self.curr_index as usize].as_ref().unwrap();
        Some((&entry.key, &entry.data))
    }

    pub fn next(&mut self) -> Option<(&str, &T)> {
        self.curr_index = self.scan_at_or_after(self.curr_index + 1)?;
        let entry = self.table[self.curr_index as usize].as_ref().unwrap();
        Some((&entry.key, &entry.data))
    }

    pub fn prev(&mut self) -> Option<(&str, &T)> {
        self.curr_index = self.scan_at_or_before(self.curr_index - 1)?;
        let entry = self.table[self.curr_index as usize].as_ref().unwrap();
        Some((&entry.key, &entry.data))
    }

    pub fn last(&mut self) -> Option<(&str, &T)> {
        self.curr_index = self.scan_at_or_before(self.hash_size as i64 - 1)?;
        let entry = self.table[self.curr_index as usize].as_ref().unwrap();
        Some((&entry.key, &entry.data))
    }

    /// A random-access iterator over storage order, amortized O(1) for
    /// sequential access via a cached last-scanned bucket (spec §4.1).
    #[must_use]
    pub fn iter(&self) -> DictIter<'_, T> {
        DictIter {
            source: self,
            last_table_index: std::cell::Cell::new(-1),
            last_logical_index: std::cell::Cell::new(-1),
        }
    }
}

impl<T> Default for Dictionary<T> {
    fn default() -> Self {
        Self::new()
    }
}

pub struct DictIter<'a, T> {
    source: &'a Dictionary<T>,
    last_table_index: std::cell::Cell<i64>,
    last_logical_index: std::cell::Cell<i64>,
}

impl<'a, T> DictIter<'a, T> {
    #[must_use]
    pub fn length(&self) -> usize {
        self.source.num_entries
    }

    /// Returns the `index`-th live entry in storage order. Sequential access
    /// (ascending or descending by one) is O(1) amortized because the scan
    /// resumes from the last table position instead of restarting.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<(&'a str, &'a T)> {
        if index >= self.source.num_entries {
            return None;
        }
        let index = index as i64;
        let mut table_index = self.last_table_index.get();
        let mut logical_index = self.last_logical_index.get();

        if logical_index < 0 {
            table_index = 0;
            while self.source.table[table_index as usize].is_none() {
                table_index += 1;
            }
            logical_index = 0;
        }

        while logical_index < index {
            table_index += 1;
            if self.source.table[table_index as usize].is_some() {
                logical_index += 1;
            }
        }
        while logical_index > index {
            table_index -= 1;
            if self.source.table[table_index as usize].is_some() {
                logical_index -= 1;
            }
        }

        self.last_table_index.set(table_index);
        self.last_logical_index.set(logical_index);

        let entry = self.source.table[table_index as usize].as_ref().unwrap();
        Some((&entry.key, &entry.data))
    }
}

/// A [`Dictionary`] that invokes a user-supplied teardown closure whenever a
/// value is overwritten, removed, or cleared — the Rust analog of
/// `MgDictionary`'s array-vs-scalar `delete` (spec §4.1: "specialized by
/// `ManagedDictionary` to `delete` or `delete[]`"). The base `Dictionary`'s
/// `freeNode` is a no-op; this wrapper is what callers that need extra
/// teardown (e.g. deregistering `T` from another table) reach for.
pub struct ManagedDictionary<T> {
    inner: Dictionary<T>,
    on_evict: Box<dyn FnMut(T) + Send>,
}

impl<T> ManagedDictionary<T> {
    pub fn new(on_evict: impl FnMut(T) + Send + 'static) -> Self {
        Self {
            inner: Dictionary::new(),
            on_evict: Box::new(on_evict),
        }
    }

    pub fn add(&mut self, key: &str, value: T, unique: bool) -> bool {
        match self.inner.add_returning_evicted(key, value, unique) {
            Ok(Some(old)) => {
                (self.on_evict)(old);
                true
            }
            Ok(None) => true,
            Err(_) => false,
        }
    }

    pub fn remove(&mut self, key: &str) -> bool {
        match self.inner.remove_returning_evicted(key) {
            Some(old) => {
                (self.on_evict)(old);
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        let keys: Vec<String> = {
            let mut iter_keys = Vec::with_capacity(self.inner.len());
            let it = self.inner.iter();
            for i in 0..it.length() {
                if let Some((k, _)) = it.get(i) {
                    iter_keys.push(k.to_string());
                }
            }
            iter_keys
        };
        for key in keys {
            self.remove(&key);
        }
    }

    pub fn get(&self, key: &str) -> Result<&T, DictionaryError> {
        self.inner.get(key)
    }

    #[must_use]
    pub fn find(&self, key: &str) -> Option<&T> {
        self.inner.find(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_get_remove_roundtrip() {
        let mut dict = Dictionary::new();
        assert!(dict.add("alpha", 1, false));
        assert!(dict.add("beta", 2, false));
        assert_eq!(*dict.get("alpha").unwrap(), 1);
        assert_eq!(*dict.get("beta").unwrap(), 2);
        assert!(dict.remove("alpha"));
        assert!(matches!(dict.get("alpha"), Err(DictionaryError::KeyNotFound(_))));
        assert_eq!(dict.len(), 1);
    }

    #[test]
    fn unique_refuses_overwrite() {
        let mut dict = Dictionary::new();
        assert!(dict.add("k", 1, true));
        assert!(!dict.add("k", 2, true));
        assert_eq!(*dict.get("k").unwrap(), 1);
    }

    #[test]
    fn overwrite_without_unique_replaces_value() {
        let mut dict = Dictionary::new();
        dict.add("k", 1, false);
        dict.add("k", 2, false);
        assert_eq!(*dict.get("k").unwrap(), 2);
        assert_eq!(dict.len(), 1);
    }

    #[test]
    fn handles_many_collisions_and_rehash() {
        let mut dict = Dictionary::with_capacity(4, 0.75);
        for i in 0..200 {
            let key = format!("key-{i}");
            assert!(dict.add(&key, i, false));
        }
        assert_eq!(dict.len(), 200);
        for i in 0..200 {
            let key = format!("key-{i}");
            assert_eq!(*dict.get(&key).unwrap(), i);
        }
    }

    #[test]
    fn remove_promotes_chain_and_preserves_others() {
        let mut dict = Dictionary::with_capacity(4, 1.0);
        // All of these keys hash into the small table and will collide.
        let keys: Vec<String> = (0..20).map(|i| format!("k{i}")).collect();
        for (i, k) in keys.iter().enumerate() {
            dict.add(k, i, false);
        }
        // Remove a chunk from the middle and verify survivors are intact.
        for k in &keys[5..10] {
            assert!(dict.remove(k));
        }
        for (i, k) in keys.iter().enumerate() {
            if (5..10).contains(&i) {
                assert!(dict.find(k).is_none());
            } else {
                assert_eq!(*dict.find(k).unwrap(), i);
            }
        }
    }

    #[test]
    fn iteration_visits_every_entry_exactly_once() {
        let mut dict = Dictionary::with_capacity(8, 0.75);
        for i in 0..30 {
            dict.add(&format!("k{i}"), i, false);
        }
        let mut seen = std::collections::HashSet::new();
        let mut data = dict.first();
        while let Some((k, v)) = data {
            assert!(seen.insert(k.to_string()));
            assert_eq!(k, format!("k{v}"));
            data = dict.next();
        }
        assert_eq!(seen.len(), 30);
    }

    #[test]
    fn iterator_random_access_matches_storage_order_scan() {
        let mut dict = Dictionary::with_capacity(8, 0.75);
        for i in 0..30 {
            dict.add(&format!("k{i}"), i, false);
        }
        let it = dict.iter();
        assert_eq!(it.length(), 30);
        let mut forward = Vec::new();
        for i in 0..it.length() {
            forward.push(it.get(i).unwrap().0.to_string());
        }
        let mut backward = Vec::new();
        for i in (0..it.length()).rev() {
            backward.push(it.get(i).unwrap().0.to_string());
        }
        backward.reverse();
        assert_eq!(forward, backward);
    }

    #[test]
    fn managed_dictionary_invokes_hook_on_overwrite_and_remove() {
        let evicted = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let evicted_clone = evicted.clone();
        let mut dict = ManagedDictionary::new(move |v: i32| evicted_clone.lock().unwrap().push(v));
        dict.add("k", 1, false);
        dict.add("k", 2, false);
        assert_eq!(*evicted.lock().unwrap(), vec![1]);
        dict.remove("k");
        assert_eq!(*evicted.lock().unwrap(), vec![1, 2]);
    }
}
