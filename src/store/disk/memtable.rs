//! The in-memory write buffer of the disk store. A removal is recorded as
//! a tombstone (`None`) rather than deleted outright, so a later
//! `range_prefix` merge across flushed SSTables can tell "deleted" apart
//! from "never set".

use super::bloom::BloomFilter;
use std::collections::BTreeMap;

pub struct MemTable {
    entries: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
    size: usize,
    capacity: usize,
    bloom_filter: BloomFilter,
    false_positive_rate: f64,
}

impl MemTable {
    pub fn new(capacity: usize, false_positive_rate: f64) -> Self {
        MemTable {
            entries: BTreeMap::new(),
            size: 0,
            capacity,
            bloom_filter: BloomFilter::new(estimated_entries(capacity), false_positive_rate),
            false_positive_rate,
        }
    }

    pub fn set(&mut self, key: &[u8], value: &[u8]) {
        self.put(key, Some(value.to_vec()));
    }

    pub fn remove(&mut self, key: &[u8]) {
        self.put(key, None);
    }

    fn put(&mut self, key: &[u8], value: Option<Vec<u8>>) {
        let added = key.len() + value.as_ref().map_or(0, |v| v.len());
        if let Some(old) = self.entries.insert(key.to_vec(), value) {
            self.size = self.size.saturating_sub(key.len() + old.map_or(0, |v| v.len()));
        }
        self.size += added;
        self.bloom_filter.set(key);
    }

    /// `None` means "definitely not present in this memtable" (bloom
    /// filter says so); `Some(None)` is a tombstone; `Some(Some(v))` a
    /// live value.
    pub fn get(&self, key: &[u8]) -> Option<Option<&[u8]>> {
        if !self.bloom_filter.contains(key) {
            return None;
        }
        self.entries.get(key).map(|v| v.as_deref())
    }

    pub fn is_full(&self) -> bool {
        self.size >= self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &BTreeMap<Vec<u8>, Option<Vec<u8>>> {
        &self.entries
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.size = 0;
        self.bloom_filter = BloomFilter::new(estimated_entries(self.capacity), self.false_positive_rate);
    }
}

fn estimated_entries(capacity_bytes: usize) -> usize {
    // A rough guess of average record size; only affects the bloom filter's
    // false-positive tuning, never correctness.
    (capacity_bytes / 64).max(16)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get_returns_live_value() {
        let mut table = MemTable::new(1024, 0.01);
        table.set(b"a", b"1");
        assert_eq!(table.get(b"a"), Some(Some(&b"1"[..])));
    }

    #[test]
    fn remove_leaves_a_tombstone() {
        let mut table = MemTable::new(1024, 0.01);
        table.set(b"a", b"1");
        table.remove(b"a");
        assert_eq!(table.get(b"a"), Some(None));
    }

    #[test]
    fn unknown_key_is_none() {
        let table = MemTable::new(1024, 0.01);
        assert_eq!(table.get(b"missing"), None);
    }

    #[test]
    fn becomes_full_past_capacity() {
        let mut table = MemTable::new(8, 0.01);
        assert!(!table.is_full());
        table.set(b"abcdefgh", b"abcdefgh");
        assert!(table.is_full());
    }
}
