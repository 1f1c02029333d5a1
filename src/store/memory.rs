//! The in-memory ByteStore backend (`FsKind::InMemory`). No WAL, no
//! SSTables — just a `BTreeMap` behind a single `RwLock`, kept around as
//! the store of record for tests and for callers who explicitly don't want
//! persistence.

use super::{ByteStore, ControlFlow};
use crate::error::Result;
use std::collections::BTreeMap;
use std::sync::RwLock;

pub struct MemoryStore {
    entries: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            entries: RwLock::new(BTreeMap::new()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ByteStore for MemoryStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let entries = self.entries.read().unwrap_or_else(|p| p.into_inner());
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let mut entries = self.entries.write().unwrap_or_else(|p| p.into_inner());
        entries.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        let mut entries = self.entries.write().unwrap_or_else(|p| p.into_inner());
        entries.remove(key);
        Ok(())
    }

    fn range_prefix(
        &self,
        prefix: &[u8],
        visit: &mut dyn FnMut(&[u8], &[u8]) -> ControlFlow,
    ) -> Result<()> {
        let entries = self.entries.read().unwrap_or_else(|p| p.into_inner());
        for (key, value) in entries.range(prefix.to_vec()..) {
            if !key.starts_with(prefix) {
                break;
            }
            if visit(key, value) == ControlFlow::Stop {
                break;
            }
        }
        Ok(())
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_delete_round_trip() {
        let store = MemoryStore::new();
        store.set(b"a", b"1").unwrap();
        assert_eq!(store.get(b"a").unwrap(), Some(b"1".to_vec()));
        store.delete(b"a").unwrap();
        assert_eq!(store.get(b"a").unwrap(), None);
    }

    #[test]
    fn range_prefix_visits_in_order_and_stops_at_prefix_boundary() {
        let store = MemoryStore::new();
        store.set(b"list:a:item:1", b"x").unwrap();
        store.set(b"list:a:item:2", b"y").unwrap();
        store.set(b"list:b:item:1", b"z").unwrap();

        let mut seen = Vec::new();
        store
            .range_prefix(b"list:a:item:", &mut |k, _| {
                seen.push(k.to_vec());
                ControlFlow::Continue
            })
            .unwrap();
        assert_eq!(seen, vec![b"list:a:item:1".to_vec(), b"list:a:item:2".to_vec()]);
    }

    #[test]
    fn range_prefix_honors_early_stop() {
        let store = MemoryStore::new();
        store.set(b"set:a:item:1", b"x").unwrap();
        store.set(b"set:a:item:2", b"y").unwrap();

        let mut visited = 0;
        store
            .range_prefix(b"set:a:item:", &mut |_, _| {
                visited += 1;
                ControlFlow::Stop
            })
            .unwrap();
        assert_eq!(visited, 1);
    }
}
