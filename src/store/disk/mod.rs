//! The on-disk ByteStore backend (`FsKind::OnDisk`): a `MemTable` backed by
//! a `Wal`, flushed to immutable `SsTable` files once it's full. Reads
//! check the memtable, then every `SsTable` from newest to oldest.
//!
//! `SsTable` bodies are genuinely read from and written to disk, and a
//! size-bounded cache keeps the hottest ones resident instead of holding
//! every flushed table in memory forever.

mod bloom;
mod memtable;
mod sstable;
mod wal;

use self::memtable::MemTable;
use self::sstable::SsTable;
use self::wal::{Wal, WalEntry};
use super::{ByteStore, ControlFlow};
use crate::error::Result;
use std::collections::{BTreeMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

type Body = Arc<BTreeMap<Vec<u8>, Option<Vec<u8>>>>;

struct BodyCache {
    budget_bytes: usize,
    used_bytes: usize,
    order: VecDeque<PathBuf>,
    bodies: std::collections::HashMap<PathBuf, (usize, Body)>,
}

impl BodyCache {
    fn new(budget_bytes: usize) -> Self {
        BodyCache {
            budget_bytes,
            used_bytes: 0,
            order: VecDeque::new(),
            bodies: std::collections::HashMap::new(),
        }
    }

    fn get(&mut self, path: &Path) -> Option<Body> {
        if let Some((_, body)) = self.bodies.get(path).cloned() {
            self.touch(path);
            Some(body)
        } else {
            None
        }
    }

    fn touch(&mut self, path: &Path) {
        if let Some(pos) = self.order.iter().position(|p| p == path) {
            self.order.remove(pos);
        }
        self.order.push_back(path.to_path_buf());
    }

    fn insert(&mut self, path: PathBuf, size_bytes: u64, body: Body) {
        let size = size_bytes as usize;
        self.bodies.insert(path.clone(), (size, body));
        self.used_bytes += size;
        self.order.push_back(path);
        while self.used_bytes > self.budget_bytes {
            let Some(oldest) = self.order.pop_front() else { break };
            if let Some((evicted_size, _)) = self.bodies.remove(&oldest) {
                self.used_bytes = self.used_bytes.saturating_sub(evicted_size);
            }
        }
    }
}

pub struct DiskStore {
    dir: PathBuf,
    memtable: Mutex<MemTable>,
    wal: Wal,
    sstables: Mutex<Vec<Arc<SsTable>>>,
    cache: Mutex<BodyCache>,
    memtable_capacity: usize,
    false_positive_rate: f64,
}

impl DiskStore {
    pub fn open(
        dir: impl Into<PathBuf>,
        memtable_capacity: usize,
        cache_size: usize,
        false_positive_rate: f64,
    ) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;

        let mut sstable_paths: Vec<PathBuf> = std::fs::read_dir(&dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().and_then(|e| e.to_str()) == Some("dat"))
            .collect();
        sstable_paths.sort();
        let mut sstables = Vec::with_capacity(sstable_paths.len());
        for path in sstable_paths {
            sstables.push(Arc::new(SsTable::reopen(path)?));
        }

        let wal = Wal::open(&dir)?;
        let mut memtable = MemTable::new(memtable_capacity, false_positive_rate);
        for entry in wal.recover()? {
            match entry {
                WalEntry::Insert(key, value) => memtable.set(&key, &value),
                WalEntry::Remove(key) => memtable.remove(&key),
            }
        }

        Ok(DiskStore {
            dir,
            memtable: Mutex::new(memtable),
            wal,
            sstables: Mutex::new(sstables),
            cache: Mutex::new(BodyCache::new(cache_size)),
            memtable_capacity,
            false_positive_rate,
        })
    }

    fn load_body(&self, sst: &Arc<SsTable>) -> Result<Arc<BTreeMap<Vec<u8>, Option<Vec<u8>>>>> {
        let mut cache = self.cache.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(body) = cache.get(&sst.path) {
            return Ok(body);
        }
        let body = Arc::new(sst.load_body()?);
        cache.insert(sst.path.clone(), sst.size_bytes, Arc::clone(&body));
        Ok(body)
    }

    fn flush_memtable(&self) -> Result<()> {
        let mut memtable = self.memtable.lock().unwrap_or_else(|p| p.into_inner());
        if memtable.is_empty() {
            return Ok(());
        }
        let sst = SsTable::write(&self.dir, memtable.entries(), self.false_positive_rate)?;
        self.sstables.lock().unwrap_or_else(|p| p.into_inner()).push(Arc::new(sst));
        memtable.clear();
        self.wal.clear()?;
        Ok(())
    }
}

impl ByteStore for DiskStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        {
            let memtable = self.memtable.lock().unwrap_or_else(|p| p.into_inner());
            if let Some(found) = memtable.get(key) {
                return Ok(found.map(|v| v.to_vec()));
            }
        }
        let sstables = self.sstables.lock().unwrap_or_else(|p| p.into_inner()).clone();
        for sst in sstables.iter().rev() {
            if !sst.may_contain(key) {
                continue;
            }
            let body = self.load_body(sst)?;
            if let Some(value) = body.get(key) {
                return Ok(value.clone());
            }
        }
        Ok(None)
    }

    fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.wal.append_set(key, value)?;
        let should_flush = {
            let mut memtable = self.memtable.lock().unwrap_or_else(|p| p.into_inner());
            memtable.set(key, value);
            memtable.is_full()
        };
        if should_flush {
            self.flush_memtable()?;
        }
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        self.wal.append_remove(key)?;
        let should_flush = {
            let mut memtable = self.memtable.lock().unwrap_or_else(|p| p.into_inner());
            memtable.remove(key);
            memtable.is_full()
        };
        if should_flush {
            self.flush_memtable()?;
        }
        Ok(())
    }

    fn range_prefix(
        &self,
        prefix: &[u8],
        visit: &mut dyn FnMut(&[u8], &[u8]) -> ControlFlow,
    ) -> Result<()> {
        let mut merged: BTreeMap<Vec<u8>, Option<Vec<u8>>> = BTreeMap::new();

        let sstables = self.sstables.lock().unwrap_or_else(|p| p.into_inner()).clone();
        for sst in sstables.iter() {
            if !sst.may_overlap_prefix(prefix) {
                continue;
            }
            let body = self.load_body(sst)?;
            for (key, value) in body.iter() {
                if key.starts_with(prefix) {
                    merged.insert(key.clone(), value.clone());
                }
            }
        }
        {
            let memtable = self.memtable.lock().unwrap_or_else(|p| p.into_inner());
            for (key, value) in memtable.entries() {
                if key.starts_with(prefix) {
                    merged.insert(key.clone(), value.clone());
                }
            }
        }

        for (key, value) in merged.iter() {
            if let Some(value) = value {
                if visit(key, value) == ControlFlow::Stop {
                    break;
                }
            }
        }
        Ok(())
    }

    fn close(&self) -> Result<()> {
        self.flush_memtable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(label: &str) -> PathBuf {
        std::env::temp_dir().join(format!("opkv-diskstore-test-{label}-{}", std::process::id()))
    }

    #[test]
    fn set_get_delete_round_trip() {
        let dir = temp_dir("roundtrip");
        let store = DiskStore::open(&dir, 4096, 4096, 0.01).unwrap();
        store.set(b"a", b"1").unwrap();
        assert_eq!(store.get(b"a").unwrap(), Some(b"1".to_vec()));
        store.delete(b"a").unwrap();
        assert_eq!(store.get(b"a").unwrap(), None);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn flush_then_reopen_recovers_data() {
        let dir = temp_dir("reopen");
        {
            let store = DiskStore::open(&dir, 16, 4096, 0.01).unwrap();
            for i in 0..20u8 {
                store.set(&[b'k', i], &[b'v', i]).unwrap();
            }
            store.close().unwrap();
        }
        let reopened = DiskStore::open(&dir, 16, 4096, 0.01).unwrap();
        assert_eq!(reopened.get(&[b'k', 5]).unwrap(), Some(vec![b'v', 5]));
        assert_eq!(reopened.get(&[b'k', 19]).unwrap(), Some(vec![b'v', 19]));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn range_prefix_merges_across_flushed_and_live_entries() {
        let dir = temp_dir("range");
        let store = DiskStore::open(&dir, 16, 4096, 0.01).unwrap();
        store.set(b"list:a:item:1", b"x").unwrap();
        store.set(b"list:a:item:2", b"y").unwrap();
        store.set(b"list:a:item:3", b"z").unwrap();
        store.flush_memtable().unwrap();
        store.set(b"list:a:item:4", b"w").unwrap();
        store.delete(b"list:a:item:2").unwrap();

        let mut seen = Vec::new();
        store
            .range_prefix(b"list:a:item:", &mut |k, v| {
                seen.push((k.to_vec(), v.to_vec()));
                ControlFlow::Continue
            })
            .unwrap();
        assert_eq!(
            seen,
            vec![
                (b"list:a:item:1".to_vec(), b"x".to_vec()),
                (b"list:a:item:3".to_vec(), b"z".to_vec()),
                (b"list:a:item:4".to_vec(), b"w".to_vec()),
            ]
        );
        std::fs::remove_dir_all(&dir).ok();
    }
}
