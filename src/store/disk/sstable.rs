//! On-disk sorted string tables. `write` serializes a sorted run to disk,
//! and `load_body` reads it back, guarded by a bloom filter and min/max key
//! range so callers can skip tables that can't possibly hold a key.

use super::bloom::BloomFilter;
use crate::error::Result;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

pub struct SsTable {
    pub path: PathBuf,
    bloom_path: PathBuf,
    pub min_key: Vec<u8>,
    pub max_key: Vec<u8>,
    pub size_bytes: u64,
    bloom: BloomFilter,
}

impl SsTable {
    /// Serializes `entries` (already sorted, as produced by a flushed
    /// memtable) into a new data file plus bloom-filter sidecar under `dir`.
    pub fn write(
        dir: &Path,
        entries: &BTreeMap<Vec<u8>, Option<Vec<u8>>>,
        false_positive_rate: f64,
    ) -> Result<SsTable> {
        debug_assert!(!entries.is_empty());
        let id = generate_id();
        let path = dir.join(format!("sstable_{id}.dat"));
        let bloom_path = dir.join(format!("sstable_{id}.bloom"));

        let mut bloom = BloomFilter::new(entries.len(), false_positive_rate);
        let file = File::create(&path)?;
        let mut writer = BufWriter::new(file);
        for (key, value) in entries {
            bloom.set(key);
            write_record(&mut writer, key, value.as_deref())?;
        }
        writer.flush()?;

        let mut bloom_file = File::create(&bloom_path)?;
        bloom_file.write_all(&bloom.to_bytes())?;

        let size_bytes = std::fs::metadata(&path)?.len();
        let min_key = entries.keys().next().cloned().unwrap_or_default();
        let max_key = entries.keys().next_back().cloned().unwrap_or_default();

        Ok(SsTable {
            path,
            bloom_path,
            min_key,
            max_key,
            size_bytes,
            bloom,
        })
    }

    /// Re-derives an `SsTable` handle for a data file left over from a
    /// previous process, used during `DiskStore::open` recovery.
    pub fn reopen(path: PathBuf) -> Result<SsTable> {
        let bloom_path = path.with_extension("bloom");
        let bloom_bytes = std::fs::read(&bloom_path)?;
        let bloom = BloomFilter::from_bytes(&bloom_bytes);
        let body = Self::read_body(&path)?;
        let size_bytes = std::fs::metadata(&path)?.len();
        let min_key = body.keys().next().cloned().unwrap_or_default();
        let max_key = body.keys().next_back().cloned().unwrap_or_default();
        Ok(SsTable {
            path,
            bloom_path,
            min_key,
            max_key,
            size_bytes,
            bloom,
        })
    }

    /// Whether `key` could plausibly be present, without touching disk.
    pub fn may_contain(&self, key: &[u8]) -> bool {
        if key < self.min_key.as_slice() || key > self.max_key.as_slice() {
            return false;
        }
        self.bloom.contains(key)
    }

    /// Whether any key under `prefix` could fall within this table's range.
    pub fn may_overlap_prefix(&self, prefix: &[u8]) -> bool {
        if self.max_key.as_slice() < prefix {
            return false;
        }
        match upper_bound(prefix) {
            Some(bound) => self.min_key.as_slice() < bound.as_slice(),
            None => true,
        }
    }

    pub fn load_body(&self) -> Result<BTreeMap<Vec<u8>, Option<Vec<u8>>>> {
        Self::read_body(&self.path)
    }

    fn read_body(path: &Path) -> Result<BTreeMap<Vec<u8>, Option<Vec<u8>>>> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        let mut entries = BTreeMap::new();
        loop {
            match read_record(&mut reader)? {
                Some((key, value)) => {
                    entries.insert(key, value);
                }
                None => break,
            }
        }
        Ok(entries)
    }

    pub fn delete_files(&self) -> Result<()> {
        std::fs::remove_file(&self.path).ok();
        std::fs::remove_file(&self.bloom_path).ok();
        Ok(())
    }
}

fn upper_bound(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut bound = prefix.to_vec();
    for i in (0..bound.len()).rev() {
        if bound[i] != 0xff {
            bound[i] += 1;
            bound.truncate(i + 1);
            return Some(bound);
        }
    }
    None
}

fn write_record(writer: &mut impl Write, key: &[u8], value: Option<&[u8]>) -> Result<()> {
    writer.write_all(&(key.len() as u32).to_be_bytes())?;
    writer.write_all(&[value.is_none() as u8])?;
    writer.write_all(&(value.map_or(0, |v| v.len()) as u32).to_be_bytes())?;
    writer.write_all(key)?;
    if let Some(v) = value {
        writer.write_all(v)?;
    }
    Ok(())
}

fn read_record(reader: &mut impl Read) -> Result<Option<(Vec<u8>, Option<Vec<u8>>)>> {
    let mut key_len_buf = [0u8; 4];
    if reader.read_exact(&mut key_len_buf).is_err() {
        return Ok(None);
    }
    let key_len = u32::from_be_bytes(key_len_buf) as usize;
    let mut tombstone_buf = [0u8; 1];
    reader.read_exact(&mut tombstone_buf)?;
    let tombstone = tombstone_buf[0] != 0;
    let mut value_len_buf = [0u8; 4];
    reader.read_exact(&mut value_len_buf)?;
    let value_len = u32::from_be_bytes(value_len_buf) as usize;
    let mut key = vec![0u8; key_len];
    reader.read_exact(&mut key)?;
    let value = if tombstone {
        None
    } else {
        let mut value = vec![0u8; value_len];
        reader.read_exact(&mut value)?;
        Some(value)
    };
    Ok(Some((key, value)))
}

fn generate_id() -> u128 {
    static COUNTER: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(0);
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the unix epoch")
        .as_nanos();
    let seq = COUNTER.fetch_add(1, std::sync::atomic::Ordering::Relaxed) as u128;
    (nanos << 16) | seq
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(label: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("opkv-sst-test-{label}-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn write_then_load_body_round_trips() {
        let dir = temp_dir("roundtrip");
        let mut entries = BTreeMap::new();
        entries.insert(b"a".to_vec(), Some(b"1".to_vec()));
        entries.insert(b"b".to_vec(), None);
        entries.insert(b"c".to_vec(), Some(b"3".to_vec()));

        let sst = SsTable::write(&dir, &entries, 0.01).unwrap();
        let loaded = sst.load_body().unwrap();
        assert_eq!(loaded, entries);
        assert_eq!(sst.min_key, b"a".to_vec());
        assert_eq!(sst.max_key, b"c".to_vec());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn may_contain_rejects_out_of_range_keys() {
        let dir = temp_dir("range");
        let mut entries = BTreeMap::new();
        entries.insert(b"m".to_vec(), Some(b"1".to_vec()));
        let sst = SsTable::write(&dir, &entries, 0.01).unwrap();
        assert!(!sst.may_contain(b"a"));
        assert!(!sst.may_contain(b"z"));
        assert!(sst.may_contain(b"m"));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn reopen_recovers_same_body() {
        let dir = temp_dir("reopen");
        let mut entries = BTreeMap::new();
        entries.insert(b"x".to_vec(), Some(b"1".to_vec()));
        let sst = SsTable::write(&dir, &entries, 0.01).unwrap();
        let reopened = SsTable::reopen(sst.path.clone()).unwrap();
        assert_eq!(reopened.load_body().unwrap(), entries);
        std::fs::remove_dir_all(&dir).ok();
    }
}
