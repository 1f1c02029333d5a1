//! Write-ahead log. Framing is `entry_len : u32 LE`, `kind : u8`,
//! `key_len : u32 LE`, `value_len : u32 LE`, key bytes, value bytes;
//! `Remove` entries carry no value bytes at all, so recovery can
//! reconstruct tombstones rather than just deletions against a plain map.

use crate::error::Result;
use std::fs::{File, OpenOptions as FsOpenOptions};
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub const WAL_FILE_NAME: &str = "opkv_wal.bin";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryKind {
    Insert = 1,
    Remove = 2,
}

impl EntryKind {
    fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(EntryKind::Insert),
            2 => Some(EntryKind::Remove),
            _ => None,
        }
    }
}

pub enum WalEntry {
    Insert(Vec<u8>, Vec<u8>),
    Remove(Vec<u8>),
}

pub struct Wal {
    file: Mutex<File>,
    path: PathBuf,
}

impl Wal {
    pub fn open(dir: &Path) -> Result<Self> {
        let path = dir.join(WAL_FILE_NAME);
        let file = FsOpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(&path)?;
        Ok(Wal {
            file: Mutex::new(file),
            path,
        })
    }

    pub fn append_set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.append(EntryKind::Insert, key, Some(value))
    }

    pub fn append_remove(&self, key: &[u8]) -> Result<()> {
        self.append(EntryKind::Remove, key, None)
    }

    fn append(&self, kind: EntryKind, key: &[u8], value: Option<&[u8]>) -> Result<()> {
        let value_len = value.map_or(0, |v| v.len());
        let entry_len = 1 + 4 + 4 + key.len() + value_len;
        let mut buf = Vec::with_capacity(4 + entry_len);
        buf.extend_from_slice(&(entry_len as u32).to_le_bytes());
        buf.push(kind as u8);
        buf.extend_from_slice(&(key.len() as u32).to_le_bytes());
        buf.extend_from_slice(&(value_len as u32).to_le_bytes());
        buf.extend_from_slice(key);
        if let Some(v) = value {
            buf.extend_from_slice(v);
        }
        let mut file = self.file.lock().unwrap_or_else(|p| p.into_inner());
        file.write_all(&buf)?;
        file.flush()?;
        Ok(())
    }

    /// Replays every entry recorded so far, in write order.
    pub fn recover(&self) -> Result<Vec<WalEntry>> {
        let file = File::open(&self.path)?;
        let mut reader = BufReader::new(file);
        let mut entries = Vec::new();
        loop {
            let mut len_buf = [0u8; 4];
            if reader.read_exact(&mut len_buf).is_err() {
                break;
            }
            let entry_len = u32::from_le_bytes(len_buf) as usize;
            let mut body = vec![0u8; entry_len];
            if reader.read_exact(&mut body).is_err() {
                break;
            }
            let Some(kind) = EntryKind::from_u8(body[0]) else {
                break;
            };
            let key_len = u32::from_le_bytes(body[1..5].try_into().unwrap()) as usize;
            let value_len = u32::from_le_bytes(body[5..9].try_into().unwrap()) as usize;
            if body.len() < 9 + key_len + value_len {
                break;
            }
            let key = body[9..9 + key_len].to_vec();
            match kind {
                EntryKind::Insert => {
                    let value = body[9 + key_len..9 + key_len + value_len].to_vec();
                    entries.push(WalEntry::Insert(key, value));
                }
                EntryKind::Remove => entries.push(WalEntry::Remove(key)),
            }
        }
        Ok(entries)
    }

    /// Truncates the log, called right after a memtable flush makes its
    /// entries redundant.
    pub fn clear(&self) -> Result<()> {
        let mut file = self.file.lock().unwrap_or_else(|p| p.into_inner());
        *file = FsOpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .read(true)
            .open(&self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_and_recover_round_trips_inserts_and_removes() {
        let dir = std::env::temp_dir().join(format!("opkv-wal-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let wal = Wal::open(&dir).unwrap();
        wal.append_set(b"a", b"1").unwrap();
        wal.append_set(b"b", b"2").unwrap();
        wal.append_remove(b"a").unwrap();

        let entries = wal.recover().unwrap();
        assert_eq!(entries.len(), 3);
        match &entries[0] {
            WalEntry::Insert(k, v) => assert_eq!((k.as_slice(), v.as_slice()), (b"a".as_slice(), b"1".as_slice())),
            _ => panic!("expected insert"),
        }
        match &entries[2] {
            WalEntry::Remove(k) => assert_eq!(k.as_slice(), b"a".as_slice()),
            _ => panic!("expected remove"),
        }
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn clear_truncates_the_log() {
        let dir = std::env::temp_dir().join(format!("opkv-wal-test-clear-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let wal = Wal::open(&dir).unwrap();
        wal.append_set(b"a", b"1").unwrap();
        wal.clear().unwrap();
        assert!(wal.recover().unwrap().is_empty());
        std::fs::remove_dir_all(&dir).ok();
    }
}
