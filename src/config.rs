//! Open-time configuration for the Operator and its ByteStore (spec.md §6.2).
//!
//! Kept as an immutable struct assembled through consuming `with_*` calls
//! rather than a mutable chained builder — see the REDESIGN FLAG in
//! spec.md §9 about receiver-style fluent builders.

use std::path::PathBuf;

/// The unit of measurement for capacity and size, carried over from the
/// teacher's `SizeUnit` (used there for `MemTable` capacity).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeUnit {
    Bytes,
    Kilobytes,
    Megabytes,
    Gigabytes,
}

impl SizeUnit {
    pub const fn to_bytes(self, value: usize) -> usize {
        match self {
            SizeUnit::Bytes => value,
            SizeUnit::Kilobytes => value * 1024,
            SizeUnit::Megabytes => value * 1024 * 1024,
            SizeUnit::Gigabytes => value * 1024 * 1024 * 1024,
        }
    }
}

/// Which ByteStore backend to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsKind {
    OnDisk,
    InMemory,
}

pub const DEFAULT_MEMTABLE_CAPACITY: usize = SizeUnit::Megabytes.to_bytes(64);
pub const DEFAULT_CACHE_SIZE: usize = SizeUnit::Megabytes.to_bytes(32);
pub const DEFAULT_BYTES_PER_SYNC: usize = SizeUnit::Megabytes.to_bytes(1);
pub const DEFAULT_FALSE_POSITIVE_RATE: f64 = 0.0001;
pub const DEFAULT_STRIPE_COUNT: usize = 256;
pub const DEFAULT_TTL_TICK_MS: u64 = 100;

/// Open-time configuration, spec.md §6.2.
#[derive(Debug, Clone)]
pub struct OpenOptions {
    pub path: Option<PathBuf>,
    pub fs: FsKind,
    pub cache_size: usize,
    pub memtable_size: usize,
    pub bytes_per_sync: usize,
    pub false_positive_rate: f64,
    pub stripe_count: usize,
    pub ttl_tick: std::time::Duration,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            path: None,
            fs: FsKind::InMemory,
            cache_size: DEFAULT_CACHE_SIZE,
            memtable_size: DEFAULT_MEMTABLE_CAPACITY,
            bytes_per_sync: DEFAULT_BYTES_PER_SYNC,
            false_positive_rate: DEFAULT_FALSE_POSITIVE_RATE,
            stripe_count: DEFAULT_STRIPE_COUNT,
            ttl_tick: std::time::Duration::from_millis(DEFAULT_TTL_TICK_MS),
        }
    }
}

impl OpenOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens an on-disk store rooted at `path`.
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self.fs = FsKind::OnDisk;
        self
    }

    pub fn with_fs(mut self, fs: FsKind) -> Self {
        self.fs = fs;
        self
    }

    pub fn with_cache_size(mut self, size_unit: SizeUnit, value: usize) -> Self {
        self.cache_size = size_unit.to_bytes(value);
        self
    }

    pub fn with_memtable_size(mut self, size_unit: SizeUnit, value: usize) -> Self {
        self.memtable_size = size_unit.to_bytes(value);
        self
    }

    pub fn with_bytes_per_sync(mut self, size_unit: SizeUnit, value: usize) -> Self {
        self.bytes_per_sync = size_unit.to_bytes(value);
        self
    }

    pub fn with_false_positive_rate(mut self, rate: f64) -> Self {
        self.false_positive_rate = rate;
        self
    }

    pub fn with_stripe_count(mut self, count: usize) -> Self {
        assert!(count.is_power_of_two(), "stripe count must be a power of two");
        self.stripe_count = count;
        self
    }

    pub fn with_ttl_tick(mut self, interval: std::time::Duration) -> Self {
        self.ttl_tick = interval;
        self
    }
}
