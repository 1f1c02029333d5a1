//! The Operator: the public API surface composing a [`ByteStore`], the
//! [`StripedLocks`] table, and the [`TtlManager`] (spec.md §2 item 6).
//! Every public method acquires the stripe lock for its key, reads the
//! current [`DataFrame`] (or treats a missing key as `DataFrame::Null`),
//! validates its type, applies the operation, and writes back within that
//! same lock.

mod bignum;
mod bitmap;
mod bloom;
mod list;
mod map;
mod primitive;
mod set;
mod timeseries;

use crate::config::{FsKind, OpenOptions};
use crate::dataframe::DataFrame;
use crate::error::{OperatorError, Result};
use crate::keycodec;
use crate::locks::StripedLocks;
use crate::store::disk::DiskStore;
use crate::store::memory::MemoryStore;
use crate::store::{ByteStore, ControlFlow};
use crate::ttl::TtlManager;
use std::sync::{Arc, Weak};
use std::time::{SystemTime, UNIX_EPOCH};

pub struct Operator {
    store: Arc<dyn ByteStore>,
    locks: StripedLocks,
    ttl: TtlManager,
}

impl Operator {
    pub fn open(options: OpenOptions) -> Result<Arc<Self>> {
        let store: Arc<dyn ByteStore> = match options.fs {
            FsKind::InMemory => Arc::new(MemoryStore::new()),
            FsKind::OnDisk => {
                let path = options.path.clone().ok_or_else(|| {
                    OperatorError::invalid("on-disk store requires OpenOptions::with_path")
                })?;
                Arc::new(DiskStore::open(
                    path,
                    options.memtable_size,
                    options.cache_size,
                    options.false_positive_rate,
                )?)
            }
        };

        let weak_store: Weak<dyn ByteStore> = Arc::downgrade(&store);
        let locks = StripedLocks::new(options.stripe_count);
        let ttl = TtlManager::start(
            options.ttl_tick,
            now_millis,
            move |key: &[u8]| {
                if let Some(store) = weak_store.upgrade() {
                    let _ = Self::purge_family(store.as_ref(), key);
                }
            },
        );

        Ok(Arc::new(Operator { store, locks, ttl }))
    }

    pub fn close(&self) -> Result<()> {
        self.store.close()
    }

    /// Installs an expiry deadline (Unix epoch millis) for `key`. Not
    /// persisted — lost across process restarts, per spec.md §4.9.
    pub fn set_ttl(&self, key: &[u8], expire_at_millis: i64) {
        self.ttl.set_ttl(key, expire_at_millis);
    }

    /// Cancels a previously installed TTL for `key`, if any.
    pub fn remove_ttl(&self, key: &[u8]) {
        self.ttl.remove_ttl(key);
    }

    pub fn ttl_of(&self, key: &[u8]) -> Option<i64> {
        self.ttl.ttl_of(key)
    }

    pub fn delete(&self, key: &[u8]) -> Result<()> {
        let _guard = self.locks.write(key);
        self.delete_family_locked(key)
    }

    /// Same as `delete`, for callers (the composite sub-engines) that
    /// already hold the write stripe for `key` and must not reenter the
    /// lock table (spec.md §4.8: stripes are not reentrant).
    fn delete_family_locked(&self, key: &[u8]) -> Result<()> {
        self.ttl.remove_ttl(key);
        Self::purge_family(self.store.as_ref(), key)
    }

    /// Deletes `key` and, if it held a composite metadata record, every
    /// child record sharing its prefix. Shared by the public `delete` and
    /// by the TTL sweep, which must not leave orphaned list/map/set/series
    /// children behind when their metadata record expires.
    fn purge_family(store: &dyn ByteStore, key: &[u8]) -> Result<()> {
        let child_prefix = match store.get(key)? {
            Some(bytes) => match DataFrame::decode(&bytes)? {
                DataFrame::ListMeta(_) => keycodec::child_prefix_for_meta_key("list:", "item:", key),
                DataFrame::MapMeta(_) => keycodec::child_prefix_for_meta_key("map:", "field:", key),
                DataFrame::SetMeta(_) => keycodec::child_prefix_for_meta_key("set:", "item:", key),
                DataFrame::TimeSeriesMeta(_) => {
                    keycodec::child_prefix_for_meta_key("ts:", "point:", key)
                }
                _ => None,
            },
            None => None,
        };
        if let Some(prefix) = child_prefix {
            let mut children = Vec::new();
            store.range_prefix(&prefix, &mut |k, _| {
                children.push(k.to_vec());
                ControlFlow::Continue
            })?;
            for child in children {
                store.delete(&child)?;
            }
        }
        store.delete(key)
    }

    fn get_raw(&self, key: &[u8]) -> Result<Option<DataFrame>> {
        match self.store.get(key)? {
            Some(bytes) => Ok(Some(DataFrame::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put_raw(&self, key: &[u8], df: &DataFrame) -> Result<()> {
        self.store.set(key, &df.encode())
    }

    /// For plain `Get*` accessors: a missing key is `NotFound`, never a
    /// synthesized default (spec.md §4.1: "Null/missing reads fail").
    fn read_existing(&self, key: &[u8]) -> Result<DataFrame> {
        self.get_raw(key)?.ok_or(OperatorError::NotFound)
    }

    /// For RMW operators: a missing key reads as `DataFrame::Null`, which
    /// every typed accessor treats as that type's zero value (spec.md §2
    /// item 6: "reads the current DataFrame, or synthesizes a null one").
    fn read_or_null(&self, key: &[u8]) -> Result<DataFrame> {
        Ok(self.get_raw(key)?.unwrap_or(DataFrame::Null))
    }

    fn collect_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut out = Vec::new();
        self.store.range_prefix(prefix, &mut |k, v| {
            out.push((k.to_vec(), v.to_vec()));
            ControlFlow::Continue
        })?;
        Ok(out)
    }
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the unix epoch")
        .as_millis() as i64
}
