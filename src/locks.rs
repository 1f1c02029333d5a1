//! Striped reader-writer locking for per-key read-modify-write sections
//! (spec.md §6.1). A fixed power-of-two array of `RwLock<()>` stands in for
//! a single global lock: concurrent operations on keys that hash to
//! different stripes never block each other, while two operations on the
//! same key (or a key-prefix-sharing family, e.g. a list and its items)
//! serialize through the same stripe.

use rustc_hash::FxHasher;
use std::hash::{Hash, Hasher};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

pub struct StripedLocks {
    stripes: Vec<RwLock<()>>,
    mask: usize,
}

impl StripedLocks {
    /// `count` must be a power of two; `OpenOptions::with_stripe_count`
    /// already enforces this before it reaches here.
    pub fn new(count: usize) -> Self {
        debug_assert!(count.is_power_of_two());
        let stripes = (0..count).map(|_| RwLock::new(())).collect();
        StripedLocks {
            stripes,
            mask: count - 1,
        }
    }

    fn stripe_index(&self, key: &[u8]) -> usize {
        let mut hasher = FxHasher::default();
        key.hash(&mut hasher);
        (hasher.finish() as usize) & self.mask
    }

    /// Exclusive lock for the stripe that `key` hashes to. Held across a
    /// full read-modify-write so concurrent writers to the same key never
    /// interleave.
    pub fn write(&self, key: &[u8]) -> RwLockWriteGuard<'_, ()> {
        let idx = self.stripe_index(key);
        self.stripes[idx].write().unwrap_or_else(|poison| poison.into_inner())
    }

    /// Shared lock for the stripe that `key` hashes to, for read-only
    /// operations that still need to be ordered against concurrent writers.
    pub fn read(&self, key: &[u8]) -> RwLockReadGuard<'_, ()> {
        let idx = self.stripe_index(key);
        self.stripes[idx].read().unwrap_or_else(|poison| poison.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_key_maps_to_same_stripe() {
        let locks = StripedLocks::new(16);
        assert_eq!(locks.stripe_index(b"alpha"), locks.stripe_index(b"alpha"));
    }

    #[test]
    fn stripe_index_is_in_range() {
        let locks = StripedLocks::new(8);
        for key in [b"a" as &[u8], b"bb", b"ccc", b"dddd", b"eeeee"] {
            assert!(locks.stripe_index(key) < 8);
        }
    }

    #[test]
    fn write_lock_excludes_concurrent_write_on_same_stripe() {
        let locks = StripedLocks::new(1);
        let _guard = locks.write(b"x");
        assert!(locks.stripes[0].try_write().is_err());
    }
}
