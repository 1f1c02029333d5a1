//! The bloom-filter sub-engine (spec.md §4.7). Unlike the other composites
//! there is only ever one record: `BloomMeta` carries the bit buffer
//! inline, so every operation is a single read-modify-write on
//! `keycodec::bloom_meta(name)` — no child prefix to manage.
//!
//! Membership hashing resolves the Open Question in spec.md §9 ("any
//! double-hashing scheme... is acceptable, provided the same family is
//! used for add and contains across process restarts") with Kirsch-Mitzenmacher
//! double hashing: two independent 64-bit `SipHash` digests (fixed, distinct
//! keys baked into this module, not process-local) combined linearly per
//! slot, `h_i = h1 + i * h2 mod num_bits`.

use super::Operator;
use crate::dataframe::{BloomMeta, DataFrame};
use crate::error::{OperatorError, Result};
use crate::keycodec;
use std::hash::{Hash, Hasher};

pub const DEFAULT_BLOOM_BITS: u64 = 8192;
const DEFAULT_BLOOM_HASHES: u32 = 4;

// Fixed, distinct keys: stable across restarts, not a security boundary
// (spec.md §9's stripe-hash note applies here too).
const SIP_KEY_1: (u64, u64) = (0x9E3779B97F4A7C15, 0xBF58476D1CE4E5B9);
const SIP_KEY_2: (u64, u64) = (0x94D049BB133111EB, 0x2545F4914F6CDD1D);

fn siphash(key: (u64, u64), bytes: &[u8]) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    key.0.hash(&mut hasher);
    key.1.hash(&mut hasher);
    bytes.hash(&mut hasher);
    hasher.finish()
}

fn slot_indices(meta: &BloomMeta, bytes: &[u8]) -> Vec<u64> {
    let h1 = siphash(SIP_KEY_1, bytes);
    let h2 = siphash(SIP_KEY_2, bytes);
    (0..meta.num_hashes as u64)
        .map(|i| h1.wrapping_add(i.wrapping_mul(h2)) % meta.num_bits)
        .collect()
}

impl Operator {
    /// `num_bits == 0` uses `DEFAULT_BLOOM_BITS`, per spec.md §4.7.
    pub fn create_bloom_filter(&self, name: &str, num_bits: u64) -> Result<()> {
        let key = keycodec::bloom_meta(name);
        let _guard = self.locks.write(&key);
        if self.get_raw(&key)?.is_some() {
            return Err(OperatorError::AlreadyExists);
        }
        let num_bits = if num_bits == 0 { DEFAULT_BLOOM_BITS } else { num_bits };
        let meta = BloomMeta::new(num_bits, DEFAULT_BLOOM_HASHES);
        self.put_raw(&key, &DataFrame::BloomMeta(meta))
    }

    pub fn delete_bloom_filter(&self, name: &str) -> Result<()> {
        let key = keycodec::bloom_meta(name);
        let _guard = self.locks.write(&key);
        self.delete_family_locked(&key)
    }

    /// Never produces a false negative: every bit the item hashes to is
    /// set before returning (spec.md §8 property 6).
    pub fn bloom_filter_add(&self, name: &str, item: &DataFrame) -> Result<()> {
        let key = keycodec::bloom_meta(name);
        let _guard = self.locks.write(&key);
        let mut meta = self.read_bloom_meta(&key)?;
        let bytes = item.encode();
        let indices = slot_indices(&meta, &bytes);
        let was_member = indices.iter().all(|&i| meta.get_bit(i));
        for i in indices {
            meta.set_bit(i);
        }
        if !was_member {
            meta.population += 1;
        }
        self.put_raw(&key, &DataFrame::BloomMeta(meta))
    }

    pub fn bloom_filter_contains(&self, name: &str, item: &DataFrame) -> Result<bool> {
        let key = keycodec::bloom_meta(name);
        let _guard = self.locks.read(&key);
        let meta = self.read_bloom_meta(&key)?;
        let bytes = item.encode();
        Ok(slot_indices(&meta, &bytes).iter().all(|&i| meta.get_bit(i)))
    }

    /// Advisory only (spec.md §4.7): counts `Add` calls that set at least
    /// one previously-unset bit, not true membership cardinality.
    pub fn bloom_filter_count(&self, name: &str) -> Result<u64> {
        let key = keycodec::bloom_meta(name);
        let _guard = self.locks.read(&key);
        Ok(self.read_bloom_meta(&key)?.population)
    }

    pub fn bloom_filter_clear(&self, name: &str) -> Result<()> {
        let key = keycodec::bloom_meta(name);
        let _guard = self.locks.write(&key);
        let mut meta = self.read_bloom_meta(&key)?;
        meta.clear();
        self.put_raw(&key, &DataFrame::BloomMeta(meta))
    }

    fn read_bloom_meta(&self, meta_key: &[u8]) -> Result<BloomMeta> {
        match self.get_raw(meta_key)? {
            Some(DataFrame::BloomMeta(m)) => Ok(m),
            Some(DataFrame::Null) | None => Ok(BloomMeta::new(DEFAULT_BLOOM_BITS, DEFAULT_BLOOM_HASHES)),
            _ => Err(OperatorError::TypeMismatch),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OpenOptions;

    fn operator() -> std::sync::Arc<Operator> {
        Operator::open(OpenOptions::new()).unwrap()
    }

    #[test]
    fn s6_no_false_negatives_across_a_hundred_items() {
        let op = operator();
        op.create_bloom_filter("b", 1024).unwrap();
        for i in 0..100i64 {
            op.bloom_filter_add("b", &DataFrame::Int(i)).unwrap();
        }
        for i in 0..100i64 {
            assert!(op.bloom_filter_contains("b", &DataFrame::Int(i)).unwrap());
        }
    }

    #[test]
    fn default_bit_count_used_when_zero_requested() {
        let op = operator();
        op.create_bloom_filter("b", 0).unwrap();
        op.bloom_filter_add("b", &DataFrame::Str("x".into())).unwrap();
        assert!(op.bloom_filter_contains("b", &DataFrame::Str("x".into())).unwrap());
    }

    #[test]
    fn clear_resets_membership_and_population() {
        let op = operator();
        op.create_bloom_filter("b", 1024).unwrap();
        op.bloom_filter_add("b", &DataFrame::Int(1)).unwrap();
        op.bloom_filter_clear("b").unwrap();
        assert_eq!(op.bloom_filter_count("b").unwrap(), 0);
        assert!(!op.bloom_filter_contains("b", &DataFrame::Int(1)).unwrap());
    }
}
