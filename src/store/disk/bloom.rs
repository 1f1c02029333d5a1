//! A Bloom filter over raw byte keys, used to let the disk store skip an
//! SSTable's body entirely when a key provably isn't in it. A bit-vec
//! buffer plus seeded `DefaultHasher` digests, operating on `&[u8]`
//! directly and serialized alongside the SSTable file it guards.

use bit_vec::BitVec;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

#[derive(Debug, Clone)]
pub struct BloomFilter {
    bits: BitVec,
    num_hashes: usize,
}

impl BloomFilter {
    pub fn new(num_elements: usize, false_positive_rate: f64) -> Self {
        let num_elements = num_elements.max(1);
        let num_bits = Self::calculate_num_bits(num_elements, false_positive_rate).max(8);
        let num_hashes = Self::calculate_num_hashes(num_bits, num_elements).max(1);
        BloomFilter {
            bits: BitVec::from_elem(num_bits, false),
            num_hashes,
        }
    }

    pub fn set(&mut self, key: &[u8]) {
        let len = self.bits.len() as u64;
        for i in 0..self.num_hashes {
            let index = (Self::calculate_hash(key, i) % len) as usize;
            self.bits.set(index, true);
        }
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        let len = self.bits.len() as u64;
        for i in 0..self.num_hashes {
            let index = (Self::calculate_hash(key, i) % len) as usize;
            if !self.bits[index] {
                return false;
            }
        }
        true
    }

    fn calculate_hash(key: &[u8], seed: usize) -> u64 {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        hasher.write_usize(seed);
        hasher.finish()
    }

    fn calculate_num_bits(num_elements: usize, false_positive_rate: f64) -> usize {
        let num_bits_float =
            (-((num_elements as f64) * false_positive_rate.ln()) / (2.0_f64.ln().powi(2))).ceil();
        num_bits_float as usize
    }

    fn calculate_num_hashes(num_bits: usize, num_elements: usize) -> usize {
        let num_hashes_float = (num_bits as f64 / num_elements as f64) * 2.0_f64.ln();
        num_hashes_float.ceil() as usize
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&(self.bits.len() as u32).to_be_bytes());
        out.extend_from_slice(&(self.num_hashes as u32).to_be_bytes());
        out.extend_from_slice(&self.bits.to_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        let num_bits = u32::from_be_bytes(bytes[0..4].try_into().unwrap()) as usize;
        let num_hashes = u32::from_be_bytes(bytes[4..8].try_into().unwrap()) as usize;
        let mut bits = BitVec::from_bytes(&bytes[8..]);
        bits.truncate(num_bits);
        BloomFilter { bits, num_hashes }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_is_true_for_inserted_keys() {
        let mut filter = BloomFilter::new(100, 0.01);
        filter.set(b"hello");
        filter.set(b"world");
        assert!(filter.contains(b"hello"));
        assert!(filter.contains(b"world"));
    }

    #[test]
    fn serialization_round_trips() {
        let mut filter = BloomFilter::new(50, 0.01);
        filter.set(b"a");
        filter.set(b"b");
        let bytes = filter.to_bytes();
        let restored = BloomFilter::from_bytes(&bytes);
        assert!(restored.contains(b"a"));
        assert!(restored.contains(b"b"));
        assert!(!restored.contains(b"definitely-not-present-xyz"));
    }
}
