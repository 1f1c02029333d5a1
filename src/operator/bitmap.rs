//! Bitmap32/Bitmap64 set algebra (SPEC_FULL.md §4.2 ADD — spec.md §1 names
//! "bitmap set algebra" in scope without enumerating operations). Grounded
//! on the `roaring` crate's `RoaringBitmap`/`RoaringTreemap`, which already
//! implement the needed `BitOr`/`BitAnd`/`BitXor`/`Sub` set operators.

use super::Operator;
use crate::dataframe::DataFrame;
use crate::error::{OperatorError, Result};
use roaring::{RoaringBitmap, RoaringTreemap};

impl Operator {
    // --- Bitmap32 ---

    pub fn bitmap32_add(&self, key: &[u8], value: u32) -> Result<bool> {
        let _guard = self.locks.write(key);
        let mut bm = self.read_bitmap32_or_empty(key)?;
        let inserted = bm.insert(value);
        self.put_raw(key, &DataFrame::Bitmap32(bm))?;
        Ok(inserted)
    }

    pub fn bitmap32_remove(&self, key: &[u8], value: u32) -> Result<bool> {
        let _guard = self.locks.write(key);
        let mut bm = self.read_bitmap32_or_empty(key)?;
        let removed = bm.remove(value);
        self.put_raw(key, &DataFrame::Bitmap32(bm))?;
        Ok(removed)
    }

    pub fn bitmap32_contains(&self, key: &[u8], value: u32) -> Result<bool> {
        let _guard = self.locks.read(key);
        Ok(self.read_existing(key)?.as_bitmap32()?.contains(value))
    }

    pub fn bitmap32_cardinality(&self, key: &[u8]) -> Result<u64> {
        let _guard = self.locks.read(key);
        Ok(self.read_existing(key)?.as_bitmap32()?.len())
    }

    pub fn bitmap32_clear(&self, key: &[u8]) -> Result<()> {
        let _guard = self.locks.write(key);
        self.put_raw(key, &DataFrame::Bitmap32(RoaringBitmap::new()))
    }

    pub fn bitmap32_union(&self, key: &[u8], other_key: &[u8]) -> Result<RoaringBitmap> {
        self.bitmap32_combine(key, other_key, |a, b| a | b)
    }

    pub fn bitmap32_intersect(&self, key: &[u8], other_key: &[u8]) -> Result<RoaringBitmap> {
        self.bitmap32_combine(key, other_key, |a, b| a & b)
    }

    pub fn bitmap32_difference(&self, key: &[u8], other_key: &[u8]) -> Result<RoaringBitmap> {
        self.bitmap32_combine(key, other_key, |a, b| a - b)
    }

    pub fn bitmap32_symmetric_difference(&self, key: &[u8], other_key: &[u8]) -> Result<RoaringBitmap> {
        self.bitmap32_combine(key, other_key, |a, b| a ^ b)
    }

    fn bitmap32_combine(
        &self,
        key: &[u8],
        other_key: &[u8],
        f: impl FnOnce(&RoaringBitmap, &RoaringBitmap) -> RoaringBitmap,
    ) -> Result<RoaringBitmap> {
        let _guard = self.locks.write(key);
        let lhs = self.read_bitmap32_or_empty(key)?;
        let rhs = match self.get_raw(other_key)? {
            Some(df) => df.as_bitmap32()?.clone(),
            None => RoaringBitmap::new(),
        };
        let result = f(&lhs, &rhs);
        self.put_raw(key, &DataFrame::Bitmap32(result.clone()))?;
        Ok(result)
    }

    fn read_bitmap32_or_empty(&self, key: &[u8]) -> Result<RoaringBitmap> {
        match self.get_raw(key)? {
            Some(df) => Ok(df.as_bitmap32()?.clone()),
            None => Ok(RoaringBitmap::new()),
        }
    }

    // --- Bitmap64 ---

    pub fn bitmap64_add(&self, key: &[u8], value: u64) -> Result<bool> {
        let _guard = self.locks.write(key);
        let mut bm = self.read_bitmap64_or_empty(key)?;
        let inserted = bm.insert(value);
        self.put_raw(key, &DataFrame::Bitmap64(bm))?;
        Ok(inserted)
    }

    pub fn bitmap64_remove(&self, key: &[u8], value: u64) -> Result<bool> {
        let _guard = self.locks.write(key);
        let mut bm = self.read_bitmap64_or_empty(key)?;
        let removed = bm.remove(value);
        self.put_raw(key, &DataFrame::Bitmap64(bm))?;
        Ok(removed)
    }

    pub fn bitmap64_contains(&self, key: &[u8], value: u64) -> Result<bool> {
        let _guard = self.locks.read(key);
        Ok(self.read_existing(key)?.as_bitmap64()?.contains(value))
    }

    pub fn bitmap64_cardinality(&self, key: &[u8]) -> Result<u64> {
        let _guard = self.locks.read(key);
        Ok(self.read_existing(key)?.as_bitmap64()?.len())
    }

    pub fn bitmap64_clear(&self, key: &[u8]) -> Result<()> {
        let _guard = self.locks.write(key);
        self.put_raw(key, &DataFrame::Bitmap64(RoaringTreemap::new()))
    }

    pub fn bitmap64_union(&self, key: &[u8], other_key: &[u8]) -> Result<RoaringTreemap> {
        self.bitmap64_combine(key, other_key, |a, b| a | b)
    }

    pub fn bitmap64_intersect(&self, key: &[u8], other_key: &[u8]) -> Result<RoaringTreemap> {
        self.bitmap64_combine(key, other_key, |a, b| a & b)
    }

    pub fn bitmap64_difference(&self, key: &[u8], other_key: &[u8]) -> Result<RoaringTreemap> {
        self.bitmap64_combine(key, other_key, |a, b| a - b)
    }

    pub fn bitmap64_symmetric_difference(&self, key: &[u8], other_key: &[u8]) -> Result<RoaringTreemap> {
        self.bitmap64_combine(key, other_key, |a, b| a ^ b)
    }

    fn bitmap64_combine(
        &self,
        key: &[u8],
        other_key: &[u8],
        f: impl FnOnce(&RoaringTreemap, &RoaringTreemap) -> RoaringTreemap,
    ) -> Result<RoaringTreemap> {
        let _guard = self.locks.write(key);
        let lhs = self.read_bitmap64_or_empty(key)?;
        let rhs = match self.get_raw(other_key)? {
            Some(df) => df.as_bitmap64()?.clone(),
            None => RoaringTreemap::new(),
        };
        let result = f(&lhs, &rhs);
        self.put_raw(key, &DataFrame::Bitmap64(result.clone()))?;
        Ok(result)
    }

    fn read_bitmap64_or_empty(&self, key: &[u8]) -> Result<RoaringTreemap> {
        match self.get_raw(key)? {
            Some(df) => Ok(df.as_bitmap64()?.clone()),
            None => Ok(RoaringTreemap::new()),
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
    fn add_is_idempotent_and_tracked_by_cardinality() {
        let op = operator();
        assert!(op.bitmap32_add(b"b", 1).unwrap());
        assert!(!op.bitmap32_add(b"b", 1).unwrap());
        assert_eq!(op.bitmap32_cardinality(b"b").unwrap(), 1);
    }

    #[test]
    fn union_combines_two_bitmaps_into_the_destination_key() {
        let op = operator();
        op.bitmap32_add(b"a", 1).unwrap();
        op.bitmap32_add(b"a", 2).unwrap();
        op.bitmap32_add(b"b", 2).unwrap();
        op.bitmap32_add(b"b", 3).unwrap();
        let result = op.bitmap32_union(b"a", b"b").unwrap();
        assert_eq!(result.len(), 3);
        assert_eq!(op.bitmap32_cardinality(b"a").unwrap(), 3);
    }

    #[test]
    fn type_mismatch_when_reading_as_wrong_bitmap_width() {
        let op = operator();
        op.bitmap32_add(b"a", 1).unwrap();
        assert!(matches!(op.bitmap64_contains(b"a", 1), Err(OperatorError::TypeMismatch)));
    }
}
