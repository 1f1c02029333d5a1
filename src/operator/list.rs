//! The indexed-deque list sub-engine (spec.md §4.3). Metadata lives at
//! `keycodec::list_meta(name)`; items live at `keycodec::list_item(name,
//! physical_index)`. Logical index 0 always maps to physical `head`, so
//! `ListTrim` can collapse the caller-visible window to 0-based without
//! rewriting a single item record — it only has to move `head`/`tail` to
//! the retained physical bounds (see DESIGN.md for the Open Question this
//! resolves).

use super::Operator;
use crate::dataframe::{DataFrame, ListMeta};
use crate::error::{OperatorError, Result};
use crate::keycodec;

impl Operator {
    pub fn create_list(&self, name: &str) -> Result<()> {
        let key = keycodec::list_meta(name);
        let _guard = self.locks.write(&key);
        if self.get_raw(&key)?.is_some() {
            return Err(OperatorError::AlreadyExists);
        }
        self.put_raw(&key, &DataFrame::ListMeta(ListMeta::empty()))
    }

    pub fn delete_list(&self, name: &str) -> Result<()> {
        let key = keycodec::list_meta(name);
        let _guard = self.locks.write(&key);
        self.delete_family_locked(&key)
    }

    pub fn list_length(&self, name: &str) -> Result<u64> {
        let key = keycodec::list_meta(name);
        let _guard = self.locks.read(&key);
        Ok(self.read_list_meta(&key)?.count)
    }

    pub fn push_left(&self, name: &str, value: DataFrame) -> Result<u64> {
        let key = keycodec::list_meta(name);
        let _guard = self.locks.write(&key);
        let mut meta = self.read_list_meta(&key)?;
        let index = meta.head - 1;
        self.put_raw(&keycodec::list_item(name, index), &value)?;
        meta.head = index;
        meta.count += 1;
        self.put_raw(&key, &DataFrame::ListMeta(meta.clone()))?;
        Ok(meta.count)
    }

    pub fn push_right(&self, name: &str, value: DataFrame) -> Result<u64> {
        let key = keycodec::list_meta(name);
        let _guard = self.locks.write(&key);
        let mut meta = self.read_list_meta(&key)?;
        let index = meta.tail + 1;
        self.put_raw(&keycodec::list_item(name, index), &value)?;
        meta.tail = index;
        meta.count += 1;
        self.put_raw(&key, &DataFrame::ListMeta(meta.clone()))?;
        Ok(meta.count)
    }

    pub fn pop_left(&self, name: &str) -> Result<DataFrame> {
        let key = keycodec::list_meta(name);
        let _guard = self.locks.write(&key);
        let mut meta = self.read_list_meta(&key)?;
        if meta.is_empty() {
            return Err(OperatorError::ListEmpty);
        }
        let item_key = keycodec::list_item(name, meta.head);
        let value = self.get_raw(&item_key)?.ok_or(OperatorError::NotFound)?;
        self.store.delete(&item_key)?;
        meta.head += 1;
        meta.count -= 1;
        if meta.count == 0 {
            meta = ListMeta::empty();
        }
        self.put_raw(&key, &DataFrame::ListMeta(meta))?;
        Ok(value)
    }

    pub fn pop_right(&self, name: &str) -> Result<DataFrame> {
        let key = keycodec::list_meta(name);
        let _guard = self.locks.write(&key);
        let mut meta = self.read_list_meta(&key)?;
        if meta.is_empty() {
            return Err(OperatorError::ListEmpty);
        }
        let item_key = keycodec::list_item(name, meta.tail);
        let value = self.get_raw(&item_key)?.ok_or(OperatorError::NotFound)?;
        self.store.delete(&item_key)?;
        meta.tail -= 1;
        meta.count -= 1;
        if meta.count == 0 {
            meta = ListMeta::empty();
        }
        self.put_raw(&key, &DataFrame::ListMeta(meta))?;
        Ok(value)
    }

    pub fn list_index(&self, name: &str, logical: i64) -> Result<DataFrame> {
        let key = keycodec::list_meta(name);
        let _guard = self.locks.read(&key);
        let meta = self.read_list_meta(&key)?;
        let physical = physical_index(&meta, logical)?;
        self.get_raw(&keycodec::list_item(name, physical))?
            .ok_or(OperatorError::NotFound)
    }

    pub fn list_set(&self, name: &str, logical: i64, value: DataFrame) -> Result<()> {
        let key = keycodec::list_meta(name);
        let _guard = self.locks.write(&key);
        let meta = self.read_list_meta(&key)?;
        let physical = physical_index(&meta, logical)?;
        self.put_raw(&keycodec::list_item(name, physical), &value)
    }

    /// Inclusive `[start, end]` after negative normalization, clamped into
    /// range rather than erroring (spec.md §4.3).
    pub fn list_range(&self, name: &str, start: i64, end: i64) -> Result<Vec<DataFrame>> {
        let key = keycodec::list_meta(name);
        let _guard = self.locks.read(&key);
        let meta = self.read_list_meta(&key)?;
        if meta.is_empty() {
            return Err(OperatorError::ListEmpty);
        }
        let Some((lo, hi)) = clamp_range(&meta, start, end) else {
            return Ok(Vec::new());
        };
        let mut out = Vec::with_capacity((hi - lo + 1) as usize);
        for logical in lo..=hi {
            let physical = meta.head + logical;
            if let Some(value) = self.get_raw(&keycodec::list_item(name, physical))? {
                out.push(value);
            }
        }
        Ok(out)
    }

    /// Deletes every item outside the retained `[start, end]` window and
    /// moves `head`/`tail` to the retained physical bounds, so the
    /// retained items become logical 0-based without being rewritten.
    pub fn list_trim(&self, name: &str, start: i64, end: i64) -> Result<()> {
        let key = keycodec::list_meta(name);
        let _guard = self.locks.write(&key);
        let meta = self.read_list_meta(&key)?;
        if meta.is_empty() {
            return Err(OperatorError::ListEmpty);
        }
        let retained = clamp_range(&meta, start, end);
        let (new_head, new_tail, new_count) = match retained {
            Some((lo, hi)) => (meta.head + lo, meta.head + hi, (hi - lo + 1) as u64),
            None => (0, -1, 0),
        };
        for physical in meta.head..=meta.tail {
            if physical < new_head || physical > new_tail {
                self.store.delete(&keycodec::list_item(name, physical))?;
            }
        }
        let new_meta = ListMeta {
            head: new_head,
            tail: new_tail,
            count: new_count,
        };
        self.put_raw(&key, &DataFrame::ListMeta(new_meta))
    }

    fn read_list_meta(&self, meta_key: &[u8]) -> Result<ListMeta> {
        match self.get_raw(meta_key)? {
            Some(DataFrame::ListMeta(m)) => Ok(m),
            Some(DataFrame::Null) | None => Ok(ListMeta::empty()),
            _ => Err(OperatorError::TypeMismatch),
        }
    }
}

/// Maps a logical index (negative counts from the tail) to a physical
/// item index, failing with `IndexOutOfRange` if it falls outside
/// `[0, count)` once normalized.
fn physical_index(meta: &ListMeta, logical: i64) -> Result<i64> {
    if meta.is_empty() {
        return Err(OperatorError::ListEmpty);
    }
    let normalized = normalize(logical, meta.count);
    if normalized < 0 || normalized as u64 >= meta.count {
        return Err(OperatorError::IndexOutOfRange);
    }
    Ok(meta.head + normalized)
}

fn normalize(i: i64, count: u64) -> i64 {
    if i < 0 {
        count as i64 + i
    } else {
        i
    }
}

/// Normalizes and clamps `[start, end]` into valid logical bounds,
/// returning `None` if the clamped window is empty.
fn clamp_range(meta: &ListMeta, start: i64, end: i64) -> Option<(i64, i64)> {
    let last = meta.count as i64 - 1;
    let lo = normalize(start, meta.count).clamp(0, last);
    let hi = normalize(end, meta.count).clamp(0, last);
    if lo > hi {
        None
    } else {
        Some((lo, hi))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OpenOptions;

    fn operator() -> std::sync::Arc<Operator> {
        Operator::open(OpenOptions::new()).unwrap()
    }

    fn ints(values: &[i64]) -> Vec<DataFrame> {
        values.iter().map(|v| DataFrame::Int(*v)).collect()
    }

    #[test]
    fn s1_push_left_and_right_preserve_logical_order() {
        let op = operator();
        op.push_right("l", DataFrame::Int(1)).unwrap();
        op.push_right("l", DataFrame::Int(2)).unwrap();
        op.push_left("l", DataFrame::Int(0)).unwrap();
        assert_eq!(op.list_range("l", 0, -1).unwrap(), ints(&[0, 1, 2]));
        assert_eq!(op.list_length("l").unwrap(), 3);
    }

    #[test]
    fn pop_on_empty_list_fails() {
        let op = operator();
        assert!(matches!(op.pop_left("empty"), Err(OperatorError::ListEmpty)));
    }

    #[test]
    fn negative_index_counts_from_tail() {
        let op = operator();
        op.push_right("l", DataFrame::Int(10)).unwrap();
        op.push_right("l", DataFrame::Int(20)).unwrap();
        op.push_right("l", DataFrame::Int(30)).unwrap();
        assert_eq!(op.list_index("l", -1).unwrap(), DataFrame::Int(30));
        assert_eq!(op.list_index("l", -3).unwrap(), DataFrame::Int(10));
    }

    #[test]
    fn out_of_range_index_fails() {
        let op = operator();
        op.push_right("l", DataFrame::Int(1)).unwrap();
        assert!(matches!(op.list_index("l", 5), Err(OperatorError::IndexOutOfRange)));
        assert!(matches!(op.list_index("l", -5), Err(OperatorError::IndexOutOfRange)));
    }

    #[test]
    fn trim_collapses_to_logical_zero_based_window() {
        let op = operator();
        for v in 0..10i64 {
            op.push_right("l", DataFrame::Int(v)).unwrap();
        }
        op.list_trim("l", 2, 5).unwrap();
        assert_eq!(op.list_length("l").unwrap(), 4);
        assert_eq!(op.list_range("l", 0, -1).unwrap(), ints(&[2, 3, 4, 5]));
        assert_eq!(op.list_index("l", 0).unwrap(), DataFrame::Int(2));
    }

    #[test]
    fn trim_to_nothing_leaves_canonical_empty_meta() {
        let op = operator();
        op.push_right("l", DataFrame::Int(1)).unwrap();
        op.list_trim("l", 5, 10).unwrap();
        assert_eq!(op.list_length("l").unwrap(), 0);
        assert!(matches!(op.pop_left("l"), Err(OperatorError::ListEmpty)));
    }

    #[test]
    fn delete_list_removes_meta_and_every_item() {
        let op = operator();
        op.push_right("l", DataFrame::Int(1)).unwrap();
        op.push_right("l", DataFrame::Int(2)).unwrap();
        op.delete_list("l").unwrap();
        assert_eq!(op.list_length("l").unwrap(), 0);
        assert!(op.get_raw(&keycodec::list_item("l", 0)).unwrap().is_none());
    }
}
