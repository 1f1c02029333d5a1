//! The set sub-engine (spec.md §4.5). Metadata lives at
//! `keycodec::set_meta(name)`; members live at `keycodec::set_item(name,
//! member)`, storing the member's own value as the record payload (the
//! Open Question in spec.md §9 is resolved in favor of the full value —
//! tests must not rely on this, but it costs nothing to keep).

use super::Operator;
use crate::dataframe::{DataFrame, SetMeta};
use crate::error::{OperatorError, Result};
use crate::keycodec;
use crate::store::ControlFlow;

impl Operator {
    pub fn create_set(&self, name: &str) -> Result<()> {
        let key = keycodec::set_meta(name);
        let _guard = self.locks.write(&key);
        if self.get_raw(&key)?.is_some() {
            return Err(OperatorError::AlreadyExists);
        }
        self.put_raw(&key, &DataFrame::SetMeta(SetMeta::default()))
    }

    pub fn delete_set(&self, name: &str) -> Result<()> {
        let key = keycodec::set_meta(name);
        let _guard = self.locks.write(&key);
        self.delete_family_locked(&key)
    }

    pub fn set_cardinality(&self, name: &str) -> Result<u64> {
        let key = keycodec::set_meta(name);
        let _guard = self.locks.read(&key);
        Ok(self.read_set_meta(&key)?.count)
    }

    /// Idempotent: re-adding an existing member leaves cardinality
    /// unchanged (spec.md §8, property 5). Returns the cardinality after
    /// the call either way.
    pub fn set_add(&self, name: &str, member: &str) -> Result<u64> {
        let key = keycodec::set_meta(name);
        let _guard = self.locks.write(&key);
        let mut meta = self.read_set_meta(&key)?;
        let item_key = keycodec::set_item(name, member);
        if self.get_raw(&item_key)?.is_none() {
            self.put_raw(&item_key, &DataFrame::Str(member.to_string()))?;
            meta.count += 1;
            self.put_raw(&key, &DataFrame::SetMeta(meta.clone()))?;
        }
        Ok(meta.count)
    }

    pub fn set_remove(&self, name: &str, member: &str) -> Result<u64> {
        let key = keycodec::set_meta(name);
        let _guard = self.locks.write(&key);
        let mut meta = self.read_set_meta(&key)?;
        let item_key = keycodec::set_item(name, member);
        if self.get_raw(&item_key)?.is_some() {
            self.store.delete(&item_key)?;
            meta.count = meta.count.saturating_sub(1);
            self.put_raw(&key, &DataFrame::SetMeta(meta.clone()))?;
        }
        Ok(meta.count)
    }

    pub fn set_is_member(&self, name: &str, member: &str) -> Result<bool> {
        let key = keycodec::set_meta(name);
        let _guard = self.locks.read(&key);
        Ok(self.get_raw(&keycodec::set_item(name, member))?.is_some())
    }

    pub fn set_members(&self, name: &str) -> Result<Vec<String>> {
        let key = keycodec::set_meta(name);
        let _guard = self.locks.read(&key);
        let prefix = keycodec::set_item_prefix(name);
        let mut out = Vec::new();
        self.store.range_prefix(&prefix, &mut |k, _| {
            if let Ok(member) = std::str::from_utf8(&k[prefix.len()..]) {
                out.push(member.to_string());
            }
            ControlFlow::Continue
        })?;
        Ok(out)
    }

    pub fn clear_set(&self, name: &str) -> Result<()> {
        let key = keycodec::set_meta(name);
        let _guard = self.locks.write(&key);
        let prefix = keycodec::set_item_prefix(name);
        let rows = self.collect_prefix(&prefix)?;
        for (k, _) in rows {
            self.store.delete(&k)?;
        }
        self.put_raw(&key, &DataFrame::SetMeta(SetMeta::default()))
    }

    fn read_set_meta(&self, meta_key: &[u8]) -> Result<SetMeta> {
        match self.get_raw(meta_key)? {
            Some(DataFrame::SetMeta(m)) => Ok(m),
            Some(DataFrame::Null) | None => Ok(SetMeta::default()),
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
    fn add_is_idempotent() {
        let op = operator();
        assert_eq!(op.set_add("s", "x").unwrap(), 1);
        assert_eq!(op.set_add("s", "x").unwrap(), 1);
        assert_eq!(op.set_cardinality("s").unwrap(), 1);
    }

    #[test]
    fn membership_tracks_add_and_remove() {
        let op = operator();
        assert!(!op.set_is_member("s", "x").unwrap());
        op.set_add("s", "x").unwrap();
        assert!(op.set_is_member("s", "x").unwrap());
        op.set_remove("s", "x").unwrap();
        assert!(!op.set_is_member("s", "x").unwrap());
    }

    #[test]
    fn remove_on_non_member_is_a_no_op() {
        let op = operator();
        op.set_add("s", "x").unwrap();
        assert_eq!(op.set_remove("s", "y").unwrap(), 1);
    }

    #[test]
    fn members_lists_every_current_item() {
        let op = operator();
        op.set_add("s", "a").unwrap();
        op.set_add("s", "b").unwrap();
        let mut members = op.set_members("s").unwrap();
        members.sort();
        assert_eq!(members, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn clear_set_resets_cardinality() {
        let op = operator();
        op.set_add("s", "a").unwrap();
        op.clear_set("s").unwrap();
        assert_eq!(op.set_cardinality("s").unwrap(), 0);
        assert!(!op.set_is_member("s", "a").unwrap());
    }
}
