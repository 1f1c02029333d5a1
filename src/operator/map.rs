//! The hash-map sub-engine (spec.md §4.4). Metadata lives at
//! `keycodec::map_meta(name)`; fields live at `keycodec::map_field(name,
//! field)`. Field names are plain strings; a caller that wants to key a
//! map by a non-string primitive canonicalizes it first via
//! `DataFrame::canonical_string` (spec.md §4.4: "coerced to their
//! canonical string form").

use super::Operator;
use crate::dataframe::{DataFrame, MapMeta};
use crate::error::{OperatorError, Result};
use crate::keycodec;
use crate::store::ControlFlow;

impl Operator {
    pub fn create_map(&self, name: &str) -> Result<()> {
        let key = keycodec::map_meta(name);
        let _guard = self.locks.write(&key);
        if self.get_raw(&key)?.is_some() {
            return Err(OperatorError::AlreadyExists);
        }
        self.put_raw(&key, &DataFrame::MapMeta(MapMeta::default()))
    }

    pub fn delete_map(&self, name: &str) -> Result<()> {
        let key = keycodec::map_meta(name);
        let _guard = self.locks.write(&key);
        self.delete_family_locked(&key)
    }

    pub fn map_length(&self, name: &str) -> Result<u64> {
        let key = keycodec::map_meta(name);
        let _guard = self.locks.read(&key);
        Ok(self.read_map_meta(&key)?.count)
    }

    pub fn map_set(&self, name: &str, field: &str, value: DataFrame) -> Result<()> {
        let key = keycodec::map_meta(name);
        let _guard = self.locks.write(&key);
        let mut meta = self.read_map_meta(&key)?;
        let field_key = keycodec::map_field(name, field);
        let existed = self.get_raw(&field_key)?.is_some();
        self.put_raw(&field_key, &value)?;
        if !existed {
            meta.count += 1;
            self.put_raw(&key, &DataFrame::MapMeta(meta))?;
        }
        Ok(())
    }

    pub fn map_get(&self, name: &str, field: &str) -> Result<DataFrame> {
        let key = keycodec::map_meta(name);
        let _guard = self.locks.read(&key);
        self.get_raw(&keycodec::map_field(name, field))?
            .ok_or(OperatorError::FieldNotFound)
    }

    /// Returns `(previous_value, existed)`.
    pub fn map_delete(&self, name: &str, field: &str) -> Result<(Option<DataFrame>, bool)> {
        let key = keycodec::map_meta(name);
        let _guard = self.locks.write(&key);
        let mut meta = self.read_map_meta(&key)?;
        let field_key = keycodec::map_field(name, field);
        let previous = self.get_raw(&field_key)?;
        let existed = previous.is_some();
        if existed {
            self.store.delete(&field_key)?;
            meta.count = meta.count.saturating_sub(1);
            self.put_raw(&key, &DataFrame::MapMeta(meta))?;
        }
        Ok((previous, existed))
    }

    pub fn map_keys(&self, name: &str) -> Result<Vec<String>> {
        let key = keycodec::map_meta(name);
        let _guard = self.locks.read(&key);
        let prefix = keycodec::map_field_prefix(name);
        let mut out = Vec::new();
        self.store.range_prefix(&prefix, &mut |k, _| {
            if let Ok(field) = std::str::from_utf8(&k[prefix.len()..]) {
                out.push(field.to_string());
            }
            ControlFlow::Continue
        })?;
        Ok(out)
    }

    pub fn map_values(&self, name: &str) -> Result<Vec<DataFrame>> {
        let key = keycodec::map_meta(name);
        let _guard = self.locks.read(&key);
        let prefix = keycodec::map_field_prefix(name);
        let rows = self.collect_prefix(&prefix)?;
        rows.into_iter()
            .map(|(_, v)| DataFrame::decode(&v))
            .collect()
    }

    pub fn clear_map(&self, name: &str) -> Result<()> {
        let key = keycodec::map_meta(name);
        let _guard = self.locks.write(&key);
        let prefix = keycodec::map_field_prefix(name);
        let rows = self.collect_prefix(&prefix)?;
        for (k, _) in rows {
            self.store.delete(&k)?;
        }
        self.put_raw(&key, &DataFrame::MapMeta(MapMeta::default()))
    }

    fn read_map_meta(&self, meta_key: &[u8]) -> Result<MapMeta> {
        match self.get_raw(meta_key)? {
            Some(DataFrame::MapMeta(m)) => Ok(m),
            Some(DataFrame::Null) | None => Ok(MapMeta::default()),
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
    fn set_then_get_round_trips() {
        let op = operator();
        op.map_set("m", "a", DataFrame::Int(1)).unwrap();
        assert_eq!(op.map_get("m", "a").unwrap(), DataFrame::Int(1));
        assert_eq!(op.map_length("m").unwrap(), 1);
    }

    #[test]
    fn overwriting_a_field_does_not_change_cardinality() {
        let op = operator();
        op.map_set("m", "a", DataFrame::Int(1)).unwrap();
        op.map_set("m", "a", DataFrame::Int(2)).unwrap();
        assert_eq!(op.map_length("m").unwrap(), 1);
        assert_eq!(op.map_get("m", "a").unwrap(), DataFrame::Int(2));
    }

    #[test]
    fn missing_field_fails_with_field_not_found() {
        let op = operator();
        op.map_set("m", "a", DataFrame::Int(1)).unwrap();
        assert!(matches!(op.map_get("m", "missing"), Err(OperatorError::FieldNotFound)));
    }

    #[test]
    fn delete_returns_previous_value_and_existed_flag() {
        let op = operator();
        op.map_set("m", "a", DataFrame::Int(7)).unwrap();
        let (prev, existed) = op.map_delete("m", "a").unwrap();
        assert_eq!(prev, Some(DataFrame::Int(7)));
        assert!(existed);
        let (prev2, existed2) = op.map_delete("m", "a").unwrap();
        assert_eq!(prev2, None);
        assert!(!existed2);
        assert_eq!(op.map_length("m").unwrap(), 0);
    }

    #[test]
    fn clear_map_resets_count_but_keeps_meta() {
        let op = operator();
        op.map_set("m", "a", DataFrame::Int(1)).unwrap();
        op.map_set("m", "b", DataFrame::Int(2)).unwrap();
        op.clear_map("m").unwrap();
        assert_eq!(op.map_length("m").unwrap(), 0);
        assert!(matches!(op.map_get("m", "a"), Err(OperatorError::FieldNotFound)));
    }

    #[test]
    fn keys_and_values_cover_every_field() {
        let op = operator();
        op.map_set("m", "a", DataFrame::Int(1)).unwrap();
        op.map_set("m", "b", DataFrame::Int(2)).unwrap();
        let mut keys = op.map_keys("m").unwrap();
        keys.sort();
        assert_eq!(keys, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(op.map_values("m").unwrap().len(), 2);
    }
}
