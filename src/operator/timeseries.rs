//! The time-series sub-engine (spec.md §4.6). Metadata lives at
//! `keycodec::ts_meta(name)`; points live at `keycodec::ts_point(name,
//! nanos)`, whose big-endian encoding keeps a prefix scan in ascending
//! time order without a separate sort step.

use super::Operator;
use crate::dataframe::{DataFrame, TimeSeriesMeta};
use crate::error::{OperatorError, Result};
use crate::keycodec;
use crate::store::ControlFlow;

impl Operator {
    pub fn create_time_series(&self, name: &str) -> Result<()> {
        let key = keycodec::ts_meta(name);
        let _guard = self.locks.write(&key);
        if self.get_raw(&key)?.is_some() {
            return Err(OperatorError::AlreadyExists);
        }
        self.put_raw(&key, &DataFrame::TimeSeriesMeta(TimeSeriesMeta::default()))
    }

    pub fn delete_time_series(&self, name: &str) -> Result<()> {
        let key = keycodec::ts_meta(name);
        let _guard = self.locks.write(&key);
        self.delete_family_locked(&key)
    }

    pub fn time_series_length(&self, name: &str) -> Result<u64> {
        let key = keycodec::ts_meta(name);
        let _guard = self.locks.read(&key);
        Ok(self.read_ts_meta(&key)?.count)
    }

    /// Duplicate timestamps overwrite (spec.md §4.6).
    pub fn time_series_append(&self, name: &str, nanos: i64, value: DataFrame) -> Result<()> {
        let key = keycodec::ts_meta(name);
        let _guard = self.locks.write(&key);
        let mut meta = self.read_ts_meta(&key)?;
        let point_key = keycodec::ts_point(name, nanos);
        let existed = self.get_raw(&point_key)?.is_some();
        self.put_raw(&point_key, &value)?;
        if !existed {
            meta.count += 1;
        }
        meta.first = Some(meta.first.map_or(nanos, |f| f.min(nanos)));
        meta.last = Some(meta.last.map_or(nanos, |l| l.max(nanos)));
        self.put_raw(&key, &DataFrame::TimeSeriesMeta(meta))
    }

    pub fn time_series_get(&self, name: &str, nanos: i64) -> Result<DataFrame> {
        let key = keycodec::ts_meta(name);
        let _guard = self.locks.read(&key);
        self.get_raw(&keycodec::ts_point(name, nanos))?
            .ok_or(OperatorError::NotFound)
    }

    pub fn time_series_delete_point(&self, name: &str, nanos: i64) -> Result<()> {
        let key = keycodec::ts_meta(name);
        let _guard = self.locks.write(&key);
        let mut meta = self.read_ts_meta(&key)?;
        let point_key = keycodec::ts_point(name, nanos);
        if self.get_raw(&point_key)?.is_none() {
            return Ok(());
        }
        self.store.delete(&point_key)?;
        meta.count = meta.count.saturating_sub(1);
        if meta.count == 0 {
            meta.first = None;
            meta.last = None;
        } else if meta.first == Some(nanos) || meta.last == Some(nanos) {
            let (first, last) = self.scan_bounds(name)?;
            meta.first = first;
            meta.last = last;
        }
        self.put_raw(&key, &DataFrame::TimeSeriesMeta(meta))
    }

    /// Ascending-time points with `from <= t <= to` (spec.md §4.6, §8
    /// property 8).
    pub fn time_series_range(&self, name: &str, from: i64, to: i64) -> Result<Vec<(i64, DataFrame)>> {
        let key = keycodec::ts_meta(name);
        let _guard = self.locks.read(&key);
        let prefix = keycodec::ts_point_prefix(name);
        let mut out = Vec::new();
        self.store.range_prefix(&prefix, &mut |k, v| {
            if let Some(t) = keycodec::decode_i64_suffix(prefix.len(), k) {
                if t >= from && t <= to {
                    if let Ok(df) = DataFrame::decode(v) {
                        out.push((t, df));
                    }
                }
                if t > to {
                    return ControlFlow::Stop;
                }
            }
            ControlFlow::Continue
        })?;
        Ok(out)
    }

    fn scan_bounds(&self, name: &str) -> Result<(Option<i64>, Option<i64>)> {
        let prefix = keycodec::ts_point_prefix(name);
        let rows = self.collect_prefix(&prefix)?;
        let mut first = None;
        let mut last = None;
        for (k, _) in &rows {
            if let Some(t) = keycodec::decode_i64_suffix(prefix.len(), k) {
                first = Some(first.map_or(t, |f: i64| f.min(t)));
                last = Some(last.map_or(t, |l: i64| l.max(t)));
            }
        }
        Ok((first, last))
    }

    fn read_ts_meta(&self, meta_key: &[u8]) -> Result<TimeSeriesMeta> {
        match self.get_raw(meta_key)? {
            Some(DataFrame::TimeSeriesMeta(m)) => Ok(m),
            Some(DataFrame::Null) | None => Ok(TimeSeriesMeta::default()),
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
    fn range_returns_ascending_order_within_bounds() {
        let op = operator();
        op.time_series_append("t", 300, DataFrame::Float(3.0)).unwrap();
        op.time_series_append("t", 100, DataFrame::Float(1.0)).unwrap();
        op.time_series_append("t", 200, DataFrame::Float(2.0)).unwrap();
        let points = op.time_series_range("t", 100, 250).unwrap();
        assert_eq!(
            points,
            vec![(100, DataFrame::Float(1.0)), (200, DataFrame::Float(2.0))]
        );
    }

    #[test]
    fn range_includes_negative_timestamps_in_ascending_order() {
        let op = operator();
        op.time_series_append("t", -500, DataFrame::Int(1)).unwrap();
        op.time_series_append("t", 100, DataFrame::Int(2)).unwrap();
        op.time_series_append("t", 300, DataFrame::Int(3)).unwrap();
        let points = op.time_series_range("t", -500, 200).unwrap();
        assert_eq!(
            points,
            vec![(-500, DataFrame::Int(1)), (100, DataFrame::Int(2))]
        );
    }

    #[test]
    fn duplicate_timestamp_overwrites_without_growing_count() {
        let op = operator();
        op.time_series_append("t", 100, DataFrame::Int(1)).unwrap();
        op.time_series_append("t", 100, DataFrame::Int(2)).unwrap();
        assert_eq!(op.time_series_length("t").unwrap(), 1);
        assert_eq!(op.time_series_get("t", 100).unwrap(), DataFrame::Int(2));
    }

    #[test]
    fn deleting_the_boundary_point_rescans_first_and_last() {
        let op = operator();
        op.time_series_append("t", 100, DataFrame::Int(1)).unwrap();
        op.time_series_append("t", 200, DataFrame::Int(2)).unwrap();
        op.time_series_append("t", 300, DataFrame::Int(3)).unwrap();
        op.time_series_delete_point("t", 300).unwrap();
        let points = op.time_series_range("t", i64::MIN, i64::MAX).unwrap();
        assert_eq!(points.len(), 2);
    }
}
