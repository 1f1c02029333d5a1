//! Primitive atomic operations (spec.md §4.2) over Int/Uint/Float/Bool/
//! String/Binary. Every method here is a single read-modify-write under
//! the key's stripe lock: read the current value, validate its type,
//! apply the operation, write it back.

use super::Operator;
use crate::dataframe::DataFrame;
use crate::error::{OperatorError, Result};

fn cmp_to_int(ord: std::cmp::Ordering) -> i32 {
    match ord {
        std::cmp::Ordering::Less => -1,
        std::cmp::Ordering::Equal => 0,
        std::cmp::Ordering::Greater => 1,
    }
}

impl Operator {
    // --- Int ---

    pub fn set_int(&self, key: &[u8], v: i64) -> Result<()> {
        let _guard = self.locks.write(key);
        self.put_raw(key, &DataFrame::Int(v))
    }

    pub fn get_int(&self, key: &[u8]) -> Result<i64> {
        let _guard = self.locks.read(key);
        self.read_existing(key)?.as_int()
    }

    pub fn swap_int(&self, key: &[u8], v: i64) -> Result<i64> {
        let _guard = self.locks.write(key);
        let old = self.read_or_null(key)?.as_int()?;
        self.put_raw(key, &DataFrame::Int(v))?;
        Ok(old)
    }

    pub fn add_int(&self, key: &[u8], delta: i64) -> Result<i64> {
        self.rmw_int(key, |cur| cur.wrapping_add(delta))
    }

    pub fn sub_int(&self, key: &[u8], delta: i64) -> Result<i64> {
        self.rmw_int(key, |cur| cur.wrapping_sub(delta))
    }

    pub fn mul_int(&self, key: &[u8], factor: i64) -> Result<i64> {
        self.rmw_int(key, |cur| cur.wrapping_mul(factor))
    }

    pub fn div_int(&self, key: &[u8], divisor: i64) -> Result<i64> {
        if divisor == 0 {
            return Err(OperatorError::DivideByZero);
        }
        self.rmw_int(key, |cur| cur.wrapping_div(divisor))
    }

    pub fn mod_int(&self, key: &[u8], divisor: i64) -> Result<i64> {
        if divisor == 0 {
            return Err(OperatorError::DivideByZero);
        }
        self.rmw_int(key, |cur| cur.wrapping_rem(divisor))
    }

    pub fn neg_int(&self, key: &[u8]) -> Result<i64> {
        self.rmw_int(key, i64::wrapping_neg)
    }

    pub fn abs_int(&self, key: &[u8]) -> Result<i64> {
        self.rmw_int(key, i64::wrapping_abs)
    }

    pub fn inc_int(&self, key: &[u8]) -> Result<i64> {
        self.rmw_int(key, |cur| cur.wrapping_add(1))
    }

    pub fn dec_int(&self, key: &[u8]) -> Result<i64> {
        self.rmw_int(key, |cur| cur.wrapping_sub(1))
    }

    pub fn compare_int(&self, key: &[u8], v: i64) -> Result<i32> {
        let _guard = self.locks.read(key);
        Ok(cmp_to_int(self.read_existing(key)?.as_int()?.cmp(&v)))
    }

    pub fn min_int(&self, key: &[u8], v: i64) -> Result<i64> {
        self.rmw_int(key, |cur| cur.min(v))
    }

    pub fn max_int(&self, key: &[u8], v: i64) -> Result<i64> {
        self.rmw_int(key, |cur| cur.max(v))
    }

    pub fn clamp_int(&self, key: &[u8], lo: i64, hi: i64) -> Result<i64> {
        self.rmw_int(key, |cur| cur.clamp(lo, hi))
    }

    pub fn set_int_if_equal(&self, key: &[u8], expected: i64, new: i64) -> Result<i64> {
        self.rmw_int(key, |cur| if cur == expected { new } else { cur })
    }

    pub fn set_int_if_greater(&self, key: &[u8], v: i64) -> Result<i64> {
        self.rmw_int(key, |cur| if v > cur { v } else { cur })
    }

    pub fn set_int_if_less(&self, key: &[u8], v: i64) -> Result<i64> {
        self.rmw_int(key, |cur| if v < cur { v } else { cur })
    }

    pub fn and_int(&self, key: &[u8], mask: i64) -> Result<i64> {
        self.rmw_int(key, |cur| cur & mask)
    }

    pub fn or_int(&self, key: &[u8], mask: i64) -> Result<i64> {
        self.rmw_int(key, |cur| cur | mask)
    }

    pub fn xor_int(&self, key: &[u8], mask: i64) -> Result<i64> {
        self.rmw_int(key, |cur| cur ^ mask)
    }

    pub fn shift_left_int(&self, key: &[u8], n: u32) -> Result<i64> {
        self.rmw_int(key, |cur| cur.wrapping_shl(n))
    }

    pub fn shift_right_int(&self, key: &[u8], n: u32) -> Result<i64> {
        self.rmw_int(key, |cur| cur.wrapping_shr(n))
    }

    fn rmw_int(&self, key: &[u8], f: impl FnOnce(i64) -> i64) -> Result<i64> {
        let _guard = self.locks.write(key);
        let cur = self.read_or_null(key)?.as_int()?;
        let next = f(cur);
        self.put_raw(key, &DataFrame::Int(next))?;
        Ok(next)
    }

    // --- Uint ---

    pub fn set_uint(&self, key: &[u8], v: u64) -> Result<()> {
        let _guard = self.locks.write(key);
        self.put_raw(key, &DataFrame::Uint(v))
    }

    pub fn get_uint(&self, key: &[u8]) -> Result<u64> {
        let _guard = self.locks.read(key);
        self.read_existing(key)?.as_uint()
    }

    pub fn swap_uint(&self, key: &[u8], v: u64) -> Result<u64> {
        let _guard = self.locks.write(key);
        let old = self.read_or_null(key)?.as_uint()?;
        self.put_raw(key, &DataFrame::Uint(v))?;
        Ok(old)
    }

    pub fn add_uint(&self, key: &[u8], delta: u64) -> Result<u64> {
        self.rmw_uint(key, |cur| cur.wrapping_add(delta))
    }

    pub fn sub_uint(&self, key: &[u8], delta: u64) -> Result<u64> {
        self.rmw_uint(key, |cur| cur.wrapping_sub(delta))
    }

    pub fn mul_uint(&self, key: &[u8], factor: u64) -> Result<u64> {
        self.rmw_uint(key, |cur| cur.wrapping_mul(factor))
    }

    pub fn div_uint(&self, key: &[u8], divisor: u64) -> Result<u64> {
        if divisor == 0 {
            return Err(OperatorError::DivideByZero);
        }
        self.rmw_uint(key, |cur| cur.wrapping_div(divisor))
    }

    pub fn mod_uint(&self, key: &[u8], divisor: u64) -> Result<u64> {
        if divisor == 0 {
            return Err(OperatorError::DivideByZero);
        }
        self.rmw_uint(key, |cur| cur.wrapping_rem(divisor))
    }

    pub fn inc_uint(&self, key: &[u8]) -> Result<u64> {
        self.rmw_uint(key, |cur| cur.wrapping_add(1))
    }

    pub fn dec_uint(&self, key: &[u8]) -> Result<u64> {
        self.rmw_uint(key, |cur| cur.wrapping_sub(1))
    }

    pub fn compare_uint(&self, key: &[u8], v: u64) -> Result<i32> {
        let _guard = self.locks.read(key);
        Ok(cmp_to_int(self.read_existing(key)?.as_uint()?.cmp(&v)))
    }

    pub fn min_uint(&self, key: &[u8], v: u64) -> Result<u64> {
        self.rmw_uint(key, |cur| cur.min(v))
    }

    pub fn max_uint(&self, key: &[u8], v: u64) -> Result<u64> {
        self.rmw_uint(key, |cur| cur.max(v))
    }

    pub fn clamp_uint(&self, key: &[u8], lo: u64, hi: u64) -> Result<u64> {
        self.rmw_uint(key, |cur| cur.clamp(lo, hi))
    }

    pub fn set_uint_if_equal(&self, key: &[u8], expected: u64, new: u64) -> Result<u64> {
        self.rmw_uint(key, |cur| if cur == expected { new } else { cur })
    }

    pub fn set_uint_if_greater(&self, key: &[u8], v: u64) -> Result<u64> {
        self.rmw_uint(key, |cur| if v > cur { v } else { cur })
    }

    pub fn set_uint_if_less(&self, key: &[u8], v: u64) -> Result<u64> {
        self.rmw_uint(key, |cur| if v < cur { v } else { cur })
    }

    pub fn and_uint(&self, key: &[u8], mask: u64) -> Result<u64> {
        self.rmw_uint(key, |cur| cur & mask)
    }

    pub fn or_uint(&self, key: &[u8], mask: u64) -> Result<u64> {
        self.rmw_uint(key, |cur| cur | mask)
    }

    pub fn xor_uint(&self, key: &[u8], mask: u64) -> Result<u64> {
        self.rmw_uint(key, |cur| cur ^ mask)
    }

    pub fn shift_left_uint(&self, key: &[u8], n: u32) -> Result<u64> {
        self.rmw_uint(key, |cur| cur.wrapping_shl(n))
    }

    pub fn shift_right_uint(&self, key: &[u8], n: u32) -> Result<u64> {
        self.rmw_uint(key, |cur| cur.wrapping_shr(n))
    }

    fn rmw_uint(&self, key: &[u8], f: impl FnOnce(u64) -> u64) -> Result<u64> {
        let _guard = self.locks.write(key);
        let cur = self.read_or_null(key)?.as_uint()?;
        let next = f(cur);
        self.put_raw(key, &DataFrame::Uint(next))?;
        Ok(next)
    }

    // --- Float ---

    pub fn set_float(&self, key: &[u8], v: f64) -> Result<()> {
        let _guard = self.locks.write(key);
        self.put_raw(key, &DataFrame::Float(v))
    }

    pub fn get_float(&self, key: &[u8]) -> Result<f64> {
        let _guard = self.locks.read(key);
        self.read_existing(key)?.as_float()
    }

    pub fn swap_float(&self, key: &[u8], v: f64) -> Result<f64> {
        let _guard = self.locks.write(key);
        let old = self.read_or_null(key)?.as_float()?;
        self.put_raw(key, &DataFrame::Float(v))?;
        Ok(old)
    }

    pub fn add_float(&self, key: &[u8], delta: f64) -> Result<f64> {
        self.rmw_float(key, |cur| cur + delta)
    }

    pub fn sub_float(&self, key: &[u8], delta: f64) -> Result<f64> {
        self.rmw_float(key, |cur| cur - delta)
    }

    pub fn mul_float(&self, key: &[u8], factor: f64) -> Result<f64> {
        self.rmw_float(key, |cur| cur * factor)
    }

    /// Division by zero is not an error for floats: IEEE-754 semantics
    /// apply and the resulting infinity/NaN is stored and returned
    /// (spec.md §4.2).
    pub fn div_float(&self, key: &[u8], divisor: f64) -> Result<f64> {
        self.rmw_float(key, |cur| cur / divisor)
    }

    pub fn mod_float(&self, key: &[u8], divisor: f64) -> Result<f64> {
        self.rmw_float(key, |cur| cur % divisor)
    }

    pub fn neg_float(&self, key: &[u8]) -> Result<f64> {
        self.rmw_float(key, |cur| -cur)
    }

    pub fn abs_float(&self, key: &[u8]) -> Result<f64> {
        self.rmw_float(key, f64::abs)
    }

    pub fn inc_float(&self, key: &[u8]) -> Result<f64> {
        self.rmw_float(key, |cur| cur + 1.0)
    }

    pub fn dec_float(&self, key: &[u8]) -> Result<f64> {
        self.rmw_float(key, |cur| cur - 1.0)
    }

    pub fn compare_float(&self, key: &[u8], v: f64) -> Result<i32> {
        let _guard = self.locks.read(key);
        let cur = self.read_existing(key)?.as_float()?;
        Ok(cmp_to_int(cur.partial_cmp(&v).unwrap_or(std::cmp::Ordering::Equal)))
    }

    pub fn min_float(&self, key: &[u8], v: f64) -> Result<f64> {
        self.rmw_float(key, |cur| cur.min(v))
    }

    pub fn max_float(&self, key: &[u8], v: f64) -> Result<f64> {
        self.rmw_float(key, |cur| cur.max(v))
    }

    pub fn clamp_float(&self, key: &[u8], lo: f64, hi: f64) -> Result<f64> {
        self.rmw_float(key, |cur| cur.clamp(lo, hi))
    }

    pub fn set_float_if_equal(&self, key: &[u8], expected: f64, new: f64) -> Result<f64> {
        self.rmw_float(key, |cur| if cur == expected { new } else { cur })
    }

    pub fn set_float_if_greater(&self, key: &[u8], v: f64) -> Result<f64> {
        self.rmw_float(key, |cur| if v > cur { v } else { cur })
    }

    pub fn set_float_if_less(&self, key: &[u8], v: f64) -> Result<f64> {
        self.rmw_float(key, |cur| if v < cur { v } else { cur })
    }

    fn rmw_float(&self, key: &[u8], f: impl FnOnce(f64) -> f64) -> Result<f64> {
        let _guard = self.locks.write(key);
        let cur = self.read_or_null(key)?.as_float()?;
        let next = f(cur);
        self.put_raw(key, &DataFrame::Float(next))?;
        Ok(next)
    }

    // --- Bool ---

    pub fn set_bool(&self, key: &[u8], v: bool) -> Result<()> {
        let _guard = self.locks.write(key);
        self.put_raw(key, &DataFrame::Bool(v))
    }

    pub fn get_bool(&self, key: &[u8]) -> Result<bool> {
        let _guard = self.locks.read(key);
        self.read_existing(key)?.as_bool()
    }

    pub fn swap_bool(&self, key: &[u8], v: bool) -> Result<bool> {
        let _guard = self.locks.write(key);
        let old = self.read_or_null(key)?.as_bool()?;
        self.put_raw(key, &DataFrame::Bool(v))?;
        Ok(old)
    }

    pub fn and_bool(&self, key: &[u8], v: bool) -> Result<bool> {
        self.rmw_bool(key, |cur| cur && v)
    }

    pub fn or_bool(&self, key: &[u8], v: bool) -> Result<bool> {
        self.rmw_bool(key, |cur| cur || v)
    }

    pub fn xor_bool(&self, key: &[u8], v: bool) -> Result<bool> {
        self.rmw_bool(key, |cur| cur ^ v)
    }

    pub fn not_bool(&self, key: &[u8]) -> Result<bool> {
        self.rmw_bool(key, |cur| !cur)
    }

    pub fn toggle_bool(&self, key: &[u8]) -> Result<bool> {
        self.rmw_bool(key, |cur| !cur)
    }

    pub fn equal_bool(&self, key: &[u8], v: bool) -> Result<bool> {
        let _guard = self.locks.read(key);
        Ok(self.read_existing(key)?.as_bool()? == v)
    }

    pub fn set_bool_if_equal(&self, key: &[u8], expected: bool, new: bool) -> Result<bool> {
        self.rmw_bool(key, |cur| if cur == expected { new } else { cur })
    }

    fn rmw_bool(&self, key: &[u8], f: impl FnOnce(bool) -> bool) -> Result<bool> {
        let _guard = self.locks.write(key);
        let cur = self.read_or_null(key)?.as_bool()?;
        let next = f(cur);
        self.put_raw(key, &DataFrame::Bool(next))?;
        Ok(next)
    }

    // --- String ---

    pub fn set_string(&self, key: &[u8], v: &str) -> Result<()> {
        let _guard = self.locks.write(key);
        self.put_raw(key, &DataFrame::Str(v.to_string()))
    }

    pub fn get_string(&self, key: &[u8]) -> Result<String> {
        let _guard = self.locks.read(key);
        Ok(self.read_existing(key)?.as_str()?.to_string())
    }

    pub fn swap_string(&self, key: &[u8], v: &str) -> Result<String> {
        let _guard = self.locks.write(key);
        let old = match self.get_raw(key)? {
            Some(df) => df.as_str()?.to_string(),
            None => String::new(),
        };
        self.put_raw(key, &DataFrame::Str(v.to_string()))?;
        Ok(old)
    }

    pub fn append_string(&self, key: &[u8], suffix: &str) -> Result<String> {
        self.rmw_string(key, |mut cur| {
            cur.push_str(suffix);
            cur
        })
    }

    pub fn prepend_string(&self, key: &[u8], prefix: &str) -> Result<String> {
        self.rmw_string(key, |cur| format!("{prefix}{cur}"))
    }

    pub fn replace_string(&self, key: &[u8], old: &str, new: &str) -> Result<String> {
        self.rmw_string(key, |cur| cur.replace(old, new))
    }

    pub fn upper_string(&self, key: &[u8]) -> Result<String> {
        self.rmw_string(key, |cur| cur.to_uppercase())
    }

    pub fn lower_string(&self, key: &[u8]) -> Result<String> {
        self.rmw_string(key, |cur| cur.to_lowercase())
    }

    pub fn length_string(&self, key: &[u8]) -> Result<usize> {
        let _guard = self.locks.read(key);
        Ok(self.read_existing(key)?.as_str()?.chars().count())
    }

    pub fn contains_string(&self, key: &[u8], needle: &str) -> Result<bool> {
        let _guard = self.locks.read(key);
        Ok(self.read_existing(key)?.as_str()?.contains(needle))
    }

    pub fn starts_with_string(&self, key: &[u8], needle: &str) -> Result<bool> {
        let _guard = self.locks.read(key);
        Ok(self.read_existing(key)?.as_str()?.starts_with(needle))
    }

    pub fn ends_with_string(&self, key: &[u8], needle: &str) -> Result<bool> {
        let _guard = self.locks.read(key);
        Ok(self.read_existing(key)?.as_str()?.ends_with(needle))
    }

    /// `start`/`end` are Unicode-scalar (char) offsets, clamped to
    /// `[0, len]` (spec.md §4.2).
    pub fn substring_string(&self, key: &[u8], start: usize, end: usize) -> Result<String> {
        let _guard = self.locks.read(key);
        let cur = self.read_existing(key)?.as_str()?.to_string();
        let chars: Vec<char> = cur.chars().collect();
        let len = chars.len();
        let start = start.min(len);
        let end = end.min(len).max(start);
        Ok(chars[start..end].iter().collect())
    }

    pub fn compare_string(&self, key: &[u8], v: &str) -> Result<i32> {
        let _guard = self.locks.read(key);
        Ok(cmp_to_int(self.read_existing(key)?.as_str()?.cmp(v)))
    }

    pub fn equal_string(&self, key: &[u8], v: &str) -> Result<bool> {
        let _guard = self.locks.read(key);
        Ok(self.read_existing(key)?.as_str()? == v)
    }

    fn rmw_string(&self, key: &[u8], f: impl FnOnce(String) -> String) -> Result<String> {
        let _guard = self.locks.write(key);
        let cur = match self.get_raw(key)? {
            Some(df) => df.as_str()?.to_string(),
            None => String::new(),
        };
        let next = f(cur);
        self.put_raw(key, &DataFrame::Str(next.clone()))?;
        Ok(next)
    }

    // --- Binary ---

    pub fn set_binary(&self, key: &[u8], v: &[u8]) -> Result<()> {
        let _guard = self.locks.write(key);
        self.put_raw(key, &DataFrame::Binary(v.to_vec()))
    }

    pub fn get_binary(&self, key: &[u8]) -> Result<Vec<u8>> {
        let _guard = self.locks.read(key);
        Ok(self.read_existing(key)?.as_binary()?.to_vec())
    }

    pub fn swap_binary(&self, key: &[u8], v: &[u8]) -> Result<Vec<u8>> {
        let _guard = self.locks.write(key);
        let old = match self.get_raw(key)? {
            Some(df) => df.as_binary()?.to_vec(),
            None => Vec::new(),
        };
        self.put_raw(key, &DataFrame::Binary(v.to_vec()))?;
        Ok(old)
    }

    // --- Password ---

    /// Stores an already-hashed secret. Hashing itself is a thin helper
    /// left to callers (spec.md §1: "password hashing helpers" are out of
    /// CORE scope); the Operator only guarantees the value round-trips
    /// under its own distinct type tag, so a `Password` can never be read
    /// back through `get_string` by accident.
    pub fn set_password(&self, key: &[u8], hashed: &str) -> Result<()> {
        let _guard = self.locks.write(key);
        self.put_raw(key, &DataFrame::Password(hashed.to_string()))
    }

    pub fn verify_password(&self, key: &[u8], candidate_hash: &str) -> Result<bool> {
        let _guard = self.locks.read(key);
        match self.read_existing(key)? {
            DataFrame::Password(stored) => Ok(stored == candidate_hash),
            _ => Err(OperatorError::TypeMismatch),
        }
    }
}
