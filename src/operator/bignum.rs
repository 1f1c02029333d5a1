//! Arbitrary-precision BigInt and Decimal operations (spec.md §4.2, §4.10:
//! "on BigInt never overflows"). Built on `num_bigint::BigInt` in the same
//! read-modify-write-under-stripe-lock style as `primitive.rs`.

use super::Operator;
use crate::dataframe::{DataFrame, Decimal};
use crate::error::{OperatorError, Result};
use num_bigint::BigInt;

fn cmp_to_int(ord: std::cmp::Ordering) -> i32 {
    match ord {
        std::cmp::Ordering::Less => -1,
        std::cmp::Ordering::Equal => 0,
        std::cmp::Ordering::Greater => 1,
    }
}

fn pow10(n: u32) -> BigInt {
    let mut result = BigInt::from(1);
    let ten = BigInt::from(10);
    for _ in 0..n {
        result *= &ten;
    }
    result
}

/// Rescales `(coeff, scale)` to `target_scale`, always exactly (scaling up
/// only multiplies by a power of ten).
fn rescale(coeff: &BigInt, scale: i32, target_scale: i32) -> BigInt {
    if target_scale >= scale {
        coeff * pow10((target_scale - scale) as u32)
    } else {
        coeff / pow10((scale - target_scale) as u32)
    }
}

impl Operator {
    // --- BigInt ---

    pub fn set_bigint(&self, key: &[u8], v: BigInt) -> Result<()> {
        let _guard = self.locks.write(key);
        self.put_raw(key, &DataFrame::BigInt(v))
    }

    pub fn get_bigint(&self, key: &[u8]) -> Result<BigInt> {
        let _guard = self.locks.read(key);
        Ok(self.read_existing(key)?.as_bigint()?.clone())
    }

    pub fn swap_bigint(&self, key: &[u8], v: BigInt) -> Result<BigInt> {
        let _guard = self.locks.write(key);
        let old = match self.get_raw(key)? {
            Some(df) => df.as_bigint()?.clone(),
            None => BigInt::from(0),
        };
        self.put_raw(key, &DataFrame::BigInt(v))?;
        Ok(old)
    }

    pub fn add_bigint(&self, key: &[u8], delta: &BigInt) -> Result<BigInt> {
        self.rmw_bigint(key, |cur| cur + delta)
    }

    pub fn sub_bigint(&self, key: &[u8], delta: &BigInt) -> Result<BigInt> {
        self.rmw_bigint(key, |cur| cur - delta)
    }

    pub fn mul_bigint(&self, key: &[u8], factor: &BigInt) -> Result<BigInt> {
        self.rmw_bigint(key, |cur| cur * factor)
    }

    pub fn div_bigint(&self, key: &[u8], divisor: &BigInt) -> Result<BigInt> {
        if divisor == &BigInt::from(0) {
            return Err(OperatorError::DivideByZero);
        }
        self.rmw_bigint(key, |cur| cur / divisor)
    }

    pub fn mod_bigint(&self, key: &[u8], divisor: &BigInt) -> Result<BigInt> {
        if divisor == &BigInt::from(0) {
            return Err(OperatorError::DivideByZero);
        }
        self.rmw_bigint(key, |cur| cur % divisor)
    }

    pub fn neg_bigint(&self, key: &[u8]) -> Result<BigInt> {
        self.rmw_bigint(key, |cur| -cur)
    }

    pub fn abs_bigint(&self, key: &[u8]) -> Result<BigInt> {
        self.rmw_bigint(key, |cur| cur.abs())
    }

    pub fn inc_bigint(&self, key: &[u8]) -> Result<BigInt> {
        self.rmw_bigint(key, |cur| cur + BigInt::from(1))
    }

    pub fn dec_bigint(&self, key: &[u8]) -> Result<BigInt> {
        self.rmw_bigint(key, |cur| cur - BigInt::from(1))
    }

    pub fn compare_bigint(&self, key: &[u8], v: &BigInt) -> Result<i32> {
        let _guard = self.locks.read(key);
        Ok(cmp_to_int(self.read_existing(key)?.as_bigint()?.cmp(v)))
    }

    pub fn min_bigint(&self, key: &[u8], v: &BigInt) -> Result<BigInt> {
        self.rmw_bigint(key, |cur| if &cur < v { cur } else { v.clone() })
    }

    pub fn max_bigint(&self, key: &[u8], v: &BigInt) -> Result<BigInt> {
        self.rmw_bigint(key, |cur| if &cur > v { cur } else { v.clone() })
    }

    pub fn clamp_bigint(&self, key: &[u8], lo: &BigInt, hi: &BigInt) -> Result<BigInt> {
        self.rmw_bigint(key, |cur| {
            if &cur < lo {
                lo.clone()
            } else if &cur > hi {
                hi.clone()
            } else {
                cur
            }
        })
    }

    pub fn set_bigint_if_equal(&self, key: &[u8], expected: &BigInt, new: &BigInt) -> Result<BigInt> {
        self.rmw_bigint(key, |cur| if &cur == expected { new.clone() } else { cur })
    }

    pub fn set_bigint_if_greater(&self, key: &[u8], v: &BigInt) -> Result<BigInt> {
        self.rmw_bigint(key, |cur| if v > &cur { v.clone() } else { cur })
    }

    pub fn set_bigint_if_less(&self, key: &[u8], v: &BigInt) -> Result<BigInt> {
        self.rmw_bigint(key, |cur| if v < &cur { v.clone() } else { cur })
    }

    fn rmw_bigint(&self, key: &[u8], f: impl FnOnce(BigInt) -> BigInt) -> Result<BigInt> {
        let _guard = self.locks.write(key);
        let cur = match self.get_raw(key)? {
            Some(df) => df.as_bigint()?.clone(),
            None => BigInt::from(0),
        };
        let next = f(cur);
        self.put_raw(key, &DataFrame::BigInt(next.clone()))?;
        Ok(next)
    }

    // --- Decimal ---

    pub fn set_decimal(&self, key: &[u8], coefficient: BigInt, scale: i32) -> Result<()> {
        let _guard = self.locks.write(key);
        self.put_raw(key, &DataFrame::Decimal(Decimal::new(coefficient, scale)))
    }

    pub fn get_decimal(&self, key: &[u8]) -> Result<Decimal> {
        let _guard = self.locks.read(key);
        Ok(self.read_existing(key)?.as_decimal()?.clone())
    }

    pub fn swap_decimal(&self, key: &[u8], next: Decimal) -> Result<Decimal> {
        let _guard = self.locks.write(key);
        let old = match self.get_raw(key)? {
            Some(df) => df.as_decimal()?.clone(),
            None => Decimal::zero(),
        };
        self.put_raw(key, &DataFrame::Decimal(next))?;
        Ok(old)
    }

    pub fn add_decimal(&self, key: &[u8], delta: &Decimal) -> Result<Decimal> {
        self.rmw_decimal(key, |cur| {
            let scale = cur.scale.max(delta.scale);
            let lhs = rescale(&cur.coefficient, cur.scale, scale);
            let rhs = rescale(&delta.coefficient, delta.scale, scale);
            Decimal::new(lhs + rhs, scale)
        })
    }

    pub fn sub_decimal(&self, key: &[u8], delta: &Decimal) -> Result<Decimal> {
        self.rmw_decimal(key, |cur| {
            let scale = cur.scale.max(delta.scale);
            let lhs = rescale(&cur.coefficient, cur.scale, scale);
            let rhs = rescale(&delta.coefficient, delta.scale, scale);
            Decimal::new(lhs - rhs, scale)
        })
    }

    /// Product coefficient is the exact product of coefficients; scale is
    /// the sum of scales (spec.md §8 S3: `1_000_000_000_000_000_000`
    /// scale 2 times `525` scale 2 gives coefficient
    /// `525_000_000_000_000_000_000`, scale 4).
    pub fn mul_decimal(&self, key: &[u8], factor: &Decimal) -> Result<Decimal> {
        self.rmw_decimal(key, |cur| {
            Decimal::new(&cur.coefficient * &factor.coefficient, cur.scale + factor.scale)
        })
    }

    /// Decimal division has no guaranteed finite representation, so the
    /// caller must name the result scale explicitly (spec.md §4.2).
    pub fn div_decimal(&self, key: &[u8], divisor: &Decimal, result_scale: i32) -> Result<Decimal> {
        if divisor.coefficient == BigInt::from(0) {
            return Err(OperatorError::DivideByZero);
        }
        self.rmw_decimal(key, |cur| {
            let exp = result_scale + divisor.scale - cur.scale;
            let coefficient = if exp >= 0 {
                (&cur.coefficient * pow10(exp as u32)) / &divisor.coefficient
            } else {
                &cur.coefficient / (&divisor.coefficient * pow10((-exp) as u32))
            };
            Decimal::new(coefficient, result_scale)
        })
    }

    pub fn neg_decimal(&self, key: &[u8]) -> Result<Decimal> {
        self.rmw_decimal(key, |cur| Decimal::new(-cur.coefficient, cur.scale))
    }

    pub fn abs_decimal(&self, key: &[u8]) -> Result<Decimal> {
        self.rmw_decimal(key, |cur| Decimal::new(cur.coefficient.abs(), cur.scale))
    }

    pub fn compare_decimal(&self, key: &[u8], v: &Decimal) -> Result<i32> {
        let _guard = self.locks.read(key);
        let cur = self.read_existing(key)?.as_decimal()?.clone();
        let scale = cur.scale.max(v.scale);
        let lhs = rescale(&cur.coefficient, cur.scale, scale);
        let rhs = rescale(&v.coefficient, v.scale, scale);
        Ok(cmp_to_int(lhs.cmp(&rhs)))
    }

    pub fn clamp_decimal(&self, key: &[u8], lo: &Decimal, hi: &Decimal) -> Result<Decimal> {
        self.rmw_decimal(key, |cur| {
            let scale = cur.scale.max(lo.scale).max(hi.scale);
            let v = rescale(&cur.coefficient, cur.scale, scale);
            let lo_r = rescale(&lo.coefficient, lo.scale, scale);
            let hi_r = rescale(&hi.coefficient, hi.scale, scale);
            let clamped = v.clamp(lo_r, hi_r);
            Decimal::new(clamped, scale)
        })
    }

    fn rmw_decimal(&self, key: &[u8], f: impl FnOnce(Decimal) -> Decimal) -> Result<Decimal> {
        let _guard = self.locks.write(key);
        let cur = match self.get_raw(key)? {
            Some(df) => df.as_decimal()?.clone(),
            None => Decimal::zero(),
        };
        let next = f(cur);
        self.put_raw(key, &DataFrame::Decimal(next.clone()))?;
        Ok(next)
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
    fn bigint_multiplication_never_overflows() {
        let op = operator();
        let base = BigInt::from(2).pow(256);
        op.set_bigint(b"n", base.clone()).unwrap();
        let result = op.mul_bigint(b"n", &base).unwrap();
        assert_eq!(result, BigInt::from(2).pow(512));
    }

    #[test]
    fn decimal_multiplication_sums_scales() {
        let op = operator();
        op.set_decimal(b"p", BigInt::from(1_000_000_000_000_000_000i64), 2)
            .unwrap();
        let result = op.mul_decimal(b"p", &Decimal::new(BigInt::from(525), 2)).unwrap();
        assert_eq!(result.coefficient, BigInt::parse_bytes(b"525000000000000000000", 10).unwrap());
        assert_eq!(result.scale, 4);
    }

    #[test]
    fn decimal_division_by_zero_fails() {
        let op = operator();
        op.set_decimal(b"p", BigInt::from(10), 0).unwrap();
        assert!(matches!(
            op.div_decimal(b"p", &Decimal::zero(), 2),
            Err(OperatorError::DivideByZero)
        ));
    }
}
