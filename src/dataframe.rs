//! The DataFrame binary format and its typed accessors (spec.md §4.1).
//!
//! A DataFrame is a length-prefixed, self-describing byte string: one
//! leading tag byte names the type, the remaining bytes decode per type.
//! Every record the Operator reads back out of the ByteStore is a
//! `DataFrame`, not a plain `Vec<u8>`.

use crate::error::{OperatorError, Result};
use num_bigint::{BigInt, Sign};
use roaring::{RoaringBitmap, RoaringTreemap};
use std::io::{Cursor, Read};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ListMeta {
    pub head: i64,
    pub tail: i64,
    pub count: u64,
}

impl ListMeta {
    pub fn empty() -> Self {
        ListMeta {
            head: 0,
            tail: -1,
            count: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MapMeta {
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SetMeta {
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TimeSeriesMeta {
    pub count: u64,
    pub first: Option<i64>,
    pub last: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BloomMeta {
    pub num_bits: u64,
    pub num_hashes: u32,
    pub population: u64,
    /// Packed bit buffer, `ceil(num_bits / 8)` bytes.
    pub bits: Vec<u8>,
}

impl BloomMeta {
    pub fn new(num_bits: u64, num_hashes: u32) -> Self {
        let byte_len = num_bits.div_ceil(8) as usize;
        BloomMeta {
            num_bits,
            num_hashes,
            population: 0,
            bits: vec![0u8; byte_len],
        }
    }

    pub fn get_bit(&self, index: u64) -> bool {
        let byte = self.bits[(index / 8) as usize];
        (byte & (1 << (index % 8))) != 0
    }

    pub fn set_bit(&mut self, index: u64) {
        let byte = &mut self.bits[(index / 8) as usize];
        *byte |= 1 << (index % 8);
    }

    pub fn clear(&mut self) {
        self.bits.iter_mut().for_each(|b| *b = 0);
        self.population = 0;
    }
}

/// A signed arbitrary-precision decimal: `coefficient * 10^(-scale)`.
/// Kept as a plain struct (rather than wrapping a third-party decimal
/// type) because the wire format and every arithmetic rule in spec.md
/// §4.1/§4.2 is already stated directly in terms of `(coefficient, scale)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decimal {
    pub coefficient: BigInt,
    pub scale: i32,
}

impl Decimal {
    pub fn new(coefficient: BigInt, scale: i32) -> Self {
        Decimal { coefficient, scale }
    }

    pub fn zero() -> Self {
        Decimal::new(BigInt::from(0), 0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DataFrame {
    Null,
    Int(i64),
    Uint(u64),
    Float(f64),
    Bool(bool),
    Str(String),
    Binary(Vec<u8>),
    BigInt(BigInt),
    Decimal(Decimal),
    Bitmap32(RoaringBitmap),
    Bitmap64(RoaringTreemap),
    Password(String),
    ListMeta(ListMeta),
    MapMeta(MapMeta),
    SetMeta(SetMeta),
    TimeSeriesMeta(TimeSeriesMeta),
    BloomMeta(BloomMeta),
    /// Codec-level support for spec.md §3.1's "TTL-annotated variants".
    /// Never produced by the Operator itself — see DESIGN.md.
    Expiring(Box<DataFrame>, i64),
}

#[repr(u8)]
enum Tag {
    Null = 0,
    Int = 1,
    Uint = 2,
    Float = 3,
    Bool = 4,
    Str = 5,
    Binary = 6,
    BigInt = 7,
    Decimal = 8,
    Bitmap32 = 9,
    Bitmap64 = 10,
    Password = 11,
    ListMeta = 12,
    MapMeta = 13,
    SetMeta = 14,
    TimeSeriesMeta = 15,
    BloomMeta = 16,
    Expiring = 17,
}

impl DataFrame {
    /// A human-readable name for the currently-held type, used in
    /// `TypeMismatch` diagnostics and map/set key canonicalization.
    pub fn type_name(&self) -> &'static str {
        match self {
            DataFrame::Null => "null",
            DataFrame::Int(_) => "int",
            DataFrame::Uint(_) => "uint",
            DataFrame::Float(_) => "float",
            DataFrame::Bool(_) => "bool",
            DataFrame::Str(_) => "string",
            DataFrame::Binary(_) => "binary",
            DataFrame::BigInt(_) => "bigint",
            DataFrame::Decimal(_) => "decimal",
            DataFrame::Bitmap32(_) => "bitmap32",
            DataFrame::Bitmap64(_) => "bitmap64",
            DataFrame::Password(_) => "password",
            DataFrame::ListMeta(_) => "list",
            DataFrame::MapMeta(_) => "map",
            DataFrame::SetMeta(_) => "set",
            DataFrame::TimeSeriesMeta(_) => "timeseries",
            DataFrame::BloomMeta(_) => "bloom",
            DataFrame::Expiring(_, _) => "expiring",
        }
    }

    /// The canonical string form used to build map-field/set-item keys out
    /// of an arbitrary primitive DataFrame (spec.md §4.4).
    pub fn canonical_string(&self) -> Result<String> {
        match self {
            DataFrame::Str(s) => Ok(s.clone()),
            DataFrame::Int(v) => Ok(v.to_string()),
            DataFrame::Uint(v) => Ok(v.to_string()),
            DataFrame::Float(v) => Ok(v.to_string()),
            DataFrame::Bool(v) => Ok(v.to_string()),
            DataFrame::BigInt(v) => Ok(v.to_string()),
            DataFrame::Binary(v) => Ok(String::from_utf8_lossy(v).into_owned()),
            other => Err(OperatorError::invalid(format!(
                "cannot use a {} value as a map/set key",
                other.type_name()
            ))),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        match self {
            DataFrame::Null => out.push(Tag::Null as u8),
            DataFrame::Int(v) => {
                out.push(Tag::Int as u8);
                out.extend_from_slice(&v.to_be_bytes());
            }
            DataFrame::Uint(v) => {
                out.push(Tag::Uint as u8);
                out.extend_from_slice(&v.to_be_bytes());
            }
            DataFrame::Float(v) => {
                out.push(Tag::Float as u8);
                out.extend_from_slice(&v.to_bits().to_be_bytes());
            }
            DataFrame::Bool(v) => {
                out.push(Tag::Bool as u8);
                out.push(*v as u8);
            }
            DataFrame::Str(s) => {
                out.push(Tag::Str as u8);
                write_bytes(&mut out, s.as_bytes());
            }
            DataFrame::Binary(b) => {
                out.push(Tag::Binary as u8);
                write_bytes(&mut out, b);
            }
            DataFrame::BigInt(v) => {
                out.push(Tag::BigInt as u8);
                write_bigint(&mut out, v);
            }
            DataFrame::Decimal(d) => {
                out.push(Tag::Decimal as u8);
                write_bigint(&mut out, &d.coefficient);
                out.extend_from_slice(&d.scale.to_be_bytes());
            }
            DataFrame::Bitmap32(bm) => {
                out.push(Tag::Bitmap32 as u8);
                let mut buf = Vec::new();
                bm.serialize_into(&mut buf).expect("writing to Vec cannot fail");
                write_bytes(&mut out, &buf);
            }
            DataFrame::Bitmap64(bm) => {
                out.push(Tag::Bitmap64 as u8);
                let mut buf = Vec::new();
                bm.serialize_into(&mut buf).expect("writing to Vec cannot fail");
                write_bytes(&mut out, &buf);
            }
            DataFrame::Password(s) => {
                out.push(Tag::Password as u8);
                write_bytes(&mut out, s.as_bytes());
            }
            DataFrame::ListMeta(m) => {
                out.push(Tag::ListMeta as u8);
                out.extend_from_slice(&m.head.to_be_bytes());
                out.extend_from_slice(&m.tail.to_be_bytes());
                out.extend_from_slice(&m.count.to_be_bytes());
            }
            DataFrame::MapMeta(m) => {
                out.push(Tag::MapMeta as u8);
                out.extend_from_slice(&m.count.to_be_bytes());
            }
            DataFrame::SetMeta(m) => {
                out.push(Tag::SetMeta as u8);
                out.extend_from_slice(&m.count.to_be_bytes());
            }
            DataFrame::TimeSeriesMeta(m) => {
                out.push(Tag::TimeSeriesMeta as u8);
                out.extend_from_slice(&m.count.to_be_bytes());
                write_optional_i64(&mut out, m.first);
                write_optional_i64(&mut out, m.last);
            }
            DataFrame::BloomMeta(m) => {
                out.push(Tag::BloomMeta as u8);
                out.extend_from_slice(&m.num_bits.to_be_bytes());
                out.extend_from_slice(&m.num_hashes.to_be_bytes());
                out.extend_from_slice(&m.population.to_be_bytes());
                write_bytes(&mut out, &m.bits);
            }
            DataFrame::Expiring(inner, expire_at) => {
                out.push(Tag::Expiring as u8);
                out.extend_from_slice(&expire_at.to_be_bytes());
                write_bytes(&mut out, &inner.encode());
            }
        }
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut cur = Cursor::new(bytes);
        let tag = read_u8(&mut cur)?;
        let value = Self::decode_tagged(tag, &mut cur)?;
        Ok(value)
    }

    fn decode_tagged(tag: u8, cur: &mut Cursor<&[u8]>) -> Result<Self> {
        Ok(match tag {
            t if t == Tag::Null as u8 => DataFrame::Null,
            t if t == Tag::Int as u8 => DataFrame::Int(i64::from_be_bytes(read_n(cur)?)),
            t if t == Tag::Uint as u8 => DataFrame::Uint(u64::from_be_bytes(read_n(cur)?)),
            t if t == Tag::Float as u8 => {
                DataFrame::Float(f64::from_bits(u64::from_be_bytes(read_n(cur)?)))
            }
            t if t == Tag::Bool as u8 => DataFrame::Bool(read_u8(cur)? != 0),
            t if t == Tag::Str as u8 => {
                let bytes = read_bytes(cur)?;
                DataFrame::Str(
                    String::from_utf8(bytes)
                        .map_err(|_| OperatorError::invalid("invalid utf-8 in encoded string"))?,
                )
            }
            t if t == Tag::Binary as u8 => DataFrame::Binary(read_bytes(cur)?),
            t if t == Tag::BigInt as u8 => DataFrame::BigInt(read_bigint(cur)?),
            t if t == Tag::Decimal as u8 => {
                let coefficient = read_bigint(cur)?;
                let scale = i32::from_be_bytes(read_n(cur)?);
                DataFrame::Decimal(Decimal::new(coefficient, scale))
            }
            t if t == Tag::Bitmap32 as u8 => {
                let bytes = read_bytes(cur)?;
                let bm = RoaringBitmap::deserialize_from(&bytes[..])
                    .map_err(|_| OperatorError::invalid("corrupt bitmap32 payload"))?;
                DataFrame::Bitmap32(bm)
            }
            t if t == Tag::Bitmap64 as u8 => {
                let bytes = read_bytes(cur)?;
                let bm = RoaringTreemap::deserialize_from(&bytes[..])
                    .map_err(|_| OperatorError::invalid("corrupt bitmap64 payload"))?;
                DataFrame::Bitmap64(bm)
            }
            t if t == Tag::Password as u8 => {
                let bytes = read_bytes(cur)?;
                DataFrame::Password(
                    String::from_utf8(bytes)
                        .map_err(|_| OperatorError::invalid("invalid utf-8 in encoded password"))?,
                )
            }
            t if t == Tag::ListMeta as u8 => DataFrame::ListMeta(ListMeta {
                head: i64::from_be_bytes(read_n(cur)?),
                tail: i64::from_be_bytes(read_n(cur)?),
                count: u64::from_be_bytes(read_n(cur)?),
            }),
            t if t == Tag::MapMeta as u8 => DataFrame::MapMeta(MapMeta {
                count: u64::from_be_bytes(read_n(cur)?),
            }),
            t if t == Tag::SetMeta as u8 => DataFrame::SetMeta(SetMeta {
                count: u64::from_be_bytes(read_n(cur)?),
            }),
            t if t == Tag::TimeSeriesMeta as u8 => DataFrame::TimeSeriesMeta(TimeSeriesMeta {
                count: u64::from_be_bytes(read_n(cur)?),
                first: read_optional_i64(cur)?,
                last: read_optional_i64(cur)?,
            }),
            t if t == Tag::BloomMeta as u8 => DataFrame::BloomMeta(BloomMeta {
                num_bits: u64::from_be_bytes(read_n(cur)?),
                num_hashes: u32::from_be_bytes(read_n(cur)?),
                population: u64::from_be_bytes(read_n(cur)?),
                bits: read_bytes(cur)?,
            }),
            t if t == Tag::Expiring as u8 => {
                let expire_at = i64::from_be_bytes(read_n(cur)?);
                let inner_bytes = read_bytes(cur)?;
                let inner = DataFrame::decode(&inner_bytes)?;
                DataFrame::Expiring(Box::new(inner), expire_at)
            }
            _ => return Err(OperatorError::invalid("unknown DataFrame type tag")),
        })
    }

    // --- typed accessors: fail with TypeMismatch on a stored value of a
    // different type, per spec.md §4.1. ---

    pub fn as_int(&self) -> Result<i64> {
        match self {
            DataFrame::Int(v) => Ok(*v),
            DataFrame::Null => Ok(0),
            _ => Err(OperatorError::TypeMismatch),
        }
    }

    pub fn as_uint(&self) -> Result<u64> {
        match self {
            DataFrame::Uint(v) => Ok(*v),
            DataFrame::Null => Ok(0),
            _ => Err(OperatorError::TypeMismatch),
        }
    }

    pub fn as_float(&self) -> Result<f64> {
        match self {
            DataFrame::Float(v) => Ok(*v),
            DataFrame::Null => Ok(0.0),
            _ => Err(OperatorError::TypeMismatch),
        }
    }

    pub fn as_bool(&self) -> Result<bool> {
        match self {
            DataFrame::Bool(v) => Ok(*v),
            DataFrame::Null => Ok(false),
            _ => Err(OperatorError::TypeMismatch),
        }
    }

    pub fn as_str(&self) -> Result<&str> {
        match self {
            DataFrame::Str(s) => Ok(s.as_str()),
            _ => Err(OperatorError::TypeMismatch),
        }
    }

    pub fn as_binary(&self) -> Result<&[u8]> {
        match self {
            DataFrame::Binary(b) => Ok(b.as_slice()),
            _ => Err(OperatorError::TypeMismatch),
        }
    }

    pub fn as_bigint(&self) -> Result<&BigInt> {
        match self {
            DataFrame::BigInt(v) => Ok(v),
            _ => Err(OperatorError::TypeMismatch),
        }
    }

    pub fn as_decimal(&self) -> Result<&Decimal> {
        match self {
            DataFrame::Decimal(d) => Ok(d),
            _ => Err(OperatorError::TypeMismatch),
        }
    }

    pub fn as_bitmap32(&self) -> Result<&RoaringBitmap> {
        match self {
            DataFrame::Bitmap32(bm) => Ok(bm),
            _ => Err(OperatorError::TypeMismatch),
        }
    }

    pub fn as_bitmap64(&self) -> Result<&RoaringTreemap> {
        match self {
            DataFrame::Bitmap64(bm) => Ok(bm),
            _ => Err(OperatorError::TypeMismatch),
        }
    }

    pub fn as_list_meta(&self) -> Result<&ListMeta> {
        match self {
            DataFrame::ListMeta(m) => Ok(m),
            _ => Err(OperatorError::TypeMismatch),
        }
    }

    pub fn as_map_meta(&self) -> Result<&MapMeta> {
        match self {
            DataFrame::MapMeta(m) => Ok(m),
            _ => Err(OperatorError::TypeMismatch),
        }
    }

    pub fn as_set_meta(&self) -> Result<&SetMeta> {
        match self {
            DataFrame::SetMeta(m) => Ok(m),
            _ => Err(OperatorError::TypeMismatch),
        }
    }

    pub fn as_timeseries_meta(&self) -> Result<&TimeSeriesMeta> {
        match self {
            DataFrame::TimeSeriesMeta(m) => Ok(m),
            _ => Err(OperatorError::TypeMismatch),
        }
    }

    pub fn as_bloom_meta(&self) -> Result<&BloomMeta> {
        match self {
            DataFrame::BloomMeta(m) => Ok(m),
            _ => Err(OperatorError::TypeMismatch),
        }
    }
}

fn write_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    out.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
    out.extend_from_slice(bytes);
}

fn write_optional_i64(out: &mut Vec<u8>, value: Option<i64>) {
    match value {
        Some(v) => {
            out.push(1);
            out.extend_from_slice(&v.to_be_bytes());
        }
        None => out.push(0),
    }
}

fn write_bigint(out: &mut Vec<u8>, v: &BigInt) {
    let (sign, magnitude) = v.to_bytes_be();
    let sign_byte = match sign {
        Sign::NoSign => 0u8,
        Sign::Plus => 1u8,
        Sign::Minus => 2u8,
    };
    out.push(sign_byte);
    write_bytes(out, &magnitude);
}

fn read_u8(cur: &mut Cursor<&[u8]>) -> Result<u8> {
    let mut buf = [0u8; 1];
    cur.read_exact(&mut buf)
        .map_err(|_| OperatorError::invalid("truncated DataFrame payload"))?;
    Ok(buf[0])
}

fn read_n<const N: usize>(cur: &mut Cursor<&[u8]>) -> Result<[u8; N]> {
    let mut buf = [0u8; N];
    cur.read_exact(&mut buf)
        .map_err(|_| OperatorError::invalid("truncated DataFrame payload"))?;
    Ok(buf)
}

fn read_bytes(cur: &mut Cursor<&[u8]>) -> Result<Vec<u8>> {
    let len = u32::from_be_bytes(read_n(cur)?) as usize;
    let mut buf = vec![0u8; len];
    cur.read_exact(&mut buf)
        .map_err(|_| OperatorError::invalid("truncated DataFrame payload"))?;
    Ok(buf)
}

fn read_optional_i64(cur: &mut Cursor<&[u8]>) -> Result<Option<i64>> {
    let tag = read_u8(cur)?;
    if tag == 0 {
        Ok(None)
    } else {
        Ok(Some(i64::from_be_bytes(read_n(cur)?)))
    }
}

fn read_bigint(cur: &mut Cursor<&[u8]>) -> Result<BigInt> {
    let sign_byte = read_u8(cur)?;
    let sign = match sign_byte {
        0 => Sign::NoSign,
        1 => Sign::Plus,
        2 => Sign::Minus,
        _ => return Err(OperatorError::invalid("invalid BigInt sign byte")),
    };
    let magnitude = read_bytes(cur)?;
    Ok(BigInt::from_bytes_be(sign, &magnitude))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(df: DataFrame) {
        let encoded = df.encode();
        let decoded = DataFrame::decode(&encoded).expect("decode must succeed");
        assert_eq!(decoded, df);
    }

    #[test]
    fn primitives_round_trip() {
        roundtrip(DataFrame::Null);
        roundtrip(DataFrame::Int(i64::MIN));
        roundtrip(DataFrame::Int(i64::MAX));
        roundtrip(DataFrame::Uint(u64::MAX));
        roundtrip(DataFrame::Float(1.5));
        roundtrip(DataFrame::Float(-0.0));
        roundtrip(DataFrame::Bool(true));
        roundtrip(DataFrame::Str(String::new()));
        roundtrip(DataFrame::Str("hello".into()));
        roundtrip(DataFrame::Binary(vec![]));
        roundtrip(DataFrame::Binary(vec![1, 2, 3]));
    }

    #[test]
    fn nan_round_trips_bit_exact() {
        let nan = f64::NAN;
        let df = DataFrame::Float(nan);
        let encoded = df.encode();
        let decoded = DataFrame::decode(&encoded).unwrap();
        match decoded {
            DataFrame::Float(v) => assert_eq!(v.to_bits(), nan.to_bits()),
            _ => panic!("expected float"),
        }
    }

    #[test]
    fn bigint_round_trips() {
        roundtrip(DataFrame::BigInt(BigInt::from(0)));
        roundtrip(DataFrame::BigInt(BigInt::from(-123456789i64)));
        let huge = BigInt::from(2).pow(512);
        roundtrip(DataFrame::BigInt(huge));
    }

    #[test]
    fn decimal_round_trips() {
        roundtrip(DataFrame::Decimal(Decimal::new(BigInt::from(525), 2)));
        roundtrip(DataFrame::Decimal(Decimal::new(BigInt::from(-1), -3)));
    }

    #[test]
    fn bitmap_round_trips() {
        let mut bm32 = RoaringBitmap::new();
        bm32.insert(1);
        bm32.insert(1000);
        roundtrip(DataFrame::Bitmap32(bm32));

        let mut bm64 = RoaringTreemap::new();
        bm64.insert(1);
        bm64.insert(u64::MAX - 1);
        roundtrip(DataFrame::Bitmap64(bm64));
    }

    #[test]
    fn composite_meta_round_trips() {
        roundtrip(DataFrame::ListMeta(ListMeta {
            head: -4,
            tail: 10,
            count: 15,
        }));
        roundtrip(DataFrame::MapMeta(MapMeta { count: 3 }));
        roundtrip(DataFrame::SetMeta(SetMeta { count: 0 }));
        roundtrip(DataFrame::TimeSeriesMeta(TimeSeriesMeta {
            count: 2,
            first: Some(-1),
            last: None,
        }));
        let mut bloom = BloomMeta::new(64, 4);
        bloom.set_bit(3);
        bloom.population = 1;
        roundtrip(DataFrame::BloomMeta(bloom));
    }

    #[test]
    fn type_mismatch_on_wrong_accessor() {
        let df = DataFrame::Str("x".into());
        assert!(matches!(df.as_int(), Err(OperatorError::TypeMismatch)));
    }
}
