//! # Query Constant Values
//!
//! This module provides the owned value types that flow through query
//! compilation: the scalar carriers (`Timestamp`, `Decimal`, `ObjectId`,
//! `Uuid`, `ObjKey`) and the `QueryValue` sum over all of them.
//!
//! ## Sign Discipline for Timestamps
//!
//! A `Timestamp` stores seconds and nanoseconds separately, and both
//! components must carry the same sign (or be zero). `-1.5s` is
//! `(-1, -500_000_000)`, never `(-2, +500_000_000)`. The constructor
//! rejects mixed signs.
//!
//! ## Decimal Representation
//!
//! `Decimal` is a 128-bit scaled integer (`digits * 10^-scale`) with
//! dedicated infinity and NaN states, sufficient for constant storage and
//! equality in compiled predicates. Text parsing lives in
//! `parsing::literal`.

use eyre::{bail, Result};

use super::data_type::DataType;

/// Seconds-plus-nanoseconds instant, UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Timestamp {
    seconds: i64,
    nanoseconds: i32,
}

impl Timestamp {
    /// Builds a timestamp, rejecting components with opposite signs.
    pub fn new(seconds: i64, nanoseconds: i32) -> Result<Self> {
        let both_non_negative = seconds >= 0 && nanoseconds >= 0;
        let both_non_positive = seconds <= 0 && nanoseconds <= 0;
        if both_non_negative || both_non_positive {
            return Ok(Self {
                seconds,
                nanoseconds,
            });
        }
        bail!("Invalid timestamp format");
    }

    pub fn seconds(&self) -> i64 {
        self.seconds
    }

    pub fn nanoseconds(&self) -> i32 {
        self.nanoseconds
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum DecimalRepr {
    Finite { digits: i128, scale: i16 },
    Infinity { negative: bool },
    Nan,
}

/// 128-bit decimal constant: finite scaled integer, signed infinity, or NaN.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Decimal(DecimalRepr);

impl Decimal {
    pub fn finite(digits: i128, scale: i16) -> Self {
        Self(DecimalRepr::Finite { digits, scale })
    }

    pub fn infinity(negative: bool) -> Self {
        Self(DecimalRepr::Infinity { negative })
    }

    pub fn nan() -> Self {
        Self(DecimalRepr::Nan)
    }

    pub fn is_nan(&self) -> bool {
        matches!(self.0, DecimalRepr::Nan)
    }

    pub fn is_infinite(&self) -> bool {
        matches!(self.0, DecimalRepr::Infinity { .. })
    }

    /// Digits and scale of a finite decimal; `None` for infinity and NaN.
    pub fn to_parts(&self) -> Option<(i128, i16)> {
        match self.0 {
            DecimalRepr::Finite { digits, scale } => Some((digits, scale)),
            _ => None,
        }
    }
}

/// 12-byte object identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId([u8; 12]);

impl ObjectId {
    pub fn from_bytes(bytes: [u8; 12]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 12] {
        &self.0
    }
}

/// 16-byte universally unique identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Uuid([u8; 16]);

impl Uuid {
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

/// Key of an object within a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjKey(pub i64);

/// An owned, typed constant value as bound into or produced by a query.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryValue {
    Null,
    Int(i64),
    Bool(bool),
    String(String),
    Binary(Vec<u8>),
    Timestamp(Timestamp),
    Float(f32),
    Double(f64),
    Decimal(Decimal),
    ObjectId(ObjectId),
    Uuid(Uuid),
    ObjKey(ObjKey),
}

impl QueryValue {
    pub fn is_null(&self) -> bool {
        matches!(self, QueryValue::Null)
    }

    /// The storage type of this value; `None` for null and object keys.
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            QueryValue::Null | QueryValue::ObjKey(_) => None,
            QueryValue::Int(_) => Some(DataType::Int),
            QueryValue::Bool(_) => Some(DataType::Bool),
            QueryValue::String(_) => Some(DataType::String),
            QueryValue::Binary(_) => Some(DataType::Binary),
            QueryValue::Timestamp(_) => Some(DataType::Timestamp),
            QueryValue::Float(_) => Some(DataType::Float),
            QueryValue::Double(_) => Some(DataType::Double),
            QueryValue::Decimal(_) => Some(DataType::Decimal),
            QueryValue::ObjectId(_) => Some(DataType::ObjectId),
            QueryValue::Uuid(_) => Some(DataType::Uuid),
        }
    }
}
