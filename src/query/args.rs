//! # Argument Binding
//!
//! Positional `$N` arguments are bound through the [`Arguments`] trait,
//! which the constant compiler consults when it encounters an `ARG`
//! constant. The accessors are typed; asking for the wrong type fails,
//! which the compiler exploits for the Timestamp/ObjectId fallback (a
//! bound value that fails one accessor is retried through the other).
//!
//! Two implementations are provided: [`ValueArguments`] over a vector of
//! owned values, and [`NoArguments`] for argument-free parsing, which
//! fails on any index.

use eyre::{bail, Result};

use crate::types::{DataType, Decimal, ObjKey, ObjectId, QueryValue, Timestamp, Uuid};

/// Typed access to positional query arguments.
pub trait Arguments {
    fn bool_for(&self, n: usize) -> Result<bool>;
    fn long_for(&self, n: usize) -> Result<i64>;
    fn float_for(&self, n: usize) -> Result<f32>;
    fn double_for(&self, n: usize) -> Result<f64>;
    fn string_for(&self, n: usize) -> Result<String>;
    fn binary_for(&self, n: usize) -> Result<Vec<u8>>;
    fn timestamp_for(&self, n: usize) -> Result<Timestamp>;
    fn objectid_for(&self, n: usize) -> Result<ObjectId>;
    fn uuid_for(&self, n: usize) -> Result<Uuid>;
    fn decimal_for(&self, n: usize) -> Result<Decimal>;
    fn object_index_for(&self, n: usize) -> Result<ObjKey>;
    fn is_null(&self, n: usize) -> Result<bool>;
    fn type_for(&self, n: usize) -> Result<DataType>;
}

/// The default argument set: every access fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoArguments;

macro_rules! no_argument {
    ($($method:ident -> $ty:ty),* $(,)?) => {
        $(
            fn $method(&self, n: usize) -> Result<$ty> {
                bail!("request for argument at index {} but no arguments were supplied", n)
            }
        )*
    };
}

impl Arguments for NoArguments {
    no_argument! {
        bool_for -> bool,
        long_for -> i64,
        float_for -> f32,
        double_for -> f64,
        string_for -> String,
        binary_for -> Vec<u8>,
        timestamp_for -> Timestamp,
        objectid_for -> ObjectId,
        uuid_for -> Uuid,
        decimal_for -> Decimal,
        object_index_for -> ObjKey,
        is_null -> bool,
        type_for -> DataType,
    }
}

/// Arguments bound from a vector of owned values.
#[derive(Debug, Clone, Default)]
pub struct ValueArguments {
    values: Vec<QueryValue>,
}

impl ValueArguments {
    pub fn new(values: Vec<QueryValue>) -> Self {
        Self { values }
    }

    fn get(&self, n: usize) -> Result<&QueryValue> {
        if n >= self.values.len() {
            bail!(
                "request for argument at index {} but only {} arguments were supplied",
                n,
                self.values.len()
            );
        }
        Ok(&self.values[n])
    }
}

impl Arguments for ValueArguments {
    fn bool_for(&self, n: usize) -> Result<bool> {
        match self.get(n)? {
            QueryValue::Bool(b) => Ok(*b),
            other => bail!("argument {} is not a bool: {:?}", n, other),
        }
    }

    fn long_for(&self, n: usize) -> Result<i64> {
        match self.get(n)? {
            QueryValue::Int(v) => Ok(*v),
            other => bail!("argument {} is not an int: {:?}", n, other),
        }
    }

    fn float_for(&self, n: usize) -> Result<f32> {
        match self.get(n)? {
            QueryValue::Float(v) => Ok(*v),
            other => bail!("argument {} is not a float: {:?}", n, other),
        }
    }

    fn double_for(&self, n: usize) -> Result<f64> {
        match self.get(n)? {
            QueryValue::Double(v) => Ok(*v),
            other => bail!("argument {} is not a double: {:?}", n, other),
        }
    }

    fn string_for(&self, n: usize) -> Result<String> {
        match self.get(n)? {
            QueryValue::String(s) => Ok(s.clone()),
            other => bail!("argument {} is not a string: {:?}", n, other),
        }
    }

    fn binary_for(&self, n: usize) -> Result<Vec<u8>> {
        match self.get(n)? {
            QueryValue::Binary(b) => Ok(b.clone()),
            other => bail!("argument {} is not binary: {:?}", n, other),
        }
    }

    fn timestamp_for(&self, n: usize) -> Result<Timestamp> {
        match self.get(n)? {
            QueryValue::Timestamp(ts) => Ok(*ts),
            other => bail!("argument {} is not a timestamp: {:?}", n, other),
        }
    }

    fn objectid_for(&self, n: usize) -> Result<ObjectId> {
        match self.get(n)? {
            QueryValue::ObjectId(oid) => Ok(*oid),
            other => bail!("argument {} is not an objectId: {:?}", n, other),
        }
    }

    fn uuid_for(&self, n: usize) -> Result<Uuid> {
        match self.get(n)? {
            QueryValue::Uuid(u) => Ok(*u),
            other => bail!("argument {} is not a uuid: {:?}", n, other),
        }
    }

    fn decimal_for(&self, n: usize) -> Result<Decimal> {
        match self.get(n)? {
            QueryValue::Decimal(d) => Ok(*d),
            other => bail!("argument {} is not a decimal: {:?}", n, other),
        }
    }

    fn object_index_for(&self, n: usize) -> Result<ObjKey> {
        match self.get(n)? {
            QueryValue::ObjKey(key) => Ok(*key),
            other => bail!("argument {} is not an object key: {:?}", n, other),
        }
    }

    fn is_null(&self, n: usize) -> Result<bool> {
        Ok(self.get(n)?.is_null())
    }

    fn type_for(&self, n: usize) -> Result<DataType> {
        match self.get(n)?.data_type() {
            Some(dt) => Ok(dt),
            None => bail!("argument {} has no storage type", n),
        }
    }
}
