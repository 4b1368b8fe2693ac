//! # Type System
//!
//! Canonical data types and owned constant values shared by the schema
//! layer and the query compiler.
//!
//! - [`data_type`]: the `DataType` enum and the comparability table
//! - [`value`]: scalar carriers and the `QueryValue` constant sum type

mod data_type;
mod value;

pub use data_type::{data_types_are_comparable, DataType};
pub use value::{Decimal, ObjKey, ObjectId, QueryValue, Timestamp, Uuid};
