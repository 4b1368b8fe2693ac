//! # Literal Parsing
//!
//! Hand-rolled parsers for the textual constant forms of the predicate
//! language: integers with automatic base detection, decimals, UUIDs,
//! ObjectIds, base64 payloads, and both timestamp forms.
//!
//! The query compiler is the only consumer; it decides *which* parser to
//! call from the constant's type hint, while these functions own the
//! format details and error messages.

pub mod literal;

pub use literal::{
    decode_base64, parse_decimal, parse_int_auto, parse_object_id, parse_timestamp, parse_uuid,
};
