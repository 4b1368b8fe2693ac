//! # Internal Macros
//!
//! This module provides internal macros for reducing boilerplate in RefDB.
//!
//! ## zerocopy_accessors!
//!
//! Generates getter and setter methods for zerocopy struct fields that use
//! the little-endian `U64` wrapper type. The file header and streaming
//! footer are read in place from mmap'd bytes, so every multi-byte field is
//! a wrapper type and every access goes through `get()`/`new()`.
//!
//! ### Usage
//!
//! ```ignore
//! use zerocopy::little_endian::U64;
//!
//! #[repr(C)]
//! struct StreamingFooter {
//!     top_ref: U64,
//!     magic_cookie: U64,
//! }
//!
//! impl StreamingFooter {
//!     zerocopy_accessors! {
//!         top_ref: u64,
//!         magic_cookie: u64,
//!     }
//! }
//!
//! // Generates:
//! // pub fn top_ref(&self) -> u64 { self.top_ref.get() }
//! // pub fn set_top_ref(&mut self, val: u64) { self.top_ref = U64::new(val); }
//! // ...
//! ```

/// Generates getter and setter methods for zerocopy little-endian fields.
#[macro_export]
macro_rules! zerocopy_accessors {
    (@impl $field:ident, u64) => {
        ::paste::paste! {
            #[inline]
            pub fn $field(&self) -> u64 {
                self.$field.get()
            }

            #[inline]
            pub fn [<set_ $field>](&mut self, val: u64) {
                self.$field = ::zerocopy::little_endian::U64::new(val);
            }
        }
    };
    ($($field:ident : $ty:tt),* $(,)?) => {
        $(
            $crate::zerocopy_accessors!(@impl $field, $ty);
        )*
    };
}
