//! # RefDB Configuration Constants
//!
//! This module centralizes the constants that define the on-disk envelope and
//! the ref address space. Constants that depend on each other are co-located
//! and pinned with compile-time assertions to prevent mismatch bugs.
//!
//! ## Dependency Graph
//!
//! ```text
//! REF_ALIGNMENT (8 bytes)
//!       │
//!       ├─> every ref handed out by the allocator is a multiple of this
//!       │
//!       └─> FIRST_SLAB_REF (slab space never hands out ref 0, the
//!           reserved "no ref" value, even when the baseline is 0)
//!
//! FILE_HEADER_SIZE (24 bytes)
//!       │
//!       ├─> two 8-byte top-refs + 8-byte info block
//!       │
//!       └─> MIN_STREAMING_FILE_SIZE (header + footer is the smallest
//!           file that can carry a streaming-form top-ref)
//!
//! STREAMING_FOOTER_SIZE (16 bytes)
//!       │
//!       └─> 8-byte top-ref + 8-byte magic cookie, at the very end of a
//!           streaming-form file
//! ```
//!
//! ## Modifying Constants
//!
//! The header and footer sizes are part of the file format and must never
//! change within a recognized format version. The slab floor and growth
//! policy are runtime tuning knobs; changing them affects allocation
//! patterns but not the on-disk format.

/// Alignment of every ref in the unified address space.
///
/// Refs are byte offsets from the start of the file, continued past the end
/// of the file into slab space. All allocation sizes are rounded up to this.
pub const REF_ALIGNMENT: usize = 8;

/// The first ref that slab space may occupy.
///
/// Ref 0 is reserved to mean "no ref", so when an allocator is attached with
/// an empty (zero-length) file region, slab space starts here instead of 0.
pub const FIRST_SLAB_REF: usize = REF_ALIGNMENT;

/// Size of the file header in bytes.
///
/// Layout: `top_ref[0]` (u64), `top_ref[1]` (u64), 4-byte mnemonic,
/// 2-byte format version, 1 reserved byte, 1 flags byte.
pub const FILE_HEADER_SIZE: usize = 24;

/// Size of the streaming footer in bytes: a u64 top-ref and a u64 cookie.
pub const STREAMING_FOOTER_SIZE: usize = 16;

/// Smallest file that can be on streaming form (header plus footer).
pub const MIN_STREAMING_FILE_SIZE: usize = FILE_HEADER_SIZE + STREAMING_FOOTER_SIZE;

/// Magic cookie stored in the streaming footer.
pub const FOOTER_MAGIC_COOKIE: u64 = 0x3034125237E526C8;

/// The four mnemonic bytes at header offset 16.
pub const FILE_MNEMONIC: &[u8; 4] = b"T-DB";

/// File format version written to newly created databases.
///
/// Version 3 adds null-string support; version 2 predates it. Both are
/// recognized on attach, and the version found in the file is preserved.
pub const CURRENT_FILE_FORMAT_VERSION: u8 = 3;

/// Oldest file format version this build can attach.
pub const MIN_FILE_FORMAT_VERSION: u8 = 2;

/// Smallest slab the allocator will create, in bytes.
///
/// Slab sizes double as the slab total grows, so this floor only matters
/// for the first few allocations of a session.
pub const MIN_SLAB_SIZE: usize = 128;

const _: () = assert!(FILE_HEADER_SIZE == 24, "file header layout is fixed at 24 bytes");
const _: () = assert!(STREAMING_FOOTER_SIZE == 16, "streaming footer layout is fixed at 16 bytes");
const _: () = assert!(
    MIN_SLAB_SIZE % REF_ALIGNMENT == 0,
    "slab floor must preserve ref alignment"
);
