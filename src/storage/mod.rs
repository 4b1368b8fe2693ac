//! # Storage Module
//!
//! This module provides the storage core of RefDB: the slab-based
//! file-backed allocator and the bit-exact file envelope it validates.
//!
//! ## Architecture Overview
//!
//! Persistent node storage is addressed through *refs*, byte offsets into a
//! unified address space that begins at offset 0 inside the attached file
//! and continues past the file's end into heap slabs:
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │            SlabAlloc (this module)          │
//! ├──────────────────────┬──────────────────────┤
//! │  FileMap (mmap'd,    │  Slabs (heap, grown  │
//! │  immutable prefix)   │  on demand)          │
//! ├──────────────────────┴──────────────────────┤
//! │  FileHeader / StreamingFooter validation    │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! The file region is immutable under the allocator's own mutations:
//! in-session writes land in slab space, and the external commit path is
//! what publishes them back to the file. Free space is tracked in two
//! lists (mutable and read-only) whose discipline is described in
//! [`slab`].
//!
//! ## Module Organization
//!
//! - `file_map`: byte-granular memory-mapped file region
//! - `header`: the 24-byte header, 16-byte streaming footer, validation
//! - `slab`: the allocator itself, free lists, `DetachGuard`
//!
//! ## Error Handling
//!
//! Fallible operations return `eyre::Result`. Failures that mean "this is
//! not a valid database" (bad mnemonic, unknown format version, magic
//! cookie mismatch, truncated envelope) are reported through the
//! dedicated [`InvalidDatabase`] type so callers can distinguish
//! corruption from plain I/O errors via `Report::downcast_ref`.

mod file_map;
mod header;
mod slab;

pub use file_map::FileMap;
pub use header::{
    validate_header, FileHeader, StreamingFooter, ValidatedHeader, FLAGS_SELECT_BIT,
    FLAGS_SERVER_SYNC_MODE,
};
pub use slab::{Chunk, DetachGuard, FileAttachConfig, Ref, SlabAlloc};

use std::fmt;

/// The specified file or buffer does not appear to contain a valid
/// database: the envelope is truncated, the mnemonic or magic cookie is
/// wrong, the format version is unknown, or the attach options disagree
/// with how the database was created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidDatabase {
    message: String,
}

impl InvalidDatabase {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for InvalidDatabase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid database: {}", self.message)
    }
}

impl std::error::Error for InvalidDatabase {}
