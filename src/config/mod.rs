//! # RefDB Configuration Module
//!
//! This module centralizes configuration for RefDB: the file-format and
//! allocator constants in [`constants`], and the one process-wide runtime
//! flag the storage layer consults.
//!
//! ## Process-Wide State
//!
//! The only cross-cutting mutable state in the crate is the
//! `disable_sync_to_disk` flag. Test suites flip it to skip fsync calls
//! that would otherwise dominate wall-clock time; production code leaves
//! it alone. It lives behind a single `AtomicBool` rather than being
//! threaded through every constructor because it is consulted at fsync
//! sites only and has no ordering requirements beyond its own load.

pub mod constants;
pub use constants::*;

use std::sync::atomic::{AtomicBool, Ordering};

static DISABLE_SYNC_TO_DISK: AtomicBool = AtomicBool::new(false);

/// Suppresses every fsync the storage layer would otherwise issue.
///
/// Testing only. Durability guarantees are void while the flag is set.
pub fn set_disable_sync_to_disk(disable: bool) {
    DISABLE_SYNC_TO_DISK.store(disable, Ordering::Relaxed);
}

/// Whether fsync suppression is currently in effect.
pub fn sync_to_disk_disabled() -> bool {
    DISABLE_SYNC_TO_DISK.load(Ordering::Relaxed)
}
