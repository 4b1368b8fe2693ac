//! # Memory-Mapped File Region
//!
//! This module implements `FileMap`, the low-level building block that maps
//! the attached database file into the process address space. It provides
//! byte-granular access to the file region of the ref address space; the
//! slab allocator layers its free-list and slab bookkeeping on top.
//!
//! ## Internal Component
//!
//! `FileMap` is an internal component used by `SlabAlloc`. Users should not
//! create `FileMap` instances directly; the allocator manages attachment,
//! remapping, and teardown.
//!
//! ## Design Philosophy
//!
//! Refs are byte offsets from the start of the file, so the mapping is a
//! single contiguous byte region rather than a page array. The file prefix
//! `[0, len)` is immutable with respect to the allocator's own mutations;
//! writes reach the file only through `prepare_for_update` (streaming-form
//! promotion) and the external commit path, which is why the map carries an
//! explicit read-only/writable mode instead of always mapping writable.
//!
//! ## Safety Considerations
//!
//! A mapped region becomes invalid when remapped (during `remap()`). Since
//! `remap()` requires `&mut self`, the borrow checker ensures no slice
//! references into the old mapping survive the call; callers that cached
//! raw addresses through `translate` must re-resolve them when `remap`
//! reports that the base address moved.
//!
//! ## Error Handling
//!
//! All fallible operations return `eyre::Result` with the file path and
//! operation in the message.

use std::fs::File;
use std::path::{Path, PathBuf};

use eyre::{ensure, Result, WrapErr};
use memmap2::{Mmap, MmapMut};

enum Mapping {
    /// Zero-length files cannot be mapped; an empty region stands in.
    Empty,
    ReadOnly(Mmap),
    Writable(MmapMut),
}

/// A memory-mapped prefix of the attached database file.
pub struct FileMap {
    file: File,
    path: PathBuf,
    mapping: Mapping,
    len: usize,
    read_only: bool,
}

impl std::fmt::Debug for FileMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileMap")
            .field("path", &self.path)
            .field("len", &self.len)
            .field("read_only", &self.read_only)
            .finish()
    }
}

impl FileMap {
    /// Maps `len` bytes of `file`. The file must be at least `len` long.
    pub fn new<P: AsRef<Path>>(file: File, path: P, len: usize, read_only: bool) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mapping = Self::map(&file, &path, len, read_only)?;
        Ok(Self {
            file,
            path,
            mapping,
            len,
            read_only,
        })
    }

    fn map(file: &File, path: &Path, len: usize, read_only: bool) -> Result<Mapping> {
        if len == 0 {
            return Ok(Mapping::Empty);
        }

        if read_only {
            // SAFETY: Mmap::map is unsafe because the file could be modified
            // externally while mapped. This is safe because:
            // 1. Database files are exclusively owned by the attached
            //    allocator for the duration of the session
            // 2. The mapping lifetime is tied to FileMap, preventing
            //    use-after-unmap
            // 3. All access goes through bounds-checked slices
            let map = unsafe {
                memmap2::MmapOptions::new()
                    .len(len)
                    .map(file)
                    .wrap_err_with(|| format!("failed to memory-map '{}'", path.display()))?
            };
            Ok(Mapping::ReadOnly(map))
        } else {
            // SAFETY: as above; additionally the file is opened with write
            // access, so MAP_SHARED writes are backed by the file itself.
            let map = unsafe {
                memmap2::MmapOptions::new()
                    .len(len)
                    .map_mut(file)
                    .wrap_err_with(|| format!("failed to memory-map '{}'", path.display()))?
            };
            Ok(Mapping::Writable(map))
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file(&self) -> &File {
        &self.file
    }

    pub fn as_slice(&self) -> &[u8] {
        match &self.mapping {
            Mapping::Empty => &[],
            Mapping::ReadOnly(m) => &m[..self.len],
            Mapping::Writable(m) => &m[..self.len],
        }
    }

    /// Mutable access to the mapped region; fails on a read-only mapping.
    pub fn as_mut_slice(&mut self) -> Result<&mut [u8]> {
        match &mut self.mapping {
            Mapping::Writable(m) => Ok(&mut m[..self.len]),
            Mapping::Empty => Ok(&mut []),
            Mapping::ReadOnly(_) => eyre::bail!(
                "file '{}' is mapped read-only",
                self.path.display()
            ),
        }
    }

    pub fn base_ptr(&self) -> *const u8 {
        match &self.mapping {
            Mapping::Empty => std::ptr::null(),
            Mapping::ReadOnly(m) => m.as_ptr(),
            Mapping::Writable(m) => m.as_ptr(),
        }
    }

    /// Re-maps the file so a prefix of `new_len` bytes is available.
    ///
    /// Returns true if, and only if the base address of the mapping moved.
    /// The file itself must already be at least `new_len` bytes long.
    pub fn remap(&mut self, new_len: usize) -> Result<bool> {
        let file_len = self
            .file
            .metadata()
            .wrap_err_with(|| format!("failed to stat '{}'", self.path.display()))?
            .len();
        ensure!(
            new_len as u64 <= file_len,
            "cannot map {} bytes of '{}': file is only {} bytes",
            new_len,
            self.path.display(),
            file_len
        );

        let old_base = self.base_ptr();
        let new_mapping = Self::map(&self.file, &self.path, new_len, self.read_only)?;
        self.mapping = new_mapping;
        self.len = new_len;
        Ok(self.base_ptr() != old_base)
    }

    pub fn flush(&self) -> Result<()> {
        match &self.mapping {
            Mapping::Empty | Mapping::ReadOnly(_) => Ok(()),
            Mapping::Writable(m) => m
                .flush()
                .wrap_err_with(|| format!("failed to flush '{}'", self.path.display())),
        }
    }

    /// Hints the kernel to read the given range ahead of demand paging.
    pub fn prefetch(&self, offset: usize, len: usize) {
        if offset >= self.len {
            return;
        }
        let len = len.min(self.len - offset);
        if len == 0 {
            return;
        }

        #[cfg(unix)]
        // SAFETY: madvise with MADV_WILLNEED is a kernel hint. The range is
        // clamped to the mapped region above, so the address and length are
        // always within the live mapping.
        unsafe {
            libc::madvise(
                self.base_ptr().add(offset) as *mut libc::c_void,
                len,
                libc::MADV_WILLNEED,
            );
        }
        #[cfg(not(unix))]
        let _ = (offset, len);
    }
}
