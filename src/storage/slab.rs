//! # Slab Allocator
//!
//! This module implements `SlabAlloc`, the allocator that manages the memory
//! of a RefDB database. It presents a single monotonically-growing ref
//! address space: byte offsets that start at 0 inside the attached file and
//! continue past the file's end into dynamically-grown heap slabs.
//!
//! ## Address Space
//!
//! ```text
//! ref 0                    baseline                      total_size
//! │  file region (mmap'd)  │  slab 0  │  slab 1  │  ...  │
//! └────────── immutable ───┴───────── mutable ───────────┘
//! ```
//!
//! The file region is immutable with respect to the allocator's own
//! mutations; in-session allocations live in slabs. Slabs are contiguous in
//! ref space (each starts where the previous one ends) and ordered by
//! ascending `ref_end`, which makes `translate` a binary search.
//!
//! ## Free-List Discipline
//!
//! Two free lists are kept. The mutable list holds slab-space chunks that
//! `alloc` may reuse; it is sorted by ref and coalesces on free, so
//! first-fit returns the lowest-address fit. The read-only list records
//! chunks known to be free in the file region; those cannot be reused
//! until the external commit path runs, because in-flight readers may still
//! reference the on-disk copy.
//!
//! The free-space state machine is {Clean, Dirty, Invalid}. A failed
//! allocation during free-list maintenance leaves the lists unusable
//! (Invalid); from there only `reset_free_space_tracking` and `detach` are
//! valid. List growth goes through `Vec::try_reserve` so that the failure
//! can actually be observed instead of aborting.
//!
//! ## Attachment
//!
//! An allocator is born detached. `attach_file`, `attach_buffer`, or
//! `attach_empty` promotes it; `detach` is idempotent and returns it to the
//! detached state (handing back the caller's buffer when the attachment was
//! `UsersBuffer`). `DetachGuard` guarantees release on any exit path from
//! an attach sequence.
//!
//! ## Thread Safety
//!
//! `SlabAlloc` is not thread-safe for mutation; at most one writer may
//! operate on it at a time. When used on behalf of a shared-group
//! coordinator, that coordinator provides the multi-reader/single-writer
//! discipline and the allocator trusts it.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use eyre::{bail, ensure, Result, WrapErr};

use crate::config::{
    sync_to_disk_disabled, FILE_HEADER_SIZE, FIRST_SLAB_REF, MIN_SLAB_SIZE, REF_ALIGNMENT,
};

use super::file_map::FileMap;
use super::header::{validate_header, FileHeader, StreamingFooter, ValidatedHeader, FLAGS_SELECT_BIT};
use super::InvalidDatabase;

/// A byte offset into the unified address space. Always a multiple of 8;
/// zero is reserved to mean "no ref".
pub type Ref = usize;

/// A contiguous heap buffer extending the ref address space past the file.
///
/// The slab's span ends at `ref_end`; its start is the previous slab's
/// `ref_end` (or the slab base for the first slab).
#[derive(Debug)]
struct Slab {
    ref_end: Ref,
    buf: Box<[u8]>,
}

/// A region of the ref address space that is currently unallocated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    pub ref_: Ref,
    pub size: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttachMode {
    None,
    /// We own the buffer (no buffer at all for `attach_empty`).
    OwnedBuffer,
    /// The caller gets the buffer back on detach.
    UsersBuffer,
    /// Attached to a file on behalf of a shared-group coordinator.
    SharedFile,
    UnsharedFile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FreeSpaceState {
    /// Free lists are up to date with the latest commit.
    Clean,
    /// In-session allocations or frees have modified the free lists.
    Dirty,
    /// A failed allocation mid-update left the lists unusable.
    Invalid,
}

/// Options for [`SlabAlloc::attach_file`].
#[derive(Debug, Clone, Default)]
pub struct FileAttachConfig {
    /// True if attaching on behalf of a shared-group coordinator. Implies
    /// that `read_only` and `no_create` are false.
    pub is_shared: bool,
    /// Open the file in read-only mode. Implies `no_create`.
    pub read_only: bool,
    /// Fail if the file does not already contain a database.
    pub no_create: bool,
    /// Skip header validation. In a set of overlapping shared sessions only
    /// the first may validate, otherwise there is a race.
    pub skip_validate: bool,
    /// 32-byte encryption key, if the backing storage is encrypted.
    pub encryption_key: Option<Vec<u8>>,
    /// Whether the database is operated in server-sync mode. Stored on
    /// creation; validated against the stored bit on attach.
    pub server_sync_mode: bool,
}

/// The slab allocator. See the module docs for the full model.
#[derive(Debug)]
pub struct SlabAlloc {
    file_map: Option<FileMap>,
    buffer: Option<Vec<u8>>,
    attach_mode: AttachMode,
    baseline: usize,
    file_on_streaming_form: bool,
    free_space_state: FreeSpaceState,
    file_format_version: u8,
    slabs: Vec<Slab>,
    free_space: Vec<Chunk>,
    free_read_only: Vec<Chunk>,
}

impl Default for SlabAlloc {
    fn default() -> Self {
        Self::new()
    }
}

impl SlabAlloc {
    pub fn new() -> Self {
        Self {
            file_map: None,
            buffer: None,
            attach_mode: AttachMode::None,
            baseline: 0,
            file_on_streaming_form: false,
            free_space_state: FreeSpaceState::Clean,
            file_format_version: crate::config::CURRENT_FILE_FORMAT_VERSION,
            slabs: Vec::new(),
            free_space: Vec::new(),
            free_read_only: Vec::new(),
        }
    }

    /// Attaches this allocator to the specified file.
    ///
    /// If the file is empty and creation is permitted, it is initialized
    /// with the canonical empty header. Returns the ref of the root node,
    /// or zero if there is none.
    ///
    /// It is an error to call this on an attached allocator.
    pub fn attach_file<P: AsRef<Path>>(&mut self, path: P, cfg: FileAttachConfig) -> Result<Ref> {
        let path = path.as_ref();
        ensure!(!self.is_attached(), "allocator is already attached");
        ensure!(
            !cfg.is_shared || (!cfg.read_only && !cfg.no_create),
            "a shared attachment cannot be read-only or no-create"
        );
        if cfg.encryption_key.is_some() {
            bail!("encryption is not supported by this build");
        }

        let read_only = cfg.read_only;
        let no_create = cfg.no_create || read_only;

        let mut options = OpenOptions::new();
        options.read(true);
        if !read_only {
            options.write(true).create(!no_create);
        }
        let file = options
            .open(path)
            .wrap_err_with(|| format!("failed to open database file '{}'", path.display()))?;

        let mut size = file
            .metadata()
            .wrap_err_with(|| format!("failed to get metadata for '{}'", path.display()))?
            .len() as usize;

        let mut initialized = false;
        if size == 0 {
            if read_only {
                return Err(InvalidDatabase::new(format!(
                    "database file '{}' is empty",
                    path.display()
                ))
                .into());
            }
            if no_create {
                bail!("database file '{}' is empty and no_create is set", path.display());
            }

            let header = FileHeader::new_empty(cfg.server_sync_mode);
            (&file)
                .write_all(zerocopy::IntoBytes::as_bytes(&header))
                .wrap_err_with(|| format!("failed to initialize '{}'", path.display()))?;
            if !sync_to_disk_disabled() {
                file.sync_all()
                    .wrap_err_with(|| format!("failed to sync '{}'", path.display()))?;
            }
            size = FILE_HEADER_SIZE;
            initialized = true;
        }

        if size < FILE_HEADER_SIZE {
            return Err(InvalidDatabase::new(format!(
                "database file '{}' is too small ({} bytes)",
                path.display(),
                size
            ))
            .into());
        }

        let map = FileMap::new(file, path, size, read_only)?;

        let validated = if initialized {
            ValidatedHeader {
                top_ref: 0,
                on_streaming_form: false,
                file_format_version: crate::config::CURRENT_FILE_FORMAT_VERSION,
                server_sync_mode: cfg.server_sync_mode,
            }
        } else if cfg.skip_validate {
            // Another overlapping session already validated the header; the
            // top-ref will be taken from the coordination layer instead.
            ValidatedHeader {
                top_ref: 0,
                on_streaming_form: false,
                file_format_version: crate::config::CURRENT_FILE_FORMAT_VERSION,
                server_sync_mode: cfg.server_sync_mode,
            }
        } else {
            let validated = validate_header(map.as_slice())?;
            if validated.server_sync_mode != cfg.server_sync_mode {
                return Err(InvalidDatabase::new(format!(
                    "database file '{}' was created with server_sync_mode={}, attach requested {}",
                    path.display(),
                    validated.server_sync_mode,
                    cfg.server_sync_mode
                ))
                .into());
            }
            validated
        };

        map.prefetch(0, size);

        self.file_map = Some(map);
        self.attach_mode = if cfg.is_shared {
            AttachMode::SharedFile
        } else {
            AttachMode::UnsharedFile
        };
        self.baseline = size;
        self.file_on_streaming_form = validated.on_streaming_form;
        self.file_format_version = validated.file_format_version;

        Ok(validated.top_ref)
    }

    /// Attaches this allocator to an in-memory buffer.
    ///
    /// The attachment mode is UsersBuffer: `detach` hands the buffer back
    /// to the caller unless [`own_buffer`](Self::own_buffer) was called.
    pub fn attach_buffer(&mut self, data: Vec<u8>) -> Result<Ref> {
        ensure!(!self.is_attached(), "allocator is already attached");

        let validated = validate_header(&data)?;

        self.baseline = data.len();
        self.buffer = Some(data);
        self.attach_mode = AttachMode::UsersBuffer;
        self.file_on_streaming_form = validated.on_streaming_form;
        self.file_format_version = validated.file_format_version;

        Ok(validated.top_ref)
    }

    /// Attaches this allocator with no backing region; the baseline is 0
    /// and every allocation lives in slab space.
    pub fn attach_empty(&mut self) {
        assert!(!self.is_attached(), "allocator is already attached");
        self.attach_mode = AttachMode::OwnedBuffer;
        self.baseline = 0;
        self.file_on_streaming_form = false;
    }

    /// Transfers ownership of a buffer attached with `attach_buffer` to
    /// this allocator, so `detach` drops it instead of handing it back.
    pub fn own_buffer(&mut self) {
        assert_eq!(
            self.attach_mode,
            AttachMode::UsersBuffer,
            "own_buffer requires a UsersBuffer attachment"
        );
        self.attach_mode = AttachMode::OwnedBuffer;
    }

    /// Detaches from the backing file or buffer. Idempotent.
    ///
    /// Returns the attached buffer when the attachment mode was
    /// UsersBuffer, so the caller regains ownership. Free-space tracking is
    /// deliberately not reset; use
    /// [`reset_free_space_tracking`](Self::reset_free_space_tracking) for a
    /// complete reset.
    pub fn detach(&mut self) -> Option<Vec<u8>> {
        let handed_back = match self.attach_mode {
            AttachMode::UsersBuffer => self.buffer.take(),
            _ => {
                self.buffer = None;
                None
            }
        };
        self.file_map = None;
        self.attach_mode = AttachMode::None;
        self.baseline = 0;
        self.file_on_streaming_form = false;
        handed_back
    }

    pub fn is_attached(&self) -> bool {
        self.attach_mode != AttachMode::None
    }

    /// True when attached and the attachment has a backing region, that
    /// is, when it was not established with `attach_empty`.
    pub fn nonempty_attachment(&self) -> bool {
        self.is_attached() && (self.file_map.is_some() || self.buffer.is_some())
    }

    /// The file format version found at attach time.
    pub fn file_format(&self) -> u8 {
        self.file_format_version
    }

    /// Size in bytes of the attached file or buffer region. Changes only
    /// through `remap` and the attach functions, never through `alloc`.
    pub fn baseline(&self) -> usize {
        debug_assert!(self.is_attached());
        self.baseline
    }

    /// Total managed ref space: the baseline plus all slabs, free or not.
    pub fn total_size(&self) -> usize {
        match self.slabs.last() {
            Some(slab) => slab.ref_end,
            None => self.baseline,
        }
    }

    fn file_region(&self) -> &[u8] {
        if let Some(map) = &self.file_map {
            map.as_slice()
        } else if let Some(buf) = &self.buffer {
            buf
        } else {
            &[]
        }
    }

    /// The ref at which slab space begins. Never zero: ref 0 is reserved,
    /// so an empty attachment starts slab space at the first aligned ref.
    fn slab_base(&self) -> Ref {
        self.baseline.max(FIRST_SLAB_REF)
    }

    fn slab_start(&self, index: usize) -> Ref {
        if index == 0 {
            self.slab_base()
        } else {
            self.slabs[index - 1].ref_end
        }
    }

    /// Index of the slab owning `ref_`: the first slab with `ref_end > ref_`.
    fn slab_index_of(&self, ref_: Ref) -> usize {
        self.slabs.partition_point(|slab| slab.ref_end <= ref_)
    }

    fn ensure_free_space_valid(&self) -> Result<()> {
        ensure!(
            self.free_space_state != FreeSpaceState::Invalid,
            "free space tracking is invalid; reset_free_space_tracking is required"
        );
        Ok(())
    }

    /// Allocates a chunk of at least `size` bytes, 8-aligned.
    ///
    /// First-fit over the mutable free list, splitting larger chunks;
    /// extends the address space with a new slab when nothing fits.
    pub fn alloc(&mut self, size: usize) -> Result<(Ref, &mut [u8])> {
        self.ensure_free_space_valid()?;
        ensure!(self.is_attached(), "allocator is not attached");
        ensure!(size > 0, "cannot allocate zero bytes");

        let size = round_up(size, REF_ALIGNMENT);

        // First-fit search of the mutable free list.
        if let Some(idx) = self.free_space.iter().position(|c| c.size >= size) {
            let chunk = &mut self.free_space[idx];
            let ref_ = chunk.ref_;
            if chunk.size == size {
                self.free_space.remove(idx);
            } else {
                chunk.ref_ += size;
                chunk.size -= size;
            }
            self.free_space_state = FreeSpaceState::Dirty;
            let slab_idx = self.slab_index_of(ref_);
            let offset = ref_ - self.slab_start(slab_idx);
            return Ok((ref_, &mut self.slabs[slab_idx].buf[offset..offset + size]));
        }

        // Nothing fits: extend the address space with a new slab. The slab
        // doubles the current slab total, bounded below by the request and
        // the floor.
        let curr_total: usize = self.total_size() - self.slab_base().min(self.total_size());
        let slab_size = round_up(size.max(curr_total).max(MIN_SLAB_SIZE), REF_ALIGNMENT);

        let slab_start = match self.slabs.last() {
            Some(slab) => slab.ref_end,
            None => self.slab_base(),
        };

        let mut buf = Vec::new();
        if buf.try_reserve_exact(slab_size).is_err() {
            bail!("out of memory allocating a {} byte slab", slab_size);
        }
        buf.resize(slab_size, 0);

        if self.slabs.try_reserve(1).is_err() || self.free_space.try_reserve(1).is_err() {
            self.free_space_state = FreeSpaceState::Invalid;
            bail!("out of memory extending free space tracking");
        }

        self.slabs.push(Slab {
            ref_end: slab_start + slab_size,
            buf: buf.into_boxed_slice(),
        });
        if slab_size > size {
            // The remainder is free; it has the highest ref so pushing at
            // the end keeps the list sorted.
            self.free_space.push(Chunk {
                ref_: slab_start + size,
                size: slab_size - size,
            });
        }
        self.free_space_state = FreeSpaceState::Dirty;

        let slab = self.slabs.last_mut().expect("slab was just pushed");
        Ok((slab_start, &mut slab.buf[..size]))
    }

    /// Reallocates a chunk. Always allocates fresh space, copies
    /// `min(old_size, new_size)` bytes, and frees the old chunk; growth in
    /// place is never attempted because the free lists do not model
    /// adjacency cheaply enough to make it worthwhile.
    pub fn realloc(&mut self, ref_: Ref, old_size: usize, new_size: usize) -> Result<(Ref, &mut [u8])> {
        self.ensure_free_space_valid()?;

        let old_ptr = self.translate(ref_);
        let (new_ref, new_slice) = self.alloc(new_size)?;
        let copy_len = old_size.min(new_size);
        // SAFETY: the source chunk was live before this call and the
        // destination is a freshly allocated slab chunk, so the two regions
        // are disjoint; old_ptr is valid for old_size bytes and the
        // destination slice is at least copy_len long.
        unsafe {
            std::ptr::copy_nonoverlapping(old_ptr, new_slice.as_mut_ptr(), copy_len);
        }
        self.free(ref_, old_size);
        self.get_mut(new_ref, new_size).map(|slice| (new_ref, slice))
    }

    /// Returns a chunk to the appropriate free list.
    ///
    /// A free in the file region targets the read-only list (the on-disk
    /// copy may still be referenced by readers until a commit); a free in
    /// slab space targets the mutable list and coalesces with adjacent
    /// chunks of the same slab.
    ///
    /// A failure to grow a free list leaves free-space tracking Invalid;
    /// from there only `reset_free_space_tracking` and `detach` are valid.
    pub fn free(&mut self, ref_: Ref, size: usize) {
        if self.free_space_state == FreeSpaceState::Invalid {
            return;
        }
        let size = round_up(size, REF_ALIGNMENT);
        self.free_space_state = FreeSpaceState::Dirty;

        if ref_ < self.baseline {
            if self.free_read_only.try_reserve(1).is_err() {
                self.free_space_state = FreeSpaceState::Invalid;
                return;
            }
            self.free_read_only.push(Chunk { ref_, size });
            return;
        }

        let slab_idx = self.slab_index_of(ref_);
        let idx = self.free_space.partition_point(|c| c.ref_ < ref_);

        // Coalesce with the preceding chunk when it ends exactly at this
        // ref and lives in the same slab (chunks never span slabs: the ref
        // spans are contiguous but the backing buffers are not).
        let merge_prev = idx > 0 && {
            let prev = self.free_space[idx - 1];
            prev.ref_ + prev.size == ref_ && self.slab_index_of(prev.ref_) == slab_idx
        };
        let merge_next = idx < self.free_space.len() && {
            let next = self.free_space[idx];
            ref_ + size == next.ref_ && self.slab_index_of(next.ref_) == slab_idx
        };

        match (merge_prev, merge_next) {
            (true, true) => {
                let next_size = self.free_space[idx].size;
                self.free_space[idx - 1].size += size + next_size;
                self.free_space.remove(idx);
            }
            (true, false) => {
                self.free_space[idx - 1].size += size;
            }
            (false, true) => {
                let next = &mut self.free_space[idx];
                next.ref_ = ref_;
                next.size += size;
            }
            (false, false) => {
                if self.free_space.try_reserve(1).is_err() {
                    self.free_space_state = FreeSpaceState::Invalid;
                    return;
                }
                self.free_space.insert(idx, Chunk { ref_, size });
            }
        }
    }

    /// Translates a ref to its address.
    ///
    /// Refs below the baseline resolve into the file region; refs above it
    /// are resolved by binary search over the slab sequence.
    ///
    /// Panics if `ref_` does not name managed memory.
    pub fn translate(&self, ref_: Ref) -> *const u8 {
        if ref_ < self.baseline {
            let region = self.file_region();
            debug_assert!(ref_ < region.len());
            return region[ref_..].as_ptr();
        }
        let idx = self.slab_index_of(ref_);
        assert!(idx < self.slabs.len(), "ref {} is past the managed address space", ref_);
        let offset = ref_ - self.slab_start(idx);
        self.slabs[idx].buf[offset..].as_ptr()
    }

    /// Bounds-checked read access to `len` bytes at `ref_`.
    pub fn get(&self, ref_: Ref, len: usize) -> Result<&[u8]> {
        if ref_ < self.baseline {
            let region = self.file_region();
            ensure!(
                ref_ + len <= self.baseline && ref_ + len <= region.len(),
                "range {}..{} exceeds the file region",
                ref_,
                ref_ + len
            );
            return Ok(&region[ref_..ref_ + len]);
        }
        let idx = self.slab_index_of(ref_);
        ensure!(
            idx < self.slabs.len(),
            "ref {} is past the managed address space",
            ref_
        );
        let offset = ref_ - self.slab_start(idx);
        let slab = &self.slabs[idx];
        ensure!(
            offset + len <= slab.buf.len(),
            "range {}..{} crosses a slab boundary",
            ref_,
            ref_ + len
        );
        Ok(&slab.buf[offset..offset + len])
    }

    /// Bounds-checked write access to `len` bytes at `ref_`.
    ///
    /// Fails for refs below the baseline: the file region is immutable
    /// under this allocator; writes to it go through the external writer.
    pub fn get_mut(&mut self, ref_: Ref, len: usize) -> Result<&mut [u8]> {
        ensure!(
            ref_ >= self.baseline,
            "ref {} is in the immutable file region",
            ref_
        );
        let idx = self.slab_index_of(ref_);
        ensure!(
            idx < self.slabs.len(),
            "ref {} is past the managed address space",
            ref_
        );
        let offset = ref_ - self.slab_start(idx);
        let start = self.slab_start(idx);
        let slab = &mut self.slabs[idx];
        ensure!(
            offset + len <= slab.buf.len(),
            "range {}..{} crosses a slab boundary at {}",
            ref_,
            ref_ + len,
            start + slab.buf.len()
        );
        Ok(&mut slab.buf[offset..offset + len])
    }

    /// Chunks known to be free in the file region but possibly still
    /// referenced by in-flight readers. Fails while free-space tracking is
    /// invalid.
    pub fn free_read_only(&self) -> Result<&[Chunk]> {
        self.ensure_free_space_valid()?;
        Ok(&self.free_read_only)
    }

    /// Marks all managed memory except the attached file as free space and
    /// returns the state machine to Clean.
    pub fn reset_free_space_tracking(&mut self) -> Result<()> {
        self.free_space.clear();
        self.free_read_only.clear();

        if self.free_space.try_reserve(self.slabs.len()).is_err() {
            self.free_space_state = FreeSpaceState::Invalid;
            bail!("out of memory rebuilding free space tracking");
        }
        let mut start = self.slab_base();
        for slab in &self.slabs {
            self.free_space.push(Chunk {
                ref_: start,
                size: slab.ref_end - start,
            });
            start = slab.ref_end;
        }
        self.free_space_state = FreeSpaceState::Clean;
        Ok(())
    }

    /// Re-maps the attached file so a prefix of `file_size` bytes becomes
    /// the file region, rebasing the (fully free) slabs above it.
    ///
    /// Returns true if, and only if the base address of the mapping moved,
    /// in which case callers must re-resolve any cached addresses.
    pub fn remap(&mut self, file_size: usize) -> Result<bool> {
        ensure!(
            matches!(self.attach_mode, AttachMode::SharedFile | AttachMode::UnsharedFile),
            "remap requires a file attachment"
        );
        ensure!(
            file_size % REF_ALIGNMENT == 0 && file_size >= self.baseline,
            "invalid remap size {}",
            file_size
        );
        ensure!(
            self.free_read_only.is_empty() && self.free_space.len() == self.slabs.len(),
            "remap requires fully reset free space tracking"
        );

        let map = self.file_map.as_mut().expect("file attachment has a map");
        let moved = map.remap(file_size)?;
        self.baseline = file_size;

        // Rebase each slab (and its covering free chunk) above the new
        // baseline, preserving sizes and contiguity.
        let mut offset = self.slab_base();
        for (slab, chunk) in self.slabs.iter_mut().zip(self.free_space.iter_mut()) {
            let size = slab.buf.len();
            chunk.ref_ = offset;
            chunk.size = size;
            offset += size;
            slab.ref_end = offset;
        }

        Ok(moved)
    }

    /// Converts a streaming-form file to the in-place form: the header's
    /// first top-ref slot takes the footer's top-ref and the footer region
    /// is zeroed. Does nothing when the file is not on streaming form or
    /// validation was skipped at attach time.
    pub fn prepare_for_update(&mut self) -> Result<()> {
        ensure!(
            matches!(self.attach_mode, AttachMode::SharedFile | AttachMode::UnsharedFile),
            "prepare_for_update requires a file attachment"
        );
        if !self.file_on_streaming_form {
            return Ok(());
        }

        let map = self.file_map.as_mut().expect("file attachment has a map");
        let data = map.as_mut_slice()?;

        let footer_top_ref = StreamingFooter::from_bytes(data)?.top_ref();
        {
            let header = FileHeader::from_bytes_mut(data)?;
            header.set_top_ref_0(footer_top_ref);
            let flags = header.flags() & !FLAGS_SELECT_BIT;
            header.set_flags(flags);
        }
        let len = data.len();
        data[len - crate::config::STREAMING_FOOTER_SIZE..].fill(0);

        self.file_on_streaming_form = false;
        Ok(())
    }

    /// Whether the attached file carries its top-ref in a footer.
    pub fn is_on_streaming_form(&self) -> bool {
        self.file_on_streaming_form
    }

    /// Resizes the attached file and syncs, unless sync-to-disk is
    /// disabled process-wide.
    pub fn resize_file(&mut self, new_file_size: usize) -> Result<()> {
        let map = self.require_file_map()?;
        map.file()
            .set_len(new_file_size as u64)
            .wrap_err_with(|| format!("failed to resize '{}'", map.path().display()))?;
        if !sync_to_disk_disabled() {
            map.file()
                .sync_all()
                .wrap_err_with(|| format!("failed to sync '{}'", map.path().display()))?;
        }
        Ok(())
    }

    /// Preallocates on-disk blocks up to `size_in_bytes` to avoid later
    /// allocation errors and reduce fragmentation. Best-effort: platforms
    /// without preallocation support only get the size guarantee.
    pub fn reserve_disk_space(&mut self, size_in_bytes: usize) -> Result<()> {
        let map = self.require_file_map()?;

        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;
            // posix_fallocate reports unsupported filesystems through its
            // return value rather than errno.
            let ret = unsafe {
                libc::posix_fallocate(map.file().as_raw_fd(), 0, size_in_bytes as libc::off_t)
            };
            if ret != 0 && ret != libc::EOPNOTSUPP && ret != libc::EINVAL {
                bail!(
                    "failed to preallocate {} bytes for '{}': {}",
                    size_in_bytes,
                    map.path().display(),
                    std::io::Error::from_raw_os_error(ret)
                );
            }
        }

        let current = map
            .file()
            .metadata()
            .wrap_err_with(|| format!("failed to stat '{}'", map.path().display()))?
            .len();
        if current < size_in_bytes as u64 {
            map.file()
                .set_len(size_in_bytes as u64)
                .wrap_err_with(|| format!("failed to grow '{}'", map.path().display()))?;
        }

        if !sync_to_disk_disabled() {
            map.file()
                .sync_all()
                .wrap_err_with(|| format!("failed to sync '{}'", map.path().display()))?;
        }
        Ok(())
    }

    fn require_file_map(&self) -> Result<&FileMap> {
        ensure!(
            matches!(self.attach_mode, AttachMode::SharedFile | AttachMode::UnsharedFile),
            "operation requires a file attachment"
        );
        Ok(self.file_map.as_ref().expect("file attachment has a map"))
    }
}

fn round_up(size: usize, align: usize) -> usize {
    (size + align - 1) & !(align - 1)
}

/// Scoped detach: detaches the bound allocator on drop unless released.
pub struct DetachGuard<'a> {
    alloc: Option<&'a mut SlabAlloc>,
}

impl<'a> DetachGuard<'a> {
    pub fn new(alloc: &'a mut SlabAlloc) -> Self {
        Self { alloc: Some(alloc) }
    }

    /// Defuses the guard: the allocator stays attached.
    pub fn release(mut self) -> &'a mut SlabAlloc {
        self.alloc.take().expect("guard not yet dropped")
    }
}

impl Drop for DetachGuard<'_> {
    fn drop(&mut self) {
        if let Some(alloc) = self.alloc.take() {
            alloc.detach();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_rounds_to_ref_alignment() {
        let mut alloc = SlabAlloc::new();
        alloc.attach_empty();

        let (r1, _) = alloc.alloc(3).unwrap();
        let (r2, _) = alloc.alloc(5).unwrap();

        assert_eq!(r1 % REF_ALIGNMENT, 0);
        assert_eq!(r2 % REF_ALIGNMENT, 0);
        assert_eq!(r2, r1 + 8);
    }

    #[test]
    fn empty_attachment_never_hands_out_ref_zero() {
        let mut alloc = SlabAlloc::new();
        alloc.attach_empty();

        let (r, _) = alloc.alloc(16).unwrap();

        assert_ne!(r, 0);
        assert_eq!(r, FIRST_SLAB_REF);
    }

    #[test]
    fn alloc_requires_attachment() {
        let mut alloc = SlabAlloc::new();
        assert!(alloc.alloc(16).is_err());
    }

    #[test]
    fn freed_chunk_is_reused_first_fit() {
        let mut alloc = SlabAlloc::new();
        alloc.attach_empty();

        let (r1, _) = alloc.alloc(64).unwrap();
        let (r2, _) = alloc.alloc(128).unwrap();
        assert!(r2 > r1);

        alloc.free(r1, 64);
        let (r3, _) = alloc.alloc(32).unwrap();

        assert!(r3 >= r1 && r3 < r1 + 64, "expected reuse of the freed chunk");
    }

    #[test]
    fn adjacent_frees_coalesce() {
        let mut alloc = SlabAlloc::new();
        alloc.attach_empty();

        let (r1, _) = alloc.alloc(32).unwrap();
        let (r2, _) = alloc.alloc(32).unwrap();
        let (_r3, _) = alloc.alloc(32).unwrap();

        alloc.free(r1, 32);
        alloc.free(r2, 32);

        // The two 32-byte chunks must have merged: a 64-byte request fits
        // at r1 again.
        let (r4, _) = alloc.alloc(64).unwrap();
        assert_eq!(r4, r1);
    }

    #[test]
    fn translate_round_trips_alloc_addresses() {
        let mut alloc = SlabAlloc::new();
        alloc.attach_empty();

        let (r1, buf) = alloc.alloc(64).unwrap();
        let p1 = buf.as_ptr();
        let (r2, buf) = alloc.alloc(512).unwrap();
        let p2 = buf.as_ptr();

        assert_eq!(alloc.translate(r1), p1);
        assert_eq!(alloc.translate(r2), p2);
    }

    #[test]
    fn writes_survive_translate() {
        let mut alloc = SlabAlloc::new();
        alloc.attach_empty();

        let (r, buf) = alloc.alloc(16).unwrap();
        buf.copy_from_slice(b"0123456789abcdef");

        assert_eq!(alloc.get(r, 16).unwrap(), b"0123456789abcdef");
    }

    #[test]
    fn realloc_moves_and_preserves_contents() {
        let mut alloc = SlabAlloc::new();
        alloc.attach_empty();

        let (r, buf) = alloc.alloc(16).unwrap();
        buf[..5].copy_from_slice(b"hello");

        let (new_ref, _) = alloc.realloc(r, 16, 256).unwrap();

        assert_ne!(new_ref, r);
        assert_eq!(&alloc.get(new_ref, 16).unwrap()[..5], b"hello");
    }

    #[test]
    fn reset_free_space_marks_all_slabs_free() {
        let mut alloc = SlabAlloc::new();
        alloc.attach_empty();

        let (r1, _) = alloc.alloc(64).unwrap();
        let _ = alloc.alloc(64).unwrap();

        alloc.reset_free_space_tracking().unwrap();

        // Everything is free again, so the first allocation lands at the
        // start of slab space.
        let (r, _) = alloc.alloc(16).unwrap();
        assert_eq!(r, r1);
    }

    #[test]
    fn total_size_covers_baseline_and_slabs() {
        let mut alloc = SlabAlloc::new();
        alloc.attach_empty();
        assert_eq!(alloc.total_size(), 0);

        alloc.alloc(64).unwrap();
        assert!(alloc.total_size() >= FIRST_SLAB_REF + 64);
    }

    #[test]
    fn detach_is_idempotent() {
        let mut alloc = SlabAlloc::new();
        alloc.attach_empty();
        assert!(alloc.is_attached());

        alloc.detach();
        assert!(!alloc.is_attached());
        alloc.detach();
        assert!(!alloc.is_attached());
    }

    #[test]
    fn nonempty_attachment_distinguishes_empty_attach() {
        let mut alloc = SlabAlloc::new();
        assert!(!alloc.nonempty_attachment());

        alloc.attach_empty();
        assert!(alloc.is_attached());
        assert!(!alloc.nonempty_attachment());
    }

    #[test]
    fn detach_guard_detaches_on_drop() {
        let mut alloc = SlabAlloc::new();
        alloc.attach_empty();

        {
            let _guard = DetachGuard::new(&mut alloc);
        }

        assert!(!alloc.is_attached());
    }

    #[test]
    fn released_detach_guard_leaves_attachment() {
        let mut alloc = SlabAlloc::new();
        alloc.attach_empty();

        {
            let guard = DetachGuard::new(&mut alloc);
            guard.release();
        }

        assert!(alloc.is_attached());
    }

    #[test]
    fn get_mut_rejects_file_region_refs() {
        let mut alloc = SlabAlloc::new();
        let mut data = vec![0u8; 1024];
        let header = FileHeader::new_empty(false);
        let mut bytes = zerocopy::IntoBytes::as_bytes(&header).to_vec();
        bytes[0..8].copy_from_slice(&8u64.to_le_bytes());
        data[..bytes.len()].copy_from_slice(&bytes);

        alloc.attach_buffer(data).unwrap();

        assert!(alloc.get_mut(0, 8).is_err());
    }

    #[test]
    fn file_region_frees_land_on_the_read_only_list() {
        let mut alloc = SlabAlloc::new();
        let mut header = FileHeader::new_empty(false);
        header.set_top_ref_0(24);
        let mut data = zerocopy::IntoBytes::as_bytes(&header).to_vec();
        data.resize(256, 0);

        alloc.attach_buffer(data).unwrap();
        alloc.free(32, 16);
        alloc.free(64, 8);

        let read_only = alloc.free_read_only().unwrap();
        assert_eq!(read_only.len(), 2);
        assert_eq!(read_only[0], Chunk { ref_: 32, size: 16 });

        // Slab-space frees stay off the read-only list.
        let (r, _) = alloc.alloc(16).unwrap();
        alloc.free(r, 16);
        assert_eq!(alloc.free_read_only().unwrap().len(), 2);
    }

    #[test]
    fn users_buffer_is_returned_on_detach() {
        let mut alloc = SlabAlloc::new();
        let mut header = FileHeader::new_empty(false);
        header.set_top_ref_0(8);
        let mut data = zerocopy::IntoBytes::as_bytes(&header).to_vec();
        data.resize(32, 0);

        alloc.attach_buffer(data).unwrap();
        let back = alloc.detach();

        assert!(back.is_some());
        assert_eq!(back.unwrap().len(), 32);
    }

    #[test]
    fn owned_buffer_is_dropped_on_detach() {
        let mut alloc = SlabAlloc::new();
        let mut header = FileHeader::new_empty(false);
        header.set_top_ref_0(8);
        let mut data = zerocopy::IntoBytes::as_bytes(&header).to_vec();
        data.resize(32, 0);

        alloc.attach_buffer(data).unwrap();
        alloc.own_buffer();
        let back = alloc.detach();

        assert!(back.is_none());
    }
}
