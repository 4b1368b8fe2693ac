//! # File Envelope
//!
//! This module defines the bit-exact file envelope of a RefDB database: the
//! 24-byte header at offset 0 and, for files on streaming form, the 16-byte
//! footer occupying the last bytes of the file.
//!
//! ## Header Layout
//!
//! ```text
//! Offset  Size  Description
//! ------  ----  -----------------------------------------------
//! 0       8     top_ref[0] (little-endian u64)
//! 8       8     top_ref[1]
//! 16      4     mnemonic "T-DB"
//! 20      2     file format version, one byte per top-ref slot
//! 22      1     reserved (0)
//! 23      1     flags (bit 0: top-ref selector, bit 1: server sync)
//! ```
//!
//! Writers alternate between the two top-ref slots so that readers always
//! see a complete commit; the selector bit names the current slot.
//!
//! ## Streaming Form
//!
//! A file produced by append-only construction cannot seek back to patch
//! the header, so it carries its top-ref in a footer instead and leaves the
//! header's selected slot zero:
//!
//! ```text
//! Offset      Size  Description
//! ----------  ----  ------------------------------
//! len - 16    8     top_ref (little-endian u64)
//! len - 8     8     magic cookie 0x3034125237E526C8
//! ```
//!
//! `validate_header` recognizes the form; `SlabAlloc::prepare_for_update`
//! later promotes such a file in place so it can be modified.
//!
//! ## Zerocopy Safety
//!
//! Both structs are read in place from mmap'd bytes via zerocopy's
//! `FromBytes`/`IntoBytes` with `Unaligned` little-endian fields, and their
//! sizes are pinned by compile-time assertions.

use eyre::Result;
use zerocopy::little_endian::U64;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::config::{
    CURRENT_FILE_FORMAT_VERSION, FILE_HEADER_SIZE, FILE_MNEMONIC, FOOTER_MAGIC_COOKIE,
    MIN_FILE_FORMAT_VERSION, MIN_STREAMING_FILE_SIZE, REF_ALIGNMENT, STREAMING_FOOTER_SIZE,
};
use super::InvalidDatabase;

/// Flag bit selecting which top-ref slot is current.
pub const FLAGS_SELECT_BIT: u8 = 1;
/// Flag bit marking a database operated in server-sync mode.
pub const FLAGS_SERVER_SYNC_MODE: u8 = 2;

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct FileHeader {
    top_ref_0: U64,
    top_ref_1: U64,
    mnemonic: [u8; 4],
    file_format_version: [u8; 2],
    reserved: u8,
    flags: u8,
}

const _: () = assert!(std::mem::size_of::<FileHeader>() == FILE_HEADER_SIZE);

impl FileHeader {
    /// The canonical header written to a newly created database.
    pub fn new_empty(server_sync_mode: bool) -> Self {
        let flags = if server_sync_mode {
            FLAGS_SERVER_SYNC_MODE
        } else {
            0
        };
        Self {
            top_ref_0: U64::new(0),
            top_ref_1: U64::new(0),
            mnemonic: *FILE_MNEMONIC,
            file_format_version: [CURRENT_FILE_FORMAT_VERSION; 2],
            reserved: 0,
            flags,
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<&Self> {
        if bytes.len() < FILE_HEADER_SIZE {
            return Err(InvalidDatabase::new(format!(
                "buffer too small for file header: {} < {}",
                bytes.len(),
                FILE_HEADER_SIZE
            ))
            .into());
        }
        Self::ref_from_bytes(&bytes[..FILE_HEADER_SIZE])
            .map_err(|e| InvalidDatabase::new(format!("failed to read file header: {:?}", e)).into())
    }

    pub fn from_bytes_mut(bytes: &mut [u8]) -> Result<&mut Self> {
        if bytes.len() < FILE_HEADER_SIZE {
            return Err(InvalidDatabase::new(format!(
                "buffer too small for file header: {} < {}",
                bytes.len(),
                FILE_HEADER_SIZE
            ))
            .into());
        }
        Self::mut_from_bytes(&mut bytes[..FILE_HEADER_SIZE])
            .map_err(|e| InvalidDatabase::new(format!("failed to read file header: {:?}", e)).into())
    }

    zerocopy_accessors! {
        top_ref_0: u64,
        top_ref_1: u64,
    }

    /// The slot named by the selector bit: 0 or 1.
    pub fn selected_slot(&self) -> usize {
        (self.flags & FLAGS_SELECT_BIT) as usize
    }

    pub fn top_ref(&self, slot: usize) -> u64 {
        match slot {
            0 => self.top_ref_0(),
            _ => self.top_ref_1(),
        }
    }

    pub fn mnemonic(&self) -> &[u8; 4] {
        &self.mnemonic
    }

    /// The format version of the given top-ref slot.
    pub fn format_version(&self, slot: usize) -> u8 {
        self.file_format_version[slot.min(1)]
    }

    pub fn flags(&self) -> u8 {
        self.flags
    }

    pub fn set_flags(&mut self, flags: u8) {
        self.flags = flags;
    }

    pub fn server_sync_mode(&self) -> bool {
        self.flags & FLAGS_SERVER_SYNC_MODE != 0
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct StreamingFooter {
    top_ref: U64,
    magic_cookie: U64,
}

const _: () = assert!(std::mem::size_of::<StreamingFooter>() == STREAMING_FOOTER_SIZE);

impl StreamingFooter {
    pub fn from_bytes(bytes: &[u8]) -> Result<&Self> {
        if bytes.len() < STREAMING_FOOTER_SIZE {
            return Err(InvalidDatabase::new(format!(
                "buffer too small for streaming footer: {} < {}",
                bytes.len(),
                STREAMING_FOOTER_SIZE
            ))
            .into());
        }
        let start = bytes.len() - STREAMING_FOOTER_SIZE;
        Self::ref_from_bytes(&bytes[start..])
            .map_err(|e| InvalidDatabase::new(format!("failed to read footer: {:?}", e)).into())
    }

    zerocopy_accessors! {
        top_ref: u64,
        magic_cookie: u64,
    }
}

/// The outcome of validating an attached file or buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatedHeader {
    /// Ref of the root node, possibly taken from the streaming footer.
    pub top_ref: usize,
    /// Whether the top-ref came from a footer (streaming form).
    pub on_streaming_form: bool,
    /// The file format version of the current top-ref slot.
    pub file_format_version: u8,
    /// Whether the database was created in server-sync mode.
    pub server_sync_mode: bool,
}

/// Validates the envelope of an attached file or buffer.
///
/// This will not detect all forms of corruption; it verifies the mnemonic,
/// the format version of the selected slot, top-ref alignment, and, when
/// the selected top-ref is zero, the presence and magic cookie of the
/// streaming footer, from which the real top-ref is then taken.
pub fn validate_header(data: &[u8]) -> Result<ValidatedHeader> {
    let header = FileHeader::from_bytes(data)?;

    if header.mnemonic() != FILE_MNEMONIC {
        return Err(InvalidDatabase::new("invalid mnemonic in file header").into());
    }

    let slot = header.selected_slot();
    let version = header.format_version(slot);
    if !(MIN_FILE_FORMAT_VERSION..=CURRENT_FILE_FORMAT_VERSION).contains(&version) {
        return Err(InvalidDatabase::new(format!(
            "unsupported file format version {}",
            version
        ))
        .into());
    }

    let mut top_ref = header.top_ref(slot);
    let mut on_streaming_form = false;
    if top_ref == 0 {
        // Streaming form: the writer could not seek back to the header, so
        // the top-ref lives in a footer at the very end of the file.
        if data.len() < MIN_STREAMING_FILE_SIZE {
            return Err(InvalidDatabase::new(
                "file has no top-ref and is too small to carry a streaming footer",
            )
            .into());
        }
        let footer = StreamingFooter::from_bytes(data)?;
        if footer.magic_cookie() != FOOTER_MAGIC_COOKIE {
            return Err(InvalidDatabase::new("bad magic cookie in streaming footer").into());
        }
        top_ref = footer.top_ref();
        on_streaming_form = true;
    }

    if top_ref as usize % REF_ALIGNMENT != 0 {
        return Err(InvalidDatabase::new(format!("misaligned top-ref {}", top_ref)).into());
    }

    Ok(ValidatedHeader {
        top_ref: top_ref as usize,
        on_streaming_form,
        file_format_version: version,
        server_sync_mode: header.server_sync_mode(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use zerocopy::IntoBytes;

    fn header_bytes(top_ref_0: u64, top_ref_1: u64, flags: u8) -> Vec<u8> {
        let mut header = FileHeader::new_empty(false);
        header.set_top_ref_0(top_ref_0);
        header.set_top_ref_1(top_ref_1);
        header.set_flags(flags);
        header.as_bytes().to_vec()
    }

    fn footer_bytes(top_ref: u64, cookie: u64) -> Vec<u8> {
        let mut out = Vec::with_capacity(16);
        out.extend_from_slice(&top_ref.to_le_bytes());
        out.extend_from_slice(&cookie.to_le_bytes());
        out
    }

    #[test]
    fn header_size_is_24() {
        assert_eq!(std::mem::size_of::<FileHeader>(), 24);
    }

    #[test]
    fn footer_size_is_16() {
        assert_eq!(std::mem::size_of::<StreamingFooter>(), 16);
    }

    #[test]
    fn valid_header_with_top_ref_passes() {
        let validated = validate_header(&header_bytes(1024, 0, 0)).unwrap();

        assert_eq!(validated.top_ref, 1024);
        assert!(!validated.on_streaming_form);
        assert_eq!(validated.file_format_version, CURRENT_FILE_FORMAT_VERSION);
    }

    #[test]
    fn selector_bit_picks_the_second_slot() {
        let validated = validate_header(&header_bytes(0, 2048, FLAGS_SELECT_BIT)).unwrap();

        assert_eq!(validated.top_ref, 2048);
        assert!(!validated.on_streaming_form);
    }

    #[test]
    fn short_buffer_is_rejected() {
        let err = validate_header(&[0u8; 8]).unwrap_err();
        assert!(err.downcast_ref::<InvalidDatabase>().is_some());
    }

    #[test]
    fn bad_mnemonic_is_rejected() {
        let mut bytes = header_bytes(1024, 0, 0);
        bytes[16..20].copy_from_slice(b"XXXX");

        let err = validate_header(&bytes).unwrap_err();
        assert!(err.downcast_ref::<InvalidDatabase>().is_some());
    }

    #[test]
    fn unknown_format_version_is_rejected() {
        let mut bytes = header_bytes(1024, 0, 0);
        bytes[20] = 99;

        let err = validate_header(&bytes).unwrap_err();
        assert!(err.downcast_ref::<InvalidDatabase>().is_some());
    }

    #[test]
    fn legacy_format_version_is_accepted() {
        let mut bytes = header_bytes(1024, 0, 0);
        bytes[20] = 2;

        let validated = validate_header(&bytes).unwrap();
        assert_eq!(validated.file_format_version, 2);
    }

    #[test]
    fn zero_top_ref_without_footer_is_rejected() {
        let err = validate_header(&header_bytes(0, 0, 0)).unwrap_err();
        assert!(err.downcast_ref::<InvalidDatabase>().is_some());
    }

    #[test]
    fn streaming_footer_supplies_the_top_ref() {
        let mut bytes = header_bytes(0, 0, 0);
        bytes.extend_from_slice(&footer_bytes(1024, FOOTER_MAGIC_COOKIE));

        let validated = validate_header(&bytes).unwrap();

        assert_eq!(validated.top_ref, 1024);
        assert!(validated.on_streaming_form);
    }

    #[test]
    fn bad_magic_cookie_is_rejected() {
        let mut bytes = header_bytes(0, 0, 0);
        bytes.extend_from_slice(&footer_bytes(1024, 0xDEAD_BEEF));

        let err = validate_header(&bytes).unwrap_err();
        assert!(err.downcast_ref::<InvalidDatabase>().is_some());
    }

    #[test]
    fn misaligned_top_ref_is_rejected() {
        let err = validate_header(&header_bytes(1027, 0, 0)).unwrap_err();
        assert!(err.downcast_ref::<InvalidDatabase>().is_some());
    }

    #[test]
    fn server_sync_bit_round_trips() {
        let header = FileHeader::new_empty(true);
        assert!(header.server_sync_mode());

        let header = FileHeader::new_empty(false);
        assert!(!header.server_sync_mode());
    }
}
