//! # Slab Allocator Integration Tests
//!
//! End-to-end scenarios for the allocator: envelope validation against
//! hand-built byte images, first-fit reuse, ref translation across the
//! file/slab boundary, attach round-trips, and streaming-form promotion.

use std::io::Write;

use refdb::storage::{FileAttachConfig, SlabAlloc};
use refdb::InvalidDatabase;

const FOOTER_MAGIC: u64 = 0x3034125237E526C8;

/// Builds the 24-byte header by hand: the tests pin the bit-exact layout,
/// not the struct that produces it.
fn header_bytes(top_ref_0: u64, top_ref_1: u64, flags: u8) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(24);
    bytes.extend_from_slice(&top_ref_0.to_le_bytes());
    bytes.extend_from_slice(&top_ref_1.to_le_bytes());
    bytes.extend_from_slice(b"T-DB");
    bytes.extend_from_slice(&[3, 3]); // format version per slot
    bytes.push(0); // reserved
    bytes.push(flags);
    bytes
}

fn footer_bytes(top_ref: u64, cookie: u64) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(16);
    bytes.extend_from_slice(&top_ref.to_le_bytes());
    bytes.extend_from_slice(&cookie.to_le_bytes());
    bytes
}

fn write_file(dir: &tempfile::TempDir, name: &str, bytes: &[u8]) -> std::path::PathBuf {
    let path = dir.path().join(name);
    let mut f = std::fs::File::create(&path).unwrap();
    f.write_all(bytes).unwrap();
    f.sync_all().unwrap();
    path
}

mod header_validation {
    use super::*;

    #[test]
    fn zero_top_ref_without_footer_is_invalid() {
        let mut alloc = SlabAlloc::new();

        let err = alloc.attach_buffer(header_bytes(0, 0, 0)).unwrap_err();

        assert!(err.downcast_ref::<InvalidDatabase>().is_some());
    }

    #[test]
    fn footer_supplies_the_top_ref_on_streaming_form() {
        let mut data = header_bytes(0, 0, 0);
        data.extend_from_slice(&footer_bytes(1024, FOOTER_MAGIC));

        let mut alloc = SlabAlloc::new();
        let top_ref = alloc.attach_buffer(data).unwrap();

        assert_eq!(top_ref, 1024);
        assert!(alloc.is_on_streaming_form());
    }

    #[test]
    fn bad_magic_cookie_is_invalid() {
        let mut data = header_bytes(0, 0, 0);
        data.extend_from_slice(&footer_bytes(1024, 0xBAD_C00C1E));

        let mut alloc = SlabAlloc::new();
        let err = alloc.attach_buffer(data).unwrap_err();

        assert!(err.downcast_ref::<InvalidDatabase>().is_some());
    }

    #[test]
    fn bad_mnemonic_is_invalid() {
        let mut data = header_bytes(1024, 0, 0);
        data[16..20].copy_from_slice(b"SQLi");

        let mut alloc = SlabAlloc::new();
        let err = alloc.attach_buffer(data).unwrap_err();

        assert!(err.downcast_ref::<InvalidDatabase>().is_some());
    }

    #[test]
    fn unknown_format_version_is_invalid() {
        let mut data = header_bytes(1024, 0, 0);
        data[20] = 7;

        let mut alloc = SlabAlloc::new();
        let err = alloc.attach_buffer(data).unwrap_err();

        assert!(err.downcast_ref::<InvalidDatabase>().is_some());
    }
}

mod allocation {
    use super::*;

    #[test]
    fn freed_chunk_is_reused_first_fit() {
        let mut alloc = SlabAlloc::new();
        alloc.attach_empty();

        let (ref1, _) = alloc.alloc(64).unwrap();
        let (ref2, _) = alloc.alloc(128).unwrap();
        assert!(ref2 > ref1);

        alloc.free(ref1, 64);
        let (ref3, _) = alloc.alloc(32).unwrap();

        assert!(
            ref3 >= ref1 && ref3 < ref1 + 64,
            "first fit must reuse the freed chunk: ref1={}, ref3={}",
            ref1,
            ref3
        );
    }

    #[test]
    fn refs_are_eight_aligned_and_nonzero() {
        let mut alloc = SlabAlloc::new();
        alloc.attach_empty();

        for size in [1, 7, 8, 9, 63, 64, 100] {
            let (r, buf) = alloc.alloc(size).unwrap();
            assert_ne!(r, 0);
            assert_eq!(r % 8, 0);
            assert!(buf.len() >= size);
        }
    }

    #[test]
    fn translate_spans_the_file_slab_boundary() {
        // A 1024-byte attached buffer followed by a single 1024-byte slab.
        let mut data = header_bytes(24, 0, 0);
        data.resize(1024, 0);

        let mut alloc = SlabAlloc::new();
        alloc.attach_buffer(data).unwrap();
        assert_eq!(alloc.baseline(), 1024);

        let (slab_ref, buf) = alloc.alloc(1024).unwrap();
        let slab_addr = buf.as_ptr();

        assert_eq!(slab_ref, 1024);
        let file_base = alloc.translate(0);
        assert_eq!(alloc.translate(1024), slab_addr);
        // SAFETY: offsets stay inside the regions compared above.
        unsafe {
            assert_eq!(alloc.translate(512), file_base.add(512));
            assert_eq!(alloc.translate(2047), slab_addr.add(1023));
        }
    }

    #[test]
    fn realloc_preserves_a_prefix_and_frees_the_source() {
        let mut alloc = SlabAlloc::new();
        alloc.attach_empty();

        let (r, buf) = alloc.alloc(32).unwrap();
        buf[..7].copy_from_slice(b"payload");

        let (r2, _) = alloc.realloc(r, 32, 64).unwrap();
        assert_ne!(r2, r);
        assert_eq!(&alloc.get(r2, 7).unwrap()[..], b"payload");

        // The old chunk went back on the free list.
        let (r3, _) = alloc.alloc(32).unwrap();
        assert_eq!(r3, r);
    }
}

mod file_attachment {
    use super::*;

    #[test]
    fn creates_and_initializes_an_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fresh.rdb");

        let mut alloc = SlabAlloc::new();
        let top_ref = alloc.attach_file(&path, FileAttachConfig::default()).unwrap();

        assert_eq!(top_ref, 0);
        assert_eq!(alloc.baseline(), 24);
        drop(alloc.detach());

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes.len(), 24);
        assert_eq!(&bytes[16..20], b"T-DB");
        assert_eq!(bytes[20], 3);
    }

    #[test]
    fn top_ref_round_trips_across_reattach() {
        let dir = tempfile::tempdir().unwrap();
        let mut image = header_bytes(32, 0, 0);
        image.resize(40, 0);
        let path = write_file(&dir, "committed.rdb", &image);

        let mut alloc = SlabAlloc::new();
        let first = alloc.attach_file(&path, FileAttachConfig::default()).unwrap();
        alloc.detach();
        let second = alloc.attach_file(&path, FileAttachConfig::default()).unwrap();

        assert_eq!(first, 32);
        assert_eq!(second, 32);
    }

    #[test]
    fn no_create_fails_on_a_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.rdb");

        let mut alloc = SlabAlloc::new();
        let cfg = FileAttachConfig {
            no_create: true,
            ..Default::default()
        };

        assert!(alloc.attach_file(&path, cfg).is_err());
        assert!(!path.exists());
    }

    #[test]
    fn server_sync_mode_must_agree_with_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut image = header_bytes(32, 0, 2); // flags bit 1: server sync
        image.resize(40, 0);
        let path = write_file(&dir, "synced.rdb", &image);

        let mut alloc = SlabAlloc::new();
        let err = alloc
            .attach_file(&path, FileAttachConfig::default())
            .unwrap_err();
        assert!(err.downcast_ref::<InvalidDatabase>().is_some());

        let cfg = FileAttachConfig {
            server_sync_mode: true,
            ..Default::default()
        };
        assert_eq!(alloc.attach_file(&path, cfg).unwrap(), 32);
    }

    #[test]
    fn encryption_key_is_rejected_by_this_build() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("enc.rdb");

        let mut alloc = SlabAlloc::new();
        let cfg = FileAttachConfig {
            encryption_key: Some(vec![0u8; 32]),
            ..Default::default()
        };

        let err = alloc.attach_file(&path, cfg).unwrap_err();
        assert!(err.to_string().contains("encryption"));
    }

    #[test]
    fn attach_reports_the_file_format_version() {
        let dir = tempfile::tempdir().unwrap();
        let mut image = header_bytes(32, 0, 0);
        image[20] = 2; // legacy format in slot 0
        image.resize(40, 0);
        let path = write_file(&dir, "legacy.rdb", &image);

        let mut alloc = SlabAlloc::new();
        alloc.attach_file(&path, FileAttachConfig::default()).unwrap();

        assert_eq!(alloc.file_format(), 2);
    }

    #[test]
    fn reserve_disk_space_grows_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut image = header_bytes(32, 0, 0);
        image.resize(40, 0);
        let path = write_file(&dir, "reserve.rdb", &image);

        let mut alloc = SlabAlloc::new();
        alloc.attach_file(&path, FileAttachConfig::default()).unwrap();
        alloc.reserve_disk_space(4096).unwrap();
        alloc.detach();

        assert!(std::fs::metadata(&path).unwrap().len() >= 4096);
    }

    #[test]
    fn remap_extends_the_baseline_and_rebases_slabs() {
        let dir = tempfile::tempdir().unwrap();
        let mut image = header_bytes(32, 0, 0);
        image.resize(40, 0);
        let path = write_file(&dir, "grow.rdb", &image);

        let mut alloc = SlabAlloc::new();
        alloc.attach_file(&path, FileAttachConfig::default()).unwrap();
        assert_eq!(alloc.baseline(), 40);

        alloc.resize_file(80).unwrap();
        alloc.remap(80).unwrap();
        assert_eq!(alloc.baseline(), 80);

        let (r, _) = alloc.alloc(16).unwrap();
        assert_eq!(r, 80, "slab space starts at the new baseline");
    }
}

mod streaming_promotion {
    use super::*;

    fn streaming_image() -> Vec<u8> {
        let mut image = header_bytes(0, 0, 0);
        image.resize(32, 0xAB); // node data
        image.extend_from_slice(&footer_bytes(24, FOOTER_MAGIC));
        image
    }

    #[test]
    fn prepare_for_update_promotes_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "stream.rdb", &streaming_image());

        let mut alloc = SlabAlloc::new();
        let top_ref = alloc.attach_file(&path, FileAttachConfig::default()).unwrap();
        assert_eq!(top_ref, 24);
        assert!(alloc.is_on_streaming_form());

        alloc.prepare_for_update().unwrap();
        assert!(!alloc.is_on_streaming_form());
        alloc.detach();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(u64::from_le_bytes(bytes[0..8].try_into().unwrap()), 24);
        assert!(bytes[bytes.len() - 16..].iter().all(|&b| b == 0));
    }

    #[test]
    fn promotion_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "stream2.rdb", &streaming_image());

        let mut alloc = SlabAlloc::new();
        alloc.attach_file(&path, FileAttachConfig::default()).unwrap();
        alloc.prepare_for_update().unwrap();
        let after_first = {
            alloc.detach();
            std::fs::read(&path).unwrap()
        };

        let mut alloc = SlabAlloc::new();
        alloc.attach_file(&path, FileAttachConfig::default()).unwrap();
        alloc.prepare_for_update().unwrap();
        alloc.detach();
        let after_second = std::fs::read(&path).unwrap();

        assert_eq!(after_first, after_second);
    }

    #[test]
    fn promoted_file_reattaches_without_a_footer() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "stream3.rdb", &streaming_image());

        let mut alloc = SlabAlloc::new();
        alloc.attach_file(&path, FileAttachConfig::default()).unwrap();
        alloc.prepare_for_update().unwrap();
        alloc.detach();

        let mut alloc = SlabAlloc::new();
        let top_ref = alloc.attach_file(&path, FileAttachConfig::default()).unwrap();
        assert_eq!(top_ref, 24);
        assert!(!alloc.is_on_streaming_form());
    }
}
