//! Fixed on-disk layout of `.arci`. All multi-byte fields are big-endian,
//! following the same `binrw`-based fixed-layout struct style as
//! `cascette-formats::archive::index`.

use binrw::binrw;

/// Required `.arci` header version.
pub const INDEX_VERSION: u32 = 5;

/// Size in bytes of a hash slot in the on-disk hash table, regardless of the
/// actual comparison length.
pub const HASH_SLOT_SIZE: usize = 64;

/// Sentinel `compressed_size` meaning "not compressed".
pub const NOT_COMPRESSED: u32 = 0xFFFF_FFFF;

/// Entry flag bits.
pub mod entry_flags {
    /// Payload is XTEA-encrypted.
    pub const ENCRYPTED: u32 = 1;
    /// Payload is LZ4-compressed.
    pub const COMPRESSED: u32 = 2;
    /// Payload was inserted via the live-update mechanism.
    pub const LIVEUPDATE_DATA: u32 = 4;
}

/// `.arci` fixed header, 48 bytes on disk.
#[binrw]
#[brw(big)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexHeader {
    /// Format version; must equal [`INDEX_VERSION`].
    pub version: u32,
    /// Reserved, always written as zero.
    pub reserved: u32,
    /// Opaque caller-supplied tag, round-tripped unchanged.
    pub userdata: u64,
    /// Number of entries (and hash slots) that follow.
    pub entry_count: u32,
    /// Byte offset of the entry table, relative to the start of the file.
    pub entry_data_offset: u32,
    /// Byte offset of the hash table, relative to the start of the file.
    pub hash_offset: u32,
    /// Number of bytes of each hash slot that are significant.
    pub hash_length: u32,
    /// MD5 of the index contents (not independently verified by this
    /// runtime; carried for on-disk fidelity and external tooling).
    pub md5: [u8; 16],
}

/// One `.arci` entry, 16 bytes on disk.
#[binrw]
#[brw(big)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Byte offset of the payload within `.arcd`.
    pub data_offset: u32,
    /// Uncompressed payload size in bytes.
    pub resource_size: u32,
    /// Compressed payload size, or [`NOT_COMPRESSED`] if not compressed.
    pub compressed_size: u32,
    /// Flag bits, see [`entry_flags`].
    pub flags: u32,
}

impl ArchiveEntry {
    /// Whether [`entry_flags::ENCRYPTED`] is set.
    #[must_use]
    pub const fn is_encrypted(&self) -> bool {
        self.flags & entry_flags::ENCRYPTED != 0
    }

    /// Whether [`entry_flags::COMPRESSED`] is set.
    #[must_use]
    pub const fn is_compressed(&self) -> bool {
        self.flags & entry_flags::COMPRESSED != 0
    }

    /// Whether [`entry_flags::LIVEUPDATE_DATA`] is set.
    #[must_use]
    pub const fn is_live_update(&self) -> bool {
        self.flags & entry_flags::LIVEUPDATE_DATA != 0
    }

    /// Number of bytes to read from `.arcd` for this entry: the
    /// compressed size if compressed, otherwise the uncompressed size.
    #[must_use]
    pub const fn bytes_on_disk(&self) -> u32 {
        if self.compressed_size == NOT_COMPRESSED {
            self.resource_size
        } else {
            self.compressed_size
        }
    }
}

/// 16-byte live-update payload header.
#[binrw]
#[brw(big)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiveUpdateHeader {
    /// Size of the payload that follows this header.
    pub size: u32,
    /// Flag bits, mirrors [`entry_flags`].
    pub flags: u8,
    /// Padding, always zero.
    pub padding: [u8; 11],
}

impl LiveUpdateHeader {
    /// Build a header for `size` bytes of payload with the given flags.
    #[must_use]
    pub const fn new(size: u32, flags: u8) -> Self {
        Self {
            size,
            flags,
            padding: [0; 11],
        }
    }

    /// Serialize to its 16-byte wire form.
    ///
    /// # Panics
    /// Never panics: `binrw` writes to an in-memory buffer so I/O cannot
    /// fail.
    #[must_use]
    pub fn to_bytes(self) -> Vec<u8> {
        use binrw::BinWrite;
        use std::io::Cursor;

        let mut out = Vec::with_capacity(16);
        let mut cursor = Cursor::new(&mut out);
        self.write(&mut cursor).expect("header fits fixed buffer");
        out
    }
}
