//! In-memory manifest model.

use resource_util::HashAlgorithm;

/// Per-entry flag bits.
pub mod entry_flags {
    /// Entry is shipped inside the bundle archive.
    pub const BUNDLED: u8 = 1 << 0;
    /// Entry is excluded from the bundle and expected via live-update.
    pub const EXCLUDED: u8 = 1 << 1;
    /// Entry's payload is XTEA-encrypted.
    pub const ENCRYPTED: u8 = 1 << 2;
    /// Entry's payload is LZ4-compressed.
    pub const COMPRESSED: u8 = 1 << 3;
}

/// Manifest header.
#[derive(Debug, Clone)]
pub struct ManifestHeader {
    /// Hash algorithm used for resource content digests.
    pub resource_hash_algorithm: HashAlgorithm,
    /// Hash algorithm used to hash the data body before RSA signing.
    pub signature_hash_algorithm: HashAlgorithm,
    /// Identifier of the RSA signing scheme (opaque, carried for display
    /// only; verification always uses textbook RSA signature recovery).
    pub signing_algorithm: u8,
    /// Project identifier string.
    pub project_identifier: String,
}

/// One resource entry in the manifest.
#[derive(Debug, Clone)]
pub struct ResourceEntry {
    /// Logical resource url.
    pub url: String,
    /// 64-bit hash of `url`.
    pub url_hash: u64,
    /// Content digest, length per [`ManifestHeader::resource_hash_algorithm`].
    pub digest: Vec<u8>,
    /// Uncompressed size in bytes.
    pub size: u64,
    /// Compressed size in bytes (equal to `size` if not compressed).
    pub compressed_size: u64,
    /// Flag bits, see [`entry_flags`].
    pub flags: u8,
    /// Url-hashes of direct dependencies.
    pub dependents: Vec<u64>,
}

impl ResourceEntry {
    /// Whether [`entry_flags::BUNDLED`] is set.
    #[must_use]
    pub const fn is_bundled(&self) -> bool {
        self.flags & entry_flags::BUNDLED != 0
    }

    /// Whether [`entry_flags::EXCLUDED`] is set.
    #[must_use]
    pub const fn is_excluded(&self) -> bool {
        self.flags & entry_flags::EXCLUDED != 0
    }

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
}

/// A fully parsed manifest.
#[derive(Debug, Clone)]
pub struct Manifest {
    /// Parsed header.
    pub header: ManifestHeader,
    /// RSA signature over the data body.
    pub signature: Vec<u8>,
    /// SHA-1 digests of engine versions this manifest supports.
    pub supported_engine_versions: Vec<Vec<u8>>,
    /// Resource entries, sorted ascending by `url_hash`.
    pub entries: Vec<ResourceEntry>,
    /// The raw bytes of the inner data body, kept for signature
    /// verification (the hash is computed over exactly these bytes).
    pub(crate) data_body: Vec<u8>,
}

impl Manifest {
    /// Binary-search [`Manifest::entries`] for `url_hash`.
    #[must_use]
    pub fn find_entry(&self, url_hash: u64) -> Option<&ResourceEntry> {
        self.entries
            .binary_search_by_key(&url_hash, |e| e.url_hash)
            .ok()
            .map(|idx| &self.entries[idx])
    }

    /// Direct dependency url-hashes of `url_hash`. Returns `None` if the entry
    /// does not exist.
    #[must_use]
    pub fn dependencies(&self, url_hash: u64) -> Option<&[u64]> {
        self.find_entry(url_hash).map(|e| e.dependents.as_slice())
    }
}
