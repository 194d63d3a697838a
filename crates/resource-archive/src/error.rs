//! Archive format error taxonomy.

use thiserror::Error;

/// Result alias for [`ArchiveError`].
pub type ArchiveResult<T> = Result<T, ArchiveError>;

/// Errors raised by archive index/data parsing, lookup and mutation.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// The index header's version field did not match the supported
    /// version (5).
    #[error("unsupported archive index version: expected 5, got {0}")]
    UnsupportedVersion(u32),

    /// The digest was not found in the archive's sorted hash table.
    #[error("entry not found")]
    NotFound,

    /// Attempted to insert a digest that already has an entry.
    #[error("entry already stored")]
    AlreadyStored,

    /// The index or data bytes were too short or internally inconsistent.
    #[error("invalid archive data: {0}")]
    InvalidData(String),

    /// An I/O failure touching the backing `.arci`/`.arcd` files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// LZ4 decompression failed.
    #[error("decompression failed: {0}")]
    Decompress(String),

    /// The pluggable decrypt hook reported an error.
    #[error("decrypt failed: {0}")]
    Decrypt(#[from] resource_util::UtilError),
}
