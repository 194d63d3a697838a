//! Error taxonomy shared by providers and the mount table.

use thiserror::Error;

/// Result alias for [`ProviderError`].
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Errors raised by providers, the mount table, and mount persistence.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// No mount served the requested path.
    #[error("resource not found")]
    NotFound,

    /// A write-capable operation was attempted against a read-only mount.
    #[error("not supported by this provider")]
    NotSupported,

    /// `AddFile`/`AddMount` was given a key that already exists.
    #[error("already registered")]
    AlreadyRegistered,

    /// The manifest entry's digest did not match the payload's computed
    /// digest.
    #[error("signature mismatch")]
    SignatureMismatch,

    /// Malformed archive, manifest, or mount-file contents.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// I/O failure reading or writing a provider's backing storage.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failure from the archive layer (index parse, entry lookup, insert).
    #[error(transparent)]
    Archive(#[from] resource_archive::ArchiveError),

    /// Failure from the manifest layer (parse, signature verification).
    #[error(transparent)]
    Manifest(#[from] resource_manifest::ManifestError),

    /// Failure from a ZIP archive read.
    #[error("zip error: {0}")]
    Zip(String),

    /// Failure issuing or interpreting an HTTP request.
    #[error("http error: {0}")]
    Http(String),

    /// An HTTP response's status code mapped to a generic I/O failure.
    #[error("http status {0}")]
    HttpStatus(u16),

    /// A mount URI did not parse, or named an unsupported scheme.
    #[error("unsupported uri: {0}")]
    UnsupportedUri(String),
}
