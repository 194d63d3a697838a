//! Manifest error taxonomy.

use thiserror::Error;

/// Result alias for [`ManifestError`].
pub type ManifestResult<T> = Result<T, ManifestError>;

/// Errors surfaced by manifest parsing and verification.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// The outer or inner envelope could not be decoded.
    #[error("manifest envelope parse error: {0}")]
    DdfError(String),

    /// The envelope's `version` field did not equal the supported
    /// version (5).
    #[error("unsupported manifest version: expected 5, got {0}")]
    VersionMismatch(u32),

    /// The running engine's identifier is absent from the manifest's
    /// supported-engine-version list.
    #[error("engine version not supported by manifest")]
    EngineVersionMismatch,

    /// The recovered signature digest did not match the computed digest.
    #[error("manifest signature mismatch")]
    SignatureMismatch,

    /// The supplied public key could not be parsed.
    #[error("invalid public key: {0}")]
    InvalidData(String),

    /// No resource entry exists for the requested url-hash.
    #[error("resource not found: url-hash {0:#018x}")]
    ResourceNotFound(u64),
}
