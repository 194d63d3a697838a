//! Error types shared by the path, digest and decrypt-hook helpers.

use thiserror::Error;

/// Result alias for [`UtilError`].
pub type UtilResult<T> = Result<T, UtilError>;

/// Errors raised by [`crate::path`], [`crate::digest`] and [`crate::xtea`].
#[derive(Debug, Error)]
pub enum UtilError {
    /// A canonical path exceeded the maximum allowed length.
    #[error("path exceeds maximum length of {max} bytes: {len}")]
    PathTooLong {
        /// Configured maximum.
        max: usize,
        /// Actual encoded length.
        len: usize,
    },

    /// A path was empty or contained no bytes after normalization.
    #[error("path is empty")]
    EmptyPath,

    /// Decryption failed in the registered decrypt hook.
    #[error("decrypt failed: {0}")]
    DecryptFailed(String),
}
