//! Top-level error aggregating every layer's taxonomy, the way
//! a facade crate over several lower-level crates typically rolls its
//! dependencies' errors into one type for callers.

use thiserror::Error;

/// Result alias for [`RuntimeError`].
pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Aggregated error type for the whole resource system.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Provider / mount table failure.
    #[error(transparent)]
    Provider(#[from] resource_providers::ProviderError),

    /// Factory failure.
    #[error(transparent)]
    Factory(#[from] resource_factory::FactoryError),

    /// Preloader failure.
    #[error(transparent)]
    Preloader(#[from] resource_preloader::PreloaderError),

    /// Archive-level failure surfaced outside the provider layer (e.g.
    /// during direct archive construction in setup code).
    #[error(transparent)]
    Archive(#[from] resource_archive::ArchiveError),

    /// Manifest parsing/verification failure.
    #[error(transparent)]
    Manifest(#[from] resource_manifest::ManifestError),

    /// Low-level utility failure (path canonicalization, digest, xtea).
    #[error(transparent)]
    Util(#[from] resource_util::UtilError),
}
