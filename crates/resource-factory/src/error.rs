//! Factory error taxonomy.

use thiserror::Error;

/// Result alias for [`FactoryError`].
pub type FactoryResult<T> = Result<T, FactoryError>;

/// Errors raised by type registration, `Get`, `Release`, and `Reload`.
#[derive(Debug, Error)]
pub enum FactoryError {
    /// No mount served the requested path.
    #[error("resource not found")]
    ResourceNotFound,

    /// A path had no `.`-delimited extension to resolve a type by.
    #[error("missing file extension")]
    MissingFileExtension,

    /// The resolved extension has no registered type handler.
    #[error("unknown resource type: {0}")]
    UnknownResourceType(String),

    /// `RegisterType` was called twice for the same extension.
    #[error("type already registered: {0}")]
    AlreadyRegistered(String),

    /// `RegisterType` was missing a required callback, or the extension
    /// contained a `.`.
    #[error("invalid type registration: {0}")]
    Inval(String),

    /// The path being loaded is already on the in-flight path stack.
    #[error("resource loop detected: {0:?}")]
    ResourceLoopError(Vec<String>),

    /// The cache is at `max_resources` capacity.
    #[error("out of resources: cache is at capacity ({0})")]
    OutOfResources(usize),

    /// A type handler does not support `recreate`.
    #[error("type does not support reload")]
    NotSupported,

    /// Propagated from the underlying mount table / provider stack.
    #[error(transparent)]
    Provider(#[from] resource_providers::ProviderError),

    /// A type handler's `preload`/`create`/`recreate` callback failed.
    #[error("type callback failed: {0}")]
    TypeCallback(String),
}
