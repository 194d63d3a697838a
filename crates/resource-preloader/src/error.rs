//! Preloader error taxonomy.

use thiserror::Error;

/// Result alias for [`PreloaderError`].
pub type PreloaderResult<T> = Result<T, PreloaderError>;

/// Errors raised while scheduling or running a preload tree.
#[derive(Debug, Error)]
pub enum PreloaderError {
    /// The fixed request pool (`MAX_REQUESTS`) has no free slot.
    #[error("preload request pool exhausted (max {0} in-flight nodes)")]
    PoolExhausted(usize),

    /// A node's ancestor chain already contains its canonical-path hash.
    #[error("resource loop detected while preloading: {0:?}")]
    ResourceLoopError(Vec<String>),

    /// Propagated from the factory's `Get`/load path.
    #[error(transparent)]
    Factory(#[from] resource_factory::FactoryError),

    /// The completion callback rejected the result.
    #[error("preload rejected by completion callback")]
    NotLoaded,
}
