//! The per-extension type callback contract. The original engine registers a
//! fixed set of C function pointers per type; this runtime models the same
//! seam as a trait object so each resource type can be implemented as an
//! ordinary Rust type without a central switch statement.

use crate::error::FactoryResult;
use std::any::Any;
use std::sync::Arc;

/// A type-erased resource payload. Concrete types downcast via
/// [`std::any::Any`] after a successful `create`/`recreate`.
pub type Resource = Box<dyn Any + Send + Sync>;

/// Parameters available to `preload`/`create`/`recreate`.
pub struct LoadContext<'a> {
    /// Canonical path of the resource being loaded.
    pub filename: &'a str,
    /// Bytes loaded via the mount table (may be a prefix for streaming
    /// types).
    pub buffer: &'a [u8],
    /// Full file size as reported by the mount table, which may exceed
    /// `buffer.len()` for a partial/streaming load.
    pub file_size: u64,
    /// Whether `buffer` holds fewer bytes than `file_size`.
    pub is_partial: bool,
}

/// Outcome of a `post_create` callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostCreateStatus {
    /// The post-create step is finished.
    Done,
    /// Not finished yet; call again next tick.
    Pending,
}

/// Outcome of a `recreate` callback.
pub enum RecreateOutcome {
    /// The type replaced its resource in place; the factory destroys the
    /// previous one.
    Replaced(Resource),
    /// The type migrated state into the existing resource and kept it;
    /// nothing is destroyed.
    KeptExisting,
}

/// Per-extension callback set. Implementations must be `Send + Sync`: the
/// factory may call into a handler from the synchronous `Get` path or, for
/// streaming resources, from [`crate::dependencies`]-adjacent background work.
pub trait ResourceTypeHandler: Send + Sync {
    /// Optional first pass over the raw bytes before `create`. Returning
    /// `Ok(Some(..))` hands a preload product forward to `create`.
    fn preload(&self, _ctx: &LoadContext<'_>) -> FactoryResult<Option<Resource>> {
        Ok(None)
    }

    /// Build the resource from `ctx` and the optional `preload` product.
    fn create(&self, ctx: &LoadContext<'_>, preload_data: Option<Resource>) -> FactoryResult<Resource>;

    /// Optional post-create step run after the resource is cached. Returning
    /// [`PostCreateStatus::Pending`] reschedules it.
    fn post_create(&self, _resource: &(dyn Any + Send + Sync)) -> FactoryResult<PostCreateStatus> {
        Ok(PostCreateStatus::Done)
    }

    /// Release a resource previously returned by `create`/`recreate`.
    fn destroy(&self, resource: Resource);

    /// Rebuild a cached resource in place from freshly loaded bytes. The
    /// default reports no support; hot-reload of that type is then a
    /// [`crate::error::FactoryError::NotSupported`].
    fn recreate(
        &self,
        _ctx: &LoadContext<'_>,
        _previous: &(dyn Any + Send + Sync),
    ) -> FactoryResult<RecreateOutcome> {
        Err(crate::error::FactoryError::NotSupported)
    }

    /// Whether this type streams: `Get` loads only
    /// [`Self::preload_chunk_size`] bytes initially instead of the whole file.
    fn is_streaming(&self) -> bool {
        false
    }

    /// Chunk size requested for the first load when [`Self::is_streaming`]
    /// is true.
    fn preload_chunk_size(&self) -> usize {
        0
    }
}

/// One registered type slot.
pub(crate) struct TypeEntry {
    pub(crate) handler: Arc<dyn ResourceTypeHandler>,
}
