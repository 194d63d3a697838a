//! Streaming partial reads for resources that declared a non-sentinel preload
//! size.

use std::future::Future;
use std::sync::Arc;

use resource_factory::{Factory, FactoryResult};
use tracing::debug;

/// One delivered chunk of a streamed resource.
pub struct StreamChunk {
    /// Offset this chunk started at.
    pub offset: u64,
    /// Number of bytes actually delivered (may be less than requested
    /// near end-of-resource).
    pub read: u64,
    /// The bytes themselves.
    pub bytes: Vec<u8>,
}

/// Schedule a background partial read of `path` and invoke `callback` once it
/// completes. The type implementation typically recurses by scheduling the
/// next chunk from inside `callback` until the whole resource is present; this
/// port leaves that recursion to the caller, who gets an owned `Arc<Factory>`
/// clone to call `preload_data` again from within their callback.
pub fn preload_data<F, Fut>(factory: Arc<Factory>, path: String, offset: u64, size: u64, callback: F)
where
    F: FnOnce(Arc<Factory>, FactoryResult<StreamChunk>) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let result = factory.get_raw(&path).await.map(|full| {
            let start = (offset as usize).min(full.len());
            let end = (start + size as usize).min(full.len());
            StreamChunk {
                offset,
                read: (end - start) as u64,
                bytes: full[start..end].to_vec(),
            }
        });
        if let Err(e) = &result {
            debug!(path, error = %e, "stream chunk load failed");
        }
        callback(factory, result).await;
    });
}
