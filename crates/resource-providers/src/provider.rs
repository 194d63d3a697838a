//! The uniform provider interface.

use crate::error::ProviderResult;
use crate::uri::MountUri;
use async_trait::async_trait;
use resource_manifest::Manifest;

/// One resource identified for a provider call: its canonical path and
/// the path's 64-bit hash, computed once by the caller (mount table or
/// factory) and threaded through so providers never rehash.
#[derive(Debug, Clone, Copy)]
pub struct PathKey<'a> {
    /// 64-bit hash of `path`.
    pub hash: u64,
    /// Canonicalized resource path.
    pub path: &'a str,
}

/// Uniform archive provider interface. Implementations are `Send + Sync`: two
/// in-flight `read_file` calls against the same provider must be independently
/// safe, either by copying per-call state or synchronizing internally.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Whether this provider's implementation can mount `uri`.
    fn can_mount(uri: &MountUri) -> bool
    where
        Self: Sized;

    /// Mount `uri`, optionally relative to `base`'s location.
    async fn mount(uri: &MountUri, base: Option<&str>) -> ProviderResult<Self>
    where
        Self: Sized;

    /// Tear the provider down, releasing any open handles.
    async fn unmount(&mut self) -> ProviderResult<()> {
        Ok(())
    }

    /// Size in bytes of the resource at `key`, or
    /// [`crate::error::ProviderError::NotFound`].
    async fn get_file_size(&self, key: PathKey<'_>) -> ProviderResult<u64>;

    /// Read the full contents of the resource at `key`.
    async fn read_file(&self, key: PathKey<'_>) -> ProviderResult<Vec<u8>>;

    /// Read `size` bytes starting at `offset` of the resource at `key`.
    async fn read_file_partial(
        &self,
        key: PathKey<'_>,
        offset: u64,
        size: u64,
    ) -> ProviderResult<Vec<u8>>;

    /// Write `payload` for `key`, if this provider supports writes. Default:
    /// unsupported.
    async fn write_file(&mut self, key: PathKey<'_>, payload: &[u8]) -> ProviderResult<()> {
        let _ = (key, payload);
        Err(crate::error::ProviderError::NotSupported)
    }

    /// The manifest loaded for this provider, if any.
    fn get_manifest(&self) -> Option<&Manifest> {
        None
    }
}
