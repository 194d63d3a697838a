//! Provider discovery by URI scheme.

use crate::bundle_provider::BundleArchiveProvider;
use crate::error::{ProviderError, ProviderResult};
use crate::file_provider::FileProvider;
use crate::http_provider::HttpProvider;
use crate::mutable_provider::MutableArchiveProvider;
use crate::provider::{PathKey, Provider};
use crate::uri::MountUri;
use crate::zip_provider::ZipProvider;
use async_trait::async_trait;
use resource_manifest::Manifest;

/// A mounted provider instance, dispatched through a closed tagged union
/// rather than a trait object — the built-in provider set is fixed, so
/// this avoids a heap-allocated `dyn Provider` per mount while still
/// giving the mount table one uniform type to hold.
pub enum MountedProvider {
    /// Plain filesystem directory tree.
    File(FileProvider),
    /// Read-only bundle archive (`.arci`/`.arcd`/`.dmanifest`).
    Bundle(BundleArchiveProvider),
    /// Writable live-update archive.
    Mutable(MutableArchiveProvider),
    /// ZIP-packed resource tree.
    Zip(ZipProvider),
    /// Remote resource tree over HTTP(S).
    Http(HttpProvider),
}

impl MountedProvider {
    /// Resolve `uri` against the built-in provider set and mount it.
    ///
    /// # Errors
    /// Returns [`ProviderError::UnsupportedUri`] if no built-in provider
    /// claims the scheme, or propagates the chosen provider's mount error.
    pub async fn mount(uri: &MountUri, base: Option<&str>) -> ProviderResult<Self> {
        if ZipProvider::can_mount(uri) {
            return Ok(Self::Zip(ZipProvider::mount(uri, base).await?));
        }
        if MutableArchiveProvider::can_mount(uri) {
            return Ok(Self::Mutable(MutableArchiveProvider::mount(uri, base).await?));
        }
        if BundleArchiveProvider::can_mount(uri) {
            return Ok(Self::Bundle(BundleArchiveProvider::mount(uri, base).await?));
        }
        if HttpProvider::can_mount(uri) {
            return Ok(Self::Http(HttpProvider::mount(uri, base).await?));
        }
        if FileProvider::can_mount(uri) {
            return Ok(Self::File(FileProvider::mount(uri, base).await?));
        }
        Err(ProviderError::UnsupportedUri(uri.to_uri_string()))
    }
}

#[async_trait]
impl Provider for MountedProvider {
    fn can_mount(uri: &MountUri) -> bool {
        FileProvider::can_mount(uri)
            || BundleArchiveProvider::can_mount(uri)
            || MutableArchiveProvider::can_mount(uri)
            || ZipProvider::can_mount(uri)
            || HttpProvider::can_mount(uri)
    }

    async fn mount(uri: &MountUri, base: Option<&str>) -> ProviderResult<Self> {
        Self::mount(uri, base).await
    }

    async fn unmount(&mut self) -> ProviderResult<()> {
        match self {
            Self::File(p) => p.unmount().await,
            Self::Bundle(p) => p.unmount().await,
            Self::Mutable(p) => p.unmount().await,
            Self::Zip(p) => p.unmount().await,
            Self::Http(p) => p.unmount().await,
        }
    }

    async fn get_file_size(&self, key: PathKey<'_>) -> ProviderResult<u64> {
        match self {
            Self::File(p) => p.get_file_size(key).await,
            Self::Bundle(p) => p.get_file_size(key).await,
            Self::Mutable(p) => p.get_file_size(key).await,
            Self::Zip(p) => p.get_file_size(key).await,
            Self::Http(p) => p.get_file_size(key).await,
        }
    }

    async fn read_file(&self, key: PathKey<'_>) -> ProviderResult<Vec<u8>> {
        match self {
            Self::File(p) => p.read_file(key).await,
            Self::Bundle(p) => p.read_file(key).await,
            Self::Mutable(p) => p.read_file(key).await,
            Self::Zip(p) => p.read_file(key).await,
            Self::Http(p) => p.read_file(key).await,
        }
    }

    async fn read_file_partial(
        &self,
        key: PathKey<'_>,
        offset: u64,
        size: u64,
    ) -> ProviderResult<Vec<u8>> {
        match self {
            Self::File(p) => p.read_file_partial(key, offset, size).await,
            Self::Bundle(p) => p.read_file_partial(key, offset, size).await,
            Self::Mutable(p) => p.read_file_partial(key, offset, size).await,
            Self::Zip(p) => p.read_file_partial(key, offset, size).await,
            Self::Http(p) => p.read_file_partial(key, offset, size).await,
        }
    }

    async fn write_file(&mut self, key: PathKey<'_>, payload: &[u8]) -> ProviderResult<()> {
        match self {
            Self::File(p) => p.write_file(key, payload).await,
            Self::Mutable(p) => p.write_file(key, payload).await,
            Self::Bundle(_) | Self::Zip(_) | Self::Http(_) => Err(ProviderError::NotSupported),
        }
    }

    fn get_manifest(&self) -> Option<&Manifest> {
        match self {
            Self::Bundle(p) => p.get_manifest(),
            Self::Mutable(p) => p.get_manifest(),
            Self::Zip(p) => p.get_manifest(),
            Self::File(_) | Self::Http(_) => None,
        }
    }
}
