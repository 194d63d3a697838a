//! Bundle archive provider.

use crate::error::{ProviderError, ProviderResult};
use crate::provider::{PathKey, Provider};
use crate::uri::MountUri;
use async_trait::async_trait;
use parking_lot::Mutex;
use resource_archive::Archive;
use resource_manifest::Manifest;
use std::collections::HashMap;
use tracing::debug;

/// Build the `url_hash → content digest` entry map for a set of manifest
/// entries and an archive. Entries with no matching archive entry are skipped
/// — they are excluded or expected via live-update.
pub(crate) fn build_entry_map<'a>(
    entries: impl IntoIterator<Item = &'a resource_manifest::ResourceEntry>,
    archive: &Archive,
) -> HashMap<u64, Vec<u8>> {
    let mut map = HashMap::new();
    for entry in entries {
        if archive.contains(&entry.digest) {
            map.insert(entry.url_hash, entry.digest.clone());
        } else {
            debug!(url = %entry.url, "manifest entry has no matching archive entry, skipping");
        }
    }
    map
}

pub(crate) fn derive_paths(uri: &MountUri) -> (String, String, String) {
    let base = format!("{}{}", uri.location, uri.path);
    (
        format!("{base}.arci"),
        format!("{base}.arcd"),
        format!("{base}.dmanifest"),
    )
}

/// Mounts a read-only bundle archive: `<base>.arci`, `<base>.arcd`, and
/// `<base>.dmanifest` (schemes `archive`, `dmanif`).
pub struct BundleArchiveProvider {
    manifest: Manifest,
    archive: Mutex<Archive>,
    entry_map: HashMap<u64, Vec<u8>>,
}

impl BundleArchiveProvider {
    fn digest_for(&self, key: PathKey<'_>) -> ProviderResult<&[u8]> {
        self.entry_map
            .get(&key.hash)
            .map(Vec::as_slice)
            .ok_or(ProviderError::NotFound)
    }
}

#[async_trait]
impl Provider for BundleArchiveProvider {
    fn can_mount(uri: &MountUri) -> bool {
        matches!(uri.scheme.as_str(), "archive" | "dmanif")
    }

    async fn mount(uri: &MountUri, _base: Option<&str>) -> ProviderResult<Self> {
        let (arci, arcd, dmanifest) = derive_paths(uri);

        let manifest_bytes = tokio::fs::read(&dmanifest).await?;
        let manifest = resource_manifest::parse_manifest(&manifest_bytes)?;

        let archive = Archive::open_bundled(&arci, &arcd)?;
        let entry_map = build_entry_map(&manifest.entries, &archive);

        Ok(Self {
            manifest,
            archive: Mutex::new(archive),
            entry_map,
        })
    }

    async fn get_file_size(&self, key: PathKey<'_>) -> ProviderResult<u64> {
        let digest = self.digest_for(key)?;
        self.archive
            .lock()
            .entry_size(digest)
            .map(u64::from)
            .ok_or(ProviderError::NotFound)
    }

    async fn read_file(&self, key: PathKey<'_>) -> ProviderResult<Vec<u8>> {
        let digest = self.digest_for(key)?.to_vec();
        Ok(self.archive.lock().read(&digest)?)
    }

    async fn read_file_partial(
        &self,
        key: PathKey<'_>,
        offset: u64,
        size: u64,
    ) -> ProviderResult<Vec<u8>> {
        let digest = self.digest_for(key)?.to_vec();
        Ok(self
            .archive
            .lock()
            .read_partial(&digest, offset as u32, size as u32)?)
    }

    fn get_manifest(&self) -> Option<&Manifest> {
        Some(&self.manifest)
    }
}
