//! Mount table: priority-ordered providers with first-hit lookup and synthetic
//! in-memory overrides.

use crate::error::{ProviderError, ProviderResult};
use crate::provider::{PathKey, Provider};
use crate::registry::MountedProvider;
use crate::uri::MountUri;
use dashmap::DashMap;
use resource_util::path_hash64;
use std::path::Path;
use tracing::{info, warn};

const MOUNT_FILE_VERSION: u32 = 1;
const MOUNT_FILE_SEPARATOR: &str = "@,@";

/// One mounted provider instance.
pub struct MountEntry {
    /// Unique name within the mount table.
    pub name: String,
    /// The mounted provider.
    pub archive: MountedProvider,
    /// Signed priority; higher wins. Ties broken by insertion order.
    pub priority: i32,
    /// Whether this mount is written to `liveupdate.mounts`.
    pub persist: bool,
    /// The URI this mount was created from, kept for persistence.
    pub uri: String,
}

/// Per-factory container of mounts.
#[derive(Default)]
pub struct MountTable {
    entries: Vec<MountEntry>,
    /// Synthetic in-memory resources registered via `AddFile`; these always
    /// win over any provider.
    synthetic: DashMap<u64, Vec<u8>>,
}

impl MountTable {
    /// Construct an empty mount table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mount `uri` under `name` at `priority`, inserting in descending
    /// priority order.
    ///
    /// # Errors
    /// Propagates the chosen provider's mount failure.
    pub async fn add_mount(
        &mut self,
        name: impl Into<String>,
        uri_str: &str,
        priority: i32,
        persist: bool,
    ) -> ProviderResult<()> {
        let uri: MountUri = uri_str.parse()?;
        let archive = MountedProvider::mount(&uri, None).await?;
        let name = name.into();

        let idx = self
            .entries
            .iter()
            .position(|e| e.priority < priority)
            .unwrap_or(self.entries.len());
        self.entries.insert(
            idx,
            MountEntry {
                name,
                archive,
                priority,
                persist,
                uri: uri_str.to_string(),
            },
        );
        Ok(())
    }

    /// Unmount and remove the entry named `name`, preserving the order of the
    /// rest.
    ///
    /// # Errors
    /// Returns [`ProviderError::NotFound`] if no such mount exists.
    pub async fn remove_mount(&mut self, name: &str) -> ProviderResult<()> {
        let idx = self
            .entries
            .iter()
            .position(|e| e.name == name)
            .ok_or(ProviderError::NotFound)?;
        let mut entry = self.entries.remove(idx);
        entry.archive.unmount().await?;
        Ok(())
    }

    /// Iterate mounts in priority order (descending), for diagnostics and
    /// dependency traversal.
    pub fn entries(&self) -> impl Iterator<Item = &MountEntry> {
        self.entries.iter()
    }

    /// Register a synthetic in-memory resource that always wins over provider
    /// lookups.
    ///
    /// # Errors
    /// Returns [`ProviderError::AlreadyRegistered`] if `hash` is already
    /// registered, either synthetically or must be removed first.
    pub fn add_file(&self, hash: u64, bytes: Vec<u8>) -> ProviderResult<()> {
        if self.synthetic.contains_key(&hash) {
            return Err(ProviderError::AlreadyRegistered);
        }
        self.synthetic.insert(hash, bytes);
        Ok(())
    }

    /// Remove a synthetic resource registered via [`Self::add_file`].
    pub fn remove_file(&self, hash: u64) {
        self.synthetic.remove(&hash);
    }

    /// Whether `path` (whose hash is `key.hash`) is visible through a
    /// synthetic override or any mounted provider.
    pub async fn resource_exists(&self, key: PathKey<'_>) -> bool {
        if self.synthetic.contains_key(&key.hash) {
            return true;
        }
        self.get_resource_size(key).await.is_ok()
    }

    /// Size of the resource at `key`, synthetic overrides winning over
    /// providers.
    ///
    /// # Errors
    /// Returns [`ProviderError::NotFound`] if no mount serves the path;
    /// propagates the first non-`NotFound` provider error encountered.
    pub async fn get_resource_size(&self, key: PathKey<'_>) -> ProviderResult<u64> {
        if let Some(bytes) = self.synthetic.get(&key.hash) {
            return Ok(bytes.len() as u64);
        }
        for entry in &self.entries {
            match entry.archive.get_file_size(key).await {
                Ok(size) => return Ok(size),
                Err(ProviderError::NotFound) => continue,
                Err(e) => return Err(e),
            }
        }
        Err(ProviderError::NotFound)
    }

    /// Read the full contents of the resource at `key`.
    ///
    /// # Errors
    /// Returns [`ProviderError::NotFound`] if no mount serves the path;
    /// propagates the first non-`NotFound` provider error encountered.
    pub async fn read_resource(&self, key: PathKey<'_>) -> ProviderResult<Vec<u8>> {
        if let Some(bytes) = self.synthetic.get(&key.hash) {
            return Ok(bytes.clone());
        }
        for entry in &self.entries {
            match entry.archive.read_file(key).await {
                Ok(bytes) => return Ok(bytes),
                Err(ProviderError::NotFound) => continue,
                Err(e) => return Err(e),
            }
        }
        Err(ProviderError::NotFound)
    }

    /// Read a byte range of the resource at `key`.
    ///
    /// # Errors
    /// Returns [`ProviderError::NotFound`] if no mount serves the path;
    /// propagates the first non-`NotFound` provider error encountered.
    pub async fn read_resource_partial(
        &self,
        key: PathKey<'_>,
        offset: u64,
        size: u64,
    ) -> ProviderResult<Vec<u8>> {
        if let Some(bytes) = self.synthetic.get(&key.hash) {
            let start = offset as usize;
            let end = (start + size as usize).min(bytes.len());
            return Ok(bytes[start.min(bytes.len())..end].to_vec());
        }
        for entry in &self.entries {
            match entry.archive.read_file_partial(key, offset, size).await {
                Ok(bytes) => return Ok(bytes),
                Err(ProviderError::NotFound) => continue,
                Err(e) => return Err(e),
            }
        }
        Err(ProviderError::NotFound)
    }

    /// Walk every mounted provider's manifest in priority order, invoking
    /// `callback(url_hash, digest, missing)` for each entry, where `missing`
    /// reflects whether any mount currently serves that url-hash.
    pub async fn get_dependencies(&self, mut callback: impl FnMut(u64, &[u8], bool)) {
        for entry in &self.entries {
            let Some(manifest) = entry.archive.get_manifest() else {
                continue;
            };
            for resource_entry in &manifest.entries {
                let missing = !self.resource_exists(PathKey {
                    hash: resource_entry.url_hash,
                    path: &resource_entry.url,
                }).await;
                callback(resource_entry.url_hash, &resource_entry.digest, missing);
            }
        }
    }

    /// Write all `persist=true` mounts to `liveupdate.mounts`.
    ///
    /// # Errors
    /// Propagates the I/O error writing the file.
    pub async fn save_mounts(&self, path: &Path) -> ProviderResult<()> {
        let mut out = format!("VERSION{MOUNT_FILE_SEPARATOR}{MOUNT_FILE_VERSION}\n");
        for entry in self.entries.iter().filter(|e| e.persist) {
            out.push_str(&format!(
                "MOUNT{sep}{priority}{sep}{name}{sep}{uri}\n",
                sep = MOUNT_FILE_SEPARATOR,
                priority = entry.priority,
                name = entry.name,
                uri = entry.uri,
            ));
        }
        tokio::fs::write(path, out).await?;
        Ok(())
    }

    /// Load and re-mount persisted entries from `liveupdate.mounts`.
    ///
    /// # Errors
    /// Returns [`ProviderError::InvalidData`] if the header version does not
    /// match [`MOUNT_FILE_VERSION`]; propagates I/O and provider mount errors.
    pub async fn load_mounts(&mut self, path: &Path) -> ProviderResult<()> {
        let contents = match tokio::fs::read_to_string(path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        let mut lines = contents.lines();
        let Some(header) = lines.next() else {
            return Ok(());
        };
        let mut header_parts = header.split(MOUNT_FILE_SEPARATOR);
        if header_parts.next() != Some("VERSION") {
            return Err(ProviderError::InvalidData(
                "mount file missing VERSION header".into(),
            ));
        }
        let version: u32 = header_parts
            .next()
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| ProviderError::InvalidData("mount file header malformed".into()))?;
        if version != MOUNT_FILE_VERSION {
            return Err(ProviderError::InvalidData(format!(
                "mount file version mismatch: expected {MOUNT_FILE_VERSION}, got {version}"
            )));
        }

        for line in lines {
            let mut parts = line.split(MOUNT_FILE_SEPARATOR);
            if parts.next() != Some("MOUNT") {
                continue;
            }
            let Some(priority) = parts.next().and_then(|p| p.parse::<i32>().ok()) else {
                warn!(line, "skipping mount line with invalid or missing priority");
                continue;
            };
            let (Some(name), Some(uri)) = (parts.next(), parts.next()) else {
                warn!(line, "skipping mount line with missing fields");
                continue;
            };
            if let Err(e) = self.add_mount(name, uri, priority, true).await {
                warn!(name, uri, error = %e, "failed to remount persisted entry");
            } else {
                info!(name, uri, priority, "remounted persisted entry");
            }
        }
        Ok(())
    }
}

/// Compute the path-hash for a resource path.
#[must_use]
pub fn hash_path(path: &str) -> u64 {
    path_hash64(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn mount_dir(table: &mut MountTable, dir: &Path, name: &str, priority: i32) {
        let uri = format!("file:{}", dir.display());
        table.add_mount(name, &uri, priority, false).await.unwrap();
    }

    #[tokio::test]
    async fn priority_override_wins() {
        let low = tempfile::tempdir().unwrap();
        let high = tempfile::tempdir().unwrap();
        tokio::fs::write(low.path().join("a.txt"), b"low-priority")
            .await
            .unwrap();
        tokio::fs::write(high.path().join("a.txt"), b"high-priority")
            .await
            .unwrap();

        let mut table = MountTable::new();
        mount_dir(&mut table, low.path(), "low", 10).await;
        mount_dir(&mut table, high.path(), "high", 30).await;

        let key = PathKey {
            hash: hash_path("/a.txt"),
            path: "/a.txt",
        };
        let bytes = table.read_resource(key).await.unwrap();
        assert_eq!(bytes, b"high-priority");
    }

    #[tokio::test]
    async fn add_file_wins_over_providers() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("a.txt"), b"from-disk")
            .await
            .unwrap();

        let mut table = MountTable::new();
        mount_dir(&mut table, dir.path(), "only", 0).await;

        let hash = hash_path("/a.txt");
        table.add_file(hash, b"synthetic".to_vec()).unwrap();

        let key = PathKey {
            hash,
            path: "/a.txt",
        };
        let bytes = table.read_resource(key).await.unwrap();
        assert_eq!(bytes, b"synthetic");
    }

    #[tokio::test]
    async fn add_file_duplicate_rejected() {
        let table = MountTable::new();
        table.add_file(1, vec![1]).unwrap();
        let err = table.add_file(1, vec![2]).unwrap_err();
        assert!(matches!(err, ProviderError::AlreadyRegistered));
    }

    #[tokio::test]
    async fn missing_resource_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let mut table = MountTable::new();
        mount_dir(&mut table, dir.path(), "only", 0).await;
        let key = PathKey {
            hash: hash_path("/missing.txt"),
            path: "/missing.txt",
        };
        let err = table.read_resource(key).await.unwrap_err();
        assert!(matches!(err, ProviderError::NotFound));
    }

    #[tokio::test]
    async fn persist_round_trips_through_mount_file() {
        let dir = tempfile::tempdir().unwrap();
        let mount_dir_path = tempfile::tempdir().unwrap();
        tokio::fs::write(mount_dir_path.path().join("a.txt"), b"persisted")
            .await
            .unwrap();

        let mut table = MountTable::new();
        let uri = format!("file:{}", mount_dir_path.path().display());
        table.add_mount("persisted", &uri, 5, true).await.unwrap();

        let mount_file = dir.path().join("liveupdate.mounts");
        table.save_mounts(&mount_file).await.unwrap();

        let mut reloaded = MountTable::new();
        reloaded.load_mounts(&mount_file).await.unwrap();
        assert_eq!(reloaded.entries().count(), 1);

        let key = PathKey {
            hash: hash_path("/a.txt"),
            path: "/a.txt",
        };
        let bytes = reloaded.read_resource(key).await.unwrap();
        assert_eq!(bytes, b"persisted");
    }

    #[tokio::test]
    async fn version_mismatch_aborts_load() {
        let dir = tempfile::tempdir().unwrap();
        let mount_file = dir.path().join("liveupdate.mounts");
        tokio::fs::write(&mount_file, "VERSION@,@99\n")
            .await
            .unwrap();

        let mut table = MountTable::new();
        let err = table.load_mounts(&mount_file).await.unwrap_err();
        assert!(matches!(err, ProviderError::InvalidData(_)));
    }
}
