//! ZIP archive provider.

use crate::error::{ProviderError, ProviderResult};
use crate::provider::{PathKey, Provider};
use crate::uri::MountUri;
use async_trait::async_trait;
use resource_manifest::{entry_flags, Manifest};
use resource_util::{decrypt_buffer, path_hash64};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

const MANIFEST_ENTRY_NAME: &str = "liveupdate.game.dmanifest";

/// One entry registered by the ZIP provider: either manifest-covered
/// (unwrapped per manifest flags) or a raw developer-added extra entry.
#[derive(Clone)]
struct ZipEntryInfo {
    zip_name: String,
    size: u64,
    manifest_digest: Option<Vec<u8>>,
    /// [`entry_flags`] from the covering manifest entry, or 0 for a raw
    /// extra entry with no manifest coverage.
    flags: u8,
}

/// Mounts a ZIP archive (scheme `zip`, or any URI path ending `.zip`).
pub struct ZipProvider {
    archive: Arc<Mutex<zip::ZipArchive<BufReader<File>>>>,
    manifest: Option<Manifest>,
    entries: HashMap<u64, ZipEntryInfo>,
}

#[async_trait]
impl Provider for ZipProvider {
    fn can_mount(uri: &MountUri) -> bool {
        uri.scheme == "zip" || uri.path.ends_with(".zip") || uri.location.ends_with(".zip")
    }

    async fn mount(uri: &MountUri, _base: Option<&str>) -> ProviderResult<Self> {
        let path = PathBuf::from(format!("{}{}", uri.location, uri.path));
        let file = File::open(&path)?;
        let mut zip = zip::ZipArchive::new(BufReader::new(file))
            .map_err(|e| ProviderError::Zip(e.to_string()))?;

        let manifest = match zip.by_name(MANIFEST_ENTRY_NAME) {
            Ok(mut entry) => {
                let mut bytes = Vec::with_capacity(entry.size() as usize);
                entry
                    .read_to_end(&mut bytes)
                    .map_err(|e| ProviderError::Zip(e.to_string()))?;
                Some(resource_manifest::parse_manifest(&bytes)?)
            }
            Err(zip::result::ZipError::FileNotFound) => None,
            Err(e) => return Err(ProviderError::Zip(e.to_string())),
        };

        let mut entries = HashMap::new();
        let names: Vec<String> = zip.file_names().map(str::to_string).collect();
        for name in &names {
            if name == MANIFEST_ENTRY_NAME {
                continue;
            }
            let size = zip
                .by_name(name)
                .map_err(|e| ProviderError::Zip(e.to_string()))?
                .size();
            let hash = path_hash64(name);
            entries.insert(
                hash,
                ZipEntryInfo {
                    zip_name: name.clone(),
                    size,
                    manifest_digest: None,
                    flags: 0,
                },
            );
        }

        if let Some(manifest) = &manifest {
            for entry in &manifest.entries {
                if let Some(info) = entries.get_mut(&entry.url_hash) {
                    info.manifest_digest = Some(entry.digest.clone());
                    info.size = entry.size;
                    info.flags = entry.flags;
                }
            }
        }

        Ok(Self {
            archive: Arc::new(Mutex::new(zip)),
            manifest,
            entries,
        })
    }

    async fn get_file_size(&self, key: PathKey<'_>) -> ProviderResult<u64> {
        self.entries
            .get(&key.hash)
            .map(|e| e.size)
            .ok_or(ProviderError::NotFound)
    }

    async fn read_file(&self, key: PathKey<'_>) -> ProviderResult<Vec<u8>> {
        let info = self
            .entries
            .get(&key.hash)
            .cloned()
            .ok_or(ProviderError::NotFound)?;

        let archive = self.archive.clone();
        let mut bytes = tokio::task::spawn_blocking(move || {
            let mut archive = archive.blocking_lock();
            let mut entry = archive
                .by_name(&info.zip_name)
                .map_err(|e| ProviderError::Zip(e.to_string()))?;
            let mut bytes = Vec::with_capacity(entry.size() as usize);
            entry
                .read_to_end(&mut bytes)
                .map_err(|e| ProviderError::Zip(e.to_string()))?;
            Ok::<_, ProviderError>(bytes)
        })
        .await
        .map_err(|e| ProviderError::Zip(e.to_string()))??;

        if info.manifest_digest.is_some() {
            if info.flags & entry_flags::ENCRYPTED != 0 {
                decrypt_buffer(&mut bytes).map_err(|e| ProviderError::InvalidData(e.to_string()))?;
            }
            if info.flags & entry_flags::COMPRESSED != 0 {
                bytes = lz4_flex::block::decompress(&bytes, info.size as usize)
                    .map_err(|e| ProviderError::InvalidData(e.to_string()))?;
            }
        }

        Ok(bytes)
    }

    async fn read_file_partial(
        &self,
        key: PathKey<'_>,
        offset: u64,
        size: u64,
    ) -> ProviderResult<Vec<u8>> {
        let full = self.read_file(key).await?;
        let start = offset as usize;
        let end = start
            .checked_add(size as usize)
            .filter(|&e| e <= full.len())
            .ok_or_else(|| ProviderError::InvalidData("partial read out of range".into()))?;
        Ok(full[start..end].to_vec())
    }

    fn get_manifest(&self) -> Option<&Manifest> {
        self.manifest.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use resource_manifest::{build_data_body, build_envelope, url_hash, ManifestHeader, ResourceEntry};
    use resource_util::HashAlgorithm;
    use std::io::Write;

    #[tokio::test]
    async fn read_file_unwraps_manifest_covered_compressed_encrypted_entry() {
        let dir = tempfile::tempdir().unwrap();
        let name = "archive_data/liveupdate.file7.adc";
        let original = vec![b'q'; 4096];
        let compressed = lz4_flex::block::compress(&original);
        let mut on_disk = compressed.clone();
        resource_util::decrypt_buffer(&mut on_disk).unwrap();

        let header = ManifestHeader {
            resource_hash_algorithm: HashAlgorithm::Sha256,
            signature_hash_algorithm: HashAlgorithm::Sha256,
            signing_algorithm: 1,
            project_identifier: "test".into(),
        };
        let digest = resource_util::compute_digest(HashAlgorithm::Sha256, &original);
        let entries = vec![ResourceEntry {
            url: name.to_string(),
            url_hash: url_hash(name),
            digest,
            size: original.len() as u64,
            compressed_size: compressed.len() as u64,
            flags: entry_flags::BUNDLED | entry_flags::COMPRESSED | entry_flags::ENCRYPTED,
            dependents: vec![],
        }];
        let data_body = build_data_body(&header, &[], &entries);
        let envelope = build_envelope(&data_body, b"sig", b"ident");

        let mut zip_bytes = Vec::new();
        {
            let mut writer = zip::ZipWriter::new(std::io::Cursor::new(&mut zip_bytes));
            let options = zip::write::SimpleFileOptions::default();
            writer.start_file(MANIFEST_ENTRY_NAME, options).unwrap();
            writer.write_all(&envelope).unwrap();
            writer.start_file(name, options).unwrap();
            writer.write_all(&on_disk).unwrap();
            writer.finish().unwrap();
        }
        let zip_path = dir.path().join("bundle.zip");
        std::fs::write(&zip_path, &zip_bytes).unwrap();

        let uri = MountUri {
            scheme: "zip".into(),
            location: format!("{}/", dir.path().display()),
            path: "bundle.zip".into(),
            hostname: None,
            port: None,
        };
        let provider = ZipProvider::mount(&uri, None).await.unwrap();
        let key = PathKey {
            hash: url_hash(name),
            path: name,
        };
        let read_back = provider.read_file(key).await.unwrap();
        assert_eq!(read_back, original);
    }
}
