//! Mutable (live-update) archive provider.

use crate::bundle_provider::{build_entry_map, derive_paths};
use crate::error::{ProviderError, ProviderResult};
use crate::provider::{PathKey, Provider};
use crate::uri::MountUri;
use async_trait::async_trait;
use binrw::BinRead;
use parking_lot::Mutex;
use resource_archive::{Archive, ArchiveData, IndexHeader, LiveUpdateHeader, INDEX_VERSION};
use resource_manifest::Manifest;
use resource_util::{compare_digests, compute_digest, DigestCompare};
use std::collections::HashMap;
use std::io::Cursor;
use std::path::PathBuf;

/// Wraps the same archive layout as [`crate::bundle_provider::BundleArchiveProvider`]
/// but allows `write_file` (scheme `mutable`, alias `dmanif`).
pub struct MutableArchiveProvider {
    arci_path: PathBuf,
    manifest: Manifest,
    archive: Mutex<Archive>,
    entry_map: Mutex<HashMap<u64, Vec<u8>>>,
}

impl MutableArchiveProvider {
    /// Mount with an explicit base manifest to deep-copy when the provider's
    /// own manifest file does not yet exist.
    async fn mount_with_base(uri: &MountUri, base_manifest: Option<Manifest>) -> ProviderResult<Self> {
        let (arci_path_s, arcd_path_s, dmanifest) = derive_paths(uri);
        let arci_path = PathBuf::from(&arci_path_s);
        let arcd_path = PathBuf::from(&arcd_path_s);

        // Promote any pending batch left over from a prior run by
        // renaming *.arci.tmp to *.arci.
        let tmp_path = arci_path.with_extension("arci.tmp");
        if tmp_path.exists() {
            tokio::fs::rename(&tmp_path, &arci_path).await?;
        }

        let manifest = if let Ok(bytes) = tokio::fs::read(&dmanifest).await {
            resource_manifest::parse_manifest(&bytes)?
        } else if let Some(base) = base_manifest {
            base
        } else {
            return Err(ProviderError::NotFound);
        };

        let (index, data) = if arci_path.exists() && arcd_path.exists() {
            let index_bytes = tokio::fs::read(&arci_path).await?;
            let index = resource_archive::ArchiveIndex::parse(&index_bytes)?;
            let data = ArchiveData::open_file(&arcd_path, true)?;
            (index, data)
        } else {
            let header = IndexHeader {
                version: INDEX_VERSION,
                reserved: 0,
                userdata: 0,
                entry_count: 0,
                entry_data_offset: 0,
                hash_offset: 0,
                hash_length: manifest.header.resource_hash_algorithm.digest_len() as u32,
                md5: [0; 16],
            };
            let index = Archive::new_index_with_resource(&header);
            let data = ArchiveData::open_file(&arcd_path, true)?;
            (index, data)
        };

        let archive = Archive::new_mutable(index, data, arci_path.clone());
        // The mutable provider's entry map covers only manifest entries
        // marked EXCLUDED (the ones expected via live-update).
        let excluded = manifest.entries.iter().filter(|e| e.is_excluded());
        let entry_map = build_entry_map(excluded, &archive);

        Ok(Self {
            arci_path,
            manifest,
            archive: Mutex::new(archive),
            entry_map: Mutex::new(entry_map),
        })
    }

    fn digest_for(&self, hash: u64) -> ProviderResult<Vec<u8>> {
        self.entry_map
            .lock()
            .get(&hash)
            .cloned()
            .ok_or(ProviderError::NotFound)
    }
}

#[async_trait]
impl Provider for MutableArchiveProvider {
    fn can_mount(uri: &MountUri) -> bool {
        matches!(uri.scheme.as_str(), "mutable" | "dmanif")
    }

    async fn mount(uri: &MountUri, _base: Option<&str>) -> ProviderResult<Self> {
        Self::mount_with_base(uri, None).await
    }

    async fn get_file_size(&self, key: PathKey<'_>) -> ProviderResult<u64> {
        let digest = self.digest_for(key.hash)?;
        self.archive
            .lock()
            .entry_size(&digest)
            .map(u64::from)
            .ok_or(ProviderError::NotFound)
    }

    async fn read_file(&self, key: PathKey<'_>) -> ProviderResult<Vec<u8>> {
        let digest = self.digest_for(key.hash)?;
        Ok(self.archive.lock().read(&digest)?)
    }

    async fn read_file_partial(
        &self,
        key: PathKey<'_>,
        offset: u64,
        size: u64,
    ) -> ProviderResult<Vec<u8>> {
        let digest = self.digest_for(key.hash)?;
        Ok(self
            .archive
            .lock()
            .read_partial(&digest, offset as u32, size as u32)?)
    }

    /// Live-update write path.
    async fn write_file(&mut self, key: PathKey<'_>, payload: &[u8]) -> ProviderResult<()> {
        let entry = self
            .manifest
            .find_entry(key.hash)
            .cloned()
            .ok_or(ProviderError::NotFound)?;

        let mut cursor = Cursor::new(payload);
        let header = LiveUpdateHeader::read(&mut cursor)
            .map_err(|e| ProviderError::InvalidData(e.to_string()))?;
        let body_start = 16usize;
        let body_end = body_start + header.size as usize;
        if body_end > payload.len() {
            return Err(ProviderError::InvalidData(
                "live-update payload shorter than declared size".into(),
            ));
        }
        let body = &payload[body_start..body_end];

        let computed = compute_digest(self.manifest.header.resource_hash_algorithm, body);
        if compare_digests(&computed, &entry.digest) != DigestCompare::Equal {
            return Err(ProviderError::SignatureMismatch);
        }

        {
            let mut archive = self.archive.lock();
            archive.write_resource_to_archive(
                &entry.digest,
                body,
                entry.size as u32,
                u32::from(header.flags),
            )?;
            let tmp = archive.write_index_tmp(Some(&self.arci_path))?;
            archive.publish_tmp_index(&tmp, &self.arci_path)?;
        }

        self.entry_map
            .lock()
            .insert(entry.url_hash, entry.digest.clone());
        Ok(())
    }

    fn get_manifest(&self) -> Option<&Manifest> {
        Some(&self.manifest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use resource_manifest::{build_data_body, build_envelope, entry_flags, url_hash, ManifestHeader, ResourceEntry};
    use resource_util::HashAlgorithm;

    fn sample_manifest(body: &[u8]) -> (Manifest, Vec<u8>) {
        let header = ManifestHeader {
            resource_hash_algorithm: HashAlgorithm::Sha256,
            signature_hash_algorithm: HashAlgorithm::Sha256,
            signing_algorithm: 1,
            project_identifier: "test".into(),
        };
        let digest = compute_digest(HashAlgorithm::Sha256, body);
        let entries = vec![ResourceEntry {
            url: "/archive_data/liveupdate.file7.adc".into(),
            url_hash: url_hash("/archive_data/liveupdate.file7.adc"),
            digest,
            size: body.len() as u64,
            compressed_size: body.len() as u64,
            flags: entry_flags::EXCLUDED,
            dependents: vec![],
        }];
        let data_body = build_data_body(&header, &[], &entries);
        let envelope = build_envelope(&data_body, b"sig", b"ident");
        let manifest = resource_manifest::parse_manifest(&envelope).unwrap();
        (manifest, envelope)
    }

    #[tokio::test]
    async fn write_file_then_read_back_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let body = b"the actual resource payload".to_vec();
        let (manifest, envelope) = sample_manifest(&body);
        tokio::fs::write(dir.path().join("luresources_dl.dmanifest"), &envelope)
            .await
            .unwrap();

        let uri = MountUri {
            scheme: "mutable".into(),
            location: format!("{}/", dir.path().display()),
            path: "luresources_dl".into(),
            hostname: None,
            port: None,
        };

        let mut provider = MutableArchiveProvider::mount(&uri, None).await.unwrap();
        let hash = manifest.entries[0].url_hash;
        let key = PathKey {
            hash,
            path: "/archive_data/liveupdate.file7.adc",
        };

        let missing = provider.get_file_size(key).await;
        assert!(missing.is_err());

        let mut wire = LiveUpdateHeader::new(body.len() as u32, 0).to_bytes();
        wire.extend_from_slice(&body);
        provider.write_file(key, &wire).await.unwrap();

        let read_back = provider.read_file(key).await.unwrap();
        assert_eq!(read_back, body);
    }

    #[tokio::test]
    async fn write_file_compressed_entry_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let body = vec![b'z'; 4096];
        let compressed = lz4_flex::block::compress(&body);

        // The manifest digest covers the bytes as they travel on the wire
        // (compressed, here), matching what `write_file` hashes before
        // committing to the archive.
        let header = ManifestHeader {
            resource_hash_algorithm: HashAlgorithm::Sha256,
            signature_hash_algorithm: HashAlgorithm::Sha256,
            signing_algorithm: 1,
            project_identifier: "test".into(),
        };
        let digest = compute_digest(HashAlgorithm::Sha256, &compressed);
        let entries = vec![ResourceEntry {
            url: "/archive_data/liveupdate.file7.adc".into(),
            url_hash: url_hash("/archive_data/liveupdate.file7.adc"),
            digest,
            size: body.len() as u64,
            compressed_size: compressed.len() as u64,
            flags: entry_flags::EXCLUDED | entry_flags::COMPRESSED,
            dependents: vec![],
        }];
        let data_body = build_data_body(&header, &[], &entries);
        let envelope = build_envelope(&data_body, b"sig", b"ident");
        let manifest = resource_manifest::parse_manifest(&envelope).unwrap();
        tokio::fs::write(dir.path().join("luresources_dl.dmanifest"), &envelope)
            .await
            .unwrap();

        let uri = MountUri {
            scheme: "mutable".into(),
            location: format!("{}/", dir.path().display()),
            path: "luresources_dl".into(),
            hostname: None,
            port: None,
        };

        let mut provider = MutableArchiveProvider::mount(&uri, None).await.unwrap();
        let hash = manifest.entries[0].url_hash;
        let key = PathKey {
            hash,
            path: "/archive_data/liveupdate.file7.adc",
        };

        let mut wire = LiveUpdateHeader::new(
            compressed.len() as u32,
            resource_archive::entry_flags::COMPRESSED as u8,
        )
        .to_bytes();
        wire.extend_from_slice(&compressed);
        provider.write_file(key, &wire).await.unwrap();

        let read_back = provider.read_file(key).await.unwrap();
        assert_eq!(read_back, body);
    }
}
