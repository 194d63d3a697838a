//! `Archive`: the index and data pair as a single unit, with the mutable
//! insertion/publish flow for live-update archives.

use crate::data::{read_entry, ArchiveData};
use crate::error::{ArchiveError, ArchiveResult};
use crate::format::{entry_flags, ArchiveEntry, IndexHeader, NOT_COMPRESSED};
use crate::index::ArchiveIndex;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A bundle or live-update archive: its parsed index plus a handle onto
/// the payload data it indexes.
pub struct Archive {
    index: ArchiveIndex,
    data: ArchiveData,
    /// Path the index was loaded from, if any; `.tmp`/publish operations
    /// write next to this.
    index_path: Option<PathBuf>,
    /// Whether payload inserts are accepted (live-update archives only).
    mutable: bool,
}

impl Archive {
    /// Wrap an already-parsed index and its data backing as a read-only
    /// bundle archive.
    #[must_use]
    pub fn new_bundled(index: ArchiveIndex, data: ArchiveData) -> Self {
        Self {
            index,
            data,
            index_path: None,
            mutable: false,
        }
    }

    /// Wrap an index and data backing as a mutable live-update archive,
    /// remembering where the index lives on disk for publish.
    #[must_use]
    pub fn new_mutable(index: ArchiveIndex, data: ArchiveData, index_path: PathBuf) -> Self {
        Self {
            index,
            data,
            index_path: Some(index_path),
            mutable: true,
        }
    }

    /// Load a read-only bundle archive from an `.arci`/`.arcd` pair on disk,
    /// memory-mapping the data file.
    ///
    /// # Errors
    /// Propagates I/O errors reading either file, or
    /// [`ArchiveError::InvalidData`]/[`ArchiveError::UnsupportedVersion`] if
    /// the index is malformed.
    pub fn open_bundled(index_path: impl AsRef<Path>, data_path: impl AsRef<Path>) -> ArchiveResult<Self> {
        let index_bytes = fs::read(index_path.as_ref())?;
        let index = ArchiveIndex::parse(&index_bytes)?;
        let data = ArchiveData::map_file(data_path)?;
        Ok(Self::new_bundled(index, data))
    }

    /// Whether this archive accepts [`Self::write_resource_to_archive`].
    #[must_use]
    pub const fn is_mutable(&self) -> bool {
        self.mutable
    }

    /// Number of entries currently indexed.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.index.entries.len()
    }

    /// Borrow the underlying index (for manifest cross-referencing and
    /// mount-level existence checks).
    #[must_use]
    pub const fn index(&self) -> &ArchiveIndex {
        &self.index
    }

    /// Whether `digest` has a stored entry.
    #[must_use]
    pub fn contains(&self, digest: &[u8]) -> bool {
        self.index.find_entry(digest).is_some()
    }

    /// Uncompressed size of the entry for `digest`, without reading its
    /// payload.
    #[must_use]
    pub fn entry_size(&self, digest: &[u8]) -> Option<u32> {
        self.index.find_entry(digest).map(|e| e.resource_size)
    }

    /// Read and decode one resource's full payload.
    ///
    /// # Errors
    /// Returns [`ArchiveError::NotFound`] if `digest` has no entry, or
    /// propagates I/O/decrypt/decompress failures.
    pub fn read(&mut self, digest: &[u8]) -> ArchiveResult<Vec<u8>> {
        let entry = *self.index.find_entry(digest).ok_or(ArchiveError::NotFound)?;
        read_entry(&mut self.data, &entry)
    }

    /// Read a byte range `[offset, offset+len)` of one resource's
    /// *uncompressed* payload. Compressed or encrypted entries are decoded in
    /// full first since LZ4 frames and the XTEA counter-mode stream are not
    /// independently seekable per arbitrary offset without replaying from the
    /// start of the block.
    ///
    /// # Errors
    /// Returns [`ArchiveError::NotFound`] if `digest` has no entry,
    /// [`ArchiveError::InvalidData`] if the requested range exceeds the
    /// resource's size, or propagates I/O/decrypt/decompress failures.
    pub fn read_partial(&mut self, digest: &[u8], offset: u32, len: u32) -> ArchiveResult<Vec<u8>> {
        let full = self.read(digest)?;
        let start = offset as usize;
        let end = start
            .checked_add(len as usize)
            .filter(|&e| e <= full.len())
            .ok_or_else(|| ArchiveError::InvalidData("partial read out of range".into()))?;
        Ok(full[start..end].to_vec())
    }

    /// Write `payload` for a new `digest` into the data file and index.
    /// `payload` is stored verbatim: live-update payloads arrive over the
    /// network already in their final on-disk encoding (compressed and/or
    /// encrypted per `flags`), so this never compresses or encrypts on its
    /// own. `resource_size` is the entry's uncompressed size and `flags`
    /// (see [`entry_flags`]) describes the encoding `payload` is already in;
    /// [`entry_flags::LIVEUPDATE_DATA`] is added automatically.
    ///
    /// # Errors
    /// Returns an error if this archive was not opened mutable, or if `digest`
    /// is already stored.
    pub fn write_resource_to_archive(
        &mut self,
        digest: &[u8],
        payload: &[u8],
        resource_size: u32,
        flags: u32,
    ) -> ArchiveResult<()> {
        if !self.mutable {
            return Err(ArchiveError::InvalidData(
                "archive is not mutable".into(),
            ));
        }

        let offset = self.data.append(payload)?;
        let compressed_size = if flags & entry_flags::COMPRESSED != 0 {
            payload.len() as u32
        } else {
            NOT_COMPRESSED
        };

        let entry = ArchiveEntry {
            data_offset: offset as u32,
            resource_size,
            compressed_size,
            flags: flags | entry_flags::LIVEUPDATE_DATA,
        };

        self.index.insert(digest, entry)?;
        debug!(entries = self.index.entries.len(), "inserted resource into live-update archive");
        Ok(())
    }

    /// Serialize the current index to its final on-disk bytes, as the header
    /// that should be installed via [`Self::publish_tmp_index`].
    #[must_use]
    pub fn serialize_index(&self) -> Vec<u8> {
        self.index.serialize()
    }

    /// Write the current index to a `.tmp` sibling of `index_path` (or the
    /// archive's own remembered path, if set), without yet making it the
    /// active index.
    ///
    /// # Errors
    /// Returns an error if no index path is known and none was supplied, or
    /// propagates the I/O error writing the file.
    pub fn write_index_tmp(&self, index_path: Option<&Path>) -> ArchiveResult<PathBuf> {
        let base = index_path
            .map(Path::to_path_buf)
            .or_else(|| self.index_path.clone())
            .ok_or_else(|| ArchiveError::InvalidData("no index path to write to".into()))?;
        let tmp_path = tmp_sibling(&base);
        fs::write(&tmp_path, self.index.serialize())?;
        Ok(tmp_path)
    }

    /// Atomically rename a previously-written `.tmp` index into place.
    ///
    /// # Errors
    /// Propagates the I/O error from the rename.
    pub fn publish_tmp_index(&self, tmp_path: &Path, final_path: &Path) -> ArchiveResult<()> {
        fs::rename(tmp_path, final_path)?;
        info!(path = %final_path.display(), "published new live-update index");
        Ok(())
    }

    /// Replace this archive's in-memory index wholesale, e.g. after reloading
    /// the just-published file.
    pub fn set_new_index(&mut self, index: ArchiveIndex) {
        self.index = index;
    }

    /// Build a fresh empty index that inherits `hash_length`/`userdata` from
    /// the base manifest's archive index.
    #[must_use]
    pub fn new_index_with_resource(template: &IndexHeader) -> ArchiveIndex {
        ArchiveIndex::empty_from_header(*template)
    }
}

fn tmp_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::INDEX_VERSION;
    use tempfile::tempdir;

    fn header_template() -> IndexHeader {
        IndexHeader {
            version: INDEX_VERSION,
            reserved: 0,
            userdata: 0,
            entry_count: 0,
            entry_data_offset: 0,
            hash_offset: 0,
            hash_length: 16,
            md5: [0; 16],
        }
    }

    #[test]
    fn write_then_read_round_trips_uncompressed() {
        let index = ArchiveIndex::empty_from_header(header_template());
        let data = ArchiveData::from_bytes(Vec::new());
        let mut archive = Archive::new_mutable(index, data, PathBuf::from("unused.arci"));

        archive
            .write_resource_to_archive(&[1; 16], b"hello resource", 14, 0)
            .unwrap();
        let out = archive.read(&[1; 16]).unwrap();
        assert_eq!(out, b"hello resource");
    }

    #[test]
    fn write_then_read_round_trips_compressed() {
        let index = ArchiveIndex::empty_from_header(header_template());
        let data = ArchiveData::from_bytes(Vec::new());
        let mut archive = Archive::new_mutable(index, data, PathBuf::from("unused.arci"));

        let payload = vec![b'x'; 4096];
        let compressed = lz4_flex::block::compress(&payload);
        archive
            .write_resource_to_archive(
                &[2; 16],
                &compressed,
                payload.len() as u32,
                entry_flags::COMPRESSED,
            )
            .unwrap();
        let out = archive.read(&[2; 16]).unwrap();
        assert_eq!(out, payload);
    }

    #[test]
    fn write_rejects_duplicate_digest() {
        let index = ArchiveIndex::empty_from_header(header_template());
        let data = ArchiveData::from_bytes(Vec::new());
        let mut archive = Archive::new_mutable(index, data, PathBuf::from("unused.arci"));

        archive
            .write_resource_to_archive(&[3; 16], b"first", 5, 0)
            .unwrap();
        let err = archive
            .write_resource_to_archive(&[3; 16], b"second", 6, 0)
            .unwrap_err();
        assert!(matches!(err, ArchiveError::AlreadyStored));
    }

    #[test]
    fn immutable_archive_rejects_write() {
        let index = ArchiveIndex::empty_from_header(header_template());
        let data = ArchiveData::from_bytes(Vec::new());
        let mut archive = Archive::new_bundled(index, data);
        let err = archive
            .write_resource_to_archive(&[4; 16], b"nope", 4, 0)
            .unwrap_err();
        assert!(matches!(err, ArchiveError::InvalidData(_)));
    }

    #[test]
    fn tmp_write_and_publish() {
        let dir = tempdir().unwrap();
        let final_path = dir.path().join("liveupdate.arci");
        let index = ArchiveIndex::empty_from_header(header_template());
        let data = ArchiveData::from_bytes(Vec::new());
        let mut archive = Archive::new_mutable(index, data, final_path.clone());

        archive
            .write_resource_to_archive(&[7; 16], b"payload", 7, 0)
            .unwrap();
        let tmp = archive.write_index_tmp(None).unwrap();
        assert!(tmp.exists());
        archive.publish_tmp_index(&tmp, &final_path).unwrap();
        assert!(final_path.exists());
        assert!(!tmp.exists());

        let reloaded = ArchiveIndex::parse(&fs::read(&final_path).unwrap()).unwrap();
        assert!(reloaded.find_entry(&[7; 16]).is_some());
    }
}
