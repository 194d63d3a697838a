//! `.arci` index: sorted-hash lookup and in-place insertion.

use crate::error::{ArchiveError, ArchiveResult};
use crate::format::{ArchiveEntry, IndexHeader, HASH_SLOT_SIZE, INDEX_VERSION};
use binrw::{BinRead, BinWrite};
use std::io::Cursor;

/// Size in bytes of the fixed `.arci` header.
const HEADER_SIZE: usize = 48;
/// Size in bytes of one `.arci` entry.
const ENTRY_SIZE: usize = 16;

/// A parsed `.arci` index: header, sorted hash table, and parallel entry
/// table.
#[derive(Debug, Clone)]
pub struct ArchiveIndex {
    /// Fixed header fields.
    pub header: IndexHeader,
    /// Ascending-sorted digest prefixes, `header.hash_length` bytes each.
    pub hashes: Vec<Vec<u8>>,
    /// Entries, index-aligned with `hashes`.
    pub entries: Vec<ArchiveEntry>,
}

impl ArchiveIndex {
    /// Build an empty index inheriting `hash_length` and `userdata` from a
    /// template header.
    #[must_use]
    pub fn empty_from_header(template: IndexHeader) -> Self {
        Self {
            header: IndexHeader {
                version: INDEX_VERSION,
                reserved: 0,
                userdata: template.userdata,
                entry_count: 0,
                entry_data_offset: 0,
                hash_offset: 0,
                hash_length: template.hash_length,
                md5: [0; 16],
            },
            hashes: Vec::new(),
            entries: Vec::new(),
        }
    }

    /// Parse a full `.arci` buffer.
    ///
    /// # Errors
    /// Returns [`ArchiveError::UnsupportedVersion`] if the header version
    /// is not [`INDEX_VERSION`], or [`ArchiveError::InvalidData`] if the
    /// buffer is too short for the declared `entry_count`.
    pub fn parse(bytes: &[u8]) -> ArchiveResult<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(ArchiveError::InvalidData("buffer shorter than header".into()));
        }
        let mut cursor = Cursor::new(&bytes[..HEADER_SIZE]);
        let header = IndexHeader::read(&mut cursor)
            .map_err(|e| ArchiveError::InvalidData(e.to_string()))?;
        if header.version != INDEX_VERSION {
            return Err(ArchiveError::UnsupportedVersion(header.version));
        }

        let entry_count = header.entry_count as usize;
        let hash_len = header.hash_length as usize;
        let hash_table_bytes = entry_count * HASH_SLOT_SIZE;
        let hash_start = header.hash_offset as usize;
        let hash_end = hash_start
            .checked_add(hash_table_bytes)
            .ok_or_else(|| ArchiveError::InvalidData("hash table overflow".into()))?;
        if hash_end > bytes.len() {
            return Err(ArchiveError::InvalidData("hash table truncated".into()));
        }

        let mut hashes = Vec::with_capacity(entry_count);
        for i in 0..entry_count {
            let slot = &bytes[hash_start + i * HASH_SLOT_SIZE..hash_start + (i + 1) * HASH_SLOT_SIZE];
            hashes.push(slot[..hash_len].to_vec());
        }

        let entry_start = header.entry_data_offset as usize;
        let entry_table_bytes = entry_count * ENTRY_SIZE;
        let entry_end = entry_start
            .checked_add(entry_table_bytes)
            .ok_or_else(|| ArchiveError::InvalidData("entry table overflow".into()))?;
        if entry_end > bytes.len() {
            return Err(ArchiveError::InvalidData("entry table truncated".into()));
        }

        let mut entries = Vec::with_capacity(entry_count);
        for i in 0..entry_count {
            let slot = &bytes[entry_start + i * ENTRY_SIZE..entry_start + (i + 1) * ENTRY_SIZE];
            let mut cursor = Cursor::new(slot);
            entries.push(
                ArchiveEntry::read(&mut cursor).map_err(|e| ArchiveError::InvalidData(e.to_string()))?,
            );
        }

        for pair in hashes.windows(2) {
            if pair[0] >= pair[1] {
                return Err(ArchiveError::InvalidData(
                    "hash table is not strictly increasing".into(),
                ));
            }
        }

        Ok(Self {
            header,
            hashes,
            entries,
        })
    }

    /// Serialize back to the on-disk `.arci` layout.
    ///
    /// # Panics
    /// Never panics on a well-formed `ArchiveIndex` (one produced by
    /// [`Self::parse`] or [`Self::insert`]); `binrw` writes to an in-memory
    /// buffer so I/O cannot fail.
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        let hash_offset = HEADER_SIZE as u32;
        let entry_data_offset = hash_offset + (self.hashes.len() * HASH_SLOT_SIZE) as u32;

        let mut header = self.header;
        header.entry_count = self.hashes.len() as u32;
        header.hash_offset = hash_offset;
        header.entry_data_offset = entry_data_offset;

        let mut out = Vec::with_capacity(
            HEADER_SIZE + self.hashes.len() * (HASH_SLOT_SIZE + ENTRY_SIZE),
        );
        let mut cursor = Cursor::new(&mut out);
        header.write(&mut cursor).expect("header fits header-sized buffer");
        drop(cursor);

        for hash in &self.hashes {
            let mut slot = [0u8; HASH_SLOT_SIZE];
            slot[..hash.len()].copy_from_slice(hash);
            out.extend_from_slice(&slot);
        }
        for entry in &self.entries {
            let mut buf = Vec::with_capacity(ENTRY_SIZE);
            let mut cursor = Cursor::new(&mut buf);
            entry.write(&mut cursor).expect("entry fits fixed buffer");
            out.extend_from_slice(&buf);
        }
        out
    }

    /// Lower-bound binary search on the hash table.
    fn lower_bound(&self, digest: &[u8]) -> usize {
        self.hashes.partition_point(|slot| slot.as_slice() < digest)
    }

    /// Find the entry whose digest exactly matches `digest`.
    #[must_use]
    pub fn find_entry(&self, digest: &[u8]) -> Option<&ArchiveEntry> {
        let idx = self.lower_bound(digest);
        if idx < self.hashes.len() && self.hashes[idx] == digest {
            Some(&self.entries[idx])
        } else {
            None
        }
    }

    /// Insert a new `(digest, entry)` pair at its sorted position.
    ///
    /// # Errors
    /// Returns [`ArchiveError::AlreadyStored`] if `digest` already has an
    /// entry — insertion never overwrites or moves existing entries' content,
    /// only their index slot.
    pub fn insert(&mut self, digest: &[u8], entry: ArchiveEntry) -> ArchiveResult<usize> {
        let idx = self.lower_bound(digest);
        if idx < self.hashes.len() && self.hashes[idx] == digest {
            return Err(ArchiveError::AlreadyStored);
        }
        self.hashes.insert(idx, digest.to_vec());
        self.entries.insert(idx, entry);
        Ok(idx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::entry_flags;

    fn sample_entry(offset: u32) -> ArchiveEntry {
        ArchiveEntry {
            data_offset: offset,
            resource_size: 100,
            compressed_size: crate::format::NOT_COMPRESSED,
            flags: 0,
        }
    }

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
    fn insert_keeps_hashes_strictly_ascending() {
        let mut index = ArchiveIndex::empty_from_header(header_template());
        index.insert(&[2; 16], sample_entry(0)).unwrap();
        index.insert(&[0; 16], sample_entry(100)).unwrap();
        index.insert(&[1; 16], sample_entry(200)).unwrap();
        for pair in index.hashes.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn insert_never_moves_existing_entry_content() {
        let mut index = ArchiveIndex::empty_from_header(header_template());
        index.insert(&[5; 16], sample_entry(42)).unwrap();
        let before = index.find_entry(&[5; 16]).copied().unwrap();
        index.insert(&[1; 16], sample_entry(7)).unwrap();
        let after = index.find_entry(&[5; 16]).copied().unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn insert_duplicate_fails() {
        let mut index = ArchiveIndex::empty_from_header(header_template());
        index.insert(&[5; 16], sample_entry(42)).unwrap();
        let err = index.insert(&[5; 16], sample_entry(99)).unwrap_err();
        assert!(matches!(err, ArchiveError::AlreadyStored));
    }

    #[test]
    fn find_entry_miss_returns_none() {
        let mut index = ArchiveIndex::empty_from_header(header_template());
        index.insert(&[5; 16], sample_entry(42)).unwrap();
        assert!(index.find_entry(&[9; 16]).is_none());
    }

    #[test]
    fn serialize_then_parse_round_trips() {
        let mut index = ArchiveIndex::empty_from_header(header_template());
        index.insert(&[2; 16], sample_entry(10)).unwrap();
        index
            .insert(
                &[9; 16],
                ArchiveEntry {
                    data_offset: 500,
                    resource_size: 64,
                    compressed_size: 32,
                    flags: entry_flags::COMPRESSED,
                },
            )
            .unwrap();

        let bytes = index.serialize();
        let parsed = ArchiveIndex::parse(&bytes).expect("parse");
        assert_eq!(parsed.hashes, index.hashes);
        assert_eq!(parsed.entries.len(), index.entries.len());
        assert_eq!(parsed.find_entry(&[9; 16]).unwrap().compressed_size, 32);
    }
}
