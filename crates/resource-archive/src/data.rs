//! `.arcd` payload storage: file-backed, memory-mapped, or owned-buffer
//! backends, plus entry read/decode.

use crate::error::{ArchiveError, ArchiveResult};
use crate::format::ArchiveEntry;
use memmap2::Mmap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Backing storage for a `.arcd` file.
pub enum ArchiveData {
    /// Streamed from an open file handle (file-backed variant).
    File {
        /// Path to the `.arcd` file, kept for append/remap operations.
        path: PathBuf,
        /// Open handle, read/write for mutable archives.
        handle: File,
    },
    /// Memory-mapped (read-only).
    Mapped(Mmap),
    /// Caller-supplied owned buffer, not backed by any file.
    Owned(Vec<u8>),
}

impl ArchiveData {
    /// Open a `.arcd` file for streaming reads (and, if `writable`, for
    /// appends).
    ///
    /// # Errors
    /// Propagates any I/O error opening the file.
    pub fn open_file(path: impl AsRef<Path>, writable: bool) -> ArchiveResult<Self> {
        let path = path.as_ref().to_path_buf();
        let handle = OpenOptions::new()
            .read(true)
            .write(writable)
            .create(writable)
            .open(&path)?;
        Ok(Self::File { path, handle })
    }

    /// Wrap an in-memory buffer as archive data (no file backing).
    #[must_use]
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self::Owned(bytes)
    }

    /// Memory-map a `.arcd` file read-only.
    ///
    /// # Errors
    /// Propagates I/O errors opening or mapping the file. # Safety Inherits
    /// the usual `mmap` caveat that concurrent external truncation of the file
    /// is undefined behavior; callers must not shrink a `.arcd` file while it
    /// is mapped.
    pub fn map_file(path: impl AsRef<Path>) -> ArchiveResult<Self> {
        let file = File::open(path.as_ref())?;
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(Self::Mapped(mmap))
    }

    /// Current size in bytes of the underlying data.
    ///
    /// # Errors
    /// Propagates I/O errors querying file metadata.
    pub fn len(&self) -> ArchiveResult<u64> {
        Ok(match self {
            Self::File { handle, .. } => handle.metadata()?.len(),
            Self::Mapped(mmap) => mmap.len() as u64,
            Self::Owned(buf) => buf.len() as u64,
        })
    }

    /// Whether the underlying data is empty.
    ///
    /// # Errors
    /// Propagates I/O errors querying file metadata.
    pub fn is_empty(&self) -> ArchiveResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Read `len` bytes starting at `offset`.
    ///
    /// # Errors
    /// Returns [`ArchiveError::InvalidData`] if the requested range
    /// exceeds the data's length, or an I/O error on a file read.
    pub fn read_at(&mut self, offset: u64, len: u32) -> ArchiveResult<Vec<u8>> {
        let len = len as usize;
        match self {
            Self::File { handle, .. } => {
                handle.seek(SeekFrom::Start(offset))?;
                let mut buf = vec![0u8; len];
                handle.read_exact(&mut buf)?;
                Ok(buf)
            }
            Self::Mapped(mmap) => {
                let start = offset as usize;
                let end = start
                    .checked_add(len)
                    .filter(|&e| e <= mmap.len())
                    .ok_or_else(|| ArchiveError::InvalidData("read range out of bounds".into()))?;
                Ok(mmap[start..end].to_vec())
            }
            Self::Owned(buf) => {
                let start = offset as usize;
                let end = start
                    .checked_add(len)
                    .filter(|&e| e <= buf.len())
                    .ok_or_else(|| ArchiveError::InvalidData("read range out of bounds".into()))?;
                Ok(buf[start..end].to_vec())
            }
        }
    }

    /// Append `payload` to the data, flushing afterward, and return the offset
    /// it was written at.
    ///
    /// # Errors
    /// Returns [`ArchiveError::InvalidData`] for the read-only
    /// [`Self::Mapped`] variant, or an I/O error on a file write.
    pub fn append(&mut self, payload: &[u8]) -> ArchiveResult<u64> {
        match self {
            Self::File { handle, .. } => {
                let offset = handle.seek(SeekFrom::End(0))?;
                handle.write_all(payload)?;
                handle.flush()?;
                Ok(offset)
            }
            Self::Owned(buf) => {
                let offset = buf.len() as u64;
                buf.extend_from_slice(payload);
                Ok(offset)
            }
            Self::Mapped(_) => Err(ArchiveError::InvalidData(
                "cannot append to a read-only mapped archive".into(),
            )),
        }
    }

    /// Re-map a file-backed archive after it has grown. No-op for
    /// [`Self::File`] and [`Self::Owned`], which always observe their current
    /// size; relevant only when a caller later upgrades a file-backed archive
    /// to a mapped one.
    ///
    /// # Errors
    /// Propagates I/O errors from the underlying mmap call.
    pub fn remap(&mut self) -> ArchiveResult<()> {
        if let Self::File { handle, .. } = self {
            // Nothing to do: reads always go through `read_at`, which
            // seeks fresh each time, so a grown file is immediately
            // visible without re-opening.
            let _ = handle.metadata()?;
        }
        Ok(())
    }
}

/// Read and decode one entry's payload: raw bytes from `.arcd`, then decrypt
/// (if [`crate::format::entry_flags::ENCRYPTED`]) and decompress (if
/// [`crate::format::entry_flags::COMPRESSED`]) as flagged.
///
/// # Errors
/// Propagates I/O errors reading the payload, decrypt-hook errors, and LZ4
/// decompression failures.
pub fn read_entry(data: &mut ArchiveData, entry: &ArchiveEntry) -> ArchiveResult<Vec<u8>> {
    let mut buf = data.read_at(u64::from(entry.data_offset), entry.bytes_on_disk())?;

    if entry.is_encrypted() {
        resource_util::decrypt_buffer(&mut buf)?;
    }

    if entry.is_compressed() {
        let decompressed = lz4_flex::block::decompress(&buf, entry.resource_size as usize)
            .map_err(|e| ArchiveError::Decompress(e.to_string()))?;
        Ok(decompressed)
    } else {
        Ok(buf)
    }
}
