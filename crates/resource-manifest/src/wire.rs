//! On-disk envelope for the signed manifest.
//!
//! The outer structure is `ManifestFile { version, data, signature,
//! archive_identifier }` wrapping an inner `ManifestData { Header;
//! repeated EngineVersion; repeated ResourceEntry }`. This module is a
//! small length-prefixed, big-endian encoding that carries exactly
//! those fields by hand rather than pulling in a protobuf decoder for
//! a format whose grammar isn't otherwise needed here.

use crate::error::{ManifestError, ManifestResult};
use crate::types::{Manifest, ManifestHeader, ResourceEntry};
use resource_util::{path_hash64, HashAlgorithm};

/// Required outer envelope version.
pub const MANIFEST_VERSION: u32 = 5;

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, len: usize) -> ManifestResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&e| e <= self.data.len())
            .ok_or_else(|| ManifestError::DdfError("unexpected end of data".into()))?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> ManifestResult<u8> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> ManifestResult<u32> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u64(&mut self) -> ManifestResult<u64> {
        let b = self.take(8)?;
        Ok(u64::from_be_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    fn bytes(&mut self) -> ManifestResult<Vec<u8>> {
        let len = self.u32()? as usize;
        Ok(self.take(len)?.to_vec())
    }

    fn string(&mut self) -> ManifestResult<String> {
        let bytes = self.bytes()?;
        String::from_utf8(bytes).map_err(|e| ManifestError::DdfError(e.to_string()))
    }
}

fn write_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    out.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
    out.extend_from_slice(bytes);
}

fn write_string(out: &mut Vec<u8>, s: &str) {
    write_bytes(out, s.as_bytes());
}

fn hash_algorithm_from_u8(v: u8) -> ManifestResult<HashAlgorithm> {
    match v {
        1 => Ok(HashAlgorithm::Md5),
        2 => Ok(HashAlgorithm::Sha1),
        3 => Ok(HashAlgorithm::Sha256),
        4 => Ok(HashAlgorithm::Sha512),
        other => Err(ManifestError::DdfError(format!(
            "unknown hash algorithm id {other}"
        ))),
    }
}

fn hash_algorithm_to_u8(algo: HashAlgorithm) -> u8 {
    match algo {
        HashAlgorithm::Md5 => 1,
        HashAlgorithm::Sha1 => 2,
        HashAlgorithm::Sha256 => 3,
        HashAlgorithm::Sha512 => 4,
    }
}

/// Parse the outer envelope and inner data body into a [`Manifest`].
///
/// # Errors
/// Returns [`ManifestError::VersionMismatch`] if the envelope's version is
/// not [`MANIFEST_VERSION`], or [`ManifestError::DdfError`] on malformed
/// bytes.
pub fn parse_manifest(bytes: &[u8]) -> ManifestResult<Manifest> {
    let mut outer = Reader::new(bytes);
    let version = outer.u32()?;
    if version != MANIFEST_VERSION {
        return Err(ManifestError::VersionMismatch(version));
    }
    let data_body = outer.bytes()?;
    let signature = outer.bytes()?;
    let _archive_identifier = outer.bytes()?;

    let mut inner = Reader::new(&data_body);
    let resource_hash_algorithm = hash_algorithm_from_u8(inner.u8()?)?;
    let signature_hash_algorithm = hash_algorithm_from_u8(inner.u8()?)?;
    let signing_algorithm = inner.u8()?;
    let project_identifier = inner.string()?;

    let engine_count = inner.u32()?;
    let mut supported_engine_versions = Vec::with_capacity(engine_count as usize);
    for _ in 0..engine_count {
        supported_engine_versions.push(inner.bytes()?);
    }

    let entry_count = inner.u32()?;
    let mut entries = Vec::with_capacity(entry_count as usize);
    for _ in 0..entry_count {
        let url = inner.string()?;
        let url_hash = inner.u64()?;
        let digest = inner.bytes()?;
        let size = inner.u64()?;
        let compressed_size = inner.u64()?;
        let flags = inner.u8()?;
        let dep_count = inner.u32()?;
        let mut dependents = Vec::with_capacity(dep_count as usize);
        for _ in 0..dep_count {
            dependents.push(inner.u64()?);
        }
        entries.push(ResourceEntry {
            url,
            url_hash,
            digest,
            size,
            compressed_size,
            flags,
            dependents,
        });
    }

    entries.sort_by_key(|e| e.url_hash);

    Ok(Manifest {
        header: ManifestHeader {
            resource_hash_algorithm,
            signature_hash_algorithm,
            signing_algorithm,
            project_identifier,
        },
        signature,
        supported_engine_versions,
        entries,
        data_body,
    })
}

/// Serialize a [`Manifest`] back into its wire envelope. Mainly used by
/// tests exercising the parse/verify round trip.
#[must_use]
pub fn build_data_body(
    header: &ManifestHeader,
    supported_engine_versions: &[Vec<u8>],
    entries: &[ResourceEntry],
) -> Vec<u8> {
    let mut out = Vec::new();
    out.push(hash_algorithm_to_u8(header.resource_hash_algorithm));
    out.push(hash_algorithm_to_u8(header.signature_hash_algorithm));
    out.push(header.signing_algorithm);
    write_string(&mut out, &header.project_identifier);

    out.extend_from_slice(&(supported_engine_versions.len() as u32).to_be_bytes());
    for v in supported_engine_versions {
        write_bytes(&mut out, v);
    }

    out.extend_from_slice(&(entries.len() as u32).to_be_bytes());
    for e in entries {
        write_string(&mut out, &e.url);
        out.extend_from_slice(&e.url_hash.to_be_bytes());
        write_bytes(&mut out, &e.digest);
        out.extend_from_slice(&e.size.to_be_bytes());
        out.extend_from_slice(&e.compressed_size.to_be_bytes());
        out.push(e.flags);
        out.extend_from_slice(&(e.dependents.len() as u32).to_be_bytes());
        for d in &e.dependents {
            out.extend_from_slice(&d.to_be_bytes());
        }
    }
    out
}

/// Serialize a full envelope from a pre-built data body and signature.
#[must_use]
pub fn build_envelope(data_body: &[u8], signature: &[u8], archive_identifier: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&MANIFEST_VERSION.to_be_bytes());
    write_bytes(&mut out, data_body);
    write_bytes(&mut out, signature);
    write_bytes(&mut out, archive_identifier);
    out
}

/// Compute the url-hash for `url` the same way the manifest builder must,
/// so callers constructing entries stay consistent with [`path_hash64`].
#[must_use]
pub fn url_hash(url: &str) -> u64 {
    path_hash64(url)
}
