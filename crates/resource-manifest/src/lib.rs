//! Signed manifest model. Parses the outer signed envelope and inner
//! resource-entry list, verifies the RSA signature and supported-engine
//! list, and exposes sorted url-hash lookup for the mount-table and
//! provider layers.

#![warn(missing_docs)]

pub mod error;
pub mod types;
pub mod verify;
pub mod wire;

pub use error::{ManifestError, ManifestResult};
pub use types::{entry_flags, Manifest, ManifestHeader, ResourceEntry};
pub use verify::{decrypt_signature_hash, parse_public_key, verify_manifest};
pub use wire::{build_data_body, build_envelope, parse_manifest, url_hash, MANIFEST_VERSION};

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header() -> ManifestHeader {
        ManifestHeader {
            resource_hash_algorithm: resource_util::HashAlgorithm::Sha256,
            signature_hash_algorithm: resource_util::HashAlgorithm::Sha256,
            signing_algorithm: 1,
            project_identifier: "example".into(),
        }
    }

    #[test]
    fn parse_round_trips_entries_and_dependencies() {
        let header = sample_header();
        let entries = vec![
            ResourceEntry {
                url: "/archive_data/file1.adc".into(),
                url_hash: url_hash("/archive_data/file1.adc"),
                digest: vec![1; 32],
                size: 10,
                compressed_size: 10,
                flags: entry_flags::BUNDLED,
                dependents: vec![url_hash("/archive_data/file2.adc")],
            },
            ResourceEntry {
                url: "/archive_data/file2.adc".into(),
                url_hash: url_hash("/archive_data/file2.adc"),
                digest: vec![2; 32],
                size: 20,
                compressed_size: 20,
                flags: entry_flags::BUNDLED,
                dependents: vec![],
            },
        ];
        let data_body = build_data_body(&header, &[vec![0xAA; 20]], &entries);
        let envelope = build_envelope(&data_body, b"fake-signature", b"identifier");

        let manifest = parse_manifest(&envelope).expect("parse");
        assert_eq!(manifest.entries.len(), 2);
        assert_eq!(manifest.header.project_identifier, "example");

        let h1 = url_hash("/archive_data/file1.adc");
        let h2 = url_hash("/archive_data/file2.adc");
        let found = manifest.find_entry(h1).expect("entry present");
        assert_eq!(found.url, "/archive_data/file1.adc");
        assert_eq!(manifest.dependencies(h1), Some(&[h2][..]));
        assert_eq!(manifest.dependencies(h2), Some(&[][..]));
    }

    #[test]
    fn parse_rejects_wrong_version() {
        let mut envelope = build_envelope(&[], b"", b"");
        envelope[0..4].copy_from_slice(&9u32.to_be_bytes());
        let err = parse_manifest(&envelope).unwrap_err();
        assert!(matches!(err, ManifestError::VersionMismatch(9)));
    }

    #[test]
    fn find_entry_missing_returns_none() {
        let header = sample_header();
        let data_body = build_data_body(&header, &[], &[]);
        let envelope = build_envelope(&data_body, b"", b"");
        let manifest = parse_manifest(&envelope).expect("parse");
        assert!(manifest.find_entry(0xDEAD_BEEF).is_none());
        assert!(manifest.dependencies(0xDEAD_BEEF).is_none());
    }
}
