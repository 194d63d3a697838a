//! RSA signature verification.

use crate::error::{ManifestError, ManifestResult};
use crate::types::Manifest;
use resource_util::{compare_digests, DigestCompare, HashAlgorithm};
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, RsaPublicKey};
use sha2::{Digest, Sha256, Sha512};

/// Parse a PKCS#1-DER encoded RSA public key.
///
/// # Errors
/// Returns [`ManifestError::InvalidData`] if the bytes are not a valid
/// PKCS#1 RSA public key.
pub fn parse_public_key(der: &[u8]) -> ManifestResult<RsaPublicKey> {
    RsaPublicKey::from_pkcs1_der(der).map_err(|e| ManifestError::InvalidData(e.to_string()))
}

/// Recover the digest embedded in `manifest.signature` via raw RSA signature
/// decryption: `signature^e mod n`, then strip PKCS#1 v1.5 padding.
///
/// # Errors
/// Returns [`ManifestError::InvalidData`] if the signature does not carry a
/// well-formed PKCS#1 v1.5 padding once decrypted (e.g. a tampered public key
/// was supplied).
pub fn decrypt_signature_hash(
    manifest: &Manifest,
    public_key: &RsaPublicKey,
) -> ManifestResult<Vec<u8>> {
    let modulus_len = public_key.size();
    if manifest.signature.len() > modulus_len {
        return Err(ManifestError::InvalidData(
            "signature longer than modulus".into(),
        ));
    }

    let c = BigUint::from_bytes_be(&manifest.signature);
    let m = c.modpow(public_key.e(), public_key.n());
    let mut decrypted = m.to_bytes_be();
    if decrypted.len() < modulus_len {
        let mut padded = vec![0u8; modulus_len - decrypted.len()];
        padded.extend_from_slice(&decrypted);
        decrypted = padded;
    }

    strip_pkcs1v15_padding(&decrypted)
}

/// Strip a PKCS#1 v1.5 `0x00 0x01 0xFF..0xFF 0x00 || digest` padding.
fn strip_pkcs1v15_padding(block: &[u8]) -> ManifestResult<Vec<u8>> {
    let bad = || ManifestError::InvalidData("malformed PKCS#1 v1.5 padding".into());
    if block.len() < 11 || block[0] != 0x00 || block[1] != 0x01 {
        return Err(bad());
    }
    let mut i = 2;
    while i < block.len() && block[i] == 0xFF {
        i += 1;
    }
    if i >= block.len() || block[i] != 0x00 || i == 2 {
        return Err(bad());
    }
    Ok(block[i + 1..].to_vec())
}

fn hash_data_body(manifest: &Manifest) -> Vec<u8> {
    match manifest.header.signature_hash_algorithm {
        HashAlgorithm::Sha256 => Sha256::digest(&manifest.data_body).to_vec(),
        HashAlgorithm::Sha512 => Sha512::digest(&manifest.data_body).to_vec(),
        // SHA-1/MD5 signature hashing is not offered by this runtime;
        // callers must sign manifests with SHA-256 or SHA-512.
        _ => Vec::new(),
    }
}

/// Verify `manifest`'s signature against `public_key_der`, and that
/// `running_engine_sha1` (the running engine's SHA-1 identifier) appears in
/// the manifest's supported-engine list.
///
/// # Errors
/// - [`ManifestError::InvalidData`] if the public key cannot be parsed. -
/// [`ManifestError::SignatureMismatch`] if the recovered digest does not match
/// the computed digest of the data body. -
/// [`ManifestError::EngineVersionMismatch`] if `running_engine_sha1` is absent
/// from the supported-engine list.
pub fn verify_manifest(
    manifest: &Manifest,
    public_key_der: &[u8],
    running_engine_sha1: &[u8],
) -> ManifestResult<()> {
    let public_key = parse_public_key(public_key_der)?;
    let recovered = decrypt_signature_hash(manifest, &public_key)?;
    let computed = hash_data_body(manifest);

    if computed.is_empty() {
        return Err(ManifestError::InvalidData(
            "unsupported signature hash algorithm".into(),
        ));
    }

    match compare_digests(&recovered, &computed) {
        DigestCompare::Equal => {}
        DigestCompare::LengthMismatch | DigestCompare::Mismatch => {
            return Err(ManifestError::SignatureMismatch);
        }
    }

    if !manifest
        .supported_engine_versions
        .iter()
        .any(|v| v.as_slice() == running_engine_sha1)
    {
        return Err(ManifestError::EngineVersionMismatch);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Manifest, ManifestHeader, ResourceEntry};
    use crate::wire::build_data_body;
    use rsa::pkcs1::EncodeRsaPublicKey;
    use rsa::{Pkcs1v15Sign, RsaPrivateKey};

    fn make_manifest(
        data_body: Vec<u8>,
        signature: Vec<u8>,
        supported_engine_versions: Vec<Vec<u8>>,
    ) -> Manifest {
        Manifest {
            header: ManifestHeader {
                resource_hash_algorithm: HashAlgorithm::Sha256,
                signature_hash_algorithm: HashAlgorithm::Sha256,
                signing_algorithm: 1,
                project_identifier: "test-project".into(),
            },
            signature,
            supported_engine_versions,
            entries: Vec::new(),
            data_body,
        }
    }

    fn sign(private_key: &RsaPrivateKey, data_body: &[u8]) -> Vec<u8> {
        let digest = Sha256::digest(data_body);
        private_key
            .sign(Pkcs1v15Sign::new::<Sha256>(), &digest)
            .expect("sign")
    }

    #[test]
    fn verify_succeeds_for_correctly_signed_manifest() {
        let mut rng = rand::thread_rng();
        let private_key = RsaPrivateKey::new(&mut rng, 1024).expect("keygen");
        let public_key = RsaPublicKey::from(&private_key);
        let public_key_der = public_key.to_pkcs1_der().unwrap().as_bytes().to_vec();

        let engine_sha1 = vec![0xAB; 20];
        let header = ManifestHeader {
            resource_hash_algorithm: HashAlgorithm::Sha256,
            signature_hash_algorithm: HashAlgorithm::Sha256,
            signing_algorithm: 1,
            project_identifier: "test-project".into(),
        };
        let data_body = build_data_body(&header, &[engine_sha1.clone()], &[]);
        let signature = sign(&private_key, &data_body);
        let manifest = make_manifest(data_body, signature, vec![engine_sha1.clone()]);

        verify_manifest(&manifest, &public_key_der, &engine_sha1).expect("should verify");
    }

    #[test]
    fn verify_fails_on_unsupported_engine_version() {
        let mut rng = rand::thread_rng();
        let private_key = RsaPrivateKey::new(&mut rng, 1024).expect("keygen");
        let public_key = RsaPublicKey::from(&private_key);
        let public_key_der = public_key.to_pkcs1_der().unwrap().as_bytes().to_vec();

        let header = ManifestHeader {
            resource_hash_algorithm: HashAlgorithm::Sha256,
            signature_hash_algorithm: HashAlgorithm::Sha256,
            signing_algorithm: 1,
            project_identifier: "test-project".into(),
        };
        let supported = vec![vec![0xAB; 20]];
        let data_body = build_data_body(&header, &supported, &[]);
        let signature = sign(&private_key, &data_body);
        let manifest = make_manifest(data_body, signature, supported);

        let err = verify_manifest(&manifest, &public_key_der, &[0xFF; 20]).unwrap_err();
        assert!(matches!(err, ManifestError::EngineVersionMismatch));
    }

    #[test]
    fn verify_fails_with_tampered_public_key() {
        let mut rng = rand::thread_rng();
        let private_key = RsaPrivateKey::new(&mut rng, 1024).expect("keygen");
        let other_private_key = RsaPrivateKey::new(&mut rng, 1024).expect("keygen");
        let other_public_key = RsaPublicKey::from(&other_private_key);
        let tampered_der = other_public_key.to_pkcs1_der().unwrap().as_bytes().to_vec();

        let header = ManifestHeader {
            resource_hash_algorithm: HashAlgorithm::Sha256,
            signature_hash_algorithm: HashAlgorithm::Sha256,
            signing_algorithm: 1,
            project_identifier: "test-project".into(),
        };
        let engine_sha1 = vec![0xAB; 20];
        let data_body = build_data_body(&header, &[engine_sha1.clone()], &[]);
        let signature = sign(&private_key, &data_body);
        let manifest = make_manifest(data_body, signature, vec![engine_sha1.clone()]);

        let err = verify_manifest(&manifest, &tampered_der, &engine_sha1).unwrap_err();
        assert!(matches!(
            err,
            ManifestError::InvalidData(_) | ManifestError::SignatureMismatch
        ));
    }
}
