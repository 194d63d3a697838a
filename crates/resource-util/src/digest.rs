//! Digest encoding and comparison helpers.

/// Supported content/manifest hash algorithms and their digest length in
/// bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    /// MD5, 16-byte digest.
    Md5,
    /// SHA-1, 20-byte digest.
    Sha1,
    /// SHA-256, 32-byte digest.
    Sha256,
    /// SHA-512, 64-byte digest.
    Sha512,
}

impl HashAlgorithm {
    /// Digest length in bytes for this algorithm.
    #[must_use]
    pub const fn digest_len(self) -> usize {
        match self {
            Self::Md5 => 16,
            Self::Sha1 => 20,
            Self::Sha256 => 32,
            Self::Sha512 => 64,
        }
    }
}

/// Outcome of comparing two digests of possibly different length. Kept
/// distinct from a plain `bool` so callers can tell a structural mismatch
/// (wrong algorithm or truncated digest) apart from a genuine content
/// mismatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestCompare {
    /// Digests are equal.
    Equal,
    /// Digests have different lengths; contents were not compared.
    LengthMismatch,
    /// Digests have the same length but differ.
    Mismatch,
}

/// Compare two digests in constant time with respect to their shared length
/// (the length check itself is not constant-time, matching the original
/// `dmCrypt`-backed comparison).
#[must_use]
pub fn compare_digests(a: &[u8], b: &[u8]) -> DigestCompare {
    if a.len() != b.len() {
        return DigestCompare::LengthMismatch;
    }
    let mut diff: u8 = 0;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    if diff == 0 {
        DigestCompare::Equal
    } else {
        DigestCompare::Mismatch
    }
}

/// Compute the content digest of `data` under `algorithm`.
#[must_use]
pub fn compute_digest(algorithm: HashAlgorithm, data: &[u8]) -> Vec<u8> {
    use sha1::Digest as _;
    use sha2::Digest as _;

    match algorithm {
        HashAlgorithm::Md5 => md5::compute(data).0.to_vec(),
        HashAlgorithm::Sha1 => sha1::Sha1::digest(data).to_vec(),
        HashAlgorithm::Sha256 => sha2::Sha256::digest(data).to_vec(),
        HashAlgorithm::Sha512 => sha2::Sha512::digest(data).to_vec(),
    }
}

/// Encode `bytes` as a lowercase hex string.
#[must_use]
pub fn bytes_to_hex(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

/// Decode a hex string into bytes.
///
/// # Errors
/// Returns [`hex::FromHexError`] on malformed input (odd length or non-hex
/// characters).
pub fn hex_to_bytes(s: &str) -> Result<Vec<u8>, hex::FromHexError> {
    hex::decode(s)
}
