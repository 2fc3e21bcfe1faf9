//! Content digest computation and verification.
//!
//! Digests are hex strings whose algorithm is implied by their length:
//! 64 hex characters is SHA-256 (the canonical algorithm, used whenever a
//! digest is computed for publishing), 32 is MD5 for legacy manifests.
//! Comparison is case-insensitive.

use md5::Md5;
use sha2::{Digest, Sha256};

use crate::error::{RegistryError, Result};

/// Hash algorithms recognised in manifest digests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestAlgorithm {
    Sha256,
    Md5,
}

impl DigestAlgorithm {
    /// Infer the algorithm from a hex digest's shape.
    pub fn detect(digest: &str) -> Option<Self> {
        if !digest.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        match digest.len() {
            64 => Some(DigestAlgorithm::Sha256),
            32 => Some(DigestAlgorithm::Md5),
            _ => None,
        }
    }

    fn compute(self, data: &[u8]) -> String {
        match self {
            DigestAlgorithm::Sha256 => hex::encode(Sha256::digest(data)),
            DigestAlgorithm::Md5 => hex::encode(Md5::digest(data)),
        }
    }
}

/// A content hash (SHA-256 hex digest).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentHash(pub String);

impl ContentHash {
    /// Compute the SHA-256 hash of the given data.
    pub fn compute(data: &[u8]) -> Self {
        ContentHash(DigestAlgorithm::Sha256.compute(data))
    }

    /// Hash of several digests joined with `::`, identifying a whole package.
    pub fn combine<'a>(digests: impl IntoIterator<Item = &'a ContentHash>) -> Self {
        let joined = digests
            .into_iter()
            .map(ContentHash::as_str)
            .collect::<Vec<_>>()
            .join("::");
        ContentHash::compute(joined.as_bytes())
    }

    /// Get the hex string representation.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Check `data` against a declared digest.
///
/// `target` names the artifact in the resulting error.
pub fn verify(target: &str, data: &[u8], expected: &str) -> Result<()> {
    let expected = expected.trim();
    let algorithm =
        DigestAlgorithm::detect(expected).ok_or_else(|| RegistryError::MalformedDigest {
            target: target.to_string(),
            digest: expected.to_string(),
        })?;

    let actual = algorithm.compute(data);
    if actual.eq_ignore_ascii_case(expected) {
        Ok(())
    } else {
        Err(RegistryError::IntegrityFailure {
            target: target.to_string(),
            expected: expected.to_ascii_lowercase(),
            actual,
        })
    }
}

/// Verify only when a digest is declared. Undeclared digests are accepted.
pub fn verify_declared(target: &str, data: &[u8], expected: Option<&str>) -> Result<()> {
    match expected {
        Some(digest) => verify(target, data, digest),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EMPTY_SHA256: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";
    const EMPTY_MD5: &str = "d41d8cd98f00b204e9800998ecf8427e";

    #[test]
    fn hash_deterministic() {
        let data = b"hello world";
        assert_eq!(ContentHash::compute(data), ContentHash::compute(data));
    }

    #[test]
    fn hash_verify() {
        let data = b"test data";
        let hash = ContentHash::compute(data);
        verify("data", data, hash.as_str()).unwrap();
        assert!(verify("data", b"tampered data", hash.as_str()).is_err());
    }

    #[test]
    fn hash_format() {
        assert_eq!(ContentHash::compute(b"").as_str(), EMPTY_SHA256);
    }

    #[test]
    fn combine_joins_with_separator() {
        let a = ContentHash::compute(b"a");
        let b = ContentHash::compute(b"b");
        let expected = ContentHash::compute(format!("{a}::{b}").as_bytes());
        assert_eq!(ContentHash::combine([&a, &b]), expected);
    }

    #[test]
    fn detect_algorithm_by_length() {
        assert_eq!(
            DigestAlgorithm::detect(EMPTY_SHA256),
            Some(DigestAlgorithm::Sha256)
        );
        assert_eq!(DigestAlgorithm::detect(EMPTY_MD5), Some(DigestAlgorithm::Md5));
        assert_eq!(DigestAlgorithm::detect("abc"), None);
        assert_eq!(DigestAlgorithm::detect(&"z".repeat(64)), None);
    }

    #[test]
    fn verify_accepts_uppercase_hex() {
        verify("empty", b"", &EMPTY_SHA256.to_uppercase()).unwrap();
        verify("empty", b"", &EMPTY_MD5.to_uppercase()).unwrap();
    }

    #[test]
    fn verify_detects_flipped_byte() {
        let mut data = b"print('hello')\n".to_vec();
        let digest = ContentHash::compute(&data);
        data[0] ^= 0x01;
        let err = verify("hello.py", &data, digest.as_str()).unwrap_err();
        match err {
            RegistryError::IntegrityFailure {
                target, expected, ..
            } => {
                assert_eq!(target, "hello.py");
                assert_eq!(expected, digest.as_str());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn md5_of_empty_rejects_content() {
        let err = verify("hello.py", b"print('hi')", EMPTY_MD5).unwrap_err();
        assert!(matches!(err, RegistryError::IntegrityFailure { .. }));
    }

    #[test]
    fn malformed_digest_is_rejected() {
        let err = verify("x", b"", "not-a-digest").unwrap_err();
        assert!(matches!(err, RegistryError::MalformedDigest { .. }));
    }

    #[test]
    fn undeclared_digest_is_skipped() {
        verify_declared("x", b"anything", None).unwrap();
    }
}
