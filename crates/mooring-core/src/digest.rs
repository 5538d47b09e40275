//! # Content Digests and References
//!
//! `ContentDigest` is a 32-byte hash with its algorithm tag. `ContentRef` is
//! the opaque identifier stores hand out for records: a SHA-256 digest of
//! the record's canonical bytes, rendered as `sha256:<64 lowercase hex>`.
//!
//! References serialize as their display string so that a record linking
//! another record (`prev`, `proof`, `link`, `root`) hashes the same way in
//! every store.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::canonical::CanonicalBytes;
use crate::error::IdentifierError;

/// The hash algorithm that produced a digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DigestAlgorithm {
    /// SHA-256.
    Sha256,
}

impl DigestAlgorithm {
    /// Returns the algorithm prefix used in reference strings.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A content digest with its algorithm tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContentDigest {
    /// The hash algorithm that produced this digest.
    pub algorithm: DigestAlgorithm,
    /// The raw 32-byte digest value.
    pub bytes: [u8; 32],
}

impl ContentDigest {
    /// Create a digest from raw bytes and algorithm.
    pub fn new(algorithm: DigestAlgorithm, bytes: [u8; 32]) -> Self {
        Self { algorithm, bytes }
    }

    /// Render the digest as a lowercase hex string.
    pub fn to_hex(&self) -> String {
        self.bytes.iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.to_hex())
    }
}

/// Compute a SHA-256 digest of canonical bytes.
///
/// Accepts only `&CanonicalBytes`, never raw slices.
pub fn sha256_digest(data: &CanonicalBytes) -> ContentDigest {
    let hash = Sha256::digest(data.as_bytes());
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&hash);
    ContentDigest::new(DigestAlgorithm::Sha256, bytes)
}

/// Opaque, content-derived reference to a stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContentRef(ContentDigest);

impl ContentRef {
    /// Reference the content hashed to `digest`.
    pub fn from_digest(digest: ContentDigest) -> Self {
        Self(digest)
    }

    /// Reference for arbitrary canonical content.
    pub fn of(data: &CanonicalBytes) -> Self {
        Self(sha256_digest(data))
    }

    /// The underlying digest.
    pub fn digest(&self) -> &ContentDigest {
        &self.0
    }

    /// The digest as lowercase hex, without the algorithm prefix.
    pub fn to_hex(&self) -> String {
        self.0.to_hex()
    }
}

impl fmt::Display for ContentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for ContentRef {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || IdentifierError::MalformedRef(s.to_string());
        let hex = s.strip_prefix("sha256:").ok_or_else(malformed)?;
        if hex.len() != 64 || !hex.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
            return Err(malformed());
        }
        let mut bytes = [0u8; 32];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).map_err(|_| malformed())?;
        }
        Ok(Self(ContentDigest::new(DigestAlgorithm::Sha256, bytes)))
    }
}

impl Serialize for ContentRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ContentRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_sha256_vector() {
        let cb = CanonicalBytes::new(&serde_json::json!({})).unwrap();
        assert_eq!(
            sha256_digest(&cb).to_hex(),
            "44136fa355b3678a1146ad16f7e8649e94fb4fc21fe77e8310c060f61caaff8a"
        );
    }

    #[test]
    fn reference_display_has_prefix() {
        let cb = CanonicalBytes::new(&serde_json::json!({"a": 1})).unwrap();
        let r = ContentRef::of(&cb);
        let s = r.to_string();
        assert!(s.starts_with("sha256:"));
        assert_eq!(s.len(), 7 + 64);
    }

    #[test]
    fn reference_parses_its_own_display() {
        let cb = CanonicalBytes::new(&serde_json::json!({"nonce": 7})).unwrap();
        let r = ContentRef::of(&cb);
        let parsed: ContentRef = r.to_string().parse().unwrap();
        assert_eq!(parsed, r);
    }

    #[test]
    fn reference_rejects_wrong_prefix() {
        let s = format!("blake3:{}", "0".repeat(64));
        assert!(matches!(
            s.parse::<ContentRef>(),
            Err(IdentifierError::MalformedRef(_))
        ));
    }

    #[test]
    fn reference_rejects_uppercase_and_short_hex() {
        assert!(format!("sha256:{}", "A".repeat(64)).parse::<ContentRef>().is_err());
        assert!("sha256:abcd".parse::<ContentRef>().is_err());
    }

    #[test]
    fn reference_serializes_as_string() {
        let cb = CanonicalBytes::new(&serde_json::json!({})).unwrap();
        let r = ContentRef::of(&cb);
        let json = serde_json::to_value(r).unwrap();
        assert_eq!(json, serde_json::Value::String(r.to_string()));
        let back: ContentRef = serde_json::from_value(json).unwrap();
        assert_eq!(back, r);
    }

    #[test]
    fn different_content_different_reference() {
        let a = CanonicalBytes::new(&serde_json::json!({"nonce": 1})).unwrap();
        let b = CanonicalBytes::new(&serde_json::json!({"nonce": 2})).unwrap();
        assert_ne!(ContentRef::of(&a), ContentRef::of(&b));
    }
}
