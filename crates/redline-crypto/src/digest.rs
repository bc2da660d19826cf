use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A 256-bit BLAKE3 digest.
///
/// On the wire a digest is always its 64-character lowercase hex string, so
/// documents produced by different processes compare textually.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest([u8; 32]);

impl Digest {
    /// Wrap a pre-computed hash.
    pub const fn from_hash(hash: [u8; 32]) -> Self {
        Self(hash)
    }

    /// Plain BLAKE3 of `data`, no domain tag.
    pub fn of(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// The raw 32-byte hash.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex (64 characters).
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// First 8 hex characters, for logs and terminal output.
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }

    /// Parse a 64-character hex string.
    pub fn from_hex(s: &str) -> Result<Self, DigestError> {
        let bytes = hex::decode(s).map_err(|e| DigestError::InvalidHex(e.to_string()))?;
        if bytes.len() != 32 {
            return Err(DigestError::InvalidLength {
                expected: 32,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.short_hex())
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for Digest {
    type Err = DigestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl From<[u8; 32]> for Digest {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        if s.chars().any(|c| c.is_ascii_uppercase()) {
            return Err(serde::de::Error::custom(DigestError::NotLowercase));
        }
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Errors from parsing digests.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DigestError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid byte length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("digest hex must be lowercase")]
    NotLowercase,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn of_is_deterministic() {
        assert_eq!(Digest::of(b"clause"), Digest::of(b"clause"));
        assert_ne!(Digest::of(b"clause"), Digest::of(b"Clause"));
    }

    #[test]
    fn hex_roundtrip() {
        let d = Digest::of(b"term");
        let hex = d.to_hex();
        assert_eq!(hex.len(), 64);
        assert!(hex.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
        assert_eq!(Digest::from_hex(&hex).unwrap(), d);
        assert_eq!(hex.parse::<Digest>().unwrap(), d);
    }

    #[test]
    fn from_hex_rejects_bad_input() {
        assert!(matches!(
            Digest::from_hex("zz"),
            Err(DigestError::InvalidHex(_))
        ));
        assert_eq!(
            Digest::from_hex("abcd"),
            Err(DigestError::InvalidLength {
                expected: 32,
                actual: 2
            })
        );
    }

    #[test]
    fn serializes_as_hex_string() {
        let d = Digest::from_hash([0xab; 32]);
        let json = serde_json::to_string(&d).unwrap();
        assert_eq!(json, format!("\"{}\"", "ab".repeat(32)));
        let back: Digest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, d);
    }

    #[test]
    fn deserialize_rejects_uppercase() {
        let json = format!("\"{}\"", "AB".repeat(32));
        assert!(serde_json::from_str::<Digest>(&json).is_err());
    }

    #[test]
    fn debug_uses_short_form() {
        let d = Digest::from_hash([0x01; 32]);
        assert_eq!(format!("{d:?}"), "Digest(01010101)");
    }
}
