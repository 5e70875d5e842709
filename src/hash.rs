use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::Error;

/// SHA-256 hash used for content addressing
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Hash([u8; 32]);

impl Hash {
    /// zero hash (useful as sentinel)
    pub const ZERO: Hash = Hash([0u8; 32]);

    /// length of the hex form
    pub const HEX_LEN: usize = 64;

    /// create from raw bytes
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// parse from hex string
    pub fn from_hex(s: &str) -> crate::Result<Self> {
        let bytes = hex::decode(s).map_err(|_| Error::InvalidHashHex(s.to_string()))?;
        if bytes.len() != 32 {
            return Err(Error::InvalidHashHex(s.to_string()));
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    /// does the string look like a full hex digest
    pub fn looks_like_hex(s: &str) -> bool {
        s.len() == Self::HEX_LEN && s.chars().all(|c| c.is_ascii_hexdigit())
    }

    /// get raw bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// convert to hex string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// abbreviated hex form for display
    pub fn short(&self) -> String {
        self.to_hex()[..12].to_string()
    }

    /// split into path components for object store
    /// returns (first 2 hex chars, remaining 62 hex chars)
    pub fn to_path_components(&self) -> (String, String) {
        let hex = self.to_hex();
        (hex[..2].to_string(), hex[2..].to_string())
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self.short())
    }
}

impl Serialize for Hash {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// compute the digest of an object's canonical form
///
/// format:
///   kind: ascii tag ("blob", "tree", "commit", "tag")
///   ' '
///   payload length: ascii decimal
///   '\0'
///   payload: bytes
pub fn compute_object_hash(kind: &str, payload: &[u8]) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(kind.as_bytes());
    hasher.update(b" ");
    hasher.update(payload.len().to_string().as_bytes());
    hasher.update(b"\0");
    hasher.update(payload);
    Hash(hasher.finalize().into())
}

/// digest a blob's content
pub fn compute_blob_hash(content: &[u8]) -> Hash {
    compute_object_hash("blob", content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_hex_roundtrip() {
        let original =
            Hash::from_hex("abcdef0123456789abcdef0123456789abcdef0123456789abcdef0123456789")
                .unwrap();
        let hex = original.to_hex();
        let parsed = Hash::from_hex(&hex).unwrap();
        assert_eq!(original, parsed);
    }

    #[test]
    fn test_hash_invalid_hex() {
        assert!(Hash::from_hex("not valid hex").is_err());
        assert!(Hash::from_hex("abcd").is_err()); // too short
        assert!(Hash::from_hex(
            "abcdef0123456789abcdef0123456789abcdef0123456789abcdef0123456789ff"
        )
        .is_err()); // too long
    }

    #[test]
    fn test_hash_path_components() {
        let h =
            Hash::from_hex("abcdef0123456789abcdef0123456789abcdef0123456789abcdef0123456789")
                .unwrap();
        let (dir, file) = h.to_path_components();
        assert_eq!(dir, "ab");
        assert_eq!(file, "cdef0123456789abcdef0123456789abcdef0123456789abcdef0123456789");
    }

    #[test]
    fn test_hash_short() {
        let h =
            Hash::from_hex("abcdef0123456789abcdef0123456789abcdef0123456789abcdef0123456789")
                .unwrap();
        assert_eq!(h.short(), "abcdef012345");
    }

    #[test]
    fn test_looks_like_hex() {
        assert!(Hash::looks_like_hex(&Hash::ZERO.to_hex()));
        assert!(!Hash::looks_like_hex("master"));
        assert!(!Hash::looks_like_hex("abcdef"));
    }

    #[test]
    fn test_blob_hash_determinism() {
        let h1 = compute_blob_hash(b"hello");
        let h2 = compute_blob_hash(b"hello");
        assert_eq!(h1, h2);
    }

    #[test]
    fn test_blob_hash_different_content() {
        let h1 = compute_blob_hash(b"hello");
        let h2 = compute_blob_hash(b"world");
        assert_ne!(h1, h2);
    }

    #[test]
    fn test_kind_is_part_of_hash() {
        // identical payloads of different kinds must not collide
        let blob = compute_object_hash("blob", b"payload");
        let tree = compute_object_hash("tree", b"payload");
        assert_ne!(blob, tree);
    }

    #[test]
    fn test_blob_hash_empty_content() {
        let h = compute_blob_hash(b"");
        assert_ne!(h, Hash::ZERO);
    }

    #[test]
    fn test_hash_serde_json() {
        let h =
            Hash::from_hex("abcdef0123456789abcdef0123456789abcdef0123456789abcdef0123456789")
                .unwrap();
        let json = serde_json::to_string(&h).unwrap();
        assert!(json.contains("abcdef"));
        let parsed: Hash = serde_json::from_str(&json).unwrap();
        assert_eq!(h, parsed);
    }
}
