//! Content digests of entry bytes.

use std::io::{self, Read};

use serde::{Deserialize, Serialize};

/// BLAKE3 digest of an entry's bytes.
///
/// Used wherever content identity matters: entry conflict checks between
/// file-backed sources and the keys of the dex merge cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentDigest(String);

impl ContentDigest {
    /// Compute the digest of an in-memory buffer.
    pub fn compute(data: &[u8]) -> Self {
        let hash = blake3::hash(data);
        Self(hash.to_hex().to_string())
    }

    /// Compute the digest of everything a reader yields, without buffering it.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if reading fails.
    pub fn compute_reader(mut reader: impl Read) -> io::Result<Self> {
        let mut hasher = blake3::Hasher::new();
        io::copy(&mut reader, &mut hasher)?;
        Ok(Self(hasher.finalize().to_hex().to_string()))
    }

    /// Return the inner hex string as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for ContentDigest {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reader_digest_matches_buffer_digest() {
        let data = b"classes.dex payload".repeat(1000);
        let from_reader = ContentDigest::compute_reader(&data[..]).unwrap();
        assert_eq!(from_reader, ContentDigest::compute(&data));
        assert_eq!(from_reader.as_str().len(), 64);
    }

    #[test]
    fn different_inputs_different_digests() {
        assert_ne!(ContentDigest::compute(b"a"), ContentDigest::compute(b"b"));
    }
}
