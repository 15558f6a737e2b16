//! SHA-256 hashing primitives.
//!
//! Provides a one-shot hashing function and a streaming hasher. The TCN key
//! ratchet hashes short domain-separated concatenations, so the streaming
//! form avoids building intermediate buffers.

use sha2::{Digest, Sha256};

/// Compute the SHA-256 hash of the given data.
#[must_use]
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// A streaming SHA-256 hasher that allows incremental feeding of data.
pub struct Sha256Hasher {
    inner: Sha256,
}

impl Sha256Hasher {
    /// Create a new streaming SHA-256 hasher.
    pub fn new() -> Self {
        Self {
            inner: Sha256::new(),
        }
    }

    /// Feed more data into the hasher.
    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
    }

    /// Consume the hasher and return the final SHA-256 digest.
    #[must_use]
    pub fn finalize(self) -> [u8; 32] {
        self.inner.finalize().into()
    }
}

impl Default for Sha256Hasher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_empty() {
        // FIPS 180-4 vector for the empty message.
        let expected =
            hex::decode("e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855")
                .unwrap();
        assert_eq!(sha256(b"").as_slice(), expected.as_slice());
    }

    #[test]
    fn test_sha256_abc() {
        let expected =
            hex::decode("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad")
                .unwrap();
        assert_eq!(sha256(b"abc").as_slice(), expected.as_slice());
    }

    #[test]
    fn test_streaming_matches_one_shot() {
        let mut hasher = Sha256Hasher::new();
        hasher.update(b"H_TCK");
        hasher.update(&[0xAA; 32]);
        hasher.update(&[0xBB; 32]);

        let mut concatenated = Vec::new();
        concatenated.extend_from_slice(b"H_TCK");
        concatenated.extend_from_slice(&[0xAA; 32]);
        concatenated.extend_from_slice(&[0xBB; 32]);

        assert_eq!(hasher.finalize(), sha256(&concatenated));
    }
}
