//! Report authorization keys and the temporary contact key ratchet.
//!
//! A [`ReportAuthorizationKey`] anchors a hash chain of
//! [`TemporaryContactKey`]s. Each ratchet step derives the next key from the
//! verification public key and the current key bytes; each key derives one
//! 16-byte [`TemporaryContactNumber`] for broadcast. The chain is one-way:
//! holding `tck_j` reveals nothing about keys before index `j`.
//!
//! Index 0 is an internal seed value and is never used to derive a token;
//! [`ReportAuthorizationKey::initial_temporary_contact_key`] returns the key
//! at index 1.

use core::fmt;

use tcn_crypto::ed25519::{Ed25519PrivateKey, Ed25519Signature};
use tcn_crypto::sha::Sha256Hasher;

use crate::constants::{
    TCK_DOMAIN_SEPARATOR, TCK_LENGTH, TCK_WIRE_LENGTH, TCN_DOMAIN_SEPARATOR, TCN_LENGTH,
    VERIFICATION_KEY_LENGTH,
};
use crate::types::{InvalidLength, TemporaryContactNumber};

/// Authorizes publication of an exposure report.
///
/// Owns the Ed25519 signing keypair and the capability to derive the key
/// chain. Exclusively held by the application; the engine only ever sees
/// derived tokens.
pub struct ReportAuthorizationKey {
    signing_key: Ed25519PrivateKey,
}

impl ReportAuthorizationKey {
    /// Generate a fresh authorization key from the OS random number generator.
    pub fn generate() -> Self {
        Self {
            signing_key: Ed25519PrivateKey::generate(),
        }
    }

    /// Reconstruct an authorization key from its 32-byte seed.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self {
            signing_key: Ed25519PrivateKey::from_bytes(bytes),
        }
    }

    /// The 32-byte seed of the signing key.
    pub fn to_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }

    /// The 32-byte public key reports are verified against.
    pub fn verification_public_key(&self) -> [u8; 32] {
        self.signing_key.public_key().to_bytes()
    }

    pub(crate) fn sign(&self, message: &[u8]) -> Ed25519Signature {
        self.signing_key.sign(message)
    }

    /// The seed key at index 0. Internal: index 0 must never derive a token.
    pub(crate) fn tck_0(&self) -> TemporaryContactKey {
        let mut hasher = Sha256Hasher::new();
        hasher.update(TCK_DOMAIN_SEPARATOR);
        hasher.update(&self.signing_key.to_bytes());
        TemporaryContactKey {
            index: 0,
            verification_public_key: self.verification_public_key(),
            bytes: hasher.finalize(),
        }
    }

    /// The first temporary contact key usable for token derivation (index 1).
    pub fn initial_temporary_contact_key(&self) -> TemporaryContactKey {
        let tck_0 = self.tck_0();
        TemporaryContactKey {
            index: 1,
            verification_public_key: tck_0.verification_public_key,
            bytes: next_key_bytes(&tck_0),
        }
    }
}

impl PartialEq for ReportAuthorizationKey {
    fn eq(&self, other: &Self) -> bool {
        self.to_bytes() == other.to_bytes()
    }
}

impl Eq for ReportAuthorizationKey {}

impl fmt::Debug for ReportAuthorizationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The seed stays out of logs.
        write!(f, "ReportAuthorizationKey(..)")
    }
}

/// One hash of the ratchet step: SHA256(H_TCK || vk || current bytes).
fn next_key_bytes(tck: &TemporaryContactKey) -> [u8; 32] {
    let mut hasher = Sha256Hasher::new();
    hasher.update(TCK_DOMAIN_SEPARATOR);
    hasher.update(&tck.verification_public_key);
    hasher.update(&tck.bytes);
    hasher.finalize()
}

/// A ratcheting key used to derive temporary contact numbers.
#[derive(Clone, PartialEq, Eq)]
pub struct TemporaryContactKey {
    index: u16,
    verification_public_key: [u8; VERIFICATION_KEY_LENGTH],
    bytes: [u8; TCK_LENGTH],
}

/// Result of a ratchet step.
///
/// `Exhausted` signals that the chain has reached the maximum 16-bit index
/// and the application must rotate to a new [`ReportAuthorizationKey`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub enum Ratchet {
    Ratcheted(TemporaryContactKey),
    Exhausted,
}

impl TemporaryContactKey {
    pub(crate) fn from_parts(
        index: u16,
        verification_public_key: [u8; VERIFICATION_KEY_LENGTH],
        bytes: [u8; TCK_LENGTH],
    ) -> Self {
        Self {
            index,
            verification_public_key,
            bytes,
        }
    }

    /// The current ratchet index.
    pub fn index(&self) -> u16 {
        self.index
    }

    /// The 32 bytes of the Ed25519 public key used for report verification.
    pub fn verification_public_key(&self) -> &[u8; VERIFICATION_KEY_LENGTH] {
        &self.verification_public_key
    }

    /// The 32 bytes of the key itself.
    pub fn bytes(&self) -> &[u8; TCK_LENGTH] {
        &self.bytes
    }

    /// Ratchet the key forward one step.
    pub fn ratchet(self) -> Ratchet {
        if self.index == u16::MAX {
            return Ratchet::Exhausted;
        }
        let bytes = next_key_bytes(&self);
        Ratchet::Ratcheted(TemporaryContactKey {
            index: self.index + 1,
            verification_public_key: self.verification_public_key,
            bytes,
        })
    }

    /// Derive the temporary contact number broadcast for this key:
    /// SHA256(H_TCN || index_le || bytes), truncated to 16 bytes.
    pub fn temporary_contact_number(&self) -> TemporaryContactNumber {
        let mut hasher = Sha256Hasher::new();
        hasher.update(TCN_DOMAIN_SEPARATOR);
        hasher.update(&self.index.to_le_bytes());
        hasher.update(&self.bytes);
        let full = hasher.finalize();
        let mut out = [0u8; TCN_LENGTH];
        out.copy_from_slice(&full[..TCN_LENGTH]);
        TemporaryContactNumber::new(out)
    }

    /// Serialize to wire form: index(2, LE) || vk(32) || bytes(32).
    pub fn serialize(&self) -> [u8; TCK_WIRE_LENGTH] {
        let mut out = [0u8; TCK_WIRE_LENGTH];
        out[..2].copy_from_slice(&self.index.to_le_bytes());
        out[2..2 + VERIFICATION_KEY_LENGTH].copy_from_slice(&self.verification_public_key);
        out[2 + VERIFICATION_KEY_LENGTH..].copy_from_slice(&self.bytes);
        out
    }

    /// Parse from wire form. The input must be exactly 66 bytes.
    pub fn parse(raw: &[u8]) -> Result<Self, InvalidLength> {
        if raw.len() != TCK_WIRE_LENGTH {
            return Err(InvalidLength {
                expected: TCK_WIRE_LENGTH,
                actual: raw.len(),
            });
        }
        let index = u16::from_le_bytes(raw[..2].try_into().expect("slice is exactly 2 bytes"));
        let verification_public_key: [u8; VERIFICATION_KEY_LENGTH] = raw
            [2..2 + VERIFICATION_KEY_LENGTH]
            .try_into()
            .expect("slice is exactly 32 bytes");
        let bytes: [u8; TCK_LENGTH] = raw[2 + VERIFICATION_KEY_LENGTH..]
            .try_into()
            .expect("slice is exactly 32 bytes");
        Ok(Self {
            index,
            verification_public_key,
            bytes,
        })
    }
}

impl fmt::Debug for TemporaryContactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Key bytes stay out of logs.
        write!(f, "TemporaryContactKey(index={})", self.index)
    }
}
