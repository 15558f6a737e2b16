//! Exposure reports: wire format, signing, verification, and token
//! reconstruction.
//!
//! A report discloses a contiguous range of the key chain. Anyone holding
//! the report can recompute the temporary contact numbers for indices
//! `start_index..end_index` and compare them against tokens observed over
//! the radio, without learning anything about keys before `start_index`.
//!
//! Reports are unlinkable from each other only up to the memo field:
//! placing the same high-entropy data in several memos links them.

use tcn_crypto::ed25519::{Ed25519PublicKey, Ed25519Signature};

use crate::constants::{
    MEMO_MAX_LENGTH, REPORT_MIN_LENGTH, SIGNATURE_LENGTH, SIGNED_REPORT_MIN_LENGTH, TCK_LENGTH,
    VERIFICATION_KEY_LENGTH,
};
use crate::error::ReportError;
use crate::keys::{Ratchet, ReportAuthorizationKey, TemporaryContactKey};
use crate::types::TemporaryContactNumber;

/// Intended interpretation of a report's memo field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MemoType {
    /// The CoEpi symptom self-report format, version 1.
    CoEpiV1 = 0,
    /// The CovidWatch test data format, version 1.
    CovidWatchV1 = 1,
    /// Reserved for future use.
    Reserved = 0xFF,
}

impl MemoType {
    pub fn from_u8(v: u8) -> Result<Self, ReportError> {
        match v {
            0 => Ok(MemoType::CoEpiV1),
            1 => Ok(MemoType::CovidWatchV1),
            0xFF => Ok(MemoType::Reserved),
            _ => Err(ReportError::UnknownMemoType(v)),
        }
    }

    pub fn to_byte(self) -> u8 {
        self as u8
    }
}

/// A report of potential exposure.
///
/// Constructed through [`Report::new`] (which enforces the field
/// invariants), [`Report::parse`], or
/// [`ReportAuthorizationKey::create_signed_report`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    verification_public_key: [u8; VERIFICATION_KEY_LENGTH],
    tck_bytes: [u8; TCK_LENGTH],
    start_index: u16,
    end_index: u16,
    memo_type: MemoType,
    memo_data: Vec<u8>,
}

impl Report {
    /// Build a report from raw parts.
    ///
    /// A `start_index` greater than `end_index` is clamped down to
    /// `end_index`. Fails with `OversizeMemo` if the memo cannot fit its
    /// 8-bit length prefix.
    pub fn new(
        verification_public_key: [u8; VERIFICATION_KEY_LENGTH],
        tck_bytes: [u8; TCK_LENGTH],
        start_index: u16,
        end_index: u16,
        memo_type: MemoType,
        memo_data: Vec<u8>,
    ) -> Result<Self, ReportError> {
        if memo_data.len() > MEMO_MAX_LENGTH {
            return Err(ReportError::OversizeMemo(memo_data.len()));
        }
        let start_index = start_index.min(end_index);
        Ok(Self {
            verification_public_key,
            tck_bytes,
            start_index,
            end_index,
            memo_type,
            memo_data,
        })
    }

    pub fn verification_public_key(&self) -> &[u8; VERIFICATION_KEY_LENGTH] {
        &self.verification_public_key
    }

    pub fn temporary_contact_key_bytes(&self) -> &[u8; TCK_LENGTH] {
        &self.tck_bytes
    }

    pub fn start_index(&self) -> u16 {
        self.start_index
    }

    pub fn end_index(&self) -> u16 {
        self.end_index
    }

    pub fn memo_type(&self) -> MemoType {
        self.memo_type
    }

    pub fn memo_data(&self) -> &[u8] {
        &self.memo_data
    }

    /// Serialize to the canonical wire form:
    /// vk(32) || tck(32) || start(2, LE) || end(2, LE) || type(1) || len(1) || memo.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(REPORT_MIN_LENGTH + self.memo_data.len());
        out.extend_from_slice(&self.verification_public_key);
        out.extend_from_slice(&self.tck_bytes);
        out.extend_from_slice(&self.start_index.to_le_bytes());
        out.extend_from_slice(&self.end_index.to_le_bytes());
        out.push(self.memo_type.to_byte());
        // Invariant from `new`: the memo fits the length prefix.
        out.push(self.memo_data.len() as u8);
        out.extend_from_slice(&self.memo_data);
        out
    }

    /// Parse a report from wire bytes.
    ///
    /// The buffer must contain exactly the 70-byte header plus the declared
    /// memo; a disclosed start index of 0 is rejected.
    pub fn parse(raw: &[u8]) -> Result<Self, ReportError> {
        if raw.len() < REPORT_MIN_LENGTH {
            return Err(ReportError::TooShort {
                min: REPORT_MIN_LENGTH,
                actual: raw.len(),
            });
        }
        let verification_public_key: [u8; VERIFICATION_KEY_LENGTH] = raw
            [..VERIFICATION_KEY_LENGTH]
            .try_into()
            .expect("slice is exactly 32 bytes");
        let tck_bytes: [u8; TCK_LENGTH] = raw[32..64]
            .try_into()
            .expect("slice is exactly 32 bytes");
        let start_index =
            u16::from_le_bytes(raw[64..66].try_into().expect("slice is exactly 2 bytes"));
        let end_index =
            u16::from_le_bytes(raw[66..68].try_into().expect("slice is exactly 2 bytes"));
        let memo_type = MemoType::from_u8(raw[68])?;
        let memo_len = raw[69] as usize;

        let expected = REPORT_MIN_LENGTH + memo_len;
        if raw.len() != expected {
            return Err(ReportError::LengthMismatch {
                expected,
                actual: raw.len(),
            });
        }
        if start_index == 0 {
            return Err(ReportError::InvalidReportIndex);
        }
        let memo_data = raw[REPORT_MIN_LENGTH..].to_vec();

        Self::new(
            verification_public_key,
            tck_bytes,
            start_index,
            end_index,
            memo_type,
            memo_data,
        )
    }

    /// All temporary contact numbers disclosed by this report, for indices
    /// `start_index..end_index`.
    ///
    /// The iterator is finite and restartable: each call reconstructs the
    /// chain from the stored key material.
    pub fn temporary_contact_numbers(&self) -> TemporaryContactNumbers {
        if self.start_index == 0 {
            return TemporaryContactNumbers {
                key: None,
                remaining: 0,
            };
        }
        let stored = TemporaryContactKey::from_parts(
            self.start_index - 1,
            self.verification_public_key,
            self.tck_bytes,
        );
        let key = match stored.ratchet() {
            Ratchet::Ratcheted(tck) => Some(tck),
            Ratchet::Exhausted => None,
        };
        TemporaryContactNumbers {
            key,
            remaining: self.end_index.saturating_sub(self.start_index),
        }
    }
}

/// Iterator over the tokens disclosed by a [`Report`].
#[derive(Debug, Clone)]
pub struct TemporaryContactNumbers {
    key: Option<TemporaryContactKey>,
    remaining: u16,
}

impl Iterator for TemporaryContactNumbers {
    type Item = TemporaryContactNumber;

    fn next(&mut self) -> Option<TemporaryContactNumber> {
        if self.remaining == 0 {
            return None;
        }
        let key = self.key.take()?;
        let token = key.temporary_contact_number();
        self.remaining -= 1;
        self.key = match key.ratchet() {
            Ratchet::Ratcheted(next) => Some(next),
            Ratchet::Exhausted => None,
        };
        Some(token)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.remaining as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for TemporaryContactNumbers {}

/// A signed exposure report, verifiable against the report's embedded
/// verification public key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedReport {
    pub report: Report,
    pub signature: [u8; SIGNATURE_LENGTH],
}

impl SignedReport {
    /// Serialize to wire form: report || signature(64).
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = self.report.serialize();
        out.extend_from_slice(&self.signature);
        out
    }

    /// Parse a signed report from wire bytes.
    pub fn parse(raw: &[u8]) -> Result<Self, ReportError> {
        if raw.len() < SIGNED_REPORT_MIN_LENGTH {
            return Err(ReportError::TooShort {
                min: SIGNED_REPORT_MIN_LENGTH,
                actual: raw.len(),
            });
        }
        let split = raw.len() - SIGNATURE_LENGTH;
        let report = Report::parse(&raw[..split])?;
        let signature: [u8; SIGNATURE_LENGTH] = raw[split..]
            .try_into()
            .expect("slice is exactly 64 bytes");
        Ok(Self { report, signature })
    }

    /// Verify the signature over the report's canonical encoding.
    ///
    /// An invalid signature (or an unparseable verification key) is an
    /// expected outcome, not a fault: the result is `false`, never an error.
    pub fn verify(&self) -> bool {
        let key = match Ed25519PublicKey::from_bytes(self.report.verification_public_key) {
            Ok(key) => key,
            Err(_) => return false,
        };
        let signature = Ed25519Signature::from_bytes(self.signature);
        key.verify(&self.report.serialize(), &signature).is_ok()
    }
}

impl ReportAuthorizationKey {
    /// Create a signed report disclosing tokens for `start_index..end_index`.
    ///
    /// A report reveals *all* tokens subsequent to `start_index`, not just
    /// up to `end_index`; the end index tells other devices how far to
    /// check. A `start_index` of 0 is raised to 1, since the key at index 0
    /// is seed material and must never be disclosed.
    pub fn create_signed_report(
        &self,
        memo_type: MemoType,
        memo_data: Vec<u8>,
        start_index: u16,
        end_index: u16,
    ) -> Result<SignedReport, ReportError> {
        let start_index = start_index.max(1);

        // Recompute tck_{start-1} from the seed. Reports are created rarely,
        // so re-ratcheting beats caching every intermediate key.
        let mut tck = self.tck_0();
        while tck.index() < start_index - 1 {
            match tck.clone().ratchet() {
                Ratchet::Ratcheted(next) => tck = next,
                // index < start_index - 1 <= 65534 here; the chain cannot run out.
                Ratchet::Exhausted => break,
            }
        }

        let report = Report::new(
            self.verification_public_key(),
            *tck.bytes(),
            start_index,
            end_index,
            memo_type,
            memo_data,
        )?;
        let signature = self.sign(&report.serialize()).to_bytes();
        Ok(SignedReport { report, signature })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_report(memo_data: Vec<u8>) -> Report {
        Report::new([0xAA; 32], [0xBB; 32], 1, 8, MemoType::CoEpiV1, memo_data).unwrap()
    }

    fn ratchet_ok(tck: TemporaryContactKey) -> TemporaryContactKey {
        match tck.ratchet() {
            Ratchet::Ratcheted(next) => next,
            Ratchet::Exhausted => panic!("ratchet unexpectedly exhausted"),
        }
    }

    #[test]
    fn test_memo_type_roundtrip() {
        for memo_type in [MemoType::CoEpiV1, MemoType::CovidWatchV1, MemoType::Reserved] {
            assert_eq!(MemoType::from_u8(memo_type.to_byte()).unwrap(), memo_type);
        }
        assert_eq!(
            MemoType::from_u8(0x42),
            Err(ReportError::UnknownMemoType(0x42))
        );
    }

    #[test]
    fn test_report_roundtrip() {
        let report = sample_report(vec![0x07; 100]);
        let restored = Report::parse(&report.serialize()).unwrap();
        assert_eq!(report, restored);
    }

    #[test]
    fn test_report_roundtrip_empty_memo() {
        let report = sample_report(Vec::new());
        let wire = report.serialize();
        assert_eq!(wire.len(), REPORT_MIN_LENGTH);
        assert_eq!(Report::parse(&wire).unwrap(), report);
    }

    #[test]
    fn test_report_roundtrip_max_memo() {
        let report = sample_report(vec![0x5A; 255]);
        let wire = report.serialize();
        assert_eq!(wire.len(), REPORT_MIN_LENGTH + 255);
        assert_eq!(Report::parse(&wire).unwrap(), report);
    }

    #[test]
    fn test_report_clamps_inverted_range() {
        let report = Report::new([0; 32], [0; 32], 9, 3, MemoType::CoEpiV1, Vec::new()).unwrap();
        assert_eq!(report.start_index(), 3);
        assert_eq!(report.end_index(), 3);
    }

    #[test]
    fn test_report_new_rejects_oversize_memo() {
        let err =
            Report::new([0; 32], [0; 32], 1, 8, MemoType::CoEpiV1, vec![0; 256]).unwrap_err();
        assert_eq!(err, ReportError::OversizeMemo(256));
    }

    #[test]
    fn test_parse_rejects_short_buffer() {
        let wire = sample_report(Vec::new()).serialize();
        let err = Report::parse(&wire[..REPORT_MIN_LENGTH - 1]).unwrap_err();
        assert_eq!(
            err,
            ReportError::TooShort {
                min: REPORT_MIN_LENGTH,
                actual: REPORT_MIN_LENGTH - 1,
            }
        );
    }

    #[test]
    fn test_parse_rejects_trailing_bytes() {
        let mut wire = sample_report(vec![1, 2, 3]).serialize();
        wire.push(0xEE);
        let err = Report::parse(&wire).unwrap_err();
        assert_eq!(
            err,
            ReportError::LengthMismatch {
                expected: REPORT_MIN_LENGTH + 3,
                actual: REPORT_MIN_LENGTH + 4,
            }
        );
    }

    #[test]
    fn test_parse_rejects_truncated_memo() {
        let wire = sample_report(vec![1, 2, 3]).serialize();
        let err = Report::parse(&wire[..wire.len() - 1]).unwrap_err();
        assert_eq!(
            err,
            ReportError::LengthMismatch {
                expected: REPORT_MIN_LENGTH + 3,
                actual: REPORT_MIN_LENGTH + 2,
            }
        );
    }

    #[test]
    fn test_parse_rejects_index_zero() {
        let mut wire = sample_report(Vec::new()).serialize();
        wire[64] = 0;
        wire[65] = 0;
        assert_eq!(
            Report::parse(&wire).unwrap_err(),
            ReportError::InvalidReportIndex
        );
    }

    #[test]
    fn test_parse_rejects_unknown_memo_type() {
        let mut wire = sample_report(Vec::new()).serialize();
        wire[68] = 0x42;
        assert_eq!(
            Report::parse(&wire).unwrap_err(),
            ReportError::UnknownMemoType(0x42)
        );
    }

    #[test]
    fn test_signed_report_roundtrip() {
        let rak = ReportAuthorizationKey::generate();
        let signed = rak
            .create_signed_report(MemoType::CoEpiV1, b"symptom data".to_vec(), 20, 100)
            .unwrap();
        let restored = SignedReport::parse(&signed.serialize()).unwrap();
        assert_eq!(signed, restored);
    }

    #[test]
    fn test_signed_report_parse_rejects_short_buffer() {
        let err = SignedReport::parse(&[0u8; SIGNED_REPORT_MIN_LENGTH - 1]).unwrap_err();
        assert_eq!(
            err,
            ReportError::TooShort {
                min: SIGNED_REPORT_MIN_LENGTH,
                actual: SIGNED_REPORT_MIN_LENGTH - 1,
            }
        );
    }

    #[test]
    fn test_create_signed_report_start_zero_equals_start_one() {
        let rak = ReportAuthorizationKey::from_bytes([0x21; 32]);
        let from_zero = rak
            .create_signed_report(MemoType::CoEpiV1, Vec::new(), 0, 8)
            .unwrap();
        let from_one = rak
            .create_signed_report(MemoType::CoEpiV1, Vec::new(), 1, 8)
            .unwrap();
        assert_eq!(from_zero, from_one);
        assert_eq!(from_zero.report.start_index(), 1);
    }

    #[test]
    fn test_create_signed_report_rejects_oversize_memo() {
        let rak = ReportAuthorizationKey::generate();
        let err = rak
            .create_signed_report(MemoType::CoEpiV1, vec![0; 256], 1, 8)
            .unwrap_err();
        assert_eq!(err, ReportError::OversizeMemo(256));
    }

    #[test]
    fn test_verify_fresh_report() {
        let rak = ReportAuthorizationKey::generate();
        let signed = rak
            .create_signed_report(MemoType::CovidWatchV1, b"test data".to_vec(), 2, 10)
            .unwrap();
        assert!(signed.verify());
    }

    #[test]
    fn test_verify_rejects_any_flipped_signature_byte() {
        let rak = ReportAuthorizationKey::generate();
        let signed = rak
            .create_signed_report(MemoType::CoEpiV1, Vec::new(), 1, 4)
            .unwrap();
        for position in 0..SIGNATURE_LENGTH {
            let mut tampered = signed.clone();
            tampered.signature[position] ^= 0x01;
            assert!(!tampered.verify(), "flipped byte {position} should fail");
        }
    }

    #[test]
    fn test_verify_rejects_tampered_report() {
        let rak = ReportAuthorizationKey::generate();
        let signed = rak
            .create_signed_report(MemoType::CoEpiV1, b"memo".to_vec(), 1, 4)
            .unwrap();
        let mut wire = signed.serialize();
        // Flip a memo byte; the signature no longer covers the encoding.
        wire[REPORT_MIN_LENGTH] ^= 0xFF;
        let tampered = SignedReport::parse(&wire).unwrap();
        assert!(!tampered.verify());
    }

    #[test]
    fn test_disclosed_tokens_match_broadcast_tokens() {
        let rak = ReportAuthorizationKey::generate();

        // Tokens as the broadcasting device derives them, for indices 1..=100.
        let mut tck = rak.initial_temporary_contact_key();
        let mut broadcast = Vec::new();
        for _ in 0..100 {
            broadcast.push(tck.temporary_contact_number());
            tck = ratchet_ok(tck);
        }

        let signed = rak
            .create_signed_report(MemoType::CoEpiV1, b"symptom data".to_vec(), 20, 90)
            .unwrap();
        assert!(signed.verify());

        let disclosed: Vec<_> = signed.report.temporary_contact_numbers().collect();
        assert_eq!(disclosed.len(), 70);
        // Offset by one: the broadcast list starts at index 1.
        assert_eq!(disclosed, broadcast[19..89].to_vec());
    }

    #[test]
    fn test_token_iterator_is_restartable() {
        let rak = ReportAuthorizationKey::from_bytes([0x33; 32]);
        let signed = rak
            .create_signed_report(MemoType::CoEpiV1, Vec::new(), 5, 15)
            .unwrap();

        let iter = signed.report.temporary_contact_numbers();
        assert_eq!(iter.len(), 10);
        let first: Vec<_> = iter.collect();
        let second: Vec<_> = signed.report.temporary_contact_numbers().collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_token_range() {
        let rak = ReportAuthorizationKey::generate();
        let signed = rak
            .create_signed_report(MemoType::CoEpiV1, Vec::new(), 7, 7)
            .unwrap();
        assert_eq!(signed.report.temporary_contact_numbers().count(), 0);
    }
}
