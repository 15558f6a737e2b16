//! Advertisement service-data payloads.
//!
//! Peers that can place data in the advertisement's service-data field
//! broadcast either a bare 16-byte token, or a bridged token (relayed on
//! behalf of a device that cannot advertise data itself) followed by their
//! own 4-byte short identifier. Any other length is malformed and must not
//! be sliced into.

use crate::constants::{SERVICE_DATA_BRIDGED_LENGTH, SERVICE_DATA_TOKEN_LENGTH, TCN_LENGTH};
use crate::error::AdvertisementError;
use crate::types::{ShortIdentifier, TemporaryContactNumber};

/// Parsed service-data payload of a contact-service advertisement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceData {
    /// A bare token.
    Token(TemporaryContactNumber),
    /// A bridged token plus the relaying peer's short identifier.
    Bridged {
        token: TemporaryContactNumber,
        short_id: ShortIdentifier,
    },
}

impl ServiceData {
    /// Parse a raw service-data payload. Only exactly 16 bytes (token) or
    /// exactly 20 bytes (token + short identifier) are accepted.
    pub fn parse(raw: &[u8]) -> Result<Self, AdvertisementError> {
        match raw.len() {
            SERVICE_DATA_TOKEN_LENGTH => {
                let mut token = [0u8; TCN_LENGTH];
                token.copy_from_slice(raw);
                Ok(ServiceData::Token(TemporaryContactNumber::new(token)))
            }
            SERVICE_DATA_BRIDGED_LENGTH => {
                let mut token = [0u8; TCN_LENGTH];
                token.copy_from_slice(&raw[..TCN_LENGTH]);
                let mut short_id = [0u8; 4];
                short_id.copy_from_slice(&raw[TCN_LENGTH..]);
                Ok(ServiceData::Bridged {
                    token: TemporaryContactNumber::new(token),
                    short_id: ShortIdentifier::new(short_id),
                })
            }
            len => Err(AdvertisementError::InvalidLength(len)),
        }
    }

    /// The token carried by the payload.
    pub fn token(&self) -> TemporaryContactNumber {
        match self {
            ServiceData::Token(token) => *token,
            ServiceData::Bridged { token, .. } => *token,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_token() {
        let raw = [0xAB; 16];
        let parsed = ServiceData::parse(&raw).unwrap();
        assert_eq!(
            parsed,
            ServiceData::Token(TemporaryContactNumber::new(raw))
        );
        assert_eq!(parsed.token().as_ref(), &raw);
    }

    #[test]
    fn test_parse_bridged_token() {
        let mut raw = [0u8; 20];
        raw[..16].copy_from_slice(&[0xCD; 16]);
        raw[16..].copy_from_slice(&[1, 2, 3, 4]);

        let parsed = ServiceData::parse(&raw).unwrap();
        assert_eq!(
            parsed,
            ServiceData::Bridged {
                token: TemporaryContactNumber::new([0xCD; 16]),
                short_id: ShortIdentifier::new([1, 2, 3, 4]),
            }
        );
    }

    #[test]
    fn test_parse_rejects_other_lengths() {
        for len in [0usize, 1, 15, 17, 18, 19, 21, 32] {
            let raw = vec![0u8; len];
            assert_eq!(
                ServiceData::parse(&raw).unwrap_err(),
                AdvertisementError::InvalidLength(len),
                "length {len} must be rejected"
            );
        }
    }
}
