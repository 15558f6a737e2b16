//! Classification of GATT requests arriving from remote centrals.
//!
//! The local service exposes one readable, writable characteristic. Reads
//! are answered with a freshly generated token; writes deliver a remote
//! token. Validation is a pure decision applied by the scheduler.

use tcn_core::constants::TCN_LENGTH;
use tcn_core::types::TemporaryContactNumber;

/// Outcome of validating an incoming write request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteRequestOutcome {
    /// The payload carried a token in its first 16 bytes.
    Accept(TemporaryContactNumber),
    /// The request targeted a characteristic we do not serve.
    WrongCharacteristic,
    /// The payload was shorter than a token.
    ShortValue(usize),
}

pub fn classify_write_request(characteristic_matches: bool, value: &[u8]) -> WriteRequestOutcome {
    if !characteristic_matches {
        return WriteRequestOutcome::WrongCharacteristic;
    }
    if value.len() < TCN_LENGTH {
        return WriteRequestOutcome::ShortValue(value.len());
    }
    let mut bytes = [0u8; TCN_LENGTH];
    bytes.copy_from_slice(&value[..TCN_LENGTH]);
    WriteRequestOutcome::Accept(TemporaryContactNumber::new(bytes))
}
