//! Pure protocol layer for the TCN proximity protocol.
//!
//! This crate defines the temporary contact key ratchet, the exposure report
//! wire format, advertisement service-data payloads, and RSSI-based distance
//! estimation. Everything here is synchronous and free of I/O; the radio
//! engine lives in `tcn-engine`.

pub mod advertisement;
pub mod constants;
pub mod distance;
pub mod error;
pub mod keys;
pub mod report;
pub mod types;

pub use advertisement::ServiceData;
pub use error::{AdvertisementError, ReportError};
pub use keys::{Ratchet, ReportAuthorizationKey, TemporaryContactKey};
pub use report::{MemoType, Report, SignedReport};
pub use types::{InvalidLength, ShortIdentifier, TemporaryContactNumber};
