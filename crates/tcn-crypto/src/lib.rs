//! Cryptographic primitives for the TCN proximity protocol.
//!
//! This crate wraps the hash and signature backends behind small opaque
//! types. The protocol layer is written against these wrappers, so the
//! backend is selected once here rather than branched on at call sites.

pub mod ed25519;
pub mod error;
pub mod sha;

pub use error::CryptoError;
