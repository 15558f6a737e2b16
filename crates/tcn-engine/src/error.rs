//! Error types for the connection engine.

/// Errors that can occur during engine operation.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("radio transport unavailable: {0}")]
    RadioUnavailable(String),
}
