use thiserror::Error;

/// Errors raised while parsing or building fundamental types.
#[derive(Debug, Error)]
pub enum TypesError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid length: expected {expected} bytes, got {got}")]
    InvalidLength { expected: usize, got: usize },

    #[error("{0}")]
    Other(String),
}
