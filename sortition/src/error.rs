use thiserror::Error;

#[derive(Debug, Error)]
pub enum SortitionError {
    #[error("VRF output too short: need 8 bytes, got {0}")]
    OutputTooShort(usize),

    #[error("invalid VRF output encoding: {0}")]
    InvalidEncoding(String),

    #[error("verification failed: {0}")]
    VerificationFailed(String),

    #[error("{0}")]
    Other(String),
}
