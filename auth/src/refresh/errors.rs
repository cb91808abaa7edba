use thiserror::Error;

/// Error type for refresh secret generation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RefreshTokenError {
    #[error("Secure random source unavailable: {0}")]
    RandomSourceUnavailable(String),
}
