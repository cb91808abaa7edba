use thiserror::Error;

/// Error type for password operations.
///
/// `Mismatch` and `MalformedHash` are kept apart: the first is a failed
/// authentication attempt, the second means the stored hash is corrupt.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PasswordError {
    #[error("Password hashing failed: {0}")]
    HashingFailed(String),

    #[error("Password does not match hash")]
    Mismatch,

    #[error("Malformed password hash: {0}")]
    MalformedHash(String),

    #[error("Invalid hashing cost: {0}")]
    InvalidCost(String),
}
