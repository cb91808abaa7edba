use thiserror::Error;

/// Error for identifier parsing failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IdentifierError {
    #[error("Invalid UUID format: {0}")]
    InvalidFormat(String),
}

/// Error for Username validation failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UsernameError {
    #[error("Username too short: minimum {min} characters, got {actual}")]
    TooShort { min: usize, actual: usize },

    #[error("Username too long: maximum {max} characters, got {actual}")]
    TooLong { max: usize, actual: usize },

    #[error(
        "Username contains invalid characters (only alphanumeric, underscore, and hyphen allowed)"
    )]
    InvalidCharacters,
}

/// Error for EmailAddress validation failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EmailError {
    #[error("Invalid email format: {0}")]
    InvalidFormat(String),
}

/// Error for ClientIp validation failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClientIpError {
    #[error("Client IP is empty")]
    Empty,
}

/// Error reported by a credential store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Record not found")]
    NotFound,

    #[error("Already exists: {0}")]
    Conflict(String),

    #[error("Record was not created")]
    NotCreated,

    #[error("Database error: {0}")]
    Database(String),
}

/// Error for origin-change notification delivery
#[derive(Debug, Clone, Error)]
pub enum NotifierError {
    #[error("Failed to serialize notification: {0}")]
    SerializationFailed(String),

    #[error("Failed to deliver notification: {0}")]
    DeliveryFailed(String),
}

/// Error for invalid token policy settings
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TokenPolicyError {
    #[error("Signing secret must not be empty")]
    EmptySecret,

    #[error("{0} must be a positive duration")]
    NonPositiveTtl(&'static str),

    #[error("{0} is too large")]
    TtlOutOfRange(&'static str),

    #[error("Invalid hashing cost: {0}")]
    InvalidHashingCost(String),
}

/// Top-level error for credential lifecycle operations.
///
/// Callers branch on the variant; the display text is for logs only.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    // Value object validation errors (automatically converted via #[from])
    #[error("Invalid username: {0}")]
    InvalidUsername(#[from] UsernameError),

    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    #[error("Invalid client IP: {0}")]
    InvalidClientIp(#[from] ClientIpError),

    // Authentication failures
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid access token")]
    InvalidAccessToken,

    #[error("Refresh token does not match")]
    TokenMismatch,

    // Persistence errors
    #[error("Already exists: {0}")]
    Conflict(String),

    #[error("Store error: {0}")]
    Store(String),

    // Hashing, signing or randomness failures
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(what) => AuthError::Conflict(what),
            other => AuthError::Store(other.to_string()),
        }
    }
}

impl From<auth::PasswordError> for AuthError {
    fn from(err: auth::PasswordError) -> Self {
        AuthError::Internal(err.to_string())
    }
}

impl From<auth::AuthenticationError> for AuthError {
    fn from(err: auth::AuthenticationError) -> Self {
        match err {
            auth::AuthenticationError::InvalidCredentials => AuthError::InvalidCredentials,
            auth::AuthenticationError::SecretMismatch => AuthError::TokenMismatch,
            other => AuthError::Internal(other.to_string()),
        }
    }
}
