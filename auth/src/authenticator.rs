use crate::jwt::Claims;
use crate::jwt::JwtError;
use crate::jwt::JwtHandler;
use crate::password::PasswordError;
use crate::password::PasswordHasher;
use crate::refresh::RefreshTokenError;
use crate::refresh::RefreshTokenGenerator;

/// Authentication coordinator combining password hashing, access-token
/// signing and refresh-secret generation.
pub struct Authenticator {
    password_hasher: PasswordHasher,
    jwt_handler: JwtHandler,
    refresh_generator: RefreshTokenGenerator,
}

/// A freshly generated refresh secret and the hash to persist for it.
///
/// The plaintext `secret` goes to the client; only `hash` is stored.
pub struct RefreshSecret {
    pub secret: String,
    pub hash: String,
}

/// Authentication operation errors.
#[derive(Debug, thiserror::Error)]
pub enum AuthenticationError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Refresh secret does not match")]
    SecretMismatch,

    #[error("Password error: {0}")]
    PasswordError(#[from] PasswordError),

    #[error("JWT error: {0}")]
    JwtError(#[from] JwtError),

    #[error("Refresh token error: {0}")]
    RefreshTokenError(#[from] RefreshTokenError),
}

impl Authenticator {
    /// Create a new authenticator with the default hashing cost.
    ///
    /// # Arguments
    /// * `jwt_secret` - Secret key for access-token signing
    ///
    /// # Errors
    /// * `JwtError::EmptySecret` - The secret is zero-length
    pub fn new(jwt_secret: &[u8]) -> Result<Self, JwtError> {
        Self::with_hasher(jwt_secret, PasswordHasher::new())
    }

    /// Create an authenticator with a preconfigured password hasher.
    pub fn with_hasher(
        jwt_secret: &[u8],
        password_hasher: PasswordHasher,
    ) -> Result<Self, JwtError> {
        Ok(Self {
            password_hasher,
            jwt_handler: JwtHandler::new(jwt_secret)?,
            refresh_generator: RefreshTokenGenerator::new(),
        })
    }

    /// Hash a password for storage.
    ///
    /// # Errors
    /// * `PasswordError` - Hashing operation failed
    pub fn hash_password(&self, password: &str) -> Result<String, PasswordError> {
        self.password_hasher.hash(password)
    }

    /// Verify a password against its stored hash.
    ///
    /// # Errors
    /// * `InvalidCredentials` - Password does not match
    /// * `PasswordError` - Stored hash is malformed
    pub fn verify_password(
        &self,
        password: &str,
        stored_hash: &str,
    ) -> Result<(), AuthenticationError> {
        self.password_hasher
            .verify(password, stored_hash)
            .map_err(|e| match e {
                PasswordError::Mismatch => AuthenticationError::InvalidCredentials,
                other => other.into(),
            })
    }

    /// Generate a refresh secret together with its storable hash.
    ///
    /// # Errors
    /// * `RefreshTokenError` - Random source unavailable
    /// * `PasswordError` - Hashing the secret failed
    pub fn new_refresh_secret(&self) -> Result<RefreshSecret, AuthenticationError> {
        let secret = self.refresh_generator.generate()?;
        let hash = self.password_hasher.hash(&secret)?;

        Ok(RefreshSecret { secret, hash })
    }

    /// Verify a presented refresh secret against the stored hash.
    ///
    /// # Errors
    /// * `SecretMismatch` - Secret does not match
    /// * `PasswordError` - Stored hash is malformed
    pub fn verify_refresh_secret(
        &self,
        secret: &str,
        stored_hash: &str,
    ) -> Result<(), AuthenticationError> {
        self.password_hasher
            .verify(secret, stored_hash)
            .map_err(|e| match e {
                PasswordError::Mismatch => AuthenticationError::SecretMismatch,
                other => other.into(),
            })
    }

    /// Sign access-token claims.
    ///
    /// # Errors
    /// * `JwtError` - Token generation failed
    pub fn generate_token(&self, claims: &Claims) -> Result<String, JwtError> {
        self.jwt_handler.encode(claims)
    }

    /// Validate and decode an access token, rejecting expired ones.
    ///
    /// # Errors
    /// * `JwtError` - Token validation or decoding failed
    pub fn validate_token(&self, token: &str) -> Result<Claims, JwtError> {
        self.jwt_handler.decode(token)
    }

    /// Decode an authentic access token even if it has expired.
    ///
    /// For diagnostics only.
    pub fn inspect_token(&self, token: &str) -> Result<Claims, JwtError> {
        self.jwt_handler.decode_ignoring_expiry(token)
    }
}
