use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;

use super::errors::RefreshTokenError;

/// Number of random bytes in a refresh secret.
pub const REFRESH_SECRET_BYTES: usize = 32;

/// Produces opaque refresh secrets.
///
/// A secret is 32 bytes from the operating system RNG, encoded as padded
/// standard base64 (44 characters).
#[derive(Debug, Clone, Copy, Default)]
pub struct RefreshTokenGenerator;

impl RefreshTokenGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Generate a fresh refresh secret.
    ///
    /// # Errors
    /// * `RandomSourceUnavailable` - The OS RNG could not be read
    pub fn generate(&self) -> Result<String, RefreshTokenError> {
        let mut bytes = [0u8; REFRESH_SECRET_BYTES];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| RefreshTokenError::RandomSourceUnavailable(e.to_string()))?;

        Ok(STANDARD.encode(bytes))
    }
}
