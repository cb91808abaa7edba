//! Authentication utilities library
//!
//! Provides the credential primitives used by the token service:
//! - Password and refresh-secret hashing (Argon2id)
//! - Access-token signing and validation (HMAC JWT)
//! - Refresh-secret generation
//! - An `Authenticator` coordinating the three
//!
//! # Examples
//!
//! ## Password Hashing
//! ```
//! use auth::PasswordHasher;
//!
//! let hasher = PasswordHasher::new();
//! let hash = hasher.hash("my_password").unwrap();
//! assert!(hasher.verify("my_password", &hash).is_ok());
//! ```
//!
//! ## Access Tokens
//! ```
//! use auth::{Claims, JwtHandler};
//! use chrono::Duration;
//!
//! let handler = JwtHandler::new(b"secret_key_at_least_32_bytes_long!").unwrap();
//! let claims = Claims::new("refresh-id", "user123", "203.0.113.7", Duration::minutes(15));
//! let token = handler.encode(&claims).unwrap();
//! let decoded: Claims = handler.decode(&token).unwrap();
//! assert_eq!(decoded.user_id, "user123");
//! ```
//!
//! ## Refresh Secrets
//! ```
//! use auth::Authenticator;
//!
//! let auth = Authenticator::new(b"secret_key_at_least_32_bytes_long!").unwrap();
//! let refresh = auth.new_refresh_secret().unwrap();
//! assert!(auth.verify_refresh_secret(&refresh.secret, &refresh.hash).is_ok());
//! ```

pub mod authenticator;
pub mod jwt;
pub mod password;
pub mod refresh;

// Re-export commonly used items
pub use authenticator::AuthenticationError;
pub use authenticator::Authenticator;
pub use authenticator::RefreshSecret;
pub use jwt::Claims;
pub use jwt::JwtError;
pub use jwt::JwtHandler;
pub use password::HashingCost;
pub use password::PasswordError;
pub use password::PasswordHasher;
pub use refresh::RefreshTokenError;
pub use refresh::RefreshTokenGenerator;
