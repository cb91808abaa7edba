use async_trait::async_trait;

use crate::domain::credentials::events::OriginChangedEvent;
use crate::domain::credentials::models::CreateUserCommand;
use crate::domain::credentials::models::Credentials;
use crate::domain::credentials::models::LoginCommand;
use crate::domain::credentials::models::RefreshCommand;
use crate::domain::credentials::models::RefreshToken;
use crate::domain::credentials::models::RefreshTokenId;
use crate::domain::credentials::models::TokenPair;
use crate::domain::credentials::models::User;
use crate::domain::credentials::models::UserId;
use crate::credentials::errors::AuthError;
use crate::credentials::errors::NotifierError;
use crate::credentials::errors::StoreError;

/// Port for credential lifecycle operations.
#[async_trait]
pub trait AuthServicePort: Send + Sync + 'static {
    /// Register a new user.
    ///
    /// # Arguments
    /// * `command` - Validated command containing username, email, and password
    ///
    /// # Returns
    /// Identifier of the created user
    ///
    /// # Errors
    /// * `Conflict` - Email or username is already registered
    /// * `Store` - Persistence failed or inserted nothing
    /// * `Internal` - Password hashing failed
    async fn create_user(&self, command: CreateUserCommand) -> Result<UserId, AuthError>;

    /// Exchange email and password for a fresh token pair.
    ///
    /// # Errors
    /// * `InvalidCredentials` - Unknown email or wrong password (indistinguishable)
    /// * `Store` - Persistence failed
    /// * `Internal` - Hashing, signing or randomness failed
    async fn login(&self, command: LoginCommand) -> Result<TokenPair, AuthError>;

    /// Exchange a token pair for a new one, consuming the presented refresh secret.
    ///
    /// # Errors
    /// * `InvalidAccessToken` - Access token is forged, malformed or expired, or its
    ///   refresh record is gone (already rotated or expired)
    /// * `TokenMismatch` - Refresh secret does not match the stored hash
    /// * `Store` - Persistence failed
    /// * `Internal` - Hashing, signing or randomness failed
    async fn refresh_tokens(&self, command: RefreshCommand) -> Result<TokenPair, AuthError>;
}

/// Persistence operations the credential lifecycle depends on.
#[async_trait]
pub trait CredentialStore: Send + Sync + 'static {
    /// Persist a new user.
    ///
    /// # Errors
    /// * `Conflict` - Email or username is already taken
    /// * `NotCreated` - The insert affected no rows
    /// * `Database` - Database operation failed
    async fn create_user(&self, user: User) -> Result<UserId, StoreError>;

    /// Look up login credentials by email.
    ///
    /// # Errors
    /// * `NotFound` - No user with this email
    /// * `Database` - Database operation failed
    async fn find_credentials_by_email(&self, email: &str) -> Result<Credentials, StoreError>;

    /// Replace the user's refresh-token record.
    ///
    /// Deletes any existing record for `token.user_id` and inserts `token`
    /// atomically: either both happen or neither does.
    ///
    /// # Errors
    /// * `Conflict` - A concurrent save for the same user won
    /// * `Database` - Database operation failed; prior state is intact
    async fn save_refresh_token(&self, token: RefreshToken) -> Result<(), StoreError>;

    /// Consume the record `previous` and insert `token` in its place.
    ///
    /// Atomic like `save_refresh_token`, but only succeeds while `previous`
    /// is still the user's live record. Of two concurrent rotations of the
    /// same record exactly one succeeds.
    ///
    /// # Errors
    /// * `NotFound` - `previous` no longer exists (already rotated or superseded)
    /// * `Database` - Database operation failed; prior state is intact
    async fn rotate_refresh_token(
        &self,
        previous: &RefreshTokenId,
        token: RefreshToken,
    ) -> Result<(), StoreError>;

    /// Fetch the stored hash of a live refresh-token record.
    ///
    /// # Errors
    /// * `NotFound` - No record with this ID, or the record has expired
    /// * `Database` - Database operation failed
    async fn get_refresh_token_hash(&self, id: &RefreshTokenId) -> Result<String, StoreError>;
}

/// Delivery of origin-change notices.
#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    /// Notify that a refresh came from a new network origin.
    ///
    /// # Errors
    /// * `SerializationFailed` - Notice could not be encoded
    /// * `DeliveryFailed` - Transport rejected or timed out
    async fn notify_origin_change(&self, event: &OriginChangedEvent) -> Result<(), NotifierError>;
}
