use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use auth::Authenticator;
use auth::Claims;
use auth::HashingCost;
use auth::JwtError;
use auth::PasswordHasher;
use chrono::Duration;
use chrono::Utc;

use crate::domain::credentials::events::OriginChangedEvent;
use crate::domain::credentials::models::ClientIp;
use crate::domain::credentials::models::CreateUserCommand;
use crate::domain::credentials::models::LoginCommand;
use crate::domain::credentials::models::RefreshCommand;
use crate::domain::credentials::models::RefreshToken;
use crate::domain::credentials::models::RefreshTokenId;
use crate::domain::credentials::models::TokenPair;
use crate::domain::credentials::models::User;
use crate::domain::credentials::models::UserId;
use crate::credentials::errors::AuthError;
use crate::credentials::errors::StoreError;
use crate::credentials::errors::TokenPolicyError;
use crate::credentials::ports::AuthServicePort;
use crate::credentials::ports::CredentialStore;
use crate::credentials::ports::Notifier;

/// Immutable issuance settings supplied at construction.
#[derive(Clone)]
pub struct TokenPolicy {
    signing_secret: Vec<u8>,
    access_token_ttl: Duration,
    refresh_token_ttl: Duration,
    hashing_cost: HashingCost,
}

impl TokenPolicy {
    /// Build a validated policy.
    ///
    /// # Errors
    /// * `EmptySecret` - Signing secret is zero-length
    /// * `NonPositiveTtl` - Either TTL is zero or negative
    /// * `TtlOutOfRange` - Either TTL pushes an expiry past the representable range
    pub fn new(
        signing_secret: Vec<u8>,
        access_token_ttl: Duration,
        refresh_token_ttl: Duration,
    ) -> Result<Self, TokenPolicyError> {
        if signing_secret.is_empty() {
            return Err(TokenPolicyError::EmptySecret);
        }
        check_ttl(access_token_ttl, "access token TTL")?;
        check_ttl(refresh_token_ttl, "refresh token TTL")?;

        Ok(Self {
            signing_secret,
            access_token_ttl,
            refresh_token_ttl,
            hashing_cost: HashingCost::default(),
        })
    }

    /// Override the Argon2id cost used for passwords and refresh secrets.
    pub fn with_hashing_cost(mut self, hashing_cost: HashingCost) -> Self {
        self.hashing_cost = hashing_cost;
        self
    }

    pub fn access_token_ttl(&self) -> Duration {
        self.access_token_ttl
    }

    pub fn refresh_token_ttl(&self) -> Duration {
        self.refresh_token_ttl
    }
}

// Expiries are computed as `now + ttl`; keep a century of headroom past that.
fn check_ttl(ttl: Duration, name: &'static str) -> Result<(), TokenPolicyError> {
    if ttl <= Duration::zero() {
        return Err(TokenPolicyError::NonPositiveTtl(name));
    }
    let headroom = Duration::days(36_525);
    match ttl
        .checked_add(&headroom)
        .and_then(|span| Utc::now().checked_add_signed(span))
    {
        Some(_) => Ok(()),
        None => Err(TokenPolicyError::TtlOutOfRange(name)),
    }
}

impl fmt::Debug for TokenPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPolicy")
            .field("signing_secret", &"<redacted>")
            .field("access_token_ttl", &self.access_token_ttl)
            .field("refresh_token_ttl", &self.refresh_token_ttl)
            .field("hashing_cost", &self.hashing_cost)
            .finish()
    }
}

/// Domain service implementation for the credential lifecycle.
///
/// Holds no mutable state of its own; every guarantee about refresh-token
/// records is delegated to the `CredentialStore`.
pub struct AuthService<CS, N>
where
    CS: CredentialStore,
    N: Notifier,
{
    store: Arc<CS>,
    notifier: Arc<N>,
    authenticator: Authenticator,
    access_token_ttl: Duration,
    refresh_token_ttl: Duration,
}

impl<CS, N> AuthService<CS, N>
where
    CS: CredentialStore,
    N: Notifier,
{
    /// Create a new auth service with injected dependencies.
    ///
    /// # Arguments
    /// * `store` - Credential persistence implementation
    /// * `notifier` - Origin-change notification delivery
    /// * `policy` - Signing secret, TTLs and hashing cost
    ///
    /// # Errors
    /// * `InvalidHashingCost` - Argon2 rejected the configured cost
    pub fn new(
        store: Arc<CS>,
        notifier: Arc<N>,
        policy: TokenPolicy,
    ) -> Result<Self, TokenPolicyError> {
        let hasher = PasswordHasher::with_cost(policy.hashing_cost)
            .map_err(|e| TokenPolicyError::InvalidHashingCost(e.to_string()))?;
        let authenticator = Authenticator::with_hasher(&policy.signing_secret, hasher)
            .map_err(|_| TokenPolicyError::EmptySecret)?;

        Ok(Self {
            store,
            notifier,
            authenticator,
            access_token_ttl: policy.access_token_ttl,
            refresh_token_ttl: policy.refresh_token_ttl,
        })
    }

    /// Issue a token pair for `user_id` and persist the matching record.
    ///
    /// With `previous` set, the presented record is consumed in the same
    /// transaction; losing that race means the secret was already spent.
    async fn generate_tokens(
        &self,
        user_id: UserId,
        client_ip: &ClientIp,
        previous: Option<RefreshTokenId>,
    ) -> Result<TokenPair, AuthError> {
        let refresh = self.authenticator.new_refresh_secret()?;
        let expires_at = Utc::now()
            .checked_add_signed(self.refresh_token_ttl)
            .ok_or_else(|| AuthError::Internal("Refresh token expiry out of range".to_string()))?;

        let record = RefreshToken {
            id: RefreshTokenId::new(),
            user_id,
            token_hash: refresh.hash,
            expires_at,
        };
        let refresh_token_id = record.id;

        match previous {
            None => self
                .store
                .save_refresh_token(record)
                .await
                .map_err(|e| record_write_failure(user_id, e))?,
            Some(previous) => self
                .store
                .rotate_refresh_token(&previous, record)
                .await
                .map_err(|e| match e {
                    StoreError::NotFound => {
                        tracing::warn!(
                            user_id = %user_id,
                            refresh_token_id = %previous,
                            "Refresh token consumed concurrently"
                        );
                        AuthError::InvalidAccessToken
                    }
                    other => record_write_failure(user_id, other),
                })?,
        }

        let claims = Claims::new(refresh_token_id, user_id, client_ip, self.access_token_ttl);
        let access_token = self
            .authenticator
            .generate_token(&claims)
            .map_err(|e| AuthError::Internal(format!("Access token signing failed: {}", e)))?;

        Ok(TokenPair {
            access_token,
            refresh_token: refresh.secret,
        })
    }

    /// Fire-and-forget delivery of an origin-change notice.
    fn dispatch_origin_change(&self, event: OriginChangedEvent) {
        tracing::warn!(
            user_id = %event.user_id,
            previous_ip = %event.previous_ip,
            current_ip = %event.current_ip,
            "Client origin changed since token issuance"
        );

        let notifier = Arc::clone(&self.notifier);
        tokio::spawn(async move {
            if let Err(e) = notifier.notify_origin_change(&event).await {
                tracing::error!(
                    user_id = %event.user_id,
                    event_id = %event.event_id,
                    error = %e,
                    "Failed to deliver origin change notification"
                );
            }
        });
    }

    fn log_rejected_access_token(&self, token: &str, error: &JwtError) {
        match error {
            JwtError::TokenExpired => {
                let user_id = self
                    .authenticator
                    .inspect_token(token)
                    .map(|claims| claims.user_id)
                    .unwrap_or_default();
                tracing::debug!(user_id = %user_id, "Refresh rejected: access token expired");
            }
            other => tracing::warn!(error = %other, "Refresh rejected: invalid access token"),
        }
    }
}

/// The address bound into the access token versus the one presenting it.
fn origin_change(
    user_id: UserId,
    claims: &Claims,
    client_ip: &ClientIp,
) -> Option<OriginChangedEvent> {
    (claims.user_ip != client_ip.as_str())
        .then(|| OriginChangedEvent::new(user_id, &claims.user_ip, client_ip))
}

/// A refresh-token write that fails is a store failure, whatever the kind.
///
/// A unique violation here means a concurrent login for the same user won;
/// it is not a duplicate resource the client could act on.
fn record_write_failure(user_id: UserId, err: StoreError) -> AuthError {
    match err {
        StoreError::Conflict(what) => {
            tracing::warn!(
                user_id = %user_id,
                conflict = %what,
                "Refresh token write lost to a concurrent issuance"
            );
            AuthError::Store(format!("Concurrent write: {}", what))
        }
        other => other.into(),
    }
}

#[async_trait]
impl<CS, N> AuthServicePort for AuthService<CS, N>
where
    CS: CredentialStore,
    N: Notifier,
{
    async fn create_user(&self, command: CreateUserCommand) -> Result<UserId, AuthError> {
        let password_hash = self.authenticator.hash_password(&command.password)?;

        let user = User {
            id: UserId::new(),
            username: command.username,
            email: command.email,
            password_hash,
            created_at: Utc::now(),
        };

        let user_id = self.store.create_user(user).await?;
        tracing::info!(user_id = %user_id, "User registered");

        Ok(user_id)
    }

    async fn login(&self, command: LoginCommand) -> Result<TokenPair, AuthError> {
        let credentials = match self.store.find_credentials_by_email(&command.email).await {
            Ok(credentials) => credentials,
            Err(StoreError::NotFound) => {
                tracing::debug!("Login rejected: unknown email");
                return Err(AuthError::InvalidCredentials);
            }
            Err(e) => return Err(e.into()),
        };

        self.authenticator
            .verify_password(&command.password, &credentials.password_hash)
            .map_err(|e| {
                let err = AuthError::from(e);
                if let AuthError::Internal(reason) = &err {
                    tracing::error!(
                        user_id = %credentials.user_id,
                        reason = %reason,
                        "Stored password hash is unusable"
                    );
                }
                err
            })?;

        let pair = self
            .generate_tokens(credentials.user_id, &command.client_ip, None)
            .await?;
        tracing::info!(user_id = %credentials.user_id, "User logged in");

        Ok(pair)
    }

    async fn refresh_tokens(&self, command: RefreshCommand) -> Result<TokenPair, AuthError> {
        let claims = self
            .authenticator
            .validate_token(&command.access_token)
            .map_err(|e| {
                self.log_rejected_access_token(&command.access_token, &e);
                AuthError::InvalidAccessToken
            })?;

        let refresh_token_id = RefreshTokenId::from_string(&claims.refresh_token_id)
            .map_err(|_| AuthError::InvalidAccessToken)?;
        let user_id =
            UserId::from_string(&claims.user_id).map_err(|_| AuthError::InvalidAccessToken)?;

        if let Some(event) = origin_change(user_id, &claims, &command.client_ip) {
            self.dispatch_origin_change(event);
        }

        let stored_hash = match self.store.get_refresh_token_hash(&refresh_token_id).await {
            Ok(hash) => hash,
            Err(StoreError::NotFound) => {
                tracing::debug!(
                    user_id = %user_id,
                    refresh_token_id = %refresh_token_id,
                    "Refresh rejected: no live refresh token record"
                );
                return Err(AuthError::InvalidAccessToken);
            }
            Err(e) => return Err(e.into()),
        };

        self.authenticator
            .verify_refresh_secret(&command.refresh_token, &stored_hash)
            .map_err(|e| {
                let err = AuthError::from(e);
                if err == AuthError::TokenMismatch {
                    tracing::warn!(user_id = %user_id, "Refresh rejected: refresh token mismatch");
                }
                err
            })?;

        let pair = self
            .generate_tokens(user_id, &command.client_ip, Some(refresh_token_id))
            .await?;
        tracing::info!(user_id = %user_id, "Tokens refreshed");

        Ok(pair)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration as StdDuration;

    use mockall::mock;
    use tokio::sync::mpsc;

    use super::*;
    use crate::credentials::errors::NotifierError;
    use crate::domain::credentials::models::Credentials;
    use crate::domain::credentials::models::EmailAddress;
    use crate::domain::credentials::models::Username;
    use crate::outbound::repositories::InMemoryCredentialStore;

    const SECRET: &[u8] = b"test-secret-key-for-jwt-signing-at-least-32-bytes";

    mock! {
        pub TestCredentialStore {}

        #[async_trait]
        impl CredentialStore for TestCredentialStore {
            async fn create_user(&self, user: User) -> Result<UserId, StoreError>;
            async fn find_credentials_by_email(&self, email: &str) -> Result<Credentials, StoreError>;
            async fn save_refresh_token(&self, token: RefreshToken) -> Result<(), StoreError>;
            async fn rotate_refresh_token(&self, previous: &RefreshTokenId, token: RefreshToken) -> Result<(), StoreError>;
            async fn get_refresh_token_hash(&self, id: &RefreshTokenId) -> Result<String, StoreError>;
        }
    }

    mock! {
        pub TestNotifier {}

        #[async_trait]
        impl Notifier for TestNotifier {
            async fn notify_origin_change(&self, event: &OriginChangedEvent) -> Result<(), NotifierError>;
        }
    }

    /// Notifier that reports each call on a channel, then succeeds or fails.
    struct ChannelNotifier {
        sender: mpsc::UnboundedSender<OriginChangedEvent>,
        fail: bool,
    }

    #[async_trait]
    impl Notifier for ChannelNotifier {
        async fn notify_origin_change(
            &self,
            event: &OriginChangedEvent,
        ) -> Result<(), NotifierError> {
            let _ = self.sender.send(event.clone());
            if self.fail {
                Err(NotifierError::DeliveryFailed("smtp unreachable".to_string()))
            } else {
                Ok(())
            }
        }
    }

    fn fast_cost() -> HashingCost {
        HashingCost {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        }
    }

    fn test_policy() -> TokenPolicy {
        TokenPolicy::new(SECRET.to_vec(), Duration::minutes(15), Duration::days(30))
            .unwrap()
            .with_hashing_cost(fast_cost())
    }

    fn test_authenticator() -> Authenticator {
        Authenticator::with_hasher(SECRET, PasswordHasher::with_cost(fast_cost()).unwrap())
            .unwrap()
    }

    fn ip(value: &str) -> ClientIp {
        ClientIp::new(value.to_string()).unwrap()
    }

    fn register_command(email: &str) -> CreateUserCommand {
        CreateUserCommand::new(
            Username::new("alice".to_string()).unwrap(),
            EmailAddress::new(email.to_string()).unwrap(),
            "pass_word!".to_string(),
        )
    }

    fn login_command(email: &str, password: &str, client_ip: &str) -> LoginCommand {
        LoginCommand {
            email: email.to_string(),
            password: password.to_string(),
            client_ip: ip(client_ip),
        }
    }

    fn refresh_command(pair: &TokenPair, client_ip: &str) -> RefreshCommand {
        RefreshCommand {
            access_token: pair.access_token.clone(),
            refresh_token: pair.refresh_token.clone(),
            client_ip: ip(client_ip),
        }
    }

    struct Harness {
        service: Arc<AuthService<InMemoryCredentialStore, ChannelNotifier>>,
        store: Arc<InMemoryCredentialStore>,
        notifications: mpsc::UnboundedReceiver<OriginChangedEvent>,
    }

    fn harness(fail_notifications: bool) -> Harness {
        let store = Arc::new(InMemoryCredentialStore::new());
        let (sender, notifications) = mpsc::unbounded_channel();
        let notifier = Arc::new(ChannelNotifier {
            sender,
            fail: fail_notifications,
        });
        let service =
            Arc::new(AuthService::new(Arc::clone(&store), notifier, test_policy()).unwrap());

        Harness {
            service,
            store,
            notifications,
        }
    }

    async fn registered_login(harness: &Harness, client_ip: &str) -> (UserId, TokenPair) {
        let user_id = harness
            .service
            .create_user(register_command("alice@example.com"))
            .await
            .expect("registration failed");
        let pair = harness
            .service
            .login(login_command("alice@example.com", "pass_word!", client_ip))
            .await
            .expect("login failed");
        (user_id, pair)
    }

    #[test]
    fn test_policy_rejects_empty_secret() {
        let result = TokenPolicy::new(Vec::new(), Duration::minutes(15), Duration::days(1));
        assert!(matches!(result, Err(TokenPolicyError::EmptySecret)));
    }

    #[test]
    fn test_policy_rejects_non_positive_ttl() {
        assert!(matches!(
            TokenPolicy::new(SECRET.to_vec(), Duration::zero(), Duration::days(1)),
            Err(TokenPolicyError::NonPositiveTtl(_))
        ));
        assert!(matches!(
            TokenPolicy::new(SECRET.to_vec(), Duration::minutes(1), Duration::seconds(-1)),
            Err(TokenPolicyError::NonPositiveTtl(_))
        ));
    }

    #[test]
    fn test_policy_rejects_ttl_past_representable_expiry() {
        let huge = Duration::seconds(9_000_000_000_000);

        assert_eq!(
            TokenPolicy::new(SECRET.to_vec(), Duration::minutes(15), huge).unwrap_err(),
            TokenPolicyError::TtlOutOfRange("refresh token TTL")
        );
        assert_eq!(
            TokenPolicy::new(SECRET.to_vec(), huge, Duration::days(1)).unwrap_err(),
            TokenPolicyError::TtlOutOfRange("access token TTL")
        );
        assert!(
            TokenPolicy::new(SECRET.to_vec(), Duration::minutes(15), Duration::days(3650)).is_ok()
        );
    }

    #[test]
    fn test_origin_change_only_for_a_different_address() {
        let user_id = UserId::new();
        let claims = Claims::new(RefreshTokenId::new(), user_id, "10.0.0.1", Duration::minutes(5));

        assert!(origin_change(user_id, &claims, &ip("10.0.0.1")).is_none());

        let event = origin_change(user_id, &claims, &ip("192.168.1.7")).unwrap();
        assert_eq!(event.user_id, user_id.to_string());
        assert_eq!(event.previous_ip, "10.0.0.1");
        assert_eq!(event.current_ip, "192.168.1.7");
    }

    #[test]
    fn test_policy_debug_redacts_secret() {
        let rendered = format!("{:?}", test_policy());
        assert!(!rendered.contains("test-secret-key"));
    }

    #[tokio::test]
    async fn test_create_user_hashes_password() {
        let mut store = MockTestCredentialStore::new();
        let notifier = MockTestNotifier::new();

        store
            .expect_create_user()
            .withf(|user| {
                user.username.as_str() == "alice"
                    && user.email.as_str() == "alice@example.com"
                    && user.password_hash.starts_with("$argon2id$")
                    && user.password_hash != "pass_word!"
            })
            .times(1)
            .returning(|user| Ok(user.id));

        let service = AuthService::new(Arc::new(store), Arc::new(notifier), test_policy()).unwrap();

        let result = service.create_user(register_command("alice@example.com")).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_create_user_conflict() {
        let mut store = MockTestCredentialStore::new();
        let notifier = MockTestNotifier::new();

        store
            .expect_create_user()
            .times(1)
            .returning(|user| Err(StoreError::Conflict(user.email.as_str().to_string())));

        let service = AuthService::new(Arc::new(store), Arc::new(notifier), test_policy()).unwrap();

        let result = service.create_user(register_command("alice@example.com")).await;
        assert!(matches!(result, Err(AuthError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_create_user_nothing_inserted() {
        let mut store = MockTestCredentialStore::new();
        let notifier = MockTestNotifier::new();

        store
            .expect_create_user()
            .times(1)
            .returning(|_| Err(StoreError::NotCreated));

        let service = AuthService::new(Arc::new(store), Arc::new(notifier), test_policy()).unwrap();

        let result = service.create_user(register_command("alice@example.com")).await;
        assert!(matches!(result, Err(AuthError::Store(_))));
    }

    #[tokio::test]
    async fn test_login_unknown_email_is_invalid_credentials() {
        let mut store = MockTestCredentialStore::new();
        let notifier = MockTestNotifier::new();

        store
            .expect_find_credentials_by_email()
            .times(1)
            .returning(|_| Err(StoreError::NotFound));
        store.expect_save_refresh_token().times(0);

        let service = AuthService::new(Arc::new(store), Arc::new(notifier), test_policy()).unwrap();

        let result = service
            .login(login_command("ghost@example.com", "whatever", "10.0.0.1"))
            .await;
        assert_eq!(result, Err(AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_login_wrong_password_is_invalid_credentials() {
        let mut store = MockTestCredentialStore::new();
        let notifier = MockTestNotifier::new();
        let password_hash = test_authenticator().hash_password("pass_word!").unwrap();

        store
            .expect_find_credentials_by_email()
            .times(1)
            .returning(move |_| {
                Ok(Credentials {
                    user_id: UserId::new(),
                    password_hash: password_hash.clone(),
                })
            });
        store.expect_save_refresh_token().times(0);

        let service = AuthService::new(Arc::new(store), Arc::new(notifier), test_policy()).unwrap();

        let result = service
            .login(login_command("alice@example.com", "wrong", "10.0.0.1"))
            .await;
        assert_eq!(result, Err(AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_login_malformed_stored_hash_is_internal() {
        let mut store = MockTestCredentialStore::new();
        let notifier = MockTestNotifier::new();

        store
            .expect_find_credentials_by_email()
            .times(1)
            .returning(|_| {
                Ok(Credentials {
                    user_id: UserId::new(),
                    password_hash: "not-a-hash".to_string(),
                })
            });

        let service = AuthService::new(Arc::new(store), Arc::new(notifier), test_policy()).unwrap();

        let result = service
            .login(login_command("alice@example.com", "pass_word!", "10.0.0.1"))
            .await;
        assert!(matches!(result, Err(AuthError::Internal(_))));
    }

    #[tokio::test]
    async fn test_login_store_failure_propagates() {
        let mut store = MockTestCredentialStore::new();
        let notifier = MockTestNotifier::new();
        let password_hash = test_authenticator().hash_password("pass_word!").unwrap();

        store
            .expect_find_credentials_by_email()
            .times(1)
            .returning(move |_| {
                Ok(Credentials {
                    user_id: UserId::new(),
                    password_hash: password_hash.clone(),
                })
            });
        store
            .expect_save_refresh_token()
            .times(1)
            .returning(|_| Err(StoreError::Database("connection reset".to_string())));

        let service = AuthService::new(Arc::new(store), Arc::new(notifier), test_policy()).unwrap();

        let result = service
            .login(login_command("alice@example.com", "pass_word!", "10.0.0.1"))
            .await;
        assert!(matches!(result, Err(AuthError::Store(_))));
    }

    #[tokio::test]
    async fn test_login_losing_concurrent_save_is_store_error() {
        let mut store = MockTestCredentialStore::new();
        let notifier = MockTestNotifier::new();
        let password_hash = test_authenticator().hash_password("pass_word!").unwrap();

        store
            .expect_find_credentials_by_email()
            .times(1)
            .returning(move |_| {
                Ok(Credentials {
                    user_id: UserId::new(),
                    password_hash: password_hash.clone(),
                })
            });
        store
            .expect_save_refresh_token()
            .times(1)
            .returning(|_| Err(StoreError::Conflict("refresh token".to_string())));

        let service = AuthService::new(Arc::new(store), Arc::new(notifier), test_policy()).unwrap();

        let result = service
            .login(login_command("alice@example.com", "pass_word!", "10.0.0.1"))
            .await;
        assert!(matches!(result, Err(AuthError::Store(_))));
    }

    #[tokio::test]
    async fn test_refresh_rotation_conflict_is_store_error() {
        let mut store = MockTestCredentialStore::new();
        let notifier = MockTestNotifier::new();
        let authenticator = test_authenticator();
        let refresh = authenticator.new_refresh_secret().unwrap();
        let claims = Claims::new(
            RefreshTokenId::new(),
            UserId::new(),
            "10.0.0.1",
            Duration::minutes(5),
        );
        let access_token = authenticator.generate_token(&claims).unwrap();

        store
            .expect_get_refresh_token_hash()
            .times(1)
            .returning(move |_| Ok(refresh.hash.clone()));
        store
            .expect_rotate_refresh_token()
            .times(1)
            .returning(|_, _| Err(StoreError::Conflict("refresh token".to_string())));

        let service = AuthService::new(Arc::new(store), Arc::new(notifier), test_policy()).unwrap();

        let result = service
            .refresh_tokens(RefreshCommand {
                access_token,
                refresh_token: refresh.secret,
                client_ip: ip("10.0.0.1"),
            })
            .await;
        assert!(matches!(result, Err(AuthError::Store(_))));
    }

    #[tokio::test]
    async fn test_login_persists_hash_not_secret() {
        let mut store = MockTestCredentialStore::new();
        let notifier = MockTestNotifier::new();
        let authenticator = test_authenticator();
        let password_hash = authenticator.hash_password("pass_word!").unwrap();
        let user_id = UserId::new();
        let saved = Arc::new(std::sync::Mutex::new(None));
        let saved_clone = Arc::clone(&saved);

        store
            .expect_find_credentials_by_email()
            .times(1)
            .returning(move |_| {
                Ok(Credentials {
                    user_id,
                    password_hash: password_hash.clone(),
                })
            });
        store
            .expect_save_refresh_token()
            .withf(move |token| token.user_id == user_id)
            .times(1)
            .returning(move |token| {
                *saved_clone.lock().unwrap() = Some(token);
                Ok(())
            });

        let service = AuthService::new(Arc::new(store), Arc::new(notifier), test_policy()).unwrap();

        let pair = service
            .login(login_command("alice@example.com", "pass_word!", "10.0.0.1"))
            .await
            .unwrap();

        let record = saved.lock().unwrap().clone().unwrap();
        assert_ne!(record.token_hash, pair.refresh_token);
        assert!(authenticator
            .verify_refresh_secret(&pair.refresh_token, &record.token_hash)
            .is_ok());

        let claims = authenticator.validate_token(&pair.access_token).unwrap();
        assert_eq!(claims.refresh_token_id, record.id.to_string());
        assert_eq!(claims.user_id, user_id.to_string());
        assert_eq!(claims.user_ip, "10.0.0.1");
        assert_eq!(claims.exp - claims.iat, 15 * 60);
    }

    #[tokio::test]
    async fn test_refresh_store_failure_is_store_error() {
        let mut store = MockTestCredentialStore::new();
        let notifier = MockTestNotifier::new();
        let claims = Claims::new(
            RefreshTokenId::new(),
            UserId::new(),
            "10.0.0.1",
            Duration::minutes(5),
        );
        let access_token = test_authenticator().generate_token(&claims).unwrap();

        store
            .expect_get_refresh_token_hash()
            .times(1)
            .returning(|_| Err(StoreError::Database("timeout".to_string())));

        let service = AuthService::new(Arc::new(store), Arc::new(notifier), test_policy()).unwrap();

        let result = service
            .refresh_tokens(RefreshCommand {
                access_token,
                refresh_token: "secret".to_string(),
                client_ip: ip("10.0.0.1"),
            })
            .await;
        assert!(matches!(result, Err(AuthError::Store(_))));
    }

    #[tokio::test]
    async fn test_refresh_rejects_claims_with_foreign_ids() {
        let store = MockTestCredentialStore::new();
        let notifier = MockTestNotifier::new();
        let claims = Claims::new("not-a-uuid", UserId::new(), "10.0.0.1", Duration::minutes(5));
        let access_token = test_authenticator().generate_token(&claims).unwrap();

        let service = AuthService::new(Arc::new(store), Arc::new(notifier), test_policy()).unwrap();

        let result = service
            .refresh_tokens(RefreshCommand {
                access_token,
                refresh_token: "secret".to_string(),
                client_ip: ip("10.0.0.1"),
            })
            .await;
        assert_eq!(result, Err(AuthError::InvalidAccessToken));
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let harness = harness(false);
        let (_, pair) = registered_login(&harness, "10.0.0.1").await;

        assert!(!pair.access_token.is_empty());
        assert!(!pair.refresh_token.is_empty());
    }

    #[tokio::test]
    async fn test_login_supersedes_previous_record() {
        let harness = harness(false);
        let (user_id, first) = registered_login(&harness, "10.0.0.1").await;

        let second = harness
            .service
            .login(login_command("alice@example.com", "pass_word!", "10.0.0.1"))
            .await
            .unwrap();

        assert_eq!(harness.store.refresh_tokens_for(&user_id).await.len(), 1);

        let stale = harness.service.refresh_tokens(refresh_command(&first, "10.0.0.1")).await;
        assert_eq!(stale, Err(AuthError::InvalidAccessToken));
        assert!(harness
            .service
            .refresh_tokens(refresh_command(&second, "10.0.0.1"))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_refresh_rotates_and_is_single_use() {
        let harness = harness(false);
        let (user_id, first) = registered_login(&harness, "10.0.0.1").await;

        let second = harness
            .service
            .refresh_tokens(refresh_command(&first, "10.0.0.1"))
            .await
            .expect("first refresh failed");
        assert_ne!(second.refresh_token, first.refresh_token);
        assert_ne!(second.access_token, first.access_token);

        let replay = harness.service.refresh_tokens(refresh_command(&first, "10.0.0.1")).await;
        assert!(matches!(
            replay,
            Err(AuthError::InvalidAccessToken) | Err(AuthError::TokenMismatch)
        ));

        let records = harness.store.refresh_tokens_for(&user_id).await;
        assert_eq!(records.len(), 1);

        let claims = test_authenticator().validate_token(&second.access_token).unwrap();
        assert_eq!(claims.refresh_token_id, records[0].id.to_string());
    }

    #[tokio::test]
    async fn test_refresh_with_wrong_secret_is_token_mismatch() {
        let harness = harness(false);
        let (user_id, pair) = registered_login(&harness, "10.0.0.1").await;

        let result = harness
            .service
            .refresh_tokens(RefreshCommand {
                access_token: pair.access_token.clone(),
                refresh_token: format!("{}x", pair.refresh_token),
                client_ip: ip("10.0.0.1"),
            })
            .await;
        assert_eq!(result, Err(AuthError::TokenMismatch));

        // The live record is untouched, the genuine secret still works.
        assert_eq!(harness.store.refresh_tokens_for(&user_id).await.len(), 1);
        assert!(harness
            .service
            .refresh_tokens(refresh_command(&pair, "10.0.0.1"))
            .await
            .is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_refresh_of_same_pair() {
        let harness = harness(false);
        let (user_id, pair) = registered_login(&harness, "10.0.0.1").await;

        let first = {
            let service = Arc::clone(&harness.service);
            let command = refresh_command(&pair, "10.0.0.1");
            tokio::spawn(async move { service.refresh_tokens(command).await })
        };
        let second = {
            let service = Arc::clone(&harness.service);
            let command = refresh_command(&pair, "10.0.0.1");
            tokio::spawn(async move { service.refresh_tokens(command).await })
        };

        let results = vec![first.await.unwrap(), second.await.unwrap()];
        let winners: Vec<&TokenPair> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
        assert_eq!(winners.len(), 1);

        for result in &results {
            if let Err(e) = result {
                assert!(matches!(
                    e,
                    AuthError::InvalidAccessToken | AuthError::TokenMismatch
                ));
            }
        }

        let records = harness.store.refresh_tokens_for(&user_id).await;
        assert_eq!(records.len(), 1);
        let claims = test_authenticator().validate_token(&winners[0].access_token).unwrap();
        assert_eq!(claims.refresh_token_id, records[0].id.to_string());
    }

    #[tokio::test]
    async fn test_tampered_access_token_is_rejected() {
        let harness = harness(false);
        let (_, pair) = registered_login(&harness, "10.0.0.1").await;

        let signature_start = pair.access_token.rfind('.').unwrap() + 1;
        let mut bytes = pair.access_token.clone().into_bytes();
        bytes[signature_start] = if bytes[signature_start] == b'x' { b'y' } else { b'x' };
        let tampered = TokenPair {
            access_token: String::from_utf8(bytes).unwrap(),
            refresh_token: pair.refresh_token.clone(),
        };

        let result = harness.service.refresh_tokens(refresh_command(&tampered, "10.0.0.1")).await;
        assert_eq!(result, Err(AuthError::InvalidAccessToken));
    }

    #[tokio::test]
    async fn test_expired_access_token_is_rejected() {
        let harness = harness(false);
        let (_, pair) = registered_login(&harness, "10.0.0.1").await;

        // Same record, same secret, but the access token expired an hour ago.
        let authenticator = test_authenticator();
        let live = authenticator.validate_token(&pair.access_token).unwrap();
        let expired_claims = Claims::issued_at(
            &live.refresh_token_id,
            &live.user_id,
            &live.user_ip,
            Utc::now() - Duration::hours(2),
            Duration::hours(1),
        );
        let expired = TokenPair {
            access_token: authenticator.generate_token(&expired_claims).unwrap(),
            refresh_token: pair.refresh_token.clone(),
        };

        let result = harness.service.refresh_tokens(refresh_command(&expired, "10.0.0.1")).await;
        assert_eq!(result, Err(AuthError::InvalidAccessToken));
    }

    #[tokio::test]
    async fn test_origin_change_notifies_and_proceeds() {
        let mut harness = harness(false);
        let (user_id, pair) = registered_login(&harness, "10.0.0.1").await;

        let result = harness
            .service
            .refresh_tokens(refresh_command(&pair, "192.168.1.50"))
            .await;
        let renewed = result.expect("refresh from a new origin must succeed");

        let event = tokio::time::timeout(StdDuration::from_secs(5), harness.notifications.recv())
            .await
            .expect("notification not dispatched")
            .unwrap();
        assert_eq!(event.user_id, user_id.to_string());
        assert_eq!(event.previous_ip, "10.0.0.1");
        assert_eq!(event.current_ip, "192.168.1.50");

        // New access token is bound to the new origin.
        let claims = test_authenticator().validate_token(&renewed.access_token).unwrap();
        assert_eq!(claims.user_ip, "192.168.1.50");
    }

    #[tokio::test]
    async fn test_origin_change_notification_failure_is_swallowed() {
        let mut harness = harness(true);
        let (_, pair) = registered_login(&harness, "10.0.0.1").await;

        let result = harness
            .service
            .refresh_tokens(refresh_command(&pair, "172.16.0.9"))
            .await;
        assert!(result.is_ok());

        let attempted =
            tokio::time::timeout(StdDuration::from_secs(5), harness.notifications.recv())
                .await
                .expect("notification not attempted");
        assert!(attempted.is_some());
    }

    #[tokio::test]
    async fn test_same_origin_does_not_notify() {
        let mut store = MockTestCredentialStore::new();
        let mut notifier = MockTestNotifier::new();
        let authenticator = test_authenticator();
        let refresh = authenticator.new_refresh_secret().unwrap();
        let claims = Claims::new(
            RefreshTokenId::new(),
            UserId::new(),
            "10.0.0.1",
            Duration::minutes(5),
        );
        let access_token = authenticator.generate_token(&claims).unwrap();

        store
            .expect_get_refresh_token_hash()
            .times(1)
            .returning(move |_| Ok(refresh.hash.clone()));
        store
            .expect_rotate_refresh_token()
            .times(1)
            .returning(|_, _| Ok(()));
        notifier.expect_notify_origin_change().times(0);

        let notifier = Arc::new(notifier);
        let service =
            AuthService::new(Arc::new(store), Arc::clone(&notifier), test_policy()).unwrap();

        service
            .refresh_tokens(RefreshCommand {
                access_token,
                refresh_token: refresh.secret,
                client_ip: ip("10.0.0.1"),
            })
            .await
            .unwrap();

        // A dispatched notice would still hold its own handle to the notifier.
        assert_eq!(Arc::strong_count(&notifier), 2);
    }
}
