use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use crate::domain::credentials::models::Credentials;
use crate::domain::credentials::models::RefreshToken;
use crate::domain::credentials::models::RefreshTokenId;
use crate::domain::credentials::models::User;
use crate::domain::credentials::models::UserId;
use crate::domain::credentials::ports::CredentialStore;
use crate::credentials::errors::StoreError;

#[derive(Default)]
struct State {
    users: HashMap<UserId, User>,
    refresh_tokens: HashMap<RefreshTokenId, RefreshToken>,
}

/// Process-local credential store.
///
/// Every operation runs under a single lock, so each one is atomic with
/// respect to every other. Contents are lost on restart.
#[derive(Default)]
pub struct InMemoryCredentialStore {
    state: Mutex<State>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All refresh-token records currently held for `user_id`, live or expired.
    pub async fn refresh_tokens_for(&self, user_id: &UserId) -> Vec<RefreshToken> {
        let state = self.state.lock().await;
        state
            .refresh_tokens
            .values()
            .filter(|token| token.user_id == *user_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn create_user(&self, user: User) -> Result<UserId, StoreError> {
        let mut state = self.state.lock().await;

        if state.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Conflict(user.email.as_str().to_string()));
        }
        if state.users.values().any(|u| u.username == user.username) {
            return Err(StoreError::Conflict(user.username.as_str().to_string()));
        }

        let id = user.id;
        state.users.insert(id, user);

        Ok(id)
    }

    async fn find_credentials_by_email(&self, email: &str) -> Result<Credentials, StoreError> {
        let state = self.state.lock().await;

        state
            .users
            .values()
            .find(|u| u.email.as_str() == email)
            .map(|u| Credentials {
                user_id: u.id,
                password_hash: u.password_hash.clone(),
            })
            .ok_or(StoreError::NotFound)
    }

    async fn save_refresh_token(&self, token: RefreshToken) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;

        state
            .refresh_tokens
            .retain(|_, existing| existing.user_id != token.user_id);
        state.refresh_tokens.insert(token.id, token);

        Ok(())
    }

    async fn rotate_refresh_token(
        &self,
        previous: &RefreshTokenId,
        token: RefreshToken,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;

        match state.refresh_tokens.get(previous) {
            Some(existing) if existing.user_id == token.user_id => {}
            _ => return Err(StoreError::NotFound),
        }

        state.refresh_tokens.remove(previous);
        state.refresh_tokens.insert(token.id, token);

        Ok(())
    }

    async fn get_refresh_token_hash(&self, id: &RefreshTokenId) -> Result<String, StoreError> {
        let state = self.state.lock().await;

        state
            .refresh_tokens
            .get(id)
            .filter(|token| !token.is_expired(Utc::now()))
            .map(|token| token.token_hash.clone())
            .ok_or(StoreError::NotFound)
    }
}
