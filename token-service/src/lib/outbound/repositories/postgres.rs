use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::Row;

use crate::domain::credentials::models::Credentials;
use crate::domain::credentials::models::RefreshToken;
use crate::domain::credentials::models::RefreshTokenId;
use crate::domain::credentials::models::User;
use crate::domain::credentials::models::UserId;
use crate::domain::credentials::ports::CredentialStore;
use crate::credentials::errors::StoreError;

pub struct PostgresCredentialStore {
    pool: PgPool,
}

impl PostgresCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn database_error(e: sqlx::Error) -> StoreError {
    StoreError::Database(e.to_string())
}

/// Map a unique violation on `constraint` to `Conflict(what)`.
fn conflict_or_database(e: sqlx::Error, constraint: &str, what: &str) -> StoreError {
    if let Some(db_err) = e.as_database_error() {
        if db_err.is_unique_violation() && db_err.constraint() == Some(constraint) {
            return StoreError::Conflict(what.to_string());
        }
    }
    database_error(e)
}

#[async_trait]
impl CredentialStore for PostgresCredentialStore {
    async fn create_user(&self, user: User) -> Result<UserId, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO users (id, username, email, password_hash, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(user.id.0)
        .bind(user.username.as_str())
        .bind(user.email.as_str())
        .bind(&user.password_hash)
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let Some(db_err) = e.as_database_error() {
                if db_err.is_unique_violation() {
                    if db_err.constraint() == Some("users_username_key") {
                        return StoreError::Conflict(user.username.as_str().to_string());
                    }
                    if db_err.constraint() == Some("users_email_key") {
                        return StoreError::Conflict(user.email.as_str().to_string());
                    }
                }
            }
            database_error(e)
        })?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotCreated);
        }

        Ok(user.id)
    }

    async fn find_credentials_by_email(&self, email: &str) -> Result<Credentials, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, password_hash
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(database_error)?
        .ok_or(StoreError::NotFound)?;

        Ok(Credentials {
            user_id: UserId(row.try_get("id").map_err(database_error)?),
            password_hash: row.try_get("password_hash").map_err(database_error)?,
        })
    }

    async fn save_refresh_token(&self, token: RefreshToken) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(database_error)?;

        sqlx::query("DELETE FROM refresh_tokens WHERE user_id = $1")
            .bind(token.user_id.0)
            .execute(&mut *tx)
            .await
            .map_err(database_error)?;

        insert_refresh_token(&mut tx, &token).await?;

        tx.commit().await.map_err(database_error)?;

        tracing::debug!(
            user_id = %token.user_id,
            refresh_token_id = %token.id,
            "Refresh token saved"
        );

        Ok(())
    }

    async fn rotate_refresh_token(
        &self,
        previous: &RefreshTokenId,
        token: RefreshToken,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(database_error)?;

        // Row lock on `previous` serializes concurrent rotations; the loser
        // sees zero rows once the winner commits.
        let consumed = sqlx::query("DELETE FROM refresh_tokens WHERE id = $1 AND user_id = $2")
            .bind(previous.0)
            .bind(token.user_id.0)
            .execute(&mut *tx)
            .await
            .map_err(database_error)?;

        if consumed.rows_affected() == 0 {
            tx.rollback().await.map_err(database_error)?;
            return Err(StoreError::NotFound);
        }

        insert_refresh_token(&mut tx, &token).await?;

        tx.commit().await.map_err(database_error)?;

        tracing::debug!(
            user_id = %token.user_id,
            previous_id = %previous,
            refresh_token_id = %token.id,
            "Refresh token rotated"
        );

        Ok(())
    }

    async fn get_refresh_token_hash(&self, id: &RefreshTokenId) -> Result<String, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT token_hash
            FROM refresh_tokens
            WHERE id = $1 AND expires_at > NOW()
            "#,
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(database_error)?
        .ok_or(StoreError::NotFound)?;

        row.try_get("token_hash").map_err(database_error)
    }
}

async fn insert_refresh_token(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    token: &RefreshToken,
) -> Result<(), StoreError> {
    let result = sqlx::query(
        r#"
        INSERT INTO refresh_tokens (id, user_id, token_hash, expires_at)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(token.id.0)
    .bind(token.user_id.0)
    .bind(&token.token_hash)
    .bind(token.expires_at)
    .execute(&mut **tx)
    .await
    .map_err(|e| conflict_or_database(e, "refresh_tokens_user_id_key", "refresh token"))?;

    if result.rows_affected() == 0 {
        return Err(StoreError::NotCreated);
    }

    Ok(())
}
