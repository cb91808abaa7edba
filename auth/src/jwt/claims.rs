use chrono::DateTime;
use chrono::Duration;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

/// Access token claims.
///
/// Binds the token to the refresh-token record it was issued with
/// (`refresh_token_id`) and to the client address seen at issuance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    /// Identifier of the refresh-token record issued alongside this token
    pub refresh_token_id: String,

    /// Subject user identifier
    pub user_id: String,

    /// Client IP at issuance time (opaque comparison key)
    pub user_ip: String,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Issued at (Unix timestamp)
    pub iat: i64,
}

impl Claims {
    /// Create claims issued now and expiring after `ttl`.
    pub fn new(
        refresh_token_id: impl ToString,
        user_id: impl ToString,
        user_ip: impl ToString,
        ttl: Duration,
    ) -> Self {
        Self::issued_at(refresh_token_id, user_id, user_ip, Utc::now(), ttl)
    }

    /// Create claims with an explicit issuance instant.
    pub fn issued_at(
        refresh_token_id: impl ToString,
        user_id: impl ToString,
        user_ip: impl ToString,
        issued_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        Self {
            refresh_token_id: refresh_token_id.to_string(),
            user_id: user_id.to_string(),
            user_ip: user_ip.to_string(),
            exp: (issued_at + ttl).timestamp(),
            iat: issued_at.timestamp(),
        }
    }

    /// Check if token is expired.
    pub fn is_expired(&self, current_timestamp: i64) -> bool {
        self.exp < current_timestamp
    }
}
