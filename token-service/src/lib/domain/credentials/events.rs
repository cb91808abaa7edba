use chrono::DateTime;
use chrono::Utc;
use uuid::Uuid;

use crate::domain::credentials::models::ClientIp;

/// Domain event raised when a refresh arrives from a different network
/// origin than the one the access token was issued to.
///
/// Advisory only: the refresh proceeds regardless.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginChangedEvent {
    pub event_id: String,
    pub user_id: String,
    pub previous_ip: String,
    pub current_ip: String,
    pub detected_at: DateTime<Utc>,
}

impl OriginChangedEvent {
    /// Create a new OriginChanged event.
    ///
    /// # Arguments
    /// * `user_id` - User the refreshed token belongs to
    /// * `previous_ip` - Origin recorded in the access token
    /// * `current_ip` - Origin of the refresh request
    pub fn new(user_id: impl ToString, previous_ip: impl ToString, current_ip: &ClientIp) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            previous_ip: previous_ip.to_string(),
            current_ip: current_ip.to_string(),
            detected_at: Utc::now(),
        }
    }
}
