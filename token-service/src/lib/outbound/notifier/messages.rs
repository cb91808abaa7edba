use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

use crate::domain::credentials::events::OriginChangedEvent;

/// Serializable envelope for security notices.
///
/// Infrastructure representation of `OriginChangedEvent` for the message bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum SecurityEventMessage {
    OriginChanged(OriginChangedMessage),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OriginChangedMessage {
    pub event_id: String,
    pub user_id: String,
    pub previous_ip: String,
    pub current_ip: String,
    pub detected_at: DateTime<Utc>,
}

impl From<&OriginChangedEvent> for SecurityEventMessage {
    fn from(event: &OriginChangedEvent) -> Self {
        SecurityEventMessage::OriginChanged(OriginChangedMessage {
            event_id: event.event_id.clone(),
            user_id: event.user_id.clone(),
            previous_ip: event.previous_ip.clone(),
            current_ip: event.current_ip.clone(),
            detected_at: event.detected_at,
        })
    }
}
