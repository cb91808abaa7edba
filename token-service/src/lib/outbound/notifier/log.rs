use async_trait::async_trait;

use crate::credentials::errors::NotifierError;
use crate::domain::credentials::events::OriginChangedEvent;
use crate::domain::credentials::ports::Notifier;

/// Notifier that records origin changes in the service log.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

impl LogNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify_origin_change(&self, event: &OriginChangedEvent) -> Result<(), NotifierError> {
        tracing::warn!(
            event_id = %event.event_id,
            user_id = %event.user_id,
            previous_ip = %event.previous_ip,
            current_ip = %event.current_ip,
            detected_at = %event.detected_at,
            "Refresh from a new network origin"
        );

        Ok(())
    }
}
