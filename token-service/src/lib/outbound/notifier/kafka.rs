use std::time::Duration;

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::producer::FutureProducer;
use rdkafka::producer::FutureRecord;
use rdkafka::util::Timeout;

use crate::config::NotifierConfig;
use crate::credentials::errors::NotifierError;
use crate::domain::credentials::events::OriginChangedEvent;
use crate::domain::credentials::ports::Notifier;
use crate::outbound::notifier::messages::SecurityEventMessage;

/// Publishes origin-change notices to a Kafka topic, keyed by user id.
pub struct KafkaNotifier {
    producer: FutureProducer,
    topic: String,
    timeout: Duration,
}

impl KafkaNotifier {
    /// Create a new Kafka notifier with "at least once" delivery semantics
    ///
    /// # Notes:
    /// - `acks=all`: Wait for all in-sync replicas to acknowledge
    /// - `enable.idempotence=true`: Prevents duplicate messages during retries
    pub fn new(config: &NotifierConfig) -> Result<Self, anyhow::Error> {
        tracing::info!(
            brokers = %config.brokers,
            topic = %config.topic,
            "Initializing Kafka notifier"
        );

        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("message.timeout.ms", "10000")
            .set("enable.idempotence", "true")
            .set("acks", "all")
            .set("retries", "5")
            .set("retry.backoff.ms", "100")
            .create()?;

        Ok(Self {
            producer,
            topic: config.topic.clone(),
            timeout: Duration::from_secs(10),
        })
    }
}

#[async_trait]
impl Notifier for KafkaNotifier {
    async fn notify_origin_change(&self, event: &OriginChangedEvent) -> Result<(), NotifierError> {
        let message = SecurityEventMessage::from(event);
        let payload = serde_json::to_string(&message)
            .map_err(|e| NotifierError::SerializationFailed(e.to_string()))?;

        let record = FutureRecord::to(&self.topic)
            .key(&event.user_id)
            .payload(&payload);

        self.producer
            .send(record, Timeout::After(self.timeout))
            .await
            .map(|_| {
                tracing::debug!(
                    topic = %self.topic,
                    user_id = %event.user_id,
                    event_id = %event.event_id,
                    "Origin change notice published"
                );
            })
            .map_err(|(err, _)| NotifierError::DeliveryFailed(err.to_string()))
    }
}
