#[cfg(feature = "kafka")]
pub mod kafka;
pub mod log;
#[cfg(feature = "kafka")]
pub mod messages;

#[cfg(feature = "kafka")]
pub use kafka::KafkaNotifier;
pub use log::LogNotifier;
