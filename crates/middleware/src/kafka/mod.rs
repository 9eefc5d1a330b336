//! Kafka bus backed by librdkafka
//!
//! Delivery reports arrive on the producer's polling thread and are forwarded
//! to the registered `DeliveryCallback`.

mod bus;
mod config;

pub use bus::KafkaBus;
pub use config::{KafkaConfig, DEFAULT_CLIENT_ID, DEFAULT_QUEUE_BUFFERING_MAX_MESSAGES};
