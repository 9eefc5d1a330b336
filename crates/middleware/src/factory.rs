use std::str::FromStr;
use std::sync::Arc;

use crate::bus::{Bus, DeliveryCallback};
use crate::error::BusError;
use crate::kafka::{KafkaBus, KafkaConfig};
use crate::memory::InMemoryBus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BusType {
    #[default]
    Kafka,
    Memory,
}

impl FromStr for BusType {
    type Err = FactoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "kafka" => Ok(BusType::Kafka),
            "memory" => Ok(BusType::Memory),
            other => Err(FactoryError::UnsupportedBus(other.to_string())),
        }
    }
}

/// Error creating middleware
#[derive(Debug, thiserror::Error)]
pub enum FactoryError {
    #[error("unsupported bus type: {0}")]
    UnsupportedBus(String),
    #[error("bus error: {0}")]
    Bus(#[from] BusError),
}

/// Factory for creating the bus client selected by configuration
pub struct BusFactory;

impl BusFactory {
    pub fn create(
        bus_type: BusType,
        kafka: &KafkaConfig,
        on_delivery: DeliveryCallback,
    ) -> Result<Arc<dyn Bus>, FactoryError> {
        match bus_type {
            BusType::Kafka => Ok(Arc::new(KafkaBus::connect(kafka, on_delivery)?)),
            BusType::Memory => Ok(Arc::new(
                InMemoryBus::with_capacity(kafka.queue_buffering_max_messages)
                    .with_delivery_callback(on_delivery),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::DeliveryReport;

    #[test]
    fn test_parse_bus_type() {
        assert_eq!("kafka".parse::<BusType>().unwrap(), BusType::Kafka);
        assert_eq!(" Memory ".parse::<BusType>().unwrap(), BusType::Memory);
        assert!(matches!(
            "nats".parse::<BusType>(),
            Err(FactoryError::UnsupportedBus(_))
        ));
    }

    #[test]
    fn test_create_memory_bus() {
        let config = KafkaConfig::new("localhost:9092");
        let bus = BusFactory::create(BusType::Memory, &config, Arc::new(|_: &DeliveryReport| {})).unwrap();
        assert_eq!(bus.in_flight(), 0);
    }
}
