//! quoteflow-middleware: Message bus abstraction
//!
//! Provides the `Bus` trait with a Kafka implementation for production and an
//! in-memory implementation for tests and dry runs.

pub mod bus;
pub mod error;
pub mod factory;
pub mod kafka;
pub mod latency;
pub mod memory;

pub use bus::{Bus, BusMessage, DeliveryCallback, DeliveryOutcome, DeliveryReport};
pub use error::BusError;
pub use factory::{BusFactory, BusType, FactoryError};
pub use kafka::{KafkaBus, KafkaConfig};
pub use latency::{elapsed, now_tsc, CLOCK};
pub use memory::InMemoryBus;
