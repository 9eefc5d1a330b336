//! In-memory implementations for testing
pub mod bus;

pub use bus::InMemoryBus;
