use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;

use crate::error::BusError;

/// Framed, keyed message bound for a topic
#[derive(Debug, Clone, PartialEq)]
pub struct BusMessage {
    pub topic: String,
    pub key: String,
    pub payload: Bytes,
    /// Carried through to the delivery report so outcomes can be matched to records
    pub correlation_id: Option<String>,
}

impl BusMessage {
    pub fn new(topic: impl Into<String>, key: impl Into<String>, payload: Bytes) -> Self {
        Self {
            topic: topic.into(),
            key: key.into(),
            payload,
            correlation_id: None,
        }
    }

    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeliveryOutcome {
    Delivered { partition: i32, offset: i64 },
    Failed(String),
}

/// Asynchronous per-message acknowledgment from the broker
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryReport {
    pub topic: String,
    pub key: Option<String>,
    pub correlation_id: Option<String>,
    pub outcome: DeliveryOutcome,
}

impl DeliveryReport {
    pub fn is_delivered(&self) -> bool {
        matches!(self.outcome, DeliveryOutcome::Delivered { .. })
    }
}

/// Invoked once per message, possibly from a bus-owned background thread
pub type DeliveryCallback = Arc<dyn Fn(&DeliveryReport) + Send + Sync>;

/// Bus abstraction for keyed, partitioned publishing
#[async_trait]
pub trait Bus: Send + Sync {
    /// Enqueue into the local send buffer without waiting for the broker.
    /// Fails with `BusError::QueueFull` when the buffer is saturated.
    fn send(&self, msg: BusMessage) -> Result<(), BusError>;

    /// Wait until every enqueued message has a delivery outcome or `timeout` elapses
    async fn flush(&self, timeout: Duration) -> Result<(), BusError>;

    /// Messages enqueued but not yet acknowledged
    fn in_flight(&self) -> usize;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bus_message_creation() {
        let msg = BusMessage::new("stocks", "AAPL", Bytes::from_static(b"\x00\x00\x00\x00\x01"))
            .with_correlation_id("evt-1");

        assert_eq!(msg.topic, "stocks");
        assert_eq!(msg.key, "AAPL");
        assert_eq!(msg.correlation_id.as_deref(), Some("evt-1"));
    }

    #[test]
    fn test_delivery_report_status() {
        let report = DeliveryReport {
            topic: "stocks".to_string(),
            key: Some("AAPL".to_string()),
            correlation_id: None,
            outcome: DeliveryOutcome::Delivered {
                partition: 0,
                offset: 42,
            },
        };
        assert!(report.is_delivered());

        let failed = DeliveryReport {
            outcome: DeliveryOutcome::Failed("broker down".to_string()),
            ..report
        };
        assert!(!failed.is_delivered());
    }
}
