//! Publisher for sending framed records to the bus
//!
//! Enqueueing never waits on the broker. Acknowledgments arrive through the
//! delivery callback; flushing is governed by a `FlushPolicy`.

use std::sync::Arc;
use std::time::Duration;

use quoteflow_middleware::{Bus, BusError, BusMessage, DeliveryCallback, DeliveryOutcome, DeliveryReport};
use tokio::time::Instant;
use tracing::{debug, error, warn};

use crate::metrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlushPolicy {
    /// Flush after every record
    #[default]
    PerRecord,
    /// Flush at most once per interval
    Interval(Duration),
}

/// Delivery callback that logs each outcome and updates the deliveries counter
pub fn delivery_logger() -> DeliveryCallback {
    Arc::new(|report: &DeliveryReport| {
        metrics::inc_delivery(report.is_delivered());
        match report.outcome {
            DeliveryOutcome::Delivered { partition, offset } => {
                debug!(
                    topic = %report.topic,
                    key = ?report.key,
                    event_id = ?report.correlation_id,
                    partition,
                    offset,
                    "Record delivered"
                );
            }
            DeliveryOutcome::Failed(ref reason) => {
                error!(
                    topic = %report.topic,
                    key = ?report.key,
                    event_id = ?report.correlation_id,
                    error = %reason,
                    "Record delivery failed"
                );
            }
        }
    })
}

pub struct Publisher {
    bus: Arc<dyn Bus>,
    policy: FlushPolicy,
    flush_timeout: Duration,
    last_flush: Instant,
}

impl Publisher {
    pub fn new(bus: Arc<dyn Bus>, policy: FlushPolicy, flush_timeout: Duration) -> Self {
        Self {
            bus,
            policy,
            flush_timeout,
            last_flush: Instant::now(),
        }
    }

    pub fn policy(&self) -> FlushPolicy {
        self.policy
    }

    /// Enqueue `msg`, then flush if the policy says so. Only enqueue failures
    /// are returned; flush problems are logged.
    pub async fn publish(&mut self, msg: BusMessage) -> Result<(), BusError> {
        let topic = msg.topic.clone();
        self.bus.send(msg)?;
        metrics::inc_published(&topic);

        let due = match self.policy {
            FlushPolicy::PerRecord => true,
            FlushPolicy::Interval(interval) => self.last_flush.elapsed() >= interval,
        };
        if due {
            if let Err(e) = self.flush().await {
                warn!(error = %e, topic = %topic, "Flush did not complete");
            }
        }
        Ok(())
    }

    /// Block until buffered records are acknowledged or the flush timeout elapses
    pub async fn flush(&mut self) -> Result<(), BusError> {
        self.last_flush = Instant::now();
        self.bus.flush(self.flush_timeout).await
    }

    pub fn in_flight(&self) -> usize {
        self.bus.in_flight()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use quoteflow_middleware::InMemoryBus;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn message(key: &str) -> BusMessage {
        BusMessage::new("stocks", key, Bytes::from_static(b"\x00\x00\x00\x00\x07"))
    }

    #[tokio::test]
    async fn test_per_record_flushes_every_publish() {
        let bus = Arc::new(InMemoryBus::new());
        let mut publisher = Publisher::new(bus.clone(), FlushPolicy::PerRecord, Duration::from_secs(1));

        publisher.publish(message("AAPL")).await.unwrap();
        assert_eq!(bus.messages("stocks").len(), 1);
        assert_eq!(bus.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_policy_defers_flush() {
        let bus = Arc::new(InMemoryBus::new());
        let mut publisher = Publisher::new(
            bus.clone(),
            FlushPolicy::Interval(Duration::from_millis(100)),
            Duration::from_secs(1),
        );

        publisher.publish(message("AAPL")).await.unwrap();
        publisher.publish(message("MSFT")).await.unwrap();
        assert_eq!(bus.pending_count(), 2);
        assert!(bus.messages("stocks").is_empty());

        tokio::time::advance(Duration::from_millis(150)).await;
        publisher.publish(message("GOOG")).await.unwrap();
        assert_eq!(bus.pending_count(), 0);

        let keys: Vec<String> = bus.messages("stocks").into_iter().map(|m| m.key).collect();
        assert_eq!(keys, vec!["AAPL", "MSFT", "GOOG"]);
    }

    #[tokio::test]
    async fn test_queue_full_is_returned() {
        let bus = Arc::new(InMemoryBus::with_capacity(1));
        let mut publisher = Publisher::new(
            bus.clone(),
            FlushPolicy::Interval(Duration::from_secs(60)),
            Duration::from_secs(1),
        );

        publisher.publish(message("AAPL")).await.unwrap();
        let err = publisher.publish(message("MSFT")).await.unwrap_err();
        assert!(matches!(err, BusError::QueueFull));

        publisher.flush().await.unwrap();
        assert_eq!(bus.messages("stocks").len(), 1);
    }

    #[tokio::test]
    async fn test_delivery_callback_sees_failures() {
        let failures = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&failures);
        let logger = delivery_logger();
        let callback: DeliveryCallback = Arc::new(move |report: &DeliveryReport| {
            logger(report);
            if !report.is_delivered() {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        let bus = Arc::new(InMemoryBus::new().with_delivery_callback(callback));
        bus.set_fail_deliveries(true);
        let mut publisher = Publisher::new(bus.clone(), FlushPolicy::PerRecord, Duration::from_secs(1));

        publisher.publish(message("AAPL")).await.unwrap();
        assert_eq!(failures.load(Ordering::SeqCst), 1);
        assert!(bus.messages("stocks").is_empty());
    }
}
