use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::bus::{Bus, BusMessage, DeliveryCallback, DeliveryOutcome, DeliveryReport};
use crate::error::BusError;

const DEFAULT_CAPACITY: usize = 1024;

/// A message that received a (simulated) broker acknowledgment
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveredMessage {
    pub message: BusMessage,
    pub partition: i32,
    pub offset: i64,
}

/// In-memory bus. Messages sit in a bounded pending queue until `flush`,
/// which acknowledges them in send order and fires the delivery callback.
pub struct InMemoryBus {
    capacity: usize,
    partitions: i32,
    pending: Mutex<VecDeque<BusMessage>>,
    delivered: Mutex<Vec<DeliveredMessage>>,
    offsets: DashMap<(String, i32), i64>,
    fail_deliveries: AtomicBool,
    on_delivery: Option<DeliveryCallback>,
}

impl InMemoryBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Bus whose pending queue rejects sends beyond `capacity`
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            partitions: 1,
            pending: Mutex::new(VecDeque::new()),
            delivered: Mutex::new(Vec::new()),
            offsets: DashMap::new(),
            fail_deliveries: AtomicBool::new(false),
            on_delivery: None,
        }
    }

    pub fn with_partitions(mut self, partitions: i32) -> Self {
        self.partitions = partitions.max(1);
        self
    }

    pub fn with_delivery_callback(mut self, on_delivery: DeliveryCallback) -> Self {
        self.on_delivery = Some(on_delivery);
        self
    }

    /// Make subsequent flushes report broker failures instead of acknowledgments
    pub fn set_fail_deliveries(&self, fail: bool) {
        self.fail_deliveries.store(fail, Ordering::SeqCst);
    }

    /// Acknowledged messages, in delivery order
    pub fn delivered(&self) -> Vec<DeliveredMessage> {
        self.delivered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Acknowledged messages for one topic
    pub fn messages(&self, topic: &str) -> Vec<BusMessage> {
        self.delivered()
            .into_iter()
            .filter(|d| d.message.topic == topic)
            .map(|d| d.message)
            .collect()
    }

    pub fn pending_count(&self) -> usize {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn partition_for(&self, key: &str) -> i32 {
        // FNV-1a keeps key -> partition stable across runs
        let mut hash: u32 = 0x811c_9dc5;
        for byte in key.as_bytes() {
            hash ^= u32::from(*byte);
            hash = hash.wrapping_mul(0x0100_0193);
        }
        (hash % self.partitions as u32) as i32
    }

    fn next_offset(&self, topic: &str, partition: i32) -> i64 {
        let mut entry = self.offsets.entry((topic.to_string(), partition)).or_insert(0);
        let offset = *entry;
        *entry += 1;
        offset
    }

    fn report(&self, report: DeliveryReport) {
        if let Some(ref on_delivery) = self.on_delivery {
            on_delivery(&report);
        }
    }
}

impl Default for InMemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Bus for InMemoryBus {
    fn send(&self, msg: BusMessage) -> Result<(), BusError> {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if pending.len() >= self.capacity {
            return Err(BusError::QueueFull);
        }
        pending.push_back(msg);
        Ok(())
    }

    async fn flush(&self, _timeout: Duration) -> Result<(), BusError> {
        let drained: Vec<BusMessage> = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();

        let fail = self.fail_deliveries.load(Ordering::SeqCst);
        for message in drained {
            let mut report = DeliveryReport {
                topic: message.topic.clone(),
                key: Some(message.key.clone()),
                correlation_id: message.correlation_id.clone(),
                outcome: DeliveryOutcome::Failed("simulated broker failure".to_string()),
            };

            if !fail {
                let partition = self.partition_for(&message.key);
                let offset = self.next_offset(&message.topic, partition);
                report.outcome = DeliveryOutcome::Delivered { partition, offset };
                self.delivered
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(DeliveredMessage {
                        message,
                        partition,
                        offset,
                    });
            }

            self.report(report);
        }
        Ok(())
    }

    fn in_flight(&self) -> usize {
        self.pending_count()
    }
}
