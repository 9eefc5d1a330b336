use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use rdkafka::message::Message;
use rdkafka::producer::{BaseRecord, DeliveryResult, Producer, ProducerContext, ThreadedProducer};
use rdkafka::util::Timeout;
use rdkafka::ClientContext;
use tracing::info;

use crate::bus::{Bus, BusMessage, DeliveryCallback, DeliveryOutcome, DeliveryReport};
use crate::error::BusError;
use crate::kafka::config::KafkaConfig;

/// Per-message opaque handed to librdkafka and returned in the delivery report
struct DeliveryTag {
    correlation_id: Option<String>,
}

/// Producer context that turns librdkafka delivery reports into `DeliveryReport`s
struct DeliveryContext {
    on_delivery: DeliveryCallback,
}

impl ClientContext for DeliveryContext {}

impl ProducerContext for DeliveryContext {
    type DeliveryOpaque = Box<DeliveryTag>;

    fn delivery(&self, result: &DeliveryResult<'_>, tag: Self::DeliveryOpaque) {
        let report = match result {
            Ok(msg) => DeliveryReport {
                topic: msg.topic().to_string(),
                key: msg.key().map(|k| String::from_utf8_lossy(k).into_owned()),
                correlation_id: tag.correlation_id,
                outcome: DeliveryOutcome::Delivered {
                    partition: msg.partition(),
                    offset: msg.offset(),
                },
            },
            Err((err, msg)) => DeliveryReport {
                topic: msg.topic().to_string(),
                key: msg.key().map(|k| String::from_utf8_lossy(k).into_owned()),
                correlation_id: tag.correlation_id,
                outcome: DeliveryOutcome::Failed(err.to_string()),
            },
        };
        (self.on_delivery)(&report);
    }
}

/// Kafka bus using a `ThreadedProducer` (librdkafka polls on its own thread)
pub struct KafkaBus {
    producer: Arc<ThreadedProducer<DeliveryContext>>,
}

impl KafkaBus {
    pub fn connect(config: &KafkaConfig, on_delivery: DeliveryCallback) -> Result<Self, BusError> {
        let producer: ThreadedProducer<DeliveryContext> = config
            .client_config()
            .create_with_context(DeliveryContext { on_delivery })
            .map_err(|e| BusError::ConnectionFailed(e.to_string()))?;

        info!(
            bootstrap_servers = %config.bootstrap_servers,
            security_protocol = %config.security_protocol,
            client_id = %config.client_id,
            "Kafka producer created"
        );

        Ok(Self {
            producer: Arc::new(producer),
        })
    }
}

#[async_trait]
impl Bus for KafkaBus {
    fn send(&self, msg: BusMessage) -> Result<(), BusError> {
        let tag = Box::new(DeliveryTag {
            correlation_id: msg.correlation_id.clone(),
        });
        let record = BaseRecord::with_opaque_to(&msg.topic, tag)
            .key(msg.key.as_str())
            .payload(msg.payload.as_ref());

        self.producer.send(record).map_err(|(err, _)| match err {
            KafkaError::MessageProduction(RDKafkaErrorCode::QueueFull) => BusError::QueueFull,
            other => BusError::PublishFailed(other.to_string()),
        })
    }

    async fn flush(&self, timeout: Duration) -> Result<(), BusError> {
        let producer = Arc::clone(&self.producer);
        let result = tokio::task::spawn_blocking(move || producer.flush(Timeout::After(timeout)))
            .await
            .map_err(|e| BusError::FlushFailed(e.to_string()))?;

        match result {
            Ok(()) => Ok(()),
            Err(KafkaError::Flush(RDKafkaErrorCode::OperationTimedOut)) => {
                Err(BusError::FlushTimeout {
                    in_flight: self.in_flight(),
                })
            }
            Err(e) => Err(BusError::FlushFailed(e.to_string())),
        }
    }

    fn in_flight(&self) -> usize {
        self.producer.in_flight_count().max(0) as usize
    }
}
