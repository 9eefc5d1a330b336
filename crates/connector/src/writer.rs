//! Per-record pipeline: classify, filter, enrich, encode, publish

use async_trait::async_trait;
use quoteflow_middleware::{elapsed, BusMessage};
use serde_json::Value;
use tracing::{debug, info};

use crate::classifier::Classifier;
use crate::encoder::{filter, SchemaEncoder};
use crate::enricher::{Enricher, EVENT_ID_FIELD};
use crate::error::PipelineError;
use crate::message::Message;
use crate::metrics;
use crate::publisher::Publisher;
use crate::traits::Writer;

pub struct PipelineWriter {
    classifier: Classifier,
    enricher: Enricher,
    publisher: Publisher,
}

impl PipelineWriter {
    pub fn new(classifier: Classifier, enricher: Enricher, publisher: Publisher) -> Self {
        Self {
            classifier,
            enricher,
            publisher,
        }
    }
}

#[async_trait]
impl Writer for PipelineWriter {
    async fn write(&mut self, msg: &Message) -> Result<(), PipelineError> {
        let record = msg
            .record
            .as_object()
            .ok_or_else(|| PipelineError::MalformedRecord("record is not an object".to_string()))?;
        let id = record
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| PipelineError::MalformedRecord("record has no string id".to_string()))?;

        let (asset_class, binding) = self.classifier.route(id)?;

        let enriched = self.enricher.enrich(id, filter(record, &binding.field_names));
        let payload = SchemaEncoder::encode(&enriched, binding)?;

        let mut bus_msg = BusMessage::new(binding.topic.as_str(), id, payload);
        if let Some(event_id) = enriched.get(EVENT_ID_FIELD).and_then(Value::as_str) {
            bus_msg = bus_msg.with_correlation_id(event_id);
        }
        let topic = binding.topic.clone();

        self.publisher.publish(bus_msg).await?;

        metrics::observe_pipeline_duration(&topic, elapsed(msg.tsc).as_secs_f64());
        debug!(id = %id, asset_class = %asset_class, topic = %topic, "Record published");
        Ok(())
    }

    async fn close(&mut self) -> Result<(), PipelineError> {
        info!(in_flight = self.publisher.in_flight(), "Flushing publisher");
        self.publisher.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::binding::tests::stocks_binding;
    use crate::binding::TopicBindings;
    use crate::encoder::unframe;
    use crate::publisher::FlushPolicy;
    use chrono::{TimeZone, Utc};
    use quoteflow_metadata::InstrumentRegistry;
    use quoteflow_middleware::InMemoryBus;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    pub(crate) fn pipeline(bus: Arc<InMemoryBus>) -> PipelineWriter {
        let instruments = InstrumentRegistry::from_json_str(
            r#"{"AAPL": {"type": "stocks"}, "BTC-USD": {"type": "crypto"}}"#,
        )
        .unwrap();
        let classifier = Classifier::new(
            Arc::new(instruments),
            Arc::new(TopicBindings::from_bindings([stocks_binding()])),
        );
        let enricher = Enricher::with_clock(Arc::new(|| {
            Utc.timestamp_opt(1_700_000_000, 0).single().unwrap()
        }));
        let publisher = Publisher::new(bus, FlushPolicy::PerRecord, Duration::from_secs(1));
        PipelineWriter::new(classifier, enricher, publisher)
    }

    #[tokio::test]
    async fn test_aapl_record_is_published_to_stocks() {
        let bus = Arc::new(InMemoryBus::new());
        let mut writer = pipeline(bus.clone());

        let msg = Message::new(
            "yahoo",
            json!({"id": "AAPL", "price": 189.95, "marketHours": 1, "dayVolume": 1000}),
        );
        writer.write(&msg).await.unwrap();

        let published = bus.messages("stocks");
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].key, "AAPL");
        assert_eq!(
            published[0].correlation_id.as_deref(),
            Some("39e6bd7a-909e-559d-a04c-420f63b1fe41")
        );
        assert_eq!(unframe(&published[0].payload).unwrap().0, 7);

        let decoded = SchemaEncoder::decode(&published[0].payload, &stocks_binding()).unwrap();
        assert_eq!(decoded["id"], "AAPL");
        assert_eq!(decoded["price"], 189.95);
        assert_eq!(decoded["ingestion_ts"], 1_700_000_000_000i64);
        assert_eq!(decoded["source_api"], "YahooFinance");
        assert!(!decoded.contains_key("marketHours"));
        assert!(!decoded.contains_key("dayVolume"));
    }

    #[tokio::test]
    async fn test_unknown_instrument_publishes_nothing() {
        let bus = Arc::new(InMemoryBus::new());
        let mut writer = pipeline(bus.clone());

        let err = writer
            .write(&Message::new("yahoo", json!({"id": "ZZZZ", "price": 1.0})))
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::UnknownInstrument(ref id) if id == "ZZZZ"));
        assert!(bus.delivered().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_records() {
        let bus = Arc::new(InMemoryBus::new());
        let mut writer = pipeline(bus.clone());

        for record in [json!({"price": 1.0}), json!({"id": 5}), json!("AAPL")] {
            let err = writer.write(&Message::new("yahoo", record)).await.unwrap_err();
            assert_eq!(err.reason(), "malformed_record");
        }
        assert!(bus.delivered().is_empty());
    }

    #[tokio::test]
    async fn test_schema_violation_is_encoding_error() {
        let bus = Arc::new(InMemoryBus::new());
        let mut writer = pipeline(bus.clone());

        let err = writer
            .write(&Message::new("yahoo", json!({"id": "AAPL", "price": "n/a"})))
            .await
            .unwrap_err();
        assert_eq!(err.reason(), "encoding_error");
    }

    #[tokio::test]
    async fn test_missing_binding() {
        let bus = Arc::new(InMemoryBus::new());
        let mut writer = pipeline(bus.clone());

        let err = writer
            .write(&Message::new("yahoo", json!({"id": "BTC-USD", "price": 37000.5})))
            .await
            .unwrap_err();
        assert_eq!(err.reason(), "missing_binding");
    }
}
