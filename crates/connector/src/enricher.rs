//! Ingestion metadata stamped onto every outbound record

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use crate::encoder::RawRecord;

/// Value of the `source_api` field
pub const SOURCE_API: &str = "YahooFinance";

pub const INGESTION_TS_FIELD: &str = "ingestion_ts";
pub const EVENT_ID_FIELD: &str = "event_id";
pub const SOURCE_API_FIELD: &str = "source_api";

pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Deterministic event id: UUID v5 in the DNS namespace over `"<id>_<ingestion_ts>"`.
/// Two records of one instrument within the same second share an id.
pub fn event_id(instrument_id: &str, ingestion_ts: i64) -> Uuid {
    let name = format!("{}_{}", instrument_id, ingestion_ts);
    Uuid::new_v5(&Uuid::NAMESPACE_DNS, name.as_bytes())
}

pub struct Enricher {
    clock: Clock,
}

impl Default for Enricher {
    fn default() -> Self {
        Self::new()
    }
}

impl Enricher {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(Utc::now))
    }

    pub fn with_clock(clock: Clock) -> Self {
        Self { clock }
    }

    /// Epoch milliseconds truncated to whole seconds
    pub fn ingestion_ts(&self) -> i64 {
        (self.clock)().timestamp() * 1000
    }

    /// Add `ingestion_ts`, `event_id` and `source_api`, overwriting any existing values
    pub fn enrich(&self, instrument_id: &str, mut record: RawRecord) -> RawRecord {
        let ingestion_ts = self.ingestion_ts();
        record.insert(INGESTION_TS_FIELD.to_string(), Value::from(ingestion_ts));
        record.insert(
            EVENT_ID_FIELD.to_string(),
            Value::String(event_id(instrument_id, ingestion_ts).to_string()),
        );
        record.insert(
            SOURCE_API_FIELD.to_string(),
            Value::String(SOURCE_API.to_string()),
        );
        record
    }
}
