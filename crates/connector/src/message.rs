use quoteflow_middleware::now_tsc;
use serde_json::Value;

/// Message wraps a decoded feed record with receive metadata
#[derive(Debug, Clone)]
pub struct Message {
    /// TSC timestamp (zero-syscall, convert to wall clock at I/O boundary)
    pub tsc: u64,
    pub feed: String,
    /// Decoded record, expected to be a JSON object carrying `id`
    pub record: Value,
}

impl Message {
    #[inline]
    pub fn new(feed: impl Into<String>, record: Value) -> Self {
        Self::with_tsc(feed, record, now_tsc())
    }

    /// Create a message stamped with the TSC captured at socket receive
    #[inline]
    pub fn with_tsc(feed: impl Into<String>, record: Value, tsc: u64) -> Self {
        Self {
            tsc,
            feed: feed.into(),
            record,
        }
    }

    /// Instrument id of the record, when present and a string
    pub fn instrument_id(&self) -> Option<&str> {
        self.record.get("id").and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_instrument_id() {
        let msg = Message::new("yahoo", json!({"id": "AAPL", "price": 189.5}));
        assert_eq!(msg.instrument_id(), Some("AAPL"));
        assert!(msg.tsc > 0);

        let msg = Message::with_tsc("yahoo", json!({"id": 42}), 7);
        assert_eq!(msg.instrument_id(), None);
        assert_eq!(msg.tsc, 7);

        let msg = Message::new("yahoo", json!([1, 2, 3]));
        assert_eq!(msg.instrument_id(), None);
    }
}
