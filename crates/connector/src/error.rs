use quoteflow_metadata::{AssetClass, MetadataError};
use quoteflow_middleware::BusError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConnectorError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
    #[error("subscription failed: {0}")]
    SubscriptionFailed(String),
    #[error("disconnected: {0}")]
    Disconnected(String),
}

#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("record does not match schema {schema_id}: {reason}")]
    SchemaMismatch { schema_id: i32, reason: String },
    #[error("invalid frame: {0}")]
    InvalidFrame(String),
}

/// Per-record pipeline failure. None of these stop the feed.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("malformed record: {0}")]
    MalformedRecord(String),
    #[error("unknown instrument: {0}")]
    UnknownInstrument(String),
    #[error("no topic binding for asset class {0}")]
    MissingBinding(AssetClass),
    #[error("encoding failed: {0}")]
    Encode(#[from] EncodeError),
    #[error("publish failed: {0}")]
    Publish(#[from] BusError),
}

impl PipelineError {
    /// Short label used for the dropped-records metric
    pub fn reason(&self) -> &'static str {
        match self {
            PipelineError::MalformedRecord(_) => "malformed_record",
            PipelineError::UnknownInstrument(_) => "unknown_instrument",
            PipelineError::MissingBinding(_) => "missing_binding",
            PipelineError::Encode(_) => "encoding_error",
            PipelineError::Publish(BusError::QueueFull) => "queue_full",
            PipelineError::Publish(_) => "publish_error",
        }
    }

    /// Per-record failures drop the record; only connector errors end the feed
    pub fn is_fatal(&self) -> bool {
        false
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} not set")]
    Missing(&'static str),
    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
    #[error("instrument table: {0}")]
    Metadata(#[from] MetadataError),
}
