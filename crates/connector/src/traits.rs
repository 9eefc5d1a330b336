use async_trait::async_trait;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::error::{ConnectorError, PipelineError};
use crate::message::Message;

/// Decoded record paired with the TSC captured when its frame arrived
pub type TimestampedRecord = (u64, serde_json::Value);

/// Connector trait for push-based quote sources
#[async_trait]
pub trait Connector: Send + Sync {
    /// Establish the session with the data source
    async fn connect(&mut self) -> Result<(), ConnectorError>;

    /// Request updates for every instrument the connector was built with
    /// and start forwarding decoded records
    async fn subscribe(&mut self) -> Result<(), ConnectorError>;

    /// Receiver for decoded records, in arrival order. Can be taken once.
    fn messages(&mut self) -> Result<mpsc::Receiver<TimestampedRecord>, ConnectorError>;

    /// Close the connection
    async fn close(&mut self) -> Result<(), ConnectorError>;

    /// Handle to the last socket activity timestamp (epoch seconds), if tracked
    fn activity_handle(&self) -> Option<Arc<AtomicU64>> {
        None
    }
}

/// Writer trait for the per-record pipeline
#[async_trait]
pub trait Writer: Send + Sync {
    /// Process one record. Errors are per-record and never stop the feed.
    async fn write(&mut self, msg: &Message) -> Result<(), PipelineError>;

    /// Flush anything buffered and release resources
    async fn close(&mut self) -> Result<(), PipelineError>;
}
