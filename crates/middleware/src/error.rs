use thiserror::Error;

#[derive(Error, Debug)]
pub enum BusError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
    #[error("local producer queue is full")]
    QueueFull,
    #[error("publish failed: {0}")]
    PublishFailed(String),
    #[error("flush timed out with {in_flight} messages in flight")]
    FlushTimeout { in_flight: usize },
    #[error("flush failed: {0}")]
    FlushFailed(String),
}
