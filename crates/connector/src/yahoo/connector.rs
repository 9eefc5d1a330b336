//! Yahoo Finance connector implementation
//!
//! One session, one subscribe command for the whole instrument set. Frames
//! are decoded on the receiver task so the pipeline only sees records.

use crate::error::ConnectorError;
use crate::metrics;
use crate::traits::{Connector, TimestampedRecord};
use crate::yahoo::messages::decode_frame;
use crate::yahoo::websocket::{YahooWebSocket, YahooWebSocketError};
use async_trait::async_trait;
use quoteflow_middleware::now_tsc;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, trace, warn};

const CHANNEL_CAPACITY: usize = 1000;
const PING_INTERVAL_SECS: u64 = 30;

fn update_activity(tracker: &AtomicU64) {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    tracker.store(now, Ordering::SeqCst);
}

pub struct YahooConnector {
    ids: Vec<String>,
    ws_url: String,
    ws: Option<YahooWebSocket>,
    tx: Option<mpsc::Sender<TimestampedRecord>>,
    rx: Option<mpsc::Receiver<TimestampedRecord>>,
    task: Option<JoinHandle<()>>,
    /// Last WebSocket activity timestamp (epoch seconds)
    last_ws_activity_epoch_secs: Arc<AtomicU64>,
}

impl YahooConnector {
    pub fn new(ids: Vec<String>, ws_url: impl Into<String>) -> Self {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        Self {
            ids,
            ws_url: ws_url.into(),
            ws: None,
            tx: Some(tx),
            rx: Some(rx),
            task: None,
            last_ws_activity_epoch_secs: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    /// Spawn the WebSocket receiver task. The sender is dropped when the
    /// session ends, which the runner observes as a closed channel.
    fn spawn_receiver_task(
        mut ws: YahooWebSocket,
        tx: mpsc::Sender<TimestampedRecord>,
        activity_tracker: Arc<AtomicU64>,
    ) -> JoinHandle<()> {
        update_activity(&activity_tracker);

        tokio::spawn(async move {
            let mut ping_interval = tokio::time::interval(Duration::from_secs(PING_INTERVAL_SECS));
            ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // First tick completes immediately
            ping_interval.tick().await;

            loop {
                tokio::select! {
                    _ = ping_interval.tick() => {
                        trace!("Sending WS ping");
                        if let Err(e) = ws.ping().await {
                            error!(error = %e, "Failed to send ping, connection may be dead");
                            break;
                        }
                    }

                    result = ws.recv_frame() => {
                        match result {
                            Ok(text) => {
                                update_activity(&activity_tracker);
                                let tsc = now_tsc();
                                match decode_frame(&text) {
                                    Ok(pricing) => {
                                        let record = Value::Object(pricing.to_record());
                                        if tx.send((tsc, record)).await.is_err() {
                                            info!("Channel closed, stopping Yahoo receiver");
                                            break;
                                        }
                                    }
                                    Err(e) => {
                                        warn!(error = %e, "Dropping undecodable frame");
                                        metrics::inc_dropped("malformed_frame");
                                    }
                                }
                            }
                            Err(YahooWebSocketError::ConnectionClosed) => {
                                error!("Yahoo Finance session closed");
                                break;
                            }
                            Err(e) => {
                                error!(error = %e, "Yahoo Finance WebSocket error");
                                break;
                            }
                        }
                    }
                }
            }

            if let Err(e) = ws.close().await {
                trace!(error = %e, "Error closing Yahoo WebSocket");
            }
        })
    }
}

#[async_trait]
impl Connector for YahooConnector {
    async fn connect(&mut self) -> Result<(), ConnectorError> {
        let ws = YahooWebSocket::connect(&self.ws_url)
            .await
            .map_err(|e| ConnectorError::ConnectionFailed(e.to_string()))?;
        self.ws = Some(ws);
        Ok(())
    }

    async fn subscribe(&mut self) -> Result<(), ConnectorError> {
        let mut ws = self.ws.take().ok_or_else(|| {
            ConnectorError::SubscriptionFailed("subscribe() called before connect()".to_string())
        })?;
        let tx = self.tx.take().ok_or_else(|| {
            ConnectorError::SubscriptionFailed("subscribe() called twice".to_string())
        })?;

        ws.subscribe(&self.ids)
            .await
            .map_err(|e| ConnectorError::SubscriptionFailed(e.to_string()))?;
        info!(count = self.ids.len(), ids = ?self.ids, "Subscribed to Yahoo Finance streamer");

        self.task = Some(Self::spawn_receiver_task(
            ws,
            tx,
            Arc::clone(&self.last_ws_activity_epoch_secs),
        ));
        Ok(())
    }

    fn messages(&mut self) -> Result<mpsc::Receiver<TimestampedRecord>, ConnectorError> {
        self.rx
            .take()
            .ok_or_else(|| ConnectorError::Disconnected("messages() called twice".to_string()))
    }

    async fn close(&mut self) -> Result<(), ConnectorError> {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        if let Some(mut ws) = self.ws.take() {
            ws.close()
                .await
                .map_err(|e| ConnectorError::Disconnected(e.to_string()))?;
        }
        self.tx = None;
        Ok(())
    }

    fn activity_handle(&self) -> Option<Arc<AtomicU64>> {
        Some(Arc::clone(&self.last_ws_activity_epoch_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::yahoo::messages::tests::{aapl, envelope};
    use futures_util::{SinkExt, StreamExt};
    use tokio::net::TcpListener;
    use tokio_tungstenite::tungstenite::Message;

    /// Accepts one session, checks the subscribe command, pushes `frames`, then closes
    async fn mock_streamer(frames: Vec<String>) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

            let subscribe = match ws.next().await.unwrap().unwrap() {
                Message::Text(text) => text,
                other => panic!("expected subscribe text, got {:?}", other),
            };
            for frame in frames {
                ws.send(Message::Text(frame)).await.unwrap();
            }
            ws.close(None).await.ok();
            subscribe
        });

        (format!("ws://{}", addr), handle)
    }

    #[test]
    fn test_connector_creation() {
        let connector = YahooConnector::new(vec!["AAPL".to_string(), "BTC-USD".to_string()], "ws://localhost:1");
        assert!(connector.tx.is_some());
        assert!(connector.rx.is_some());
        assert_eq!(connector.ids().len(), 2);
        assert!(connector.activity_handle().is_some());
    }

    #[test]
    fn test_messages_takes_receiver_once() {
        let mut connector = YahooConnector::new(vec!["AAPL".to_string()], "ws://localhost:1");
        assert!(connector.messages().is_ok());
        assert!(matches!(
            connector.messages(),
            Err(ConnectorError::Disconnected(_))
        ));
    }

    #[tokio::test]
    async fn test_subscribe_before_connect_fails() {
        let mut connector = YahooConnector::new(vec!["AAPL".to_string()], "ws://localhost:1");
        assert!(matches!(
            connector.subscribe().await,
            Err(ConnectorError::SubscriptionFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_connect_failure() {
        // Nothing listens on port 1
        let mut connector = YahooConnector::new(vec!["AAPL".to_string()], "ws://127.0.0.1:1");
        assert!(matches!(
            connector.connect().await,
            Err(ConnectorError::ConnectionFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_session_forwards_decoded_records() {
        let (url, server) = mock_streamer(vec![
            envelope(&aapl()),
            "%%% not a frame %%%".to_string(),
            envelope(&aapl()),
        ])
        .await;

        let mut connector = YahooConnector::new(vec!["AAPL".to_string(), "BTC-USD".to_string()], url);
        let mut rx = connector.messages().unwrap();
        connector.connect().await.unwrap();
        connector.subscribe().await.unwrap();

        let subscribe = server.await.unwrap();
        assert_eq!(
            serde_json::from_str::<Value>(&subscribe).unwrap(),
            serde_json::json!({"subscribe": ["AAPL", "BTC-USD"]})
        );

        let (_, first) = rx.recv().await.unwrap();
        assert_eq!(first["id"], "AAPL");
        assert_eq!(first["price"], 189.95);
        let (_, second) = rx.recv().await.unwrap();
        assert_eq!(second["id"], "AAPL");

        // Session closed by the server ends the stream
        assert!(rx.recv().await.is_none());
        assert!(connector.activity_handle().unwrap().load(Ordering::SeqCst) > 0);
    }
}
