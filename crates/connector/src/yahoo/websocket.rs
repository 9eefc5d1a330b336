//! Yahoo Finance streamer WebSocket client
//!
//! No authentication. The streamer acknowledges nothing: after the subscribe
//! command it starts pushing pricing frames for the requested ids.

use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, trace};
use url::Url;

/// Yahoo Finance streamer URL
pub const YAHOO_WS_URL: &str = "wss://streamer.finance.yahoo.com/?version=2";

#[derive(Error, Debug)]
pub enum YahooWebSocketError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Connection closed")]
    ConnectionClosed,
}

pub struct YahooWebSocket {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl YahooWebSocket {
    pub async fn connect(url: &str) -> Result<Self, YahooWebSocketError> {
        let parsed = Url::parse(url).map_err(|e| YahooWebSocketError::InvalidUrl(format!("{}: {}", url, e)))?;
        if !matches!(parsed.scheme(), "ws" | "wss") {
            return Err(YahooWebSocketError::InvalidUrl(format!(
                "{}: expected ws or wss scheme",
                url
            )));
        }

        info!(url = %url, "Connecting to Yahoo Finance streamer");
        let (ws, response) = connect_async(url).await?;
        info!(status = ?response.status(), "Yahoo Finance streamer connected");

        Ok(Self { ws })
    }

    /// Sends: `{"subscribe":["AAPL","BTC-USD"]}`
    pub async fn subscribe(&mut self, ids: &[String]) -> Result<(), YahooWebSocketError> {
        let msg = serde_json::to_string(&serde_json::json!({ "subscribe": ids }))?;
        debug!(cmd = %msg, "Sending subscribe command");
        self.ws.send(Message::Text(msg)).await?;
        Ok(())
    }

    /// Receive the next data frame as text. Binary frames are read as UTF-8.
    pub async fn recv_frame(&mut self) -> Result<String, YahooWebSocketError> {
        loop {
            match self.ws.next().await {
                Some(Ok(Message::Text(text))) => {
                    trace!(len = text.len(), "Received frame");
                    return Ok(text);
                }
                Some(Ok(Message::Binary(data))) => {
                    return Ok(String::from_utf8_lossy(&data).into_owned());
                }
                Some(Ok(Message::Ping(data))) => {
                    trace!("Received WS ping, sending pong");
                    self.ws.send(Message::Pong(data)).await?;
                }
                Some(Ok(Message::Close(frame))) => {
                    info!(frame = ?frame, "Yahoo Finance streamer closed");
                    return Err(YahooWebSocketError::ConnectionClosed);
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(e.into()),
                None => return Err(YahooWebSocketError::ConnectionClosed),
            }
        }
    }

    /// WS-level ping to keep idle sessions open
    pub async fn ping(&mut self) -> Result<(), YahooWebSocketError> {
        self.ws.send(Message::Ping(Vec::new())).await?;
        Ok(())
    }

    pub async fn close(&mut self) -> Result<(), YahooWebSocketError> {
        self.ws.close(None).await?;
        Ok(())
    }
}
