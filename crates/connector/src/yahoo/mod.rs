//! Yahoo Finance streamer connector
//!
//! Subscribes to quote updates for stocks, crypto and currency pairs over the
//! public streamer WebSocket.

pub mod connector;
pub mod messages;
pub mod websocket;

pub use connector::YahooConnector;
pub use messages::{decode_frame, PricingData, YahooDecodeError};
pub use websocket::{YahooWebSocket, YahooWebSocketError, YAHOO_WS_URL};
