use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::select;
use tracing::{error, info, warn};

use crate::error::ConnectorError;
use crate::message::Message;
use crate::metrics;
use crate::state::{FeedState, FeedStateHandle};
use crate::traits::{Connector, Writer};

/// Runner drives the feed session and hands each record to the writer
pub struct Runner<C: Connector, W: Writer> {
    feed_name: String,
    connector: C,
    writer: W,
    state: FeedStateHandle,
    /// Unix timestamp (seconds) of last record received
    last_message_epoch_secs: Arc<AtomicU64>,
}

impl<C: Connector, W: Writer> Runner<C, W> {
    pub fn new(feed_name: impl Into<String>, connector: C, writer: W) -> Self {
        Self {
            feed_name: feed_name.into(),
            connector,
            writer,
            state: FeedStateHandle::default(),
            last_message_epoch_secs: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn state(&self) -> FeedState {
        self.state.get()
    }

    /// Returns a handle to the feed state, shared with the health server
    pub fn state_handle(&self) -> FeedStateHandle {
        self.state.clone()
    }

    /// Connector socket activity if tracked, otherwise the last record time
    pub fn activity_handle(&self) -> Arc<AtomicU64> {
        self.connector
            .activity_handle()
            .unwrap_or_else(|| Arc::clone(&self.last_message_epoch_secs))
    }

    fn set_state(&self, state: FeedState) {
        self.state.set(state);
        metrics::set_feed_connected(state == FeedState::Listening);
    }

    fn update_last_message_time(&self) {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        self.last_message_epoch_secs.store(now, Ordering::SeqCst);
    }

    async fn start(&mut self) -> Result<(), ConnectorError> {
        self.set_state(FeedState::Connecting);
        self.connector.connect().await?;
        info!(feed = %self.feed_name, "Connected to data source");

        self.connector.subscribe().await?;
        self.set_state(FeedState::Subscribed);
        info!(feed = %self.feed_name, "Subscribed");
        Ok(())
    }

    /// Run the pipeline until shutdown is signalled or the session ends.
    ///
    /// Record-level failures are logged and counted; the loop only exits with
    /// an error when the connector fails or disconnects.
    pub async fn run(&mut self, shutdown: tokio::sync::watch::Receiver<bool>) -> Result<(), ConnectorError> {
        if let Err(e) = self.start().await {
            self.set_state(FeedState::Disconnected);
            error!(feed = %self.feed_name, error = %e, "Failed to start feed session");
            return Err(e);
        }

        let mut rx = self.connector.messages()?;
        let mut shutdown = shutdown;
        self.set_state(FeedState::Listening);
        info!(feed = %self.feed_name, "Listening");

        loop {
            select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("Shutdown signal received");
                        break;
                    }
                }
                msg = rx.recv() => {
                    match msg {
                        Some((tsc, record)) => {
                            metrics::inc_received();
                            self.update_last_message_time();

                            let message = Message::with_tsc(&self.feed_name, record, tsc);
                            if let Err(e) = self.writer.write(&message).await {
                                warn!(
                                    id = ?message.instrument_id(),
                                    reason = e.reason(),
                                    error = %e,
                                    "Dropping record"
                                );
                                metrics::inc_dropped(e.reason());
                            }
                        }
                        None => {
                            self.set_state(FeedState::Disconnected);
                            error!("Feed session ended - exiting to trigger restart");
                            if let Err(e) = self.writer.close().await {
                                warn!(error = %e, "Failed to flush writer");
                            }
                            return Err(ConnectorError::Disconnected("session closed".to_string()));
                        }
                    }
                }
            }
        }

        self.set_state(FeedState::Disconnected);
        if let Err(e) = self.writer.close().await {
            warn!(error = %e, "Failed to flush writer");
        }
        self.connector.close().await?;

        Ok(())
    }
}
