use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::metrics::encode_metrics;
use crate::state::FeedStateHandle;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub feed: String,
    pub state: String,
    pub last_activity_epoch_secs: u64,
}

/// Shared state for health endpoints
#[derive(Clone)]
pub struct ServerState {
    pub feed_name: String,
    pub feed_state: FeedStateHandle,
    pub last_activity: Arc<AtomicU64>,
}

impl ServerState {
    pub fn new(
        feed_name: impl Into<String>,
        feed_state: FeedStateHandle,
        last_activity: Arc<AtomicU64>,
    ) -> Self {
        Self {
            feed_name: feed_name.into(),
            feed_state,
            last_activity,
        }
    }

    fn response(&self, status: &str) -> HealthResponse {
        HealthResponse {
            status: status.to_string(),
            feed: self.feed_name.clone(),
            state: self.feed_state.get().to_string(),
            last_activity_epoch_secs: self.last_activity.load(Ordering::SeqCst),
        }
    }
}

/// Health endpoint - always returns 200 if server is running
async fn health(State(state): State<ServerState>) -> Json<HealthResponse> {
    Json(state.response("ok"))
}

/// Ready endpoint - returns 200 only while the feed is listening
async fn ready(State(state): State<ServerState>) -> (StatusCode, Json<HealthResponse>) {
    if state.feed_state.is_listening() {
        (StatusCode::OK, Json(state.response("ready")))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(state.response("not_ready")),
        )
    }
}

async fn metrics() -> impl IntoResponse {
    match encode_metrics() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [(header::CONTENT_TYPE, "text/plain")],
            e.to_string(),
        ),
    }
}

/// Create the health server router
pub fn create_router(state: ServerState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Run the health server
pub async fn run_server(addr: SocketAddr, state: ServerState) -> std::io::Result<()> {
    let app = create_router(state);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await
}
