//! Feed session state shared between the runner and the health server

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FeedState {
    Disconnected = 0,
    Connecting = 1,
    Subscribed = 2,
    Listening = 3,
}

impl FeedState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => FeedState::Connecting,
            2 => FeedState::Subscribed,
            3 => FeedState::Listening,
            _ => FeedState::Disconnected,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FeedState::Disconnected => "disconnected",
            FeedState::Connecting => "connecting",
            FeedState::Subscribed => "subscribed",
            FeedState::Listening => "listening",
        }
    }
}

impl fmt::Display for FeedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cloneable handle to the current feed state
#[derive(Debug, Clone)]
pub struct FeedStateHandle(Arc<AtomicU8>);

impl Default for FeedStateHandle {
    fn default() -> Self {
        Self::new(FeedState::Disconnected)
    }
}

impl FeedStateHandle {
    pub fn new(state: FeedState) -> Self {
        Self(Arc::new(AtomicU8::new(state as u8)))
    }

    pub fn get(&self) -> FeedState {
        FeedState::from_u8(self.0.load(Ordering::SeqCst))
    }

    pub fn set(&self, state: FeedState) {
        self.0.store(state as u8, Ordering::SeqCst);
    }

    pub fn is_listening(&self) -> bool {
        self.get() == FeedState::Listening
    }
}
