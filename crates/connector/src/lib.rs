//! quoteflow-connector-lib: Quote ingestion runtime components
//!
//! Connects to the Yahoo Finance streamer, routes each quote to the topic of
//! its asset class, validates and encodes it against the registered schema,
//! and publishes it on the bus.

pub mod binding;
pub mod classifier;
pub mod config;
pub mod encoder;
pub mod enricher;
pub mod error;
pub mod message;
pub mod metrics;
pub mod publisher;
pub mod runner;
pub mod server;
pub mod state;
pub mod traits;
pub mod writer;
pub mod yahoo;

pub use binding::{TopicBinding, TopicBindings};
pub use classifier::Classifier;
pub use config::Config;
pub use encoder::{filter, RawRecord, SchemaEncoder};
pub use enricher::{Enricher, SOURCE_API};
pub use error::{ConfigError, ConnectorError, EncodeError, PipelineError};
pub use message::Message;
pub use publisher::{delivery_logger, FlushPolicy, Publisher};
pub use runner::Runner;
pub use server::{create_router, run_server, ServerState};
pub use state::{FeedState, FeedStateHandle};
pub use traits::{Connector, TimestampedRecord, Writer};
pub use writer::PipelineWriter;
pub use yahoo::{YahooConnector, YAHOO_WS_URL};
