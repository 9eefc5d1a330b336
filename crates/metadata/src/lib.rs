//! quoteflow-metadata: Static reference data shared by the ingestion services

pub mod error;
pub mod instrument;

pub use error::MetadataError;
pub use instrument::{AssetClass, Instrument, InstrumentRegistry};
