//! quoteflow-registry: Client for a Confluent-compatible schema registry
//!
//! Resolves topics to their latest registered value schema and registers
//! local schema definitions.

pub mod client;
pub mod error;

pub use client::{
    field_names, value_subject, RegisteredSchema, ResolvedSchema, SchemaRegistryClient,
    REGISTRY_CONTENT_TYPE,
};
pub use error::{RegistryError, SchemaError};
