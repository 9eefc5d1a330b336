//! quoteflow-provision: Schema provisioning
//!
//! Waits for the schema registry to come up, then registers every local
//! `*.avsc` schema under the value subject of the topic it is named after.

use std::path::{Path, PathBuf};
use std::time::Duration;

use quoteflow_registry::{value_subject, SchemaRegistryClient};
use serde_json::Value;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{error, info, warn};

/// Default registry polling interval
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is not valid JSON: {reason}")]
    InvalidJson { path: PathBuf, reason: String },

    #[error("{path} is not a valid Avro schema: {reason}")]
    InvalidSchema { path: PathBuf, reason: String },

    #[error("{0} has no \"name\"")]
    MissingName(PathBuf),

    #[error("no *.avsc schemas found in {0}")]
    NoSchemas(PathBuf),

    #[error("schema registry not reachable after {0:?}")]
    RegistryTimeout(Duration),
}

/// Schema definition read from disk
#[derive(Debug, Clone, PartialEq)]
pub struct LocalSchema {
    pub path: PathBuf,
    /// Topic the schema belongs to
    pub name: String,
    /// Compact JSON text posted to the registry
    pub text: String,
}

impl LocalSchema {
    pub fn subject(&self) -> String {
        value_subject(&self.name)
    }
}

/// Outcome of registering a batch of schemas
#[derive(Debug, Default)]
pub struct RegistrationSummary {
    pub registered: Vec<(String, i32)>,
    pub failed: Vec<(String, String)>,
}

impl RegistrationSummary {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Poll `GET /subjects` every `interval` until the registry answers.
/// Without a deadline this waits forever.
pub async fn wait_for_registry(
    client: &SchemaRegistryClient,
    interval: Duration,
    deadline: Option<Duration>,
) -> Result<(), ProvisionError> {
    let started = Instant::now();
    loop {
        match client.subjects().await {
            Ok(subjects) => {
                info!(url = %client.base_url(), subjects = subjects.len(), "Schema registry is up");
                return Ok(());
            }
            Err(e) => {
                warn!(url = %client.base_url(), error = %e, "Could not connect to schema registry");
            }
        }

        if let Some(deadline) = deadline {
            if started.elapsed() + interval > deadline {
                return Err(ProvisionError::RegistryTimeout(deadline));
            }
        }
        tokio::time::sleep(interval).await;
    }
}

fn parse_schema(path: &Path) -> Result<LocalSchema, ProvisionError> {
    let content = std::fs::read_to_string(path).map_err(|source| ProvisionError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let json: Value = serde_json::from_str(&content).map_err(|e| ProvisionError::InvalidJson {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let name = json
        .get("name")
        .and_then(Value::as_str)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| ProvisionError::MissingName(path.to_path_buf()))?
        .to_string();

    let text = json.to_string();
    apache_avro::Schema::parse_str(&text).map_err(|e| ProvisionError::InvalidSchema {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    Ok(LocalSchema {
        path: path.to_path_buf(),
        name,
        text,
    })
}

/// Read every `*.avsc` file in `dir`, sorted by file name. At least one is required.
pub fn load_schemas(dir: &Path) -> Result<Vec<LocalSchema>, ProvisionError> {
    let entries = std::fs::read_dir(dir).map_err(|source| ProvisionError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| ProvisionError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.is_file() && path.extension().and_then(|e| e.to_str()) == Some("avsc") {
            paths.push(path);
        }
    }
    paths.sort();

    if paths.is_empty() {
        return Err(ProvisionError::NoSchemas(dir.to_path_buf()));
    }

    paths.iter().map(|p| parse_schema(p)).collect()
}

/// Register every schema, continuing past failures
pub async fn register_all(
    client: &SchemaRegistryClient,
    schemas: &[LocalSchema],
) -> RegistrationSummary {
    let mut summary = RegistrationSummary::default();
    for schema in schemas {
        let subject = schema.subject();
        info!(subject = %subject, path = %schema.path.display(), "Posting schema");

        match client.register(&subject, &schema.text).await {
            Ok(id) => {
                info!(subject = %subject, schema_id = id, "Schema registered");
                summary.registered.push((subject, id));
            }
            Err(e) => {
                error!(subject = %subject, error = %e, "Schema registration failed");
                summary.failed.push((subject, e.to_string()));
            }
        }
    }
    summary
}
