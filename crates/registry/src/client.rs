use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{RegistryError, SchemaError};

/// Content type the registry expects on write requests
pub const REGISTRY_CONTENT_TYPE: &str = "application/vnd.schemaregistry.v1+json";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Registry subject holding the value schema of `topic`
pub fn value_subject(topic: &str) -> String {
    format!("{}-value", topic)
}

/// Field names declared by a record schema, in declaration order
pub fn field_names(schema_text: &str) -> Result<Vec<String>, String> {
    #[derive(Deserialize)]
    struct Field {
        name: String,
    }
    #[derive(Deserialize)]
    struct Record {
        fields: Vec<Field>,
    }

    let record: Record = serde_json::from_str(schema_text)
        .map_err(|e| format!("not a record schema: {}", e))?;
    Ok(record.fields.into_iter().map(|f| f.name).collect())
}

/// Response of `GET /subjects/{subject}/versions/latest`
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredSchema {
    pub subject: String,
    pub version: i32,
    pub id: i32,
    pub schema: String,
    #[serde(default)]
    pub schema_type: Option<String>,
}

/// Latest schema for a topic, ready to build an encoder from
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSchema {
    pub subject: String,
    pub schema_id: i32,
    pub version: i32,
    pub schema_text: String,
    pub field_names: Vec<String>,
}

#[derive(Serialize)]
struct RegisterRequest<'a> {
    schema: &'a str,
}

#[derive(Deserialize)]
struct RegisterResponse {
    id: i32,
}

/// Client for the schema registry HTTP API
#[derive(Clone)]
pub struct SchemaRegistryClient {
    client: Client,
    base_url: String,
}

impl SchemaRegistryClient {
    pub fn new(base_url: &str) -> Result<Self, RegistryError> {
        let base_url = base_url.trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(RegistryError::InvalidUrl(base_url));
        }

        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, RegistryError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response.text().await.unwrap_or_default();
        Err(RegistryError::Api { status, message })
    }

    /// List registered subjects. Doubles as the liveness probe.
    pub async fn subjects(&self) -> Result<Vec<String>, RegistryError> {
        let url = format!("{}/subjects", self.base_url);
        debug!(url = %url, "Listing registry subjects");

        let response = Self::check(self.client.get(&url).send().await?).await?;
        Ok(response.json().await?)
    }

    /// Fetch the latest registered version of `subject`
    pub async fn latest_version(&self, subject: &str) -> Result<RegisteredSchema, RegistryError> {
        let url = format!("{}/subjects/{}/versions/latest", self.base_url, subject);
        debug!(url = %url, subject = %subject, "Fetching latest schema version");

        let response = Self::check(self.client.get(&url).send().await?).await?;
        Ok(response.json().await?)
    }

    /// Register `schema_text` under `subject`, returning the schema id.
    /// Re-registering an identical schema returns the existing id.
    pub async fn register(&self, subject: &str, schema_text: &str) -> Result<i32, RegistryError> {
        let url = format!("{}/subjects/{}/versions", self.base_url, subject);
        debug!(url = %url, subject = %subject, "Registering schema");

        let response = self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, REGISTRY_CONTENT_TYPE)
            .json(&RegisterRequest {
                schema: schema_text,
            })
            .send()
            .await?;
        let response = Self::check(response).await?;
        let registered: RegisterResponse = response.json().await?;
        Ok(registered.id)
    }

    /// Resolve the latest value schema for `topic` (subject `<topic>-value`)
    pub async fn resolve(&self, topic: &str) -> Result<ResolvedSchema, SchemaError> {
        let subject = value_subject(topic);

        let latest = self
            .latest_version(&subject)
            .await
            .map_err(|e| SchemaError::Unavailable {
                subject: subject.clone(),
                reason: if e.is_not_found() {
                    format!("no registered version ({})", e)
                } else {
                    e.to_string()
                },
            })?;

        if let Some(ref schema_type) = latest.schema_type {
            if !schema_type.eq_ignore_ascii_case("AVRO") {
                return Err(SchemaError::Invalid {
                    subject,
                    reason: format!("unsupported schema type {}", schema_type),
                });
            }
        }

        let field_names = field_names(&latest.schema).map_err(|reason| SchemaError::Invalid {
            subject: subject.clone(),
            reason,
        })?;

        info!(
            subject = %subject,
            schema_id = latest.id,
            version = latest.version,
            fields = ?field_names,
            "Resolved schema"
        );

        Ok(ResolvedSchema {
            subject,
            schema_id: latest.id,
            version: latest.version,
            schema_text: latest.schema,
            field_names,
        })
    }
}
