use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Schema registry returned error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("invalid registry URL: {0}")]
    InvalidUrl(String),
}

impl RegistryError {
    /// True when the registry answered but has no such subject/version
    pub fn is_not_found(&self) -> bool {
        matches!(self, RegistryError::Api { status: 404, .. })
    }
}

#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("schema unavailable for subject {subject}: {reason}")]
    Unavailable { subject: String, reason: String },

    #[error("schema for subject {subject} is invalid: {reason}")]
    Invalid { subject: String, reason: String },
}
