//! Asset class -> topic -> schema bindings, resolved once at startup

use apache_avro::Schema;
use quoteflow_metadata::AssetClass;
use quoteflow_registry::{ResolvedSchema, SchemaError, SchemaRegistryClient};
use std::collections::BTreeMap;
use tracing::info;

/// Destination topic of an asset class and the compiled schema its records must satisfy
#[derive(Debug, Clone)]
pub struct TopicBinding {
    pub asset_class: AssetClass,
    pub topic: String,
    pub schema_id: i32,
    pub schema_text: String,
    /// Declared field names, in schema order
    pub field_names: Vec<String>,
    pub schema: Schema,
}

impl TopicBinding {
    pub fn new(
        asset_class: AssetClass,
        topic: impl Into<String>,
        resolved: ResolvedSchema,
    ) -> Result<Self, SchemaError> {
        let schema =
            Schema::parse_str(&resolved.schema_text).map_err(|e| SchemaError::Invalid {
                subject: resolved.subject.clone(),
                reason: e.to_string(),
            })?;
        if !matches!(schema, Schema::Record(_)) {
            return Err(SchemaError::Invalid {
                subject: resolved.subject,
                reason: "value schema is not a record".to_string(),
            });
        }

        Ok(Self {
            asset_class,
            topic: topic.into(),
            schema_id: resolved.schema_id,
            schema_text: resolved.schema_text,
            field_names: resolved.field_names,
            schema,
        })
    }
}

/// Immutable set of bindings, one per configured asset class
#[derive(Debug, Clone, Default)]
pub struct TopicBindings {
    bindings: BTreeMap<AssetClass, TopicBinding>,
}

impl TopicBindings {
    pub fn from_bindings(bindings: impl IntoIterator<Item = TopicBinding>) -> Self {
        Self {
            bindings: bindings
                .into_iter()
                .map(|b| (b.asset_class, b))
                .collect(),
        }
    }

    /// Fetch the latest value schema of every topic. Any failure aborts startup.
    pub async fn resolve(
        client: &SchemaRegistryClient,
        topics: &BTreeMap<AssetClass, String>,
    ) -> Result<Self, SchemaError> {
        let mut bindings = BTreeMap::new();
        for (asset_class, topic) in topics {
            let resolved = client.resolve(topic).await?;
            let binding = TopicBinding::new(*asset_class, topic.as_str(), resolved)?;
            info!(
                asset_class = %asset_class,
                topic = %binding.topic,
                schema_id = binding.schema_id,
                "Topic binding ready"
            );
            bindings.insert(*asset_class, binding);
        }
        Ok(Self { bindings })
    }

    pub fn get(&self, asset_class: AssetClass) -> Option<&TopicBinding> {
        self.bindings.get(&asset_class)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
