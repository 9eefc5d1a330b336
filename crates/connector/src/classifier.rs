use quoteflow_metadata::{AssetClass, InstrumentRegistry};
use std::sync::Arc;

use crate::binding::{TopicBinding, TopicBindings};
use crate::error::PipelineError;

/// Maps an instrument id to its asset class and topic binding
#[derive(Debug, Clone)]
pub struct Classifier {
    instruments: Arc<InstrumentRegistry>,
    bindings: Arc<TopicBindings>,
}

impl Classifier {
    pub fn new(instruments: Arc<InstrumentRegistry>, bindings: Arc<TopicBindings>) -> Self {
        Self {
            instruments,
            bindings,
        }
    }

    pub fn classify(&self, instrument_id: &str) -> Result<AssetClass, PipelineError> {
        self.instruments
            .get(instrument_id)
            .map(|i| i.asset_class)
            .ok_or_else(|| PipelineError::UnknownInstrument(instrument_id.to_string()))
    }

    pub fn route(&self, instrument_id: &str) -> Result<(AssetClass, &TopicBinding), PipelineError> {
        let asset_class = self.classify(instrument_id)?;
        let binding = self
            .bindings
            .get(asset_class)
            .ok_or(PipelineError::MissingBinding(asset_class))?;
        Ok((asset_class, binding))
    }
}
