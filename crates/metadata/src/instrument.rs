use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use crate::error::MetadataError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum AssetClass {
    Stocks,
    Crypto,
    Currency,
}

impl AssetClass {
    pub const ALL: [AssetClass; 3] = [AssetClass::Stocks, AssetClass::Crypto, AssetClass::Currency];

    pub fn as_str(&self) -> &'static str {
        match self {
            AssetClass::Stocks => "stocks",
            AssetClass::Crypto => "crypto",
            AssetClass::Currency => "currency",
        }
    }
}

impl fmt::Display for AssetClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the instrument table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Instrument {
    #[serde(rename = "type")]
    pub asset_class: AssetClass,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub exchange: Option<String>,
}

/// Instrument id -> instrument, loaded once at startup and read-only afterwards.
///
/// Backed by a `BTreeMap` so subscription order is stable across restarts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstrumentRegistry {
    instruments: BTreeMap<String, Instrument>,
}

impl InstrumentRegistry {
    pub fn new(instruments: BTreeMap<String, Instrument>) -> Result<Self, MetadataError> {
        if instruments.is_empty() {
            return Err(MetadataError::Validation(
                "instrument table is empty".to_string(),
            ));
        }
        if let Some(blank) = instruments.keys().find(|id| id.trim().is_empty()) {
            return Err(MetadataError::Validation(format!(
                "blank instrument id: {:?}",
                blank
            )));
        }
        Ok(Self { instruments })
    }

    /// Load from a `.yaml`/`.yml` file, otherwise JSON (`tickers.json` layout)
    pub fn load(path: &Path) -> Result<Self, MetadataError> {
        let content = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml_str(&content),
            _ => Self::from_json_str(&content),
        }
    }

    pub fn from_json_str(content: &str) -> Result<Self, MetadataError> {
        Self::new(serde_json::from_str(content)?)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, MetadataError> {
        Self::new(serde_yaml::from_str(content)?)
    }

    pub fn get(&self, id: &str) -> Option<&Instrument> {
        self.instruments.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.instruments.contains_key(id)
    }

    /// All instrument ids in sorted order
    pub fn ids(&self) -> Vec<String> {
        self.instruments.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }

    /// Asset classes that have at least one instrument
    pub fn asset_classes(&self) -> Vec<AssetClass> {
        let mut classes: Vec<AssetClass> =
            self.instruments.values().map(|i| i.asset_class).collect();
        classes.sort();
        classes.dedup();
        classes
    }

    /// Restrict the registry to `ids`. Every id must already be known.
    pub fn subset(&self, ids: &[String]) -> Result<Self, MetadataError> {
        let mut instruments = BTreeMap::new();
        for id in ids {
            let instrument = self.instruments.get(id).ok_or_else(|| {
                MetadataError::Validation(format!("instrument {} not in instrument table", id))
            })?;
            instruments.insert(id.clone(), instrument.clone());
        }
        Self::new(instruments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const TICKERS_JSON: &str = r#"{
        "AAPL": {"type": "stocks", "name": "Apple Inc."},
        "BTC-USD": {"type": "crypto"},
        "EURUSD=X": {"type": "currency", "exchange": "CCY"}
    }"#;

    #[test]
    fn test_load_json_table() {
        let registry = InstrumentRegistry::from_json_str(TICKERS_JSON).unwrap();
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.get("AAPL").unwrap().asset_class, AssetClass::Stocks);
        assert_eq!(registry.get("AAPL").unwrap().name.as_deref(), Some("Apple Inc."));
        assert_eq!(registry.get("BTC-USD").unwrap().asset_class, AssetClass::Crypto);
        assert_eq!(registry.get("EURUSD=X").unwrap().exchange.as_deref(), Some("CCY"));
        assert!(registry.get("ZZZZ").is_none());
    }

    #[test]
    fn test_load_yaml_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            r#"
AAPL:
  type: stocks
ETH-USD:
  type: crypto
"#
        )
        .unwrap();

        let registry = InstrumentRegistry::load(file.path()).unwrap();
        assert_eq!(registry.ids(), vec!["AAPL".to_string(), "ETH-USD".to_string()]);
        assert_eq!(
            registry.asset_classes(),
            vec![AssetClass::Stocks, AssetClass::Crypto]
        );
    }

    #[test]
    fn test_load_json_file() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, "{}", TICKERS_JSON).unwrap();

        let registry = InstrumentRegistry::load(file.path()).unwrap();
        assert!(registry.contains("EURUSD=X"));
    }

    #[test]
    fn test_unknown_asset_class_rejected() {
        let result = InstrumentRegistry::from_json_str(r#"{"AAPL": {"type": "bonds"}}"#);
        assert!(matches!(result, Err(MetadataError::Json(_))));
    }

    #[test]
    fn test_empty_table_rejected() {
        let result = InstrumentRegistry::from_json_str("{}");
        assert!(matches!(result, Err(MetadataError::Validation(_))));
    }

    #[test]
    fn test_subset() {
        let registry = InstrumentRegistry::from_json_str(TICKERS_JSON).unwrap();

        let subset = registry.subset(&["AAPL".to_string()]).unwrap();
        assert_eq!(subset.ids(), vec!["AAPL".to_string()]);

        let missing = registry.subset(&["ZZZZ".to_string()]);
        assert!(matches!(missing, Err(MetadataError::Validation(_))));
    }

    #[test]
    fn test_asset_class_display() {
        assert_eq!(AssetClass::Stocks.to_string(), "stocks");
        assert_eq!(AssetClass::Currency.as_str(), "currency");
        assert_eq!(
            serde_json::to_string(&AssetClass::Crypto).unwrap(),
            "\"crypto\""
        );
    }
}
