//! Process configuration, read once from the environment at startup

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use quoteflow_metadata::{AssetClass, InstrumentRegistry};
use quoteflow_middleware::{BusType, KafkaConfig};

use crate::error::ConfigError;
use crate::publisher::FlushPolicy;
use crate::yahoo::YAHOO_WS_URL;

/// Upper bound on a single producer flush
pub const DEFAULT_FLUSH_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Clone)]
pub struct Config {
    pub bus_type: BusType,
    pub bootstrap_servers: String,
    pub security_protocol: String,
    pub bus_username: Option<String>,
    pub bus_password: Option<String>,
    pub queue_buffering_max_messages: usize,
    pub schema_registry_url: String,
    /// Destination topic per asset class
    pub topics: BTreeMap<AssetClass, String>,
    pub instruments_path: PathBuf,
    /// Optional subset of the instrument table to subscribe to
    pub tickers: Option<Vec<String>>,
    pub ws_url: String,
    pub flush_policy: FlushPolicy,
    pub flush_timeout: Duration,
}

fn topic_var(class: AssetClass) -> &'static str {
    match class {
        AssetClass::Stocks => "STOCKS_TOPIC",
        AssetClass::Crypto => "CRYPTO_TOPIC",
        AssetClass::Currency => "CURRENCY_TOPIC",
    }
}

fn parse_number<T: std::str::FromStr>(var: &'static str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        var,
        reason: e.to_string(),
    })
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from an arbitrary variable source. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());
        let require = |var: &'static str| get(var).ok_or(ConfigError::Missing(var));

        let bus_type = match get("BUS_TYPE") {
            Some(v) => v.parse::<BusType>().map_err(|e| ConfigError::Invalid {
                var: "BUS_TYPE",
                reason: e.to_string(),
            })?,
            None => BusType::Kafka,
        };

        let bootstrap_servers = require("BOOTSTRAP_SERVERS")?;
        let schema_registry_url = require("SCHEMA_REGISTRY_URL")?;

        let mut topics = BTreeMap::new();
        for class in AssetClass::ALL {
            topics.insert(class, require(topic_var(class))?);
        }

        let security_protocol = get("SECURITY_PROTOCOL").unwrap_or_else(|| "SASL_PLAINTEXT".into());
        let (bus_username, bus_password) =
            if bus_type == BusType::Kafka && security_protocol.to_ascii_uppercase().starts_with("SASL") {
                (
                    Some(require("KAFKA_USER")?),
                    Some(require("KAFKA_PASSWORD")?),
                )
            } else {
                (get("KAFKA_USER"), get("KAFKA_PASSWORD"))
            };

        let queue_buffering_max_messages = match get("QUEUE_BUFFERING_MAX_MESSAGES") {
            Some(v) => parse_number("QUEUE_BUFFERING_MAX_MESSAGES", &v)?,
            None => quoteflow_middleware::kafka::DEFAULT_QUEUE_BUFFERING_MAX_MESSAGES,
        };

        let instruments_path = PathBuf::from(
            get("INSTRUMENTS_PATH").unwrap_or_else(|| "tickers.json".into()),
        );

        let tickers = get("TICKERS").map(|s| {
            s.split(',')
                .map(|t| t.trim())
                .filter(|t| !t.is_empty())
                .map(ToString::to_string)
                .collect::<Vec<_>>()
        });

        let ws_url = get("YAHOO_WS_URL").unwrap_or_else(|| YAHOO_WS_URL.to_string());

        let flush_policy = match get("FLUSH_INTERVAL_MS") {
            Some(v) => FlushPolicy::Interval(Duration::from_millis(parse_number(
                "FLUSH_INTERVAL_MS",
                &v,
            )?)),
            None => FlushPolicy::PerRecord,
        };

        let flush_timeout = Duration::from_millis(match get("FLUSH_TIMEOUT_MS") {
            Some(v) => parse_number("FLUSH_TIMEOUT_MS", &v)?,
            None => DEFAULT_FLUSH_TIMEOUT_MS,
        });

        Ok(Self {
            bus_type,
            bootstrap_servers,
            security_protocol,
            bus_username,
            bus_password,
            queue_buffering_max_messages,
            schema_registry_url,
            topics,
            instruments_path,
            tickers,
            ws_url,
            flush_policy,
            flush_timeout,
        })
    }

    pub fn topic(&self, class: AssetClass) -> Option<&str> {
        self.topics.get(&class).map(String::as_str)
    }

    pub fn kafka_config(&self) -> KafkaConfig {
        let mut config = KafkaConfig::new(&self.bootstrap_servers)
            .with_security_protocol(&self.security_protocol);
        if let (Some(user), Some(password)) = (&self.bus_username, &self.bus_password) {
            config = config.with_credentials(user, password);
        }
        config.queue_buffering_max_messages = self.queue_buffering_max_messages;
        config
    }

    /// Load the instrument table, restricted to `TICKERS` when set
    pub fn load_instruments(&self) -> Result<InstrumentRegistry, ConfigError> {
        let registry = InstrumentRegistry::load(&self.instruments_path)?;
        match self.tickers {
            Some(ref tickers) => Ok(registry.subset(tickers)?),
            None => Ok(registry),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base_vars() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("BOOTSTRAP_SERVERS", "kafka:9092"),
            ("SCHEMA_REGISTRY_URL", "http://registry:8081"),
            ("STOCKS_TOPIC", "stocks"),
            ("CRYPTO_TOPIC", "crypto"),
            ("CURRENCY_TOPIC", "currency"),
            ("KAFKA_USER", "ingest"),
            ("KAFKA_PASSWORD", "secret"),
        ])
    }

    fn config_from(vars: &HashMap<&'static str, &'static str>) -> Result<Config, ConfigError> {
        Config::from_lookup(|k| vars.get(k).map(|v| v.to_string()))
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&base_vars()).unwrap();

        assert_eq!(config.bus_type, BusType::Kafka);
        assert_eq!(config.security_protocol, "SASL_PLAINTEXT");
        assert_eq!(config.topic(AssetClass::Stocks), Some("stocks"));
        assert_eq!(config.topic(AssetClass::Currency), Some("currency"));
        assert_eq!(config.instruments_path, PathBuf::from("tickers.json"));
        assert_eq!(config.ws_url, YAHOO_WS_URL);
        assert_eq!(config.flush_policy, FlushPolicy::PerRecord);
        assert_eq!(config.flush_timeout, Duration::from_secs(10));
        assert!(config.tickers.is_none());
    }

    #[test]
    fn test_missing_required_value() {
        let mut vars = base_vars();
        vars.remove("CRYPTO_TOPIC");
        assert!(matches!(
            config_from(&vars),
            Err(ConfigError::Missing("CRYPTO_TOPIC"))
        ));

        let mut vars = base_vars();
        vars.insert("SCHEMA_REGISTRY_URL", "  ");
        assert!(matches!(
            config_from(&vars),
            Err(ConfigError::Missing("SCHEMA_REGISTRY_URL"))
        ));
    }

    #[test]
    fn test_sasl_requires_credentials() {
        let mut vars = base_vars();
        vars.remove("KAFKA_PASSWORD");
        assert!(matches!(
            config_from(&vars),
            Err(ConfigError::Missing("KAFKA_PASSWORD"))
        ));

        vars.insert("SECURITY_PROTOCOL", "PLAINTEXT");
        let config = config_from(&vars).unwrap();
        assert_eq!(config.bus_password, None);
    }

    #[test]
    fn test_overrides() {
        let mut vars = base_vars();
        vars.insert("TICKERS", "AAPL, BTC-USD,,");
        vars.insert("FLUSH_INTERVAL_MS", "250");
        vars.insert("FLUSH_TIMEOUT_MS", "500");
        vars.insert("BUS_TYPE", "memory");
        vars.insert("QUEUE_BUFFERING_MAX_MESSAGES", "10");

        let config = config_from(&vars).unwrap();
        assert_eq!(
            config.tickers,
            Some(vec!["AAPL".to_string(), "BTC-USD".to_string()])
        );
        assert_eq!(
            config.flush_policy,
            FlushPolicy::Interval(Duration::from_millis(250))
        );
        assert_eq!(config.flush_timeout, Duration::from_millis(500));
        assert_eq!(config.bus_type, BusType::Memory);
        assert_eq!(config.kafka_config().queue_buffering_max_messages, 10);
    }

    #[test]
    fn test_invalid_number() {
        let mut vars = base_vars();
        vars.insert("FLUSH_TIMEOUT_MS", "soon");
        assert!(matches!(
            config_from(&vars),
            Err(ConfigError::Invalid {
                var: "FLUSH_TIMEOUT_MS",
                ..
            })
        ));
    }

    #[test]
    fn test_kafka_config_carries_credentials() {
        let config = config_from(&base_vars()).unwrap();
        let kafka = config.kafka_config().client_config();
        assert_eq!(kafka.get("bootstrap.servers"), Some("kafka:9092"));
        assert_eq!(kafka.get("sasl.username"), Some("ingest"));
    }

    #[test]
    fn test_load_instruments_with_subset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tickers.json");
        std::fs::write(
            &path,
            r#"{"AAPL": {"type": "stocks"}, "BTC-USD": {"type": "crypto"}}"#,
        )
        .unwrap();

        let mut config = config_from(&base_vars()).unwrap();
        config.instruments_path = path;
        assert_eq!(config.load_instruments().unwrap().len(), 2);

        config.tickers = Some(vec!["BTC-USD".to_string()]);
        assert_eq!(config.load_instruments().unwrap().ids(), vec!["BTC-USD"]);

        config.tickers = Some(vec!["ZZZZ".to_string()]);
        assert!(matches!(
            config.load_instruments(),
            Err(ConfigError::Metadata(_))
        ));
    }
}
