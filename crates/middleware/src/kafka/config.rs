use rdkafka::config::ClientConfig;

/// Default client id reported to the brokers
pub const DEFAULT_CLIENT_ID: &str = "ingestion-producer";

/// Default cap on messages held in the local send buffer
pub const DEFAULT_QUEUE_BUFFERING_MAX_MESSAGES: usize = 100_000;

/// Producer settings for the Kafka bus
#[derive(Debug, Clone)]
pub struct KafkaConfig {
    pub bootstrap_servers: String,
    /// `PLAINTEXT`, `SSL`, `SASL_PLAINTEXT` or `SASL_SSL`
    pub security_protocol: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub client_id: String,
    pub queue_buffering_max_messages: usize,
}

impl KafkaConfig {
    pub fn new(bootstrap_servers: impl Into<String>) -> Self {
        Self {
            bootstrap_servers: bootstrap_servers.into(),
            security_protocol: "SASL_PLAINTEXT".to_string(),
            username: None,
            password: None,
            client_id: DEFAULT_CLIENT_ID.to_string(),
            queue_buffering_max_messages: DEFAULT_QUEUE_BUFFERING_MAX_MESSAGES,
        }
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_security_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.security_protocol = protocol.into();
        self
    }

    fn uses_sasl(&self) -> bool {
        self.security_protocol.to_ascii_uppercase().starts_with("SASL")
    }

    /// Build the librdkafka client configuration (acks from all in-sync replicas)
    pub fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", &self.bootstrap_servers)
            .set("acks", "all")
            .set("client.id", &self.client_id)
            .set("security.protocol", &self.security_protocol)
            .set(
                "queue.buffering.max.messages",
                self.queue_buffering_max_messages.to_string(),
            );

        if self.uses_sasl() {
            config.set("sasl.mechanism", "PLAIN");
            if let Some(ref username) = self.username {
                config.set("sasl.username", username);
            }
            if let Some(ref password) = self.password {
                config.set("sasl.password", password);
            }
        }

        config
    }
}
