use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub read_timeout_secs: u64,
    pub write_timeout_secs: u64,
    pub idle_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub uri: String,
    pub database: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionConfig {
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub backoff_interval_ms: u64,
    pub keep_alive_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TronNodeConfig {
    pub host: String,
    pub port: u16,
    pub use_tls: bool,
    pub connection: ConnectionConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TronConfig {
    pub node: TronNodeConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BlockchainConfig {
    pub tron: TronConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
    pub output: String,
}

/// Third-party ("Porto") notification endpoints. An empty string
/// disables that delivery path entirely.
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationsConfig {
    #[serde(default)]
    pub operations_endpoint: String,
    #[serde(default)]
    pub trc20_transfer_endpoint: String,
}

impl NotificationsConfig {
    pub fn enabled(&self) -> bool {
        !self.operations_endpoint.is_empty() || !self.trc20_transfer_endpoint.is_empty()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub blockchain: BlockchainConfig,
    pub logging: LoggingConfig,
    pub notifications: NotificationsConfig,
}

impl Config {
    /// Loads configuration layered as: built-in defaults, an optional file
    /// at `path`, then environment variables prefixed `TRONWATCH_` with `__`
    /// as the nesting separator (e.g. `TRONWATCH_SERVER__PORT=9090`).
    pub fn load(path: Option<&str>) -> anyhow::Result<Self> {
        let mut builder = config::Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("server.read_timeout_secs", 30)?
            .set_default("server.write_timeout_secs", 30)?
            .set_default("server.idle_timeout_secs", 120)?
            .set_default("database.uri", "memory://")?
            .set_default("database.database", "tron_watch")?
            .set_default("blockchain.tron.node.host", "127.0.0.1")?
            .set_default("blockchain.tron.node.port", 8090)?
            .set_default("blockchain.tron.node.use_tls", false)?
            .set_default("blockchain.tron.node.connection.timeout_secs", 5)?
            .set_default("blockchain.tron.node.connection.max_retries", 3)?
            .set_default("blockchain.tron.node.connection.backoff_interval_ms", 500)?
            .set_default("blockchain.tron.node.connection.keep_alive_secs", 60)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "text")?
            .set_default("logging.output", "stdout")?
            .set_default("notifications.operations_endpoint", "")?
            .set_default("notifications.trc20_transfer_endpoint", "")?;

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        } else {
            builder = builder.add_source(config::File::with_name("config/default").required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("TRONWATCH")
                .separator("__")
                .try_parsing(true),
        );

        let cfg = builder.build()?;
        Ok(cfg.try_deserialize()?)
    }
}
