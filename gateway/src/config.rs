use config::{ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub ledger: LedgerConfig,
    pub fleet: FleetConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LedgerConfig {
    pub data_dir: PathBuf,
    pub mailbox_capacity: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FleetConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8084)?
            .set_default("server.workers", 4)?
            .set_default("ledger.data_dir", "./data/compliance-ledger")?
            .set_default("ledger.mailbox_capacity", 1000)?
            .set_default("fleet.base_url", "http://localhost:8085")?
            .set_default("fleet.timeout_secs", 10)?;

        // Optional config file
        if let Ok(config_file) = env::var("CONFIG_FILE") {
            builder = builder.add_source(File::with_name(&config_file).required(false));
        }

        // Override with environment variables
        builder = builder.add_source(
            Environment::with_prefix("COMPLIANCE_GATEWAY").separator("__"),
        );

        builder.build()?.try_deserialize()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.workers == 0 {
            return Err(ConfigError::Message(
                "server.workers must be at least 1".to_string(),
            ));
        }
        if self.fleet.base_url.is_empty() {
            return Err(ConfigError::Message(
                "fleet.base_url must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Core ledger configuration derived from gateway settings
    pub fn ledger_config(&self) -> compliance_ledger::Config {
        let mut config = compliance_ledger::Config::default();
        config.data_dir = self.ledger.data_dir.clone();
        config.writer.mailbox_capacity = self.ledger.mailbox_capacity;
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::from_env().unwrap();
        assert_eq!(config.server.port, 8084);
        assert_eq!(config.fleet.timeout_secs, 10);
        config.validate().unwrap();
    }

    #[test]
    fn test_ledger_config_carries_settings() {
        let config = Config::from_env().unwrap();
        let ledger = config.ledger_config();
        assert_eq!(ledger.writer.mailbox_capacity, config.ledger.mailbox_capacity);
    }
}
