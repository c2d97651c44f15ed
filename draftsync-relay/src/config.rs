//! Relay configuration from the environment.

use draftsync_collab::ServerConfig;
use serde::Deserialize;

const ENV_PREFIX: &str = "DRAFTSYNC_";

/// Settings read from `DRAFTSYNC_*` variables.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RelayConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Relay command queue capacity
    #[serde(default = "default_command_buffer")]
    pub command_buffer: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Environment variable error: {0}")]
    Env(#[from] envy::Error),
}

impl RelayConfig {
    /// Load from the process environment, after an optional `.env` file.
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            log::debug!("Loaded {}", path.display());
        }
        let config = envy::prefixed(ENV_PREFIX).from_env::<Self>()?;
        log::info!("Configuration loaded: {}", config.server_address());
        Ok(config)
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn into_server_config(self) -> ServerConfig {
        ServerConfig {
            bind_addr: self.server_address(),
            command_buffer: self.command_buffer,
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            command_buffer: default_command_buffer(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3001
}

fn default_command_buffer() -> usize {
    256
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_pairs(pairs: &[(&str, &str)]) -> Result<RelayConfig, envy::Error> {
        envy::prefixed(ENV_PREFIX).from_iter(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<Vec<_>>(),
        )
    }

    #[test]
    fn test_defaults_match_server_config() {
        let config = from_pairs(&[]).unwrap();
        assert_eq!(config, RelayConfig::default());
        assert_eq!(config.into_server_config(), ServerConfig::default());
    }

    #[test]
    fn test_prefixed_overrides() {
        let config = from_pairs(&[
            ("DRAFTSYNC_HOST", "0.0.0.0"),
            ("DRAFTSYNC_PORT", "9000"),
            ("DRAFTSYNC_COMMAND_BUFFER", "32"),
            ("PORT", "1"),
        ])
        .unwrap();

        assert_eq!(config.server_address(), "0.0.0.0:9000");
        assert_eq!(config.command_buffer, 32);
    }

    #[test]
    fn test_bad_port_is_rejected() {
        assert!(from_pairs(&[("DRAFTSYNC_PORT", "not-a-port")]).is_err());
    }
}
