//! Client configuration

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::collector::DEFAULT_RETRY_ATTEMPTS;
use crate::directory::DEFAULT_DENYLIST;
use crate::jobs::DEFAULT_REGISTRY_URL;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// RPC URL for the ledger cluster
    pub rpc_url: String,

    /// Job registry endpoint
    pub job_registry_url: String,

    /// Pin all requests to one gateway instead of random selection
    pub gateway_override: Option<String>,

    /// Substrings of gateway URIs to exclude from selection
    pub denylist: Vec<String>,

    /// Attempt budget for single-feed signature fetches
    pub retry_attempts: u32,

    /// Gateway liveness probe timeout, seconds
    pub probe_timeout_secs: u64,

    /// How long a probe outcome stays cached, seconds
    pub health_ttl_secs: u64,
}

impl ClientConfig {
    /// Load configuration from TOML file
    pub fn load() -> Result<Self> {
        let config_path =
            std::env::var("QUORUM_CONFIG").unwrap_or_else(|_| "quorum-config.toml".to_string());

        let config_str = std::fs::read_to_string(&config_path)
            .context(format!("Failed to read config file: {}", config_path))?;

        let config: ClientConfig =
            toml::from_str(&config_str).context("Failed to parse config TOML")?;

        Ok(config)
    }

    /// Create default configuration
    pub fn default_devnet() -> Self {
        Self {
            rpc_url: "https://api.devnet.solana.com".to_string(),
            job_registry_url: DEFAULT_REGISTRY_URL.to_string(),
            gateway_override: None,
            denylist: DEFAULT_DENYLIST.iter().map(|s| s.to_string()).collect(),
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            probe_timeout_secs: 2,
            health_ttl_secs: 60,
        }
    }

    /// Write default config to file
    pub fn write_default(path: &str) -> Result<()> {
        let config = Self::default_devnet();
        let toml_str = toml::to_string_pretty(&config).context("Failed to serialize config")?;

        std::fs::write(path, toml_str).context(format!("Failed to write config to {}", path))?;

        log::info!("Created default config at {}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_creation() {
        let config = ClientConfig::default_devnet();
        assert_eq!(config.rpc_url, "https://api.devnet.solana.com");
        assert_eq!(config.retry_attempts, 3);
        assert!(config.gateway_override.is_none());
    }

    #[test]
    fn test_config_roundtrips_through_toml() {
        let config = ClientConfig::default_devnet();
        let encoded = toml::to_string_pretty(&config).unwrap();
        let decoded: ClientConfig = toml::from_str(&encoded).unwrap();
        assert_eq!(decoded.denylist, config.denylist);
        assert_eq!(decoded.health_ttl_secs, 60);
    }
}
