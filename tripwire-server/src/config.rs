//! TOML file configuration.
//!
//! These structs map directly to the `tripwire.toml` file format.

use std::net::SocketAddr;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tripwire_core::config::EngineConfig;

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub bus: BusConfig,
}

/// Server configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The address and port to listen on.
    #[serde(default = "default_listen_addr")]
    pub listen: SocketAddr,
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 14400))
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen_addr(),
        }
    }
}

/// Which index backend holds the stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// In-process storage; state dies with the process.
    #[default]
    Memory,
    /// Postgres JSONB storage.
    Postgres,
}

/// Storage configuration section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    /// Connection string, required for the postgres backend.
    #[serde(default)]
    pub database_url: Option<String>,
}

/// Which bus client carries rendered jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BusKind {
    /// In-process recording bus; jobs go nowhere.
    #[default]
    Memory,
    /// POST every job to a broker-facing relay endpoint.
    Http,
}

/// Bus configuration section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BusConfig {
    #[serde(default)]
    pub kind: BusKind,
    /// Relay endpoint, required for the http bus.
    #[serde(default)]
    pub endpoint: Option<String>,
}

impl FileConfig {
    /// Read the config file; a missing file yields the defaults.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            tracing::warn!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_config_parses() {
        let toml_str = r#"
[server]
listen = "127.0.0.1:9000"

[engine]
space = "stage"
reserved_data_keys = ["requestorId"]

[storage]
backend = "postgres"
database_url = "postgres://tripwire@localhost/tripwire"

[bus]
kind = "http"
endpoint = "http://relay.internal:8200/publish"
"#;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.listen.port(), 9000);
        assert_eq!(config.engine.space, "stage");
        assert_eq!(config.engine.reserved_data_keys, vec!["requestorId"]);
        assert_eq!(config.storage.backend, StorageBackend::Postgres);
        assert_eq!(config.bus.kind, BusKind::Http);
    }

    #[test]
    fn empty_config_falls_back_to_defaults() {
        let config: FileConfig = toml::from_str("").unwrap();
        assert_eq!(config.server.listen.port(), 14400);
        assert_eq!(config.engine.space, "local");
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.bus.kind, BusKind::Memory);
        assert!(config.bus.endpoint.is_none());
    }
}
