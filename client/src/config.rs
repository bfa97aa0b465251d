use serde::Deserialize;
use std::path::Path;
use tracing::info;

/// Top-level client configuration, loaded from fana.toml.
#[derive(Deserialize, Default)]
#[serde(default)]
pub struct ClientConfig {
    pub server: ServerSection,
    pub storage: StorageSection,
}

#[derive(Deserialize)]
#[serde(default)]
pub struct ServerSection {
    /// WebSocket URL of the realtime service.
    pub url: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            url: "ws://localhost:5000".into(),
        }
    }
}

#[derive(Deserialize)]
#[serde(default)]
pub struct StorageSection {
    pub database_url: String,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            database_url: "sqlite:fana.db?mode=rwc".into(),
        }
    }
}

impl ClientConfig {
    /// Load config from a TOML file. Falls back to defaults if the file
    /// doesn't exist. Environment variables override TOML values.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let mut config = if Path::new(path).exists() {
            let contents = std::fs::read_to_string(path)?;
            toml::from_str(&contents)?
        } else {
            info!("No config file found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("FANA_SERVER_URL") {
            self.server.url = v;
        }
        if let Ok(v) = std::env::var("DATABASE_URL") {
            self.storage.database_url = v;
        }
    }
}
