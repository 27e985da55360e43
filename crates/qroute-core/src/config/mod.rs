//! Configuration management with file persistence

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::routing::RouterConfig;

/// qroute configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub router: RouterConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite file holding the persisted Q-table; no persistence when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_path: Option<PathBuf>,
    /// Write each updated state through to the store
    pub persist_on_update: bool,
}

const KEYS: &[&str] = &[
    "router.learning_rate",
    "router.gamma",
    "router.exploration_initial",
    "router.exploration_decay",
    "router.exploration_floor",
    "router.num_actions",
    "router.max_states",
    "router.replay_capacity",
    "router.replay_batch_size",
    "storage.database_path",
    "storage.persist_on_update",
];

fn parse<T>(key: &str, value: &str) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .parse()
        .with_context(|| format!("Invalid {} value: {}", key, value))
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> anyhow::Result<PathBuf> {
        let dir = if let Ok(custom_dir) = env::var("QROUTE_CONFIG_DIR") {
            PathBuf::from(custom_dir)
        } else {
            dirs::config_dir()
                .ok_or_else(|| anyhow!("Could not determine config directory"))?
                .join("qroute")
        };
        Ok(dir)
    }

    /// Get the config file path
    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from file, or return defaults if it doesn't exist
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from a specific file
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> anyhow::Result<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Save configuration to a specific file
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        self.validate()?;

        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).with_context(|| {
                format!("Failed to create config directory: {}", dir.display())
            })?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        self.router.validate()?;
        Ok(())
    }

    /// Router parameters for constructing a [`crate::routing::Router`]
    pub fn router_config(&self) -> RouterConfig {
        self.router.clone()
    }

    /// Get a configuration value by key
    pub fn get(&self, key: &str) -> anyhow::Result<String> {
        let router = &self.router;
        match key {
            "router.learning_rate" => Ok(router.learning_rate.to_string()),
            "router.gamma" => Ok(router.gamma.to_string()),
            "router.exploration_initial" => Ok(router.exploration_initial.to_string()),
            "router.exploration_decay" => Ok(router.exploration_decay.to_string()),
            "router.exploration_floor" => Ok(router.exploration_floor.to_string()),
            "router.num_actions" => Ok(router.num_actions.to_string()),
            "router.max_states" => Ok(router.max_states.to_string()),
            "router.replay_capacity" => Ok(router.replay_capacity.to_string()),
            "router.replay_batch_size" => Ok(router.replay_batch_size.to_string()),

            "storage.database_path" => Ok(self
                .storage
                .database_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(not set)".to_string())),
            "storage.persist_on_update" => Ok(self.storage.persist_on_update.to_string()),

            _ => Err(anyhow!(
                "Unknown configuration key: {}. Valid keys: {}",
                key,
                KEYS.join(", ")
            )),
        }
    }

    /// Set a configuration value by key
    ///
    /// The change is rejected, leaving the config untouched, if it would make
    /// the router configuration invalid.
    pub fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        let mut candidate = self.clone();
        let router = &mut candidate.router;

        match key {
            "router.learning_rate" => router.learning_rate = parse(key, value)?,
            "router.gamma" => router.gamma = parse(key, value)?,
            "router.exploration_initial" => router.exploration_initial = parse(key, value)?,
            "router.exploration_decay" => router.exploration_decay = parse(key, value)?,
            "router.exploration_floor" => router.exploration_floor = parse(key, value)?,
            "router.num_actions" => router.num_actions = parse(key, value)?,
            "router.max_states" => router.max_states = parse(key, value)?,
            "router.replay_capacity" => router.replay_capacity = parse(key, value)?,
            "router.replay_batch_size" => router.replay_batch_size = parse(key, value)?,

            "storage.database_path" => {
                candidate.storage.database_path = if value.trim().is_empty() {
                    None
                } else {
                    Some(PathBuf::from(value))
                };
            }
            "storage.persist_on_update" => {
                candidate.storage.persist_on_update = parse(key, value)?;
            }

            _ => {
                return Err(anyhow!(
                    "Unknown configuration key: {}. Valid keys: {}",
                    key,
                    KEYS.join(", ")
                ));
            }
        }

        candidate.validate()?;
        *self = candidate;
        Ok(())
    }

    /// List all configuration keys and their values
    pub fn list(&self) -> anyhow::Result<Vec<(String, String)>> {
        KEYS.iter()
            .map(|key| {
                let value = self.get(key)?;
                Ok((key.to_string(), value))
            })
            .collect()
    }

    /// Reset configuration to defaults
    pub fn reset() -> anyhow::Result<()> {
        let path = Self::config_path()?;
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to remove config file: {}", path.display()))?;
        }
        Ok(())
    }
}
