//! Configuration files for MyChunks
//!
//! Every file is TOML, mapped onto a serde struct implementing
//! [`ConfigFile`]. A missing file is created with defaults on first load.
//!
//! | File | Type | Content |
//! |------|------|---------|
//! | `mychunks.toml` | [`MainConfig`] | storage engine and debug switch |
//! | `default-permissions.toml` | [`DefaultsConfig`] | global fallback and wilderness defaults |
//! | `worlds/<world>.toml` | [`WorldConfig`] | per-world fallback and wilderness overrides |
//!
//! # Example
//!
//! ```ignore
//! use mychunks_core::config::{self, ConfigFile, DefaultsConfig};
//!
//! let path = config::defaults_config_path(&config_dir);
//! let defaults = DefaultsConfig::load_or_create(&path)?.to_defaults();
//! engine.reload_defaults(defaults);
//! ```

mod loader;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::claims::WorldOverrides;
use crate::permissions::{Permission, PermissionDefaults};
use crate::storage::DEFAULT_QUEUE_CAPACITY;

pub use loader::{defaults_config_path, main_config_path, world_config_path, world_file_name, worlds_dir};

/// Configuration system errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read or write config file
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse TOML content
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Failed to serialize config to TOML
    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    /// Storage engine name is not supported
    #[error("The storage engine '{0}' is not supported")]
    UnknownStorageEngine(String),
}

/// Result type for config operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// A TOML-backed configuration file.
///
/// # Requirements
///
/// Your config type must implement:
/// - `Default` - for generating initial config files
/// - `Serialize` - for saving to TOML
/// - `DeserializeOwned` - for loading from TOML
/// - `Send + Sync` - for thread-safe access
pub trait ConfigFile: Default + Serialize + DeserializeOwned + Send + Sync {
    /// Name used in log messages
    const NAME: &'static str;

    /// Load config from file.
    fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        tracing::debug!("Loaded {} config from {:?}", Self::NAME, path);
        Ok(config)
    }

    /// Load config from file, creating default if missing.
    fn load_or_create(path: &Path) -> ConfigResult<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            let default = Self::default();
            default.save(path)?;
            tracing::info!("Created default {} config at {:?}", Self::NAME, path);
            Ok(default)
        }
    }

    /// Save config to file.
    ///
    /// Creates parent directories if they don't exist.
    fn save(&self, path: &Path) -> ConfigResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        tracing::debug!("Saved {} config to {:?}", Self::NAME, path);
        Ok(())
    }

    /// Reload config from file.
    ///
    /// Updates self with the current file contents.
    fn reload(&mut self, path: &Path) -> ConfigResult<()> {
        *self = Self::load(path)?;
        Ok(())
    }
}

/// Supported storage backends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageEngine {
    Json,
}

/// `[storage]` table of the main config
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct StorageConfig {
    /// Only `"json"` is supported
    pub engine: String,

    /// Where claim data is written, relative to the config directory
    pub save_dir: PathBuf,

    /// Pending saves before new ones are dropped
    pub queue_capacity: usize,

    /// Seconds an unused region file stays cached
    pub cache_idle_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            engine: "json".to_string(),
            save_dir: PathBuf::from("data"),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            cache_idle_secs: 300,
        }
    }
}

impl StorageConfig {
    pub fn engine(&self) -> ConfigResult<StorageEngine> {
        match self.engine.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(StorageEngine::Json),
            _ => Err(ConfigError::UnknownStorageEngine(self.engine.clone())),
        }
    }

    /// The save directory, resolved against the config directory when relative
    pub fn resolve_save_dir(&self, config_dir: &Path) -> PathBuf {
        if self.save_dir.is_absolute() {
            self.save_dir.clone()
        } else {
            config_dir.join(&self.save_dir)
        }
    }
}

/// Main settings, loaded from `mychunks.toml`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MainConfig {
    /// Config version for future migration support
    pub version: u32,

    /// Enable debug logging
    pub debug: bool,

    pub storage: StorageConfig,
}

impl Default for MainConfig {
    fn default() -> Self {
        Self {
            version: 1,
            debug: false,
            storage: StorageConfig::default(),
        }
    }
}

impl ConfigFile for MainConfig {
    const NAME: &'static str = "main";
}

/// Global permission defaults, loaded from `default-permissions.toml`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    /// Used when no context of a claimed chunk decides
    pub fallback: BTreeMap<String, bool>,

    /// Used on unclaimed chunks without a world override
    pub wilderness: BTreeMap<String, bool>,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self::from_defaults(&PermissionDefaults::builtin())
    }
}

impl ConfigFile for DefaultsConfig {
    const NAME: &'static str = "default permissions";
}

impl DefaultsConfig {
    pub fn from_defaults(defaults: &PermissionDefaults) -> Self {
        Self {
            fallback: Permission::ALL
                .iter()
                .map(|p| (p.key().to_string(), defaults.fallback(*p)))
                .collect(),
            wilderness: Permission::ALL
                .iter()
                .map(|p| (p.key().to_string(), defaults.wild(*p)))
                .collect(),
        }
    }

    /// Built-in defaults with the configured values applied.
    ///
    /// Unknown keys are logged and skipped.
    pub fn to_defaults(&self) -> PermissionDefaults {
        let mut defaults = PermissionDefaults::builtin();
        for (permission, value) in parse_table(&self.fallback, "fallback") {
            defaults.set_fallback(permission, value);
        }
        for (permission, value) in parse_table(&self.wilderness, "wilderness") {
            defaults.set_wild(permission, value);
        }
        defaults
    }
}

/// Per-world overrides, loaded from `worlds/<world>.toml`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Overrides for unclaimed chunks of this world
    #[serde(rename = "wild-permissions")]
    pub wild: BTreeMap<String, bool>,

    /// Overrides used when a claimed chunk and its zone do not decide
    #[serde(rename = "fallback-permissions")]
    pub fallback: BTreeMap<String, bool>,
}

impl ConfigFile for WorldConfig {
    const NAME: &'static str = "world";
}

impl WorldConfig {
    pub fn from_overrides(overrides: &WorldOverrides) -> Self {
        let keyed = |map: &BTreeMap<Permission, bool>| -> BTreeMap<String, bool> {
            map.iter()
                .map(|(p, v)| (p.key().to_string(), *v))
                .collect()
        };
        Self {
            wild: keyed(&overrides.wild),
            fallback: keyed(&overrides.fallback),
        }
    }

    pub fn to_overrides(&self) -> WorldOverrides {
        WorldOverrides {
            wild: parse_table(&self.wild, "wild-permissions").collect(),
            fallback: parse_table(&self.fallback, "fallback-permissions").collect(),
        }
    }
}

fn parse_table<'a>(
    table: &'a BTreeMap<String, bool>,
    section: &'a str,
) -> impl Iterator<Item = (Permission, bool)> + 'a {
    table.iter().filter_map(move |(key, value)| match key.parse::<Permission>() {
        Ok(permission) => Some((permission, *value)),
        Err(e) => {
            tracing::warn!("Ignoring [{}] entry: {}", section, e);
            None
        }
    })
}
