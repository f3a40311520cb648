//! Lifecycle wiring between the host server and the claim engine

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::instrument;

use mychunks_core::config::{self, StorageEngine};
use mychunks_core::{
    ChunkPos, ClaimEngine, ConfigFile, DefaultsConfig, MainConfig, NodeRegistry, SaveReport, WorldConfig, WorldId,
};
use mychunks_storage::JsonStorage;

use crate::error::PluginResult;
use crate::logging::init_logging;

/// A running MyChunks instance.
///
/// The host forwards its world and chunk events here. Everything below the
/// event handlers lives in [`ClaimEngine`].
pub struct MyChunks {
    config_dir: PathBuf,
    config: MainConfig,
    nodes: Arc<NodeRegistry>,
    storage: Arc<JsonStorage>,
    engine: ClaimEngine,
}

impl MyChunks {
    /// Read the config files, open storage and start the engine
    #[instrument(skip_all)]
    pub fn enable(config_dir: impl Into<PathBuf>) -> PluginResult<Self> {
        let config_dir = config_dir.into();
        let config = MainConfig::load_or_create(&config::main_config_path(&config_dir))?;
        init_logging(config.debug);

        tracing::info!("MyChunks loading...");

        match config.storage.engine()? {
            StorageEngine::Json => {}
        }
        let save_dir = config.storage.resolve_save_dir(&config_dir);
        let idle = Duration::from_secs(config.storage.cache_idle_secs);
        let storage = Arc::new(JsonStorage::open(save_dir, idle)?);

        let defaults = DefaultsConfig::load_or_create(&config::defaults_config_path(&config_dir))?.to_defaults();
        let nodes = Arc::new(NodeRegistry::new());
        let engine = ClaimEngine::new(storage.clone(), nodes.clone(), defaults, config.storage.queue_capacity)?;

        tracing::info!("MyChunks loaded successfully!");

        Ok(Self {
            config_dir,
            config,
            nodes,
            storage,
            engine,
        })
    }

    pub fn engine(&self) -> &ClaimEngine {
        &self.engine
    }

    pub fn config(&self) -> &MainConfig {
        &self.config
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Permission nodes granted by the host; holders of the admin node act
    /// as owner of admin-held claims
    pub fn nodes(&self) -> &NodeRegistry {
        &self.nodes
    }

    pub fn storage(&self) -> &JsonStorage {
        &self.storage
    }

    /// Re-read `default-permissions.toml` and swap the global defaults
    pub fn reload_defaults(&self) -> PluginResult<()> {
        let path = config::defaults_config_path(&self.config_dir);
        let defaults = DefaultsConfig::load_or_create(&path)?.to_defaults();
        self.engine.reload_defaults(defaults);
        Ok(())
    }

    // ---- World events ----

    #[instrument(skip(self))]
    pub fn on_world_load(&self, world: WorldId, name: &str) -> PluginResult<()> {
        let path = config::world_config_path(&self.config_dir, name);
        let world_config = WorldConfig::load_or_create(&path)?;
        self.engine.load_world(world, name, world_config.to_overrides());
        Ok(())
    }

    /// Queue the world's changes and write back its overrides
    #[instrument(skip(self))]
    pub fn on_world_save(&self, world: WorldId) -> PluginResult<SaveReport> {
        let report = self.engine.save_world(world)?;
        let name = self.engine.with_world(world, |state| state.name().to_string())?;
        self.write_world_config(&name, &report)?;
        Ok(report)
    }

    #[instrument(skip(self))]
    pub fn on_world_unload(&self, world: WorldId) -> PluginResult<()> {
        self.on_world_save(world)?;
        self.engine.unload_world(world);
        Ok(())
    }

    // ---- Chunk events ----

    pub fn on_chunk_load(&self, world: WorldId, position: ChunkPos) -> PluginResult<()> {
        self.engine.load_chunk(world, position)?;
        Ok(())
    }

    pub fn on_chunk_unload(&self, world: WorldId, position: ChunkPos) -> PluginResult<()> {
        self.engine.unload_chunk(world, position)?;
        Ok(())
    }

    /// Save every world and wait for pending writes
    #[instrument(skip_all)]
    pub fn disable(self) {
        tracing::info!("MyChunks unloading...");

        for (world, report) in self.engine.shutdown() {
            if report.overrides.is_none() {
                continue;
            }
            let Ok(name) = self.engine.with_world(world, |s| s.name().to_string()) else {
                continue;
            };
            if let Err(e) = self.write_world_config(&name, &report) {
                tracing::error!("Failed to write config of world {}: {}", name, e);
            }
        }

        tracing::info!("MyChunks unloaded");
    }

    fn write_world_config(&self, name: &str, report: &SaveReport) -> PluginResult<()> {
        if let Some(overrides) = &report.overrides {
            let path = config::world_config_path(&self.config_dir, name);
            WorldConfig::from_overrides(overrides).save(&path)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for MyChunks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MyChunks")
            .field("config_dir", &self.config_dir)
            .field("engine", &self.engine)
            .field("storage", &self.storage)
            .finish()
    }
}
