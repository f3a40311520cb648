//! Region-keyed JSON storage

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use mychunks_core::storage::{ChunkRecord, ChunkStorage, RankRecord, StorageResult, ZoneRecord};
use mychunks_core::{ChunkPos, RegionPos, WorldId, ZoneId};

use crate::files::{read_json, remove_file, write_json};

/// How long an unused region stays cached
pub const DEFAULT_CACHE_IDLE: Duration = Duration::from_secs(300);

/// On-disk shape of a region file
#[derive(Debug, Default, Serialize, Deserialize)]
struct RegionData {
    #[serde(default)]
    chunks: Vec<ChunkRecord>,
}

/// Cached content of one region file
#[derive(Debug)]
struct Region {
    chunks: BTreeMap<ChunkPos, ChunkRecord>,
    last_access: Instant,
}

impl Region {
    fn touch(&mut self) {
        self.last_access = Instant::now();
    }

    fn to_data(&self) -> RegionData {
        RegionData {
            chunks: self.chunks.values().cloned().collect(),
        }
    }
}

type RegionKey = (WorldId, RegionPos);

/// [`ChunkStorage`] writing JSON files under a root directory
pub struct JsonStorage {
    root: PathBuf,
    idle: Duration,
    regions: DashMap<RegionKey, Arc<Mutex<Region>>>,
    last_sweep: Mutex<Instant>,
    // Serializes read-modify-write of the shared zone and rank files
    zones_lock: Mutex<()>,
    ranks_lock: Mutex<()>,
}

impl JsonStorage {
    /// Open (and create) the storage directory
    pub fn open(root: impl Into<PathBuf>, idle: Duration) -> StorageResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        tracing::info!("JSON storage at {:?}", root);

        Ok(Self {
            root,
            idle,
            regions: DashMap::new(),
            last_sweep: Mutex::new(Instant::now()),
            zones_lock: Mutex::new(()),
            ranks_lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn world_dir(&self, world: WorldId) -> PathBuf {
        self.root.join(world.to_string())
    }

    fn region_path(&self, world: WorldId, region: RegionPos) -> PathBuf {
        self.world_dir(world).join(format!("{}.json", region))
    }

    fn zones_path(&self, world: WorldId) -> PathBuf {
        self.world_dir(world).join("zones.json")
    }

    fn ranks_path(&self) -> PathBuf {
        self.root.join("ranks.json")
    }

    /// Number of regions held in memory
    pub fn cached_regions(&self) -> usize {
        self.regions.len()
    }

    /// Drop cached regions unused for longer than `idle`.
    ///
    /// Regions are written through, so nothing is lost. A region someone
    /// still holds is kept, otherwise a reload could race its pending write.
    /// Returns how many regions were dropped.
    pub fn evict_idle(&self, idle: Duration) -> usize {
        let before = self.regions.len();
        self.regions.retain(|_, region| {
            Arc::strong_count(region) > 1 || region.lock().last_access.elapsed() < idle
        });
        let evicted = before.saturating_sub(self.regions.len());
        if evicted > 0 {
            tracing::debug!("Evicted {} idle regions", evicted);
        }
        evicted
    }

    fn maybe_evict(&self) {
        let mut last_sweep = self.last_sweep.lock();
        if last_sweep.elapsed() >= self.idle {
            *last_sweep = Instant::now();
            drop(last_sweep);
            self.evict_idle(self.idle);
        }
    }

    fn region(&self, world: WorldId, region: RegionPos) -> StorageResult<Arc<Mutex<Region>>> {
        self.maybe_evict();

        let key = (world, region);
        if let Some(cached) = self.regions.get(&key) {
            return Ok(cached.clone());
        }

        let path = self.region_path(world, region);
        let data: RegionData = read_json(&path)?;
        let chunks = data
            .chunks
            .into_iter()
            .map(|record| (record.position(), record))
            .collect();
        tracing::trace!("Loaded region {} of {} from {:?}", region, world, path);

        let loaded = Arc::new(Mutex::new(Region {
            chunks,
            last_access: Instant::now(),
        }));
        Ok(self.regions.entry(key).or_insert(loaded).clone())
    }

    fn write_region(&self, world: WorldId, region: RegionPos, data: &Region) -> StorageResult<()> {
        let path = self.region_path(world, region);
        if data.chunks.is_empty() {
            remove_file(&path)
        } else {
            write_json(&path, &data.to_data())
        }
    }

    fn update_zones<F>(&self, world: WorldId, update: F) -> StorageResult<()>
    where
        F: FnOnce(&mut Vec<ZoneRecord>),
    {
        let _guard = self.zones_lock.lock();
        let path = self.zones_path(world);
        let mut zones: Vec<ZoneRecord> = read_json(&path)?;
        update(&mut zones);
        write_json(&path, &zones)
    }
}

impl ChunkStorage for JsonStorage {
    fn load_chunk(&self, world: WorldId, position: ChunkPos) -> StorageResult<Option<ChunkRecord>> {
        let region = self.region(world, position.region())?;
        let mut region = region.lock();
        region.touch();
        Ok(region.chunks.get(&position).cloned())
    }

    fn save_chunk(&self, record: &ChunkRecord) -> StorageResult<()> {
        let position = record.position();
        let region_pos = position.region();
        let region = self.region(record.world, region_pos)?;

        let mut region = region.lock();
        region.touch();
        region.chunks.insert(position, record.clone());
        self.write_region(record.world, region_pos, &region)
    }

    fn remove_chunk(&self, world: WorldId, position: ChunkPos) -> StorageResult<()> {
        let region_pos = position.region();
        let region = self.region(world, region_pos)?;

        let mut region = region.lock();
        region.touch();
        if region.chunks.remove(&position).is_some() {
            self.write_region(world, region_pos, &region)?;
        }
        Ok(())
    }

    fn load_zones(&self, world: WorldId) -> StorageResult<Vec<ZoneRecord>> {
        let _guard = self.zones_lock.lock();
        read_json(&self.zones_path(world))
    }

    fn save_zone(&self, record: &ZoneRecord) -> StorageResult<()> {
        self.update_zones(record.world, |zones| {
            match zones.iter_mut().find(|z| z.id == record.id) {
                Some(existing) => *existing = record.clone(),
                None => zones.push(record.clone()),
            }
        })
    }

    fn remove_zone(&self, world: WorldId, zone: ZoneId) -> StorageResult<()> {
        self.update_zones(world, |zones| zones.retain(|z| z.id != zone))
    }

    fn load_ranks(&self) -> StorageResult<Vec<RankRecord>> {
        let _guard = self.ranks_lock.lock();
        read_json(&self.ranks_path())
    }

    fn save_rank(&self, record: &RankRecord) -> StorageResult<()> {
        let _guard = self.ranks_lock.lock();
        let path = self.ranks_path();
        let mut ranks: Vec<RankRecord> = read_json(&path)?;
        match ranks.iter_mut().find(|r| r.id == record.id) {
            Some(existing) => *existing = record.clone(),
            None => ranks.push(record.clone()),
        }
        write_json(&path, &ranks)
    }
}

impl std::fmt::Debug for JsonStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonStorage")
            .field("root", &self.root)
            .field("cached_regions", &self.regions.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use mychunks_core::{Identity, Permission, PlayerId, StorageError};

    use super::*;

    fn record(world: WorldId, x: i32, z: i32) -> ChunkRecord {
        ChunkRecord {
            world,
            x,
            z,
            owner: Some(Identity::new(PlayerId::new_random(), "Owner").unwrap()),
            zone: None,
            members: Vec::new(),
            overrides: BTreeMap::from([(Permission::Modify, true)]),
        }
    }

    fn storage(dir: &Path) -> JsonStorage {
        JsonStorage::open(dir, DEFAULT_CACHE_IDLE).unwrap()
    }

    #[test]
    fn test_chunk_roundtrip_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let world = WorldId::new_random();
        let saved = record(world, -1, 40);

        storage(dir.path()).save_chunk(&saved).unwrap();

        let reopened = storage(dir.path());
        let loaded = reopened.load_chunk(world, ChunkPos::new(-1, 40)).unwrap();
        assert_eq!(loaded, Some(saved));
        assert!(reopened.load_chunk(world, ChunkPos::new(0, 40)).unwrap().is_none());

        // Region (-1, 1) on disk
        assert!(dir.path().join(world.to_string()).join("r.-1.1.json").exists());
    }

    #[test]
    fn test_remove_last_chunk_deletes_region_file() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(dir.path());
        let world = WorldId::new_random();

        storage.save_chunk(&record(world, 0, 0)).unwrap();
        storage.save_chunk(&record(world, 1, 0)).unwrap();
        let path = dir.path().join(world.to_string()).join("r.0.0.json");

        storage.remove_chunk(world, ChunkPos::new(0, 0)).unwrap();
        assert!(path.exists());
        storage.remove_chunk(world, ChunkPos::new(1, 0)).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_zones_file() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(dir.path());
        let world = WorldId::new_random();

        let mut zone = ZoneRecord {
            id: ZoneId::new_random(),
            world,
            name: "Spawn".to_string(),
            owner: None,
            members: Vec::new(),
            overrides: BTreeMap::new(),
            positions: vec![ChunkPos::new(0, 0)],
        };
        storage.save_zone(&zone).unwrap();
        zone.name = "Spawn Town".to_string();
        storage.save_zone(&zone).unwrap();

        let zones = storage.load_zones(world).unwrap();
        assert_eq!(zones, vec![zone.clone()]);
        assert!(storage.load_zones(WorldId::new_random()).unwrap().is_empty());

        storage.remove_zone(world, zone.id).unwrap();
        assert!(storage.load_zones(world).unwrap().is_empty());
    }

    #[test]
    fn test_ranks_file() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(dir.path());
        let mut rank = RankRecord {
            id: mychunks_core::RankId::new_random(),
            name: "builder".to_string(),
            permissions: vec![Permission::Modify],
        };

        storage.save_rank(&rank).unwrap();
        rank.permissions.push(Permission::Enter);
        storage.save_rank(&rank).unwrap();

        assert_eq!(storage.load_ranks().unwrap(), vec![rank]);
    }

    #[test]
    fn test_corrupt_region_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let world = WorldId::new_random();
        let world_dir = dir.path().join(world.to_string());
        std::fs::create_dir_all(&world_dir).unwrap();
        std::fs::write(world_dir.join("r.0.0.json"), "garbage").unwrap();

        let err = storage(dir.path()).load_chunk(world, ChunkPos::new(3, 3)).unwrap_err();
        assert!(matches!(err, StorageError::Decode { .. }));
    }

    #[test]
    fn test_evict_idle() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(dir.path());
        let world = WorldId::new_random();

        storage.save_chunk(&record(world, 0, 0)).unwrap();
        storage.save_chunk(&record(world, 100, 100)).unwrap();
        assert_eq!(storage.cached_regions(), 2);

        assert_eq!(storage.evict_idle(Duration::from_secs(3600)), 0);
        assert_eq!(storage.evict_idle(Duration::ZERO), 2);

        // Evicted regions are read back from disk
        assert!(storage.load_chunk(world, ChunkPos::new(100, 100)).unwrap().is_some());
    }

    #[test]
    fn test_evict_skips_region_in_use() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(dir.path());
        let world = WorldId::new_random();
        storage.save_chunk(&record(world, 0, 0)).unwrap();

        let held = storage.region(world, ChunkPos::new(0, 0).region()).unwrap();
        assert_eq!(storage.evict_idle(Duration::ZERO), 0);

        // A write through the held handle stays visible to later loads
        held.lock().chunks.clear();
        assert!(storage.load_chunk(world, ChunkPos::new(0, 0)).unwrap().is_none());

        drop(held);
        assert_eq!(storage.evict_idle(Duration::ZERO), 1);
    }
}
