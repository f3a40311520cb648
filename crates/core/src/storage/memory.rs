//! In-memory storage for tests and embedding

use std::time::Duration;

use dashmap::DashMap;

use super::{ChunkRecord, ChunkStorage, RankRecord, StorageError, StorageResult, ZoneRecord};
use crate::identity::{RankId, WorldId, ZoneId};
use crate::position::ChunkPos;

/// Storage backed by concurrent maps. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    chunks: DashMap<(WorldId, ChunkPos), ChunkRecord>,
    zones: DashMap<(WorldId, ZoneId), ZoneRecord>,
    ranks: DashMap<RankId, RankRecord>,
    failing: DashMap<(WorldId, ChunkPos), String>,
    save_delay: Duration,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage whose chunk saves take at least `delay`, to back up the save queue
    pub fn with_save_delay(delay: Duration) -> Self {
        Self {
            save_delay: delay,
            ..Self::default()
        }
    }

    /// Make every load of a position fail with the given reason
    pub fn fail_on(&self, world: WorldId, position: ChunkPos, reason: &str) {
        self.failing.insert((world, position), reason.to_string());
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn get_chunk(&self, world: WorldId, position: ChunkPos) -> Option<ChunkRecord> {
        self.chunks.get(&(world, position)).map(|r| r.value().clone())
    }
}

impl ChunkStorage for MemoryStorage {
    fn load_chunk(&self, world: WorldId, position: ChunkPos) -> StorageResult<Option<ChunkRecord>> {
        if let Some(reason) = self.failing.get(&(world, position)) {
            return Err(StorageError::Unavailable(reason.value().clone()));
        }
        Ok(self.get_chunk(world, position))
    }

    fn save_chunk(&self, record: &ChunkRecord) -> StorageResult<()> {
        if !self.save_delay.is_zero() {
            std::thread::sleep(self.save_delay);
        }
        self.chunks
            .insert((record.world, record.position()), record.clone());
        Ok(())
    }

    fn remove_chunk(&self, world: WorldId, position: ChunkPos) -> StorageResult<()> {
        self.chunks.remove(&(world, position));
        Ok(())
    }

    fn load_zones(&self, world: WorldId) -> StorageResult<Vec<ZoneRecord>> {
        Ok(self
            .zones
            .iter()
            .filter(|z| z.key().0 == world)
            .map(|z| z.value().clone())
            .collect())
    }

    fn save_zone(&self, record: &ZoneRecord) -> StorageResult<()> {
        self.zones.insert((record.world, record.id), record.clone());
        Ok(())
    }

    fn remove_zone(&self, world: WorldId, zone: ZoneId) -> StorageResult<()> {
        self.zones.remove(&(world, zone));
        Ok(())
    }

    fn load_ranks(&self) -> StorageResult<Vec<RankRecord>> {
        Ok(self.ranks.iter().map(|r| r.value().clone()).collect())
    }

    fn save_rank(&self, record: &RankRecord) -> StorageResult<()> {
        self.ranks.insert(record.id, record.clone());
        Ok(())
    }
}
