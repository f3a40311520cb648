//! Per-world claim state
//!
//! A [`WorldState`] owns every loaded claimed chunk and every zone of one
//! world, plus the world's fallback and wilderness contexts. It has no
//! internal locking; the engine serializes writers per world.

use std::collections::{BTreeMap, HashMap};

use crate::access::AccessContext;
use crate::error::{ClaimError, ClaimResult, ValidationError};
use crate::identity::{Identity, PlayerId, WorldId, ZoneId};
use crate::permissions::{Permission, PermissionDefaults};
use crate::position::ChunkPos;
use crate::storage::{ChunkRecord, ZoneRecord};

use super::chain::{Chain, Layer, Resolution};
use super::chunk::ClaimedChunk;
use super::zone::Zone;

/// Addresses one access context inside a world
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextRef {
    Chunk(ChunkPos),
    Zone(ZoneId),
    WorldFallback,
    Wilderness,
}

/// Override tables of a world's fallback and wilderness contexts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorldOverrides {
    pub wild: BTreeMap<Permission, bool>,
    pub fallback: BTreeMap<Permission, bool>,
}

/// Everything that changed since the last save
#[derive(Debug, Default)]
pub struct DirtyRecords {
    pub chunks: Vec<ChunkRecord>,
    pub zones: Vec<ZoneRecord>,
    pub overrides: Option<WorldOverrides>,
}

impl DirtyRecords {
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty() && self.zones.is_empty() && self.overrides.is_none()
    }
}

/// Zone owner change that still has to reach chunks which are not loaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerCascade {
    pub world: WorldId,
    pub zone: ZoneId,
    pub previous: Option<Identity>,
    pub owner: Option<Identity>,
    pub unloaded: Vec<ChunkPos>,
}

impl OwnerCascade {
    /// Apply the cascade to a stored record. Returns `true` if it changed.
    pub fn apply_to(&self, record: &mut ChunkRecord) -> bool {
        let integrated = record.zone == Some(self.zone)
            && record.members.is_empty()
            && record.owner == self.previous;
        if integrated && record.owner != self.owner {
            record.owner = self.owner.clone();
            return true;
        }
        false
    }
}

/// Claims, zones and fallbacks of one world
#[derive(Debug, Clone)]
pub struct WorldState {
    id: WorldId,
    name: String,
    fallback: AccessContext,
    wilderness: AccessContext,
    chunks: HashMap<ChunkPos, ClaimedChunk>,
    zones: HashMap<ZoneId, Zone>,
}

impl WorldState {
    pub fn new(id: WorldId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            fallback: AccessContext::new(),
            wilderness: AccessContext::new(),
            chunks: HashMap::new(),
            zones: HashMap::new(),
        }
    }

    pub fn id(&self) -> WorldId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Replace the fallback and wilderness overrides, as read from configuration
    pub fn apply_overrides(&mut self, overrides: WorldOverrides) {
        self.wilderness = AccessContext::with_overrides(overrides.wild);
        self.fallback = AccessContext::with_overrides(overrides.fallback);
    }

    pub fn overrides(&self) -> WorldOverrides {
        WorldOverrides {
            wild: self.wilderness.overrides().clone(),
            fallback: self.fallback.overrides().clone(),
        }
    }

    pub fn fallback(&self) -> &AccessContext {
        &self.fallback
    }

    pub fn wilderness(&self) -> &AccessContext {
        &self.wilderness
    }

    // ---- Chunks ----

    pub fn chunk(&self, position: ChunkPos) -> Option<&ClaimedChunk> {
        self.chunks.get(&position)
    }

    pub fn chunk_mut(&mut self, position: ChunkPos) -> Option<&mut ClaimedChunk> {
        self.chunks.get_mut(&position)
    }

    pub fn chunks(&self) -> impl Iterator<Item = &ClaimedChunk> {
        self.chunks.values()
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_claimed(&self, position: ChunkPos) -> bool {
        self.chunks.contains_key(&position)
    }

    /// Put a loaded chunk into the world.
    ///
    /// The zone link is taken from the zones' position sets; a stale link on
    /// the chunk is corrected and marks the chunk dirty.
    pub fn insert_chunk(&mut self, mut chunk: ClaimedChunk) -> Result<Option<ClaimedChunk>, ValidationError> {
        let position = chunk.position();
        if chunk.world() != self.id {
            return Err(ValidationError::WorldMismatch {
                position,
                expected: self.id,
                found: chunk.world(),
            });
        }

        let zone = self.zone_at(position);
        if chunk.zone() != zone {
            tracing::debug!(
                "Relinking chunk {} in {} from zone {:?} to {:?}",
                position,
                self.name,
                chunk.zone(),
                zone
            );
            chunk.set_zone(zone);
        }

        Ok(self.chunks.insert(position, chunk))
    }

    /// Take a chunk out of memory without touching its zone
    pub fn take_chunk(&mut self, position: ChunkPos) -> Option<ClaimedChunk> {
        self.chunks.remove(&position)
    }

    /// Claim an unclaimed chunk
    pub fn claim(&mut self, position: ChunkPos, owner: Option<Identity>) -> ClaimResult<&ClaimedChunk> {
        if self.chunks.contains_key(&position) {
            return Err(ClaimError::AlreadyClaimed(position));
        }
        self.insert_chunk(ClaimedChunk::new(self.id, position, owner))?;
        self.chunks
            .get(&position)
            .ok_or(ClaimError::NotClaimed(position))
    }

    /// Drop a claim. A zoned chunk leaves its zone under the removal guard.
    pub fn unclaim(&mut self, position: ChunkPos) -> ClaimResult<ClaimedChunk> {
        let zone = self
            .chunks
            .get(&position)
            .ok_or(ClaimError::NotClaimed(position))?
            .zone();

        if let Some(zone) = zone {
            self.remove_chunk_from_zone(zone, position)?;
        }

        self.chunks
            .remove(&position)
            .ok_or(ClaimError::NotClaimed(position))
    }

    // ---- Zones ----

    pub fn zone(&self, id: ZoneId) -> Option<&Zone> {
        self.zones.get(&id)
    }

    pub fn zone_mut(&mut self, id: ZoneId) -> Option<&mut Zone> {
        self.zones.get_mut(&id)
    }

    pub fn zones(&self) -> impl Iterator<Item = &Zone> {
        self.zones.values()
    }

    /// The zone listing a position, if any
    pub fn zone_at(&self, position: ChunkPos) -> Option<ZoneId> {
        self.zones
            .values()
            .find(|z| z.contains(position))
            .map(Zone::id)
    }

    /// Find a zone by name, ignoring case, accents and symbols
    pub fn find_zone_by_name(&self, name: &str) -> Option<&Zone> {
        let wanted = crate::normalize::normalize_identifier(name);
        self.zones.values().find(|z| z.normalized_name() == wanted)
    }

    pub fn insert_zone(&mut self, zone: Zone) -> Result<(), ValidationError> {
        if zone.world() != self.id {
            return Err(ValidationError::WorldMismatch {
                position: zone.positions().next().unwrap_or(ChunkPos::new(0, 0)),
                expected: self.id,
                found: zone.world(),
            });
        }
        self.zones.insert(zone.id(), zone);
        Ok(())
    }

    pub fn create_zone(&mut self, name: &str) -> Result<ZoneId, ValidationError> {
        let zone = Zone::new(self.id, name)?;
        let id = zone.id();
        tracing::info!("Created zone {} ({}) in {}", zone.name(), id, self.name);
        self.zones.insert(id, zone);
        Ok(id)
    }

    /// Drop a zone and unlink its loaded chunks. The chunks stay claimed.
    pub fn remove_zone(&mut self, zone_id: ZoneId) -> ClaimResult<Zone> {
        let zone = self
            .zones
            .remove(&zone_id)
            .ok_or(ClaimError::ZoneNotFound(zone_id))?;
        for position in zone.positions() {
            if let Some(chunk) = self.chunks.get_mut(&position) {
                chunk.set_zone(None);
            }
        }
        Ok(zone)
    }

    /// Link a claimed chunk to a zone.
    ///
    /// Validates first, then detaches the chunk from its previous zone
    /// without the removal guard. Adding a chunk to its own zone does nothing.
    pub fn add_chunk_to_zone(&mut self, zone_id: ZoneId, position: ChunkPos) -> ClaimResult<()> {
        let chunk = self
            .chunks
            .get(&position)
            .ok_or(ClaimError::NotClaimed(position))?;
        let (chunk_world, previous) = (chunk.world(), chunk.zone());

        let zone = self
            .zones
            .get(&zone_id)
            .ok_or(ClaimError::ZoneNotFound(zone_id))?;
        if previous == Some(zone_id) && zone.contains(position) {
            return Ok(());
        }
        zone.validate_addition(chunk_world, position)?;

        if let Some(old) = previous.filter(|old| *old != zone_id) {
            if let Some(old_zone) = self.zones.get_mut(&old) {
                old_zone.remove_position(position);
            }
        }

        if let Some(zone) = self.zones.get_mut(&zone_id) {
            zone.insert_position(position);
        }
        if let Some(chunk) = self.chunks.get_mut(&position) {
            chunk.set_zone(Some(zone_id));
        }
        Ok(())
    }

    /// Unlink a position from a zone under the removal guard.
    ///
    /// Removing a position the zone does not hold does nothing.
    pub fn remove_chunk_from_zone(&mut self, zone_id: ZoneId, position: ChunkPos) -> ClaimResult<()> {
        let zone = self
            .zones
            .get_mut(&zone_id)
            .ok_or(ClaimError::ZoneNotFound(zone_id))?;
        if !zone.contains(position) {
            return Ok(());
        }
        if zone.is_removal_blocked(position) {
            return Err(ValidationError::RemovalBreaksContiguity {
                position,
                zone: zone_id,
            }
            .into());
        }
        zone.remove_position(position);

        if let Some(chunk) = self.chunks.get_mut(&position) {
            if chunk.zone() == Some(zone_id) {
                chunk.set_zone(None);
            }
        }
        Ok(())
    }

    /// A chunk follows its zone's owner while it has no members and the
    /// same owner as the zone (both unset counts as the same).
    pub fn is_integrated(&self, zone_id: ZoneId, position: ChunkPos) -> ClaimResult<bool> {
        let zone = self
            .zones
            .get(&zone_id)
            .ok_or(ClaimError::ZoneNotFound(zone_id))?;
        let chunk = self
            .chunks
            .get(&position)
            .ok_or(ClaimError::NotClaimed(position))?;

        Ok(chunk.zone() == Some(zone_id) && integrated_with(chunk, zone.context().owner()))
    }

    /// Change a zone's owner, carrying integrated loaded chunks along.
    ///
    /// Chunks of the zone that are not loaded are listed in the returned
    /// cascade for the caller to update in storage.
    pub fn set_zone_owner(&mut self, zone_id: ZoneId, owner: Option<Identity>) -> ClaimResult<OwnerCascade> {
        let zone = self
            .zones
            .get(&zone_id)
            .ok_or(ClaimError::ZoneNotFound(zone_id))?;
        let previous = zone.context().owner().cloned();
        let positions: Vec<ChunkPos> = zone.positions().collect();

        let mut unloaded = Vec::new();
        for position in positions {
            match self.chunks.get_mut(&position) {
                Some(chunk) => {
                    if integrated_with(chunk, previous.as_ref()) {
                        chunk.context_mut().set_owner(owner.clone());
                    }
                }
                None => unloaded.push(position),
            }
        }

        if let Some(zone) = self.zones.get_mut(&zone_id) {
            zone.context_mut().set_owner(owner.clone());
        }

        Ok(OwnerCascade {
            world: self.id,
            zone: zone_id,
            previous,
            owner,
            unloaded,
        })
    }

    // ---- Contexts ----

    pub fn context(&self, target: ContextRef) -> ClaimResult<&AccessContext> {
        match target {
            ContextRef::Chunk(position) => self
                .chunks
                .get(&position)
                .map(ClaimedChunk::context)
                .ok_or(ClaimError::NotClaimed(position)),
            ContextRef::Zone(id) => self
                .zones
                .get(&id)
                .map(Zone::context)
                .ok_or(ClaimError::ZoneNotFound(id)),
            ContextRef::WorldFallback => Ok(&self.fallback),
            ContextRef::Wilderness => Ok(&self.wilderness),
        }
    }

    pub fn context_mut(&mut self, target: ContextRef) -> ClaimResult<&mut AccessContext> {
        match target {
            ContextRef::Chunk(position) => self
                .chunks
                .get_mut(&position)
                .map(ClaimedChunk::context_mut)
                .ok_or(ClaimError::NotClaimed(position)),
            ContextRef::Zone(id) => self
                .zones
                .get_mut(&id)
                .map(Zone::context_mut)
                .ok_or(ClaimError::ZoneNotFound(id)),
            ContextRef::WorldFallback => Ok(&mut self.fallback),
            ContextRef::Wilderness => Ok(&mut self.wilderness),
        }
    }

    /// Like [`Self::context_mut`], for owner and member changes.
    ///
    /// The world fallback and wilderness layers only answer with overrides,
    /// so they refuse owners and members.
    pub fn member_context_mut(&mut self, target: ContextRef) -> ClaimResult<&mut AccessContext> {
        match target {
            ContextRef::WorldFallback | ContextRef::Wilderness => Err(ClaimError::OverridesOnly(target)),
            target => self.context_mut(target),
        }
    }

    // ---- Resolution ----

    /// Layers consulted for a position
    pub fn chain(&self, position: ChunkPos) -> Chain {
        match self.chunks.get(&position) {
            Some(chunk) => Chain::claimed(position, chunk.zone()),
            None => Chain::unclaimed(),
        }
    }

    /// Walk the chain for a position
    pub fn resolve(
        &self,
        position: ChunkPos,
        permission: Permission,
        actor: PlayerId,
        is_admin: bool,
        defaults: &PermissionDefaults,
    ) -> Resolution {
        self.chain(position)
            .resolve(permission, defaults, |layer| match layer {
                Layer::Chunk(pos) => self
                    .chunks
                    .get(&pos)
                    .and_then(|c| c.context().check(permission, actor, is_admin)),
                Layer::Zone(id) => self
                    .zones
                    .get(&id)
                    .and_then(|z| z.context().check(permission, actor, is_admin)),
                Layer::WorldFallback => self.fallback.public_permission(permission),
                Layer::Wilderness => self.wilderness.public_permission(permission),
            })
    }

    /// Owner named in denial notices: the chunk owner, then the zone owner,
    /// then the admins for claimed land or the wilderness for the rest
    pub fn nearest_owner(&self, position: ChunkPos) -> Identity {
        let Some(chunk) = self.chunks.get(&position) else {
            return Identity::wilderness();
        };

        chunk
            .owner()
            .or_else(|| {
                chunk
                    .zone()
                    .and_then(|id| self.zones.get(&id))
                    .and_then(|z| z.context().owner())
            })
            .cloned()
            .unwrap_or_else(Identity::admins)
    }

    // ---- Persistence ----

    /// Collect records of everything modified and mark it clean
    pub fn take_dirty(&mut self) -> DirtyRecords {
        let mut dirty = DirtyRecords::default();

        for chunk in self.chunks.values_mut().filter(|c| c.is_modified()) {
            dirty.chunks.push(chunk.to_record());
            chunk.mark_clean();
        }
        for zone in self.zones.values_mut().filter(|z| z.is_modified()) {
            dirty.zones.push(zone.to_record());
            zone.mark_clean();
        }
        if self.fallback.is_modified() || self.wilderness.is_modified() {
            dirty.overrides = Some(self.overrides());
            self.fallback.mark_clean();
            self.wilderness.mark_clean();
        }

        dirty
    }
}

fn integrated_with(chunk: &ClaimedChunk, zone_owner: Option<&Identity>) -> bool {
    !chunk.context().has_members() && chunk.owner() == zone_owner
}
