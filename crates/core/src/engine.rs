//! Cross-world claim engine
//!
//! [`ClaimEngine`] is the entry point for the host. It owns the loaded
//! worlds, the active permission defaults, the rank registry, the denial
//! listeners and the save queue.
//!
//! # Threading
//!
//! Worlds live in a `DashMap`, so loading and unloading different worlds or
//! chunks can happen from independent threads. Writers to one world are
//! serialized by the map's shard lock. Permission defaults are an
//! `Arc<PermissionDefaults>` behind an `RwLock`: a check clones the `Arc`
//! once and a reload swaps it wholesale.
//!
//! # Persistence
//!
//! Chunk loads call storage synchronously. Every write goes through the save
//! queue and is never awaited. A caller only waits when the queue is full,
//! and once the queue is stopped writes go straight to storage.

use std::sync::Arc;

use dashmap::mapref::one::RefMut;
use dashmap::DashMap;
use parking_lot::RwLock;

use crate::access::{Member, Rank, RankRegistry, SharedRank};
use crate::claims::{Chain, ClaimedChunk, ContextRef, Resolution, WorldOverrides, WorldState, Zone};
use crate::error::{ClaimError, ClaimResult};
use crate::identity::{Identity, PlayerId, WorldId, ZoneId};
use crate::listeners::{DenialEvent, DenialListeners, ListenerKey};
use crate::permissions::{AdminPredicate, Permission, PermissionDefaults, Tristate};
use crate::position::ChunkPos;
use crate::storage::{ChunkStorage, RankRecord, SaveJob, SaveQueue, StorageResult};

/// What a world save handed to storage
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SaveReport {
    pub chunks: usize,
    pub zones: usize,
    pub ranks: usize,
    /// Changed fallback and wilderness overrides, for the host to write back
    pub overrides: Option<WorldOverrides>,
}

/// Layered permission engine over every loaded world
pub struct ClaimEngine {
    worlds: DashMap<WorldId, WorldState>,
    defaults: RwLock<Arc<PermissionDefaults>>,
    admins: Arc<dyn AdminPredicate>,
    storage: Arc<dyn ChunkStorage>,
    saves: SaveQueue,
    ranks: RankRegistry,
    listeners: DenialListeners,
}

impl ClaimEngine {
    /// Start the save worker and load every stored rank
    pub fn new(
        storage: Arc<dyn ChunkStorage>,
        admins: Arc<dyn AdminPredicate>,
        defaults: PermissionDefaults,
        queue_capacity: usize,
    ) -> StorageResult<Self> {
        let saves = SaveQueue::start(storage.clone(), queue_capacity)?;

        let ranks = RankRegistry::new();
        for record in storage.load_ranks()? {
            let id = record.id;
            match record.into_rank() {
                Ok(rank) => {
                    ranks.insert(rank);
                }
                Err(e) => tracing::warn!("Skipping stored rank {}: {}", id, e),
            }
        }
        tracing::info!("Loaded {} ranks", ranks.len());

        Ok(Self {
            worlds: DashMap::new(),
            defaults: RwLock::new(Arc::new(defaults)),
            admins,
            storage,
            saves,
            ranks,
            listeners: DenialListeners::new(),
        })
    }

    // ---- Defaults ----

    /// The defaults in effect right now
    pub fn defaults(&self) -> Arc<PermissionDefaults> {
        self.defaults.read().clone()
    }

    /// Replace the global defaults. Checks already running keep the old value.
    pub fn reload_defaults(&self, defaults: PermissionDefaults) {
        *self.defaults.write() = Arc::new(defaults);
        tracing::info!("Permission defaults reloaded");
    }

    // ---- Resolution ----

    /// Full chain verdict for an actor whose admin status is already known.
    ///
    /// A world that is not loaded answers with the wilderness defaults.
    pub fn resolve_permission(
        &self,
        world: WorldId,
        position: ChunkPos,
        permission: Permission,
        actor: PlayerId,
        is_admin: bool,
    ) -> bool {
        self.resolution(world, position, permission, actor, is_admin)
            .allowed
    }

    /// Like [`Self::resolve_permission`], also telling which layer decided
    pub fn resolution(
        &self,
        world: WorldId,
        position: ChunkPos,
        permission: Permission,
        actor: PlayerId,
        is_admin: bool,
    ) -> Resolution {
        let defaults = self.defaults();
        match self.worlds.get(&world) {
            Some(state) => state.resolve(position, permission, actor, is_admin, &defaults),
            None => {
                tracing::debug!("Permission check in unloaded world {}", world);
                Chain::unclaimed().resolve(permission, &defaults, |_| None)
            }
        }
    }

    /// Player-facing check.
    ///
    /// Admin status comes from the admin predicate. When the action is
    /// denied and `notify` is set, every denial listener is called.
    pub fn check_player(
        &self,
        world: WorldId,
        position: ChunkPos,
        permission: Permission,
        actor: PlayerId,
        notify: bool,
    ) -> bool {
        let is_admin = self.admins.is_admin(actor);
        let defaults = self.defaults();

        let (allowed, owner) = match self.worlds.get(&world) {
            Some(state) => {
                let resolution = state.resolve(position, permission, actor, is_admin, &defaults);
                let owner = (!resolution.allowed && notify).then(|| state.nearest_owner(position));
                (resolution.allowed, owner)
            }
            None => {
                let allowed = defaults.wild(permission);
                (allowed, (!allowed && notify).then(Identity::wilderness))
            }
        };

        // World guard is released before listeners run
        if let Some(owner) = owner {
            self.listeners.fire(&DenialEvent {
                world,
                position,
                permission,
                actor,
                owner,
            });
        }
        allowed
    }

    // ---- Listeners ----

    /// Register a callback for denied player checks
    pub fn on_permission_denied<F>(&self, callback: F) -> ListenerKey
    where
        F: Fn(&DenialEvent) + Send + Sync + 'static,
    {
        self.listeners.register(callback)
    }

    /// Returns `true` if the listener was found and removed.
    pub fn remove_listener(&self, key: ListenerKey) -> bool {
        self.listeners.remove(key)
    }

    // ---- Worlds ----

    fn world_mut(&self, world: WorldId) -> ClaimResult<RefMut<'_, WorldId, WorldState>> {
        self.worlds
            .get_mut(&world)
            .ok_or(ClaimError::WorldNotLoaded(world))
    }

    /// Run a read-only closure against a loaded world
    pub fn with_world<R>(&self, world: WorldId, f: impl FnOnce(&WorldState) -> R) -> ClaimResult<R> {
        let state = self
            .worlds
            .get(&world)
            .ok_or(ClaimError::WorldNotLoaded(world))?;
        Ok(f(&state))
    }

    pub fn is_world_loaded(&self, world: WorldId) -> bool {
        self.worlds.contains_key(&world)
    }

    pub fn world_count(&self) -> usize {
        self.worlds.len()
    }

    /// Bring a world into memory with its zones and configured overrides.
    ///
    /// Zones that cannot be read are logged and skipped. Loading a world
    /// twice keeps the first state.
    pub fn load_world(&self, world: WorldId, name: &str, overrides: WorldOverrides) {
        if self.worlds.contains_key(&world) {
            tracing::warn!("World {} ({}) is already loaded", name, world);
            return;
        }

        let mut state = WorldState::new(world, name);
        state.apply_overrides(overrides);

        match self.storage.load_zones(world) {
            Ok(records) => {
                for record in records {
                    let id = record.id;
                    match Zone::from_record(record, &self.ranks).map(|z| state.insert_zone(z)) {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) | Err(e) => tracing::warn!("Skipping zone {} of {}: {}", id, name, e),
                    }
                }
            }
            Err(e) => tracing::error!("Failed to load zones of {}: {}", name, e),
        }

        tracing::info!("Loaded world {} with {} zones", name, state.zones().count());
        self.worlds.insert(world, state);
    }

    /// Save and drop a world. Returns `None` if it was not loaded.
    pub fn unload_world(&self, world: WorldId) -> Option<SaveReport> {
        let report = self.save_world(world).ok()?;
        let (_, state) = self.worlds.remove(&world)?;
        tracing::info!("Unloaded world {}", state.name());
        Some(report)
    }

    /// Queue every modified chunk, zone and rank for saving
    pub fn save_world(&self, world: WorldId) -> ClaimResult<SaveReport> {
        let dirty = self.world_mut(world)?.take_dirty();

        let mut report = SaveReport {
            chunks: dirty.chunks.len(),
            zones: dirty.zones.len(),
            overrides: dirty.overrides,
            ..SaveReport::default()
        };
        for record in dirty.chunks {
            self.persist(SaveJob::Chunk(record));
        }
        for record in dirty.zones {
            self.persist(SaveJob::Zone(record));
        }
        report.ranks = self.save_ranks();

        tracing::debug!("Queued save of world {}: {:?}", world, report);
        Ok(report)
    }

    // ---- Chunks ----

    /// Load the claim at a position, if any.
    ///
    /// A storage failure leaves the chunk admin-owned rather than open. A
    /// position with no stored record stays unclaimed (see DESIGN.md, chunk
    /// load failure).
    pub fn load_chunk(&self, world: WorldId, position: ChunkPos) -> ClaimResult<()> {
        if !self.worlds.contains_key(&world) {
            return Err(ClaimError::WorldNotLoaded(world));
        }

        let chunk = match self.storage.load_chunk(world, position) {
            Ok(Some(record)) => ClaimedChunk::from_record(record, &self.ranks),
            Ok(None) => return Ok(()),
            Err(e) => {
                tracing::error!(
                    "Failed to load chunk {} of world {}, protecting it for the admins: {}",
                    position,
                    world,
                    e
                );
                ClaimedChunk::safe_default(world, position)
            }
        };

        let mut state = self.world_mut(world)?;
        if let Err(e) = state.insert_chunk(chunk) {
            tracing::error!("Stored chunk {} does not fit world {}: {}", position, world, e);
            state.insert_chunk(ClaimedChunk::safe_default(world, position))?;
        }
        Ok(())
    }

    /// Drop a chunk from memory, queueing it for saving if it changed
    pub fn unload_chunk(&self, world: WorldId, position: ChunkPos) -> ClaimResult<()> {
        let chunk = self.world_mut(world)?.take_chunk(position);
        if let Some(chunk) = chunk.filter(ClaimedChunk::is_modified) {
            self.persist(SaveJob::Chunk(chunk.to_record()));
        }
        Ok(())
    }

    /// Claim an unclaimed, loaded chunk. `None` leaves it to the admins.
    pub fn claim_chunk(&self, world: WorldId, position: ChunkPos, owner: Option<Identity>) -> ClaimResult<()> {
        let mut state = self.world_mut(world)?;
        state.claim(position, owner)?;
        tracing::info!("Claimed chunk {} in {}", position, state.name());
        Ok(())
    }

    /// Remove a claim and delete its stored record
    pub fn unclaim_chunk(&self, world: WorldId, position: ChunkPos) -> ClaimResult<()> {
        self.world_mut(world)?.unclaim(position)?;
        self.persist(SaveJob::RemoveChunk { world, position });
        tracing::info!("Unclaimed chunk {} in world {}", position, world);
        Ok(())
    }

    // ---- Zones ----

    pub fn create_zone(&self, world: WorldId, name: &str) -> ClaimResult<ZoneId> {
        Ok(self.world_mut(world)?.create_zone(name)?)
    }

    pub fn add_chunk_to_zone(&self, world: WorldId, zone: ZoneId, position: ChunkPos) -> ClaimResult<()> {
        self.world_mut(world)?.add_chunk_to_zone(zone, position)
    }

    pub fn remove_chunk_from_zone(&self, world: WorldId, zone: ZoneId, position: ChunkPos) -> ClaimResult<()> {
        self.world_mut(world)?.remove_chunk_from_zone(zone, position)
    }

    /// Delete a zone. Its chunks stay claimed and become unzoned.
    pub fn delete_zone(&self, world: WorldId, zone: ZoneId) -> ClaimResult<()> {
        let removed = self.world_mut(world)?.remove_zone(zone)?;
        tracing::info!("Deleted zone {} ({}) in world {}", removed.name(), zone, world);
        self.persist(SaveJob::RemoveZone { world, zone });
        Ok(())
    }

    pub fn rename_zone(&self, world: WorldId, zone: ZoneId, name: &str) -> ClaimResult<()> {
        let mut state = self.world_mut(world)?;
        let zone = state.zone_mut(zone).ok_or(ClaimError::ZoneNotFound(zone))?;
        Ok(zone.set_name(name)?)
    }

    pub fn is_integrated(&self, world: WorldId, zone: ZoneId, position: ChunkPos) -> ClaimResult<bool> {
        self.with_world(world, |state| state.is_integrated(zone, position))?
    }

    // ---- Context mutations ----

    /// Store, replace or clear an override. Returns `true` if it changed.
    pub fn set_public_permission(
        &self,
        world: WorldId,
        target: ContextRef,
        permission: Permission,
        value: Tristate,
    ) -> ClaimResult<bool> {
        Ok(self
            .world_mut(world)?
            .context_mut(target)?
            .set_public_permission(permission, value))
    }

    /// Replace the owner of a context.
    ///
    /// A zone owner change carries along every integrated chunk of the zone,
    /// including the ones that are not loaded.
    pub fn set_owner(&self, world: WorldId, target: ContextRef, owner: Option<Identity>) -> ClaimResult<()> {
        let mut state = self.world_mut(world)?;
        match target {
            ContextRef::Zone(zone) => {
                let cascade = state.set_zone_owner(zone, owner)?;
                drop(state);
                if !cascade.unloaded.is_empty() {
                    tracing::debug!(
                        "Cascading owner of zone {} to {} unloaded chunks",
                        zone,
                        cascade.unloaded.len()
                    );
                    self.persist(SaveJob::Cascade(cascade));
                }
            }
            target => state.member_context_mut(target)?.set_owner(owner),
        }
        Ok(())
    }

    pub fn add_member(&self, world: WorldId, target: ContextRef, member: Member) -> ClaimResult<()> {
        self.world_mut(world)?
            .member_context_mut(target)?
            .add_member(member);
        Ok(())
    }

    pub fn remove_member(&self, world: WorldId, target: ContextRef, member: &Member) -> ClaimResult<bool> {
        Ok(self
            .world_mut(world)?
            .member_context_mut(target)?
            .remove_member(member))
    }

    // ---- Ranks ----

    pub fn ranks(&self) -> &RankRegistry {
        &self.ranks
    }

    /// Register a rank and queue it for saving
    pub fn add_rank(&self, rank: Rank) -> SharedRank {
        self.persist(SaveJob::Rank(RankRecord::from_rank(&rank)));
        self.ranks.insert(rank)
    }

    /// Queue every modified rank. Returns how many were queued.
    pub fn save_ranks(&self) -> usize {
        let mut count = 0;
        for rank in self.ranks.all() {
            let mut rank = rank.write();
            if rank.is_modified() {
                self.persist(SaveJob::Rank(RankRecord::from_rank(&rank)));
                rank.mark_clean();
                count += 1;
            }
        }
        count
    }

    // ---- Persistence ----

    /// Hand a write to the save worker, or write it directly once the worker is gone
    fn persist(&self, job: SaveJob) {
        if let Err(job) = self.saves.enqueue(job) {
            tracing::warn!("Save queue stopped, writing {:?} directly", job);
            if let Err(e) = job.apply(self.storage.as_ref()) {
                tracing::error!("Failed to save {:?}: {}", job, e);
            }
        }
    }

    // ---- Shutdown ----

    /// Save every world and wait for the queue to drain
    pub fn shutdown(&self) -> Vec<(WorldId, SaveReport)> {
        let worlds: Vec<WorldId> = self.worlds.iter().map(|w| *w.key()).collect();
        let reports = worlds
            .into_iter()
            .filter_map(|world| self.save_world(world).ok().map(|r| (world, r)))
            .collect();
        self.saves.shutdown();
        tracing::info!("Claim engine stopped");
        reports
    }
}

impl std::fmt::Debug for ClaimEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClaimEngine")
            .field("worlds", &self.worlds.len())
            .field("ranks", &self.ranks.len())
            .field("listeners", &self.listeners)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::permissions::{NoAdmins, NodeRegistry, PermissionSet, ADMIN_NODE};
    use crate::storage::{MemoryStorage, DEFAULT_QUEUE_CAPACITY};

    fn engine_with(storage: Arc<MemoryStorage>, admins: Arc<dyn AdminPredicate>) -> ClaimEngine {
        ClaimEngine::new(storage, admins, PermissionDefaults::builtin(), DEFAULT_QUEUE_CAPACITY).unwrap()
    }

    fn loaded_world(engine: &ClaimEngine) -> WorldId {
        let world = WorldId::new_random();
        engine.load_world(world, "world", WorldOverrides::default());
        world
    }

    fn player(name: &str) -> Identity {
        Identity::new(PlayerId::new_random(), name).unwrap()
    }

    #[test]
    fn test_world_not_loaded() {
        let engine = engine_with(Arc::new(MemoryStorage::new()), Arc::new(NoAdmins));
        let world = WorldId::new_random();

        assert!(matches!(
            engine.claim_chunk(world, ChunkPos::new(0, 0), None),
            Err(ClaimError::WorldNotLoaded(_))
        ));
        // Falls back to the wilderness defaults
        let actor = PlayerId::new_random();
        assert!(engine.resolve_permission(world, ChunkPos::new(0, 0), Permission::Enter, actor, false));
        assert!(!engine.resolve_permission(world, ChunkPos::new(0, 0), Permission::Modify, actor, false));
    }

    #[test]
    fn test_load_chunk_outcomes() {
        let storage = Arc::new(MemoryStorage::new());
        let engine = engine_with(storage.clone(), Arc::new(NoAdmins));
        let world = loaded_world(&engine);
        let owner = player("Owner");

        storage
            .save_chunk(&ClaimedChunk::new(world, ChunkPos::new(1, 1), Some(owner.clone())).to_record())
            .unwrap();
        storage.fail_on(world, ChunkPos::new(2, 2), "corrupt");

        engine.load_chunk(world, ChunkPos::new(0, 0)).unwrap();
        engine.load_chunk(world, ChunkPos::new(1, 1)).unwrap();
        engine.load_chunk(world, ChunkPos::new(2, 2)).unwrap();

        engine
            .with_world(world, |state| {
                assert!(!state.is_claimed(ChunkPos::new(0, 0)));
                assert_eq!(state.chunk(ChunkPos::new(1, 1)).unwrap().owner(), Some(&owner));
                assert!(state
                    .chunk(ChunkPos::new(2, 2))
                    .unwrap()
                    .owner()
                    .is_some_and(Identity::is_admins));
            })
            .unwrap();
    }

    #[test]
    fn test_check_player_notifies() {
        let storage = Arc::new(MemoryStorage::new());
        let nodes = Arc::new(NodeRegistry::new());
        let engine = engine_with(storage, nodes.clone());
        let world = loaded_world(&engine);
        let owner = player("Owner");
        let stranger = PlayerId::new_random();
        engine
            .claim_chunk(world, ChunkPos::new(0, 0), Some(owner.clone()))
            .unwrap();

        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = seen.clone();
        let key = engine.on_permission_denied(move |event| sink.lock().push(event.clone()));

        let pos = ChunkPos::new(0, 0);
        assert!(!engine.check_player(world, pos, Permission::Modify, stranger, true));
        assert!(!engine.check_player(world, pos, Permission::Modify, stranger, false));
        assert!(engine.check_player(world, pos, Permission::Enter, stranger, true));
        assert!(engine.check_player(world, pos, Permission::Modify, owner.id(), true));

        {
            let seen = seen.lock();
            assert_eq!(seen.len(), 1);
            assert_eq!(seen[0].owner, owner);
            assert_eq!(seen[0].actor, stranger);
        }

        // Admins do not beat a named owner
        nodes.add_nodes(stranger, &[ADMIN_NODE]);
        assert!(!engine.check_player(world, pos, Permission::Modify, stranger, true));
        assert_eq!(seen.lock().len(), 2);

        assert!(engine.remove_listener(key));
    }

    #[test]
    fn test_admin_owns_unowned_claims() {
        let nodes = Arc::new(NodeRegistry::new());
        let engine = engine_with(Arc::new(MemoryStorage::new()), nodes.clone());
        let world = loaded_world(&engine);
        let admin = PlayerId::new_random();
        nodes.add_nodes(admin, &["mychunks.*"]);

        engine.claim_chunk(world, ChunkPos::new(0, 0), None).unwrap();
        assert!(engine.check_player(world, ChunkPos::new(0, 0), Permission::Modify, admin, false));
        assert!(!engine.check_player(
            world,
            ChunkPos::new(0, 0),
            Permission::Modify,
            PlayerId::new_random(),
            false
        ));
    }

    #[test]
    fn test_reload_defaults() {
        let engine = engine_with(Arc::new(MemoryStorage::new()), Arc::new(NoAdmins));
        let world = loaded_world(&engine);
        let actor = PlayerId::new_random();
        let pos = ChunkPos::new(3, 3);

        let before = engine.defaults();
        let mut defaults = PermissionDefaults::builtin();
        defaults.set_wild(Permission::Modify, true);
        engine.reload_defaults(defaults);

        assert!(engine.resolve_permission(world, pos, Permission::Modify, actor, false));
        // Readers holding the old value are unaffected
        assert!(!before.wild(Permission::Modify));
    }

    #[test]
    fn test_unload_and_reload_chunk_persists() {
        let storage = Arc::new(MemoryStorage::new());
        let engine = engine_with(storage.clone(), Arc::new(NoAdmins));
        let world = loaded_world(&engine);
        let owner = player("Owner");
        let pos = ChunkPos::new(5, -5);

        engine.claim_chunk(world, pos, Some(owner.clone())).unwrap();
        engine
            .set_public_permission(world, ContextRef::Chunk(pos), Permission::Enter, Tristate::False)
            .unwrap();
        engine.unload_chunk(world, pos).unwrap();
        engine.shutdown();

        let stored = storage.get_chunk(world, pos).unwrap();
        assert_eq!(stored.owner, Some(owner));
        assert_eq!(stored.overrides.get(&Permission::Enter), Some(&false));
    }

    #[test]
    fn test_unclaim_removes_record() {
        let storage = Arc::new(MemoryStorage::new());
        let engine = engine_with(storage.clone(), Arc::new(NoAdmins));
        let world = loaded_world(&engine);
        let pos = ChunkPos::new(0, 0);

        engine.claim_chunk(world, pos, None).unwrap();
        engine.save_world(world).unwrap();
        engine.unclaim_chunk(world, pos).unwrap();
        engine.shutdown();

        assert!(storage.get_chunk(world, pos).is_none());
    }

    #[test]
    fn test_zone_owner_cascades_to_unloaded_chunks() {
        let storage = Arc::new(MemoryStorage::new());
        let engine = engine_with(storage.clone(), Arc::new(NoAdmins));
        let world = loaded_world(&engine);
        let alice = player("Alice");

        for x in 0..3 {
            engine.claim_chunk(world, ChunkPos::new(x, 0), None).unwrap();
        }
        let zone = engine.create_zone(world, "Farm").unwrap();
        for x in 0..3 {
            engine.add_chunk_to_zone(world, zone, ChunkPos::new(x, 0)).unwrap();
        }
        engine.unload_chunk(world, ChunkPos::new(2, 0)).unwrap();

        engine
            .set_owner(world, ContextRef::Zone(zone), Some(alice.clone()))
            .unwrap();
        engine.shutdown();

        assert_eq!(storage.get_chunk(world, ChunkPos::new(2, 0)).unwrap().owner, Some(alice.clone()));
        let loaded = engine
            .with_world(world, |s| s.chunk(ChunkPos::new(0, 0)).map(|c| c.owner().cloned()))
            .unwrap();
        assert_eq!(loaded, Some(Some(alice)));
    }

    #[test]
    fn test_zones_survive_world_reload() {
        let storage = Arc::new(MemoryStorage::new());
        let engine = engine_with(storage.clone(), Arc::new(NoAdmins));
        let world = loaded_world(&engine);

        engine.claim_chunk(world, ChunkPos::new(0, 0), None).unwrap();
        let zone = engine.create_zone(world, "Spawn").unwrap();
        engine.add_chunk_to_zone(world, zone, ChunkPos::new(0, 0)).unwrap();
        let report = engine.unload_world(world).unwrap();
        assert_eq!((report.chunks, report.zones), (1, 1));
        engine.shutdown();

        let engine = engine_with(storage, Arc::new(NoAdmins));
        engine.load_world(world, "world", WorldOverrides::default());
        engine.load_chunk(world, ChunkPos::new(0, 0)).unwrap();
        let linked = engine
            .with_world(world, |s| s.chunk(ChunkPos::new(0, 0)).and_then(ClaimedChunk::zone))
            .unwrap();
        assert_eq!(linked, Some(zone));
    }

    #[test]
    fn test_ranks_are_loaded_and_saved() {
        let storage = Arc::new(MemoryStorage::new());
        let engine = engine_with(storage.clone(), Arc::new(NoAdmins));
        let rank = engine.add_rank(Rank::new("builder", PermissionSet::MODIFY).unwrap());
        rank.write().grant(Permission::Enter);
        assert_eq!(engine.save_ranks(), 1);
        engine.shutdown();

        let engine = engine_with(storage, Arc::new(NoAdmins));
        let loaded = engine.ranks().find_by_name("Builder").unwrap();
        assert!(loaded.read().grants(Permission::Enter));
    }

    #[test]
    fn test_listener_can_query_engine() {
        let engine = Arc::new(engine_with(Arc::new(MemoryStorage::new()), Arc::new(NoAdmins)));
        let world = loaded_world(&engine);
        engine.claim_chunk(world, ChunkPos::new(0, 0), Some(player("Owner"))).unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let (inner, counter) = (Arc::downgrade(&engine), calls.clone());
        engine.on_permission_denied(move |event| {
            if let Some(engine) = inner.upgrade() {
                // Must not deadlock on the world shard
                engine.claim_chunk(event.world, ChunkPos::new(9, 9), None).ok();
            }
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(!engine.check_player(world, ChunkPos::new(0, 0), Permission::Modify, PlayerId::new_random(), true));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_save_larger_than_queue_keeps_every_chunk() {
        let storage = Arc::new(MemoryStorage::with_save_delay(std::time::Duration::from_millis(1)));
        let engine = ClaimEngine::new(storage.clone(), Arc::new(NoAdmins), PermissionDefaults::builtin(), 4).unwrap();
        let world = loaded_world(&engine);
        let owner = player("Alice");

        for x in 0..60 {
            engine.claim_chunk(world, ChunkPos::new(x, 0), Some(owner.clone())).unwrap();
        }
        engine.unload_chunk(world, ChunkPos::new(0, 0)).unwrap();

        let reports = engine.shutdown();
        assert_eq!(reports[0].1.chunks, 59);
        assert_eq!(storage.chunk_count(), 60);

        // Nothing is left dirty, and a late save still reaches storage
        assert_eq!(engine.save_world(world).unwrap().chunks, 0);
        engine.unclaim_chunk(world, ChunkPos::new(5, 0)).unwrap();
        assert_eq!(storage.chunk_count(), 59);
    }

    #[test]
    fn test_owner_and_members_rejected_on_override_layers() {
        let engine = engine_with(Arc::new(MemoryStorage::new()), Arc::new(NoAdmins));
        let world = loaded_world(&engine);
        let rank = engine.add_rank(Rank::new("builder", PermissionSet::MODIFY).unwrap());
        let builder = Member::new(player("Bob"), &rank);

        for target in [ContextRef::WorldFallback, ContextRef::Wilderness] {
            assert!(matches!(
                engine.add_member(world, target, builder.clone()),
                Err(ClaimError::OverridesOnly(t)) if t == target
            ));
            assert!(matches!(
                engine.set_owner(world, target, Some(player("Carol"))),
                Err(ClaimError::OverridesOnly(_))
            ));
            assert!(matches!(
                engine.remove_member(world, target, &builder),
                Err(ClaimError::OverridesOnly(_))
            ));
            assert!(engine
                .set_public_permission(world, target, Permission::Modify, Tristate::True)
                .unwrap());
        }

        let report = engine.save_world(world).unwrap();
        let overrides = report.overrides.unwrap();
        assert_eq!(overrides.fallback.get(&Permission::Modify), Some(&true));
        assert_eq!(overrides.wild.get(&Permission::Modify), Some(&true));
    }

    #[test]
    fn test_delete_zone_unlinks_chunks() {
        let storage = Arc::new(MemoryStorage::new());
        let engine = engine_with(storage.clone(), Arc::new(NoAdmins));
        let world = loaded_world(&engine);
        let owner = player("Alice");

        engine.claim_chunk(world, ChunkPos::new(0, 0), Some(owner.clone())).unwrap();
        let zone = engine.create_zone(world, "Spawn").unwrap();
        engine.add_chunk_to_zone(world, zone, ChunkPos::new(0, 0)).unwrap();
        engine.save_world(world).unwrap();

        engine.delete_zone(world, zone).unwrap();
        assert!(matches!(engine.delete_zone(world, zone), Err(ClaimError::ZoneNotFound(_))));
        let linked = engine
            .with_world(world, |w| w.chunk(ChunkPos::new(0, 0)).and_then(ClaimedChunk::zone))
            .unwrap();
        assert_eq!(linked, None);
        assert!(engine.resolve_permission(world, ChunkPos::new(0, 0), Permission::Modify, owner.id(), false));

        engine.shutdown();
        assert!(storage.load_zones(world).unwrap().is_empty());
        assert_eq!(storage.get_chunk(world, ChunkPos::new(0, 0)).unwrap().zone, None);
    }
}
