//! End-to-end permission scenarios against a `ClaimEngine` with in-memory storage

use std::sync::Arc;

use mychunks_core::storage::DEFAULT_QUEUE_CAPACITY;
use mychunks_core::{
    ChunkPos, ClaimEngine, ClaimError, ContextRef, Identity, Layer, Member, MemoryStorage, NoAdmins, Permission,
    PermissionDefaults, PermissionSet, PlayerId, Rank, Source, Tristate, ValidationError, WorldId, WorldOverrides,
};

struct Fixture {
    engine: ClaimEngine,
    world: WorldId,
}

fn fixture() -> Fixture {
    let engine = ClaimEngine::new(
        Arc::new(MemoryStorage::new()),
        Arc::new(NoAdmins),
        PermissionDefaults::builtin(),
        DEFAULT_QUEUE_CAPACITY,
    )
    .unwrap();
    let world = WorldId::new_random();
    engine.load_world(world, "overworld", WorldOverrides::default());
    Fixture { engine, world }
}

fn player(name: &str) -> Identity {
    Identity::new(PlayerId::new_random(), name).unwrap()
}

const ORIGIN: ChunkPos = ChunkPos::new(0, 0);

#[test]
fn test_unclaimed_chunk_uses_wild_default() {
    let Fixture { engine, world } = fixture();

    assert!(!engine.resolve_permission(world, ORIGIN, Permission::Modify, PlayerId::new_random(), false));
    assert!(engine.resolve_permission(world, ORIGIN, Permission::Enter, PlayerId::new_random(), false));
}

#[test]
fn test_owner_and_stranger() {
    let Fixture { engine, world } = fixture();
    let owner = player("P");
    engine.claim_chunk(world, ORIGIN, Some(owner.clone())).unwrap();

    assert!(engine.resolve_permission(world, ORIGIN, Permission::Modify, owner.id(), false));
    assert!(!engine.resolve_permission(world, ORIGIN, Permission::Modify, PlayerId::new_random(), false));
}

#[test]
fn test_public_override_survives_owner_removal() {
    let Fixture { engine, world } = fixture();
    engine.claim_chunk(world, ORIGIN, Some(player("P"))).unwrap();
    assert!(engine
        .set_public_permission(world, ContextRef::Chunk(ORIGIN), Permission::Modify, Tristate::True)
        .unwrap());

    let anyone = PlayerId::new_random();
    assert!(engine.resolve_permission(world, ORIGIN, Permission::Modify, anyone, false));

    engine.set_owner(world, ContextRef::Chunk(ORIGIN), None).unwrap();
    assert!(engine.resolve_permission(world, ORIGIN, Permission::Modify, anyone, false));
}

#[test]
fn test_zone_owner_delegation() {
    let Fixture { engine, world } = fixture();
    let owner = player("P");
    engine.claim_chunk(world, ORIGIN, None).unwrap();
    engine.claim_chunk(world, ChunkPos::new(1, 0), None).unwrap();

    let zone = engine.create_zone(world, "Z").unwrap();
    engine.add_chunk_to_zone(world, zone, ORIGIN).unwrap();
    engine.add_chunk_to_zone(world, zone, ChunkPos::new(1, 0)).unwrap();
    engine.set_owner(world, ContextRef::Zone(zone), Some(owner.clone())).unwrap();

    assert!(engine.resolve_permission(world, ORIGIN, Permission::Modify, owner.id(), false));
    assert!(!engine.resolve_permission(world, ORIGIN, Permission::Modify, PlayerId::new_random(), false));
}

#[test]
fn test_zone_delegation_from_unowned_chunk() {
    let Fixture { engine, world } = fixture();
    let owner = player("P");
    engine.claim_chunk(world, ORIGIN, None).unwrap();
    let zone = engine.create_zone(world, "Z").unwrap();
    engine.add_chunk_to_zone(world, zone, ORIGIN).unwrap();
    engine.set_owner(world, ContextRef::Zone(zone), Some(owner.clone())).unwrap();
    // The chunk gives up the owner it got from the cascade
    engine.set_owner(world, ContextRef::Chunk(ORIGIN), None).unwrap();

    let resolution = engine.resolution(world, ORIGIN, Permission::Modify, owner.id(), false);
    assert!(resolution.allowed);
    assert_eq!(resolution.source, Source::Layer(Layer::Zone(zone)));
}

#[test]
fn test_collinear_removal_guard() {
    let Fixture { engine, world } = fixture();
    let zone = engine.create_zone(world, "Line").unwrap();
    for x in -1..=1 {
        engine.claim_chunk(world, ChunkPos::new(x, 0), None).unwrap();
        engine.add_chunk_to_zone(world, zone, ChunkPos::new(x, 0)).unwrap();
    }

    assert!(matches!(
        engine.remove_chunk_from_zone(world, zone, ORIGIN),
        Err(ClaimError::Validation(ValidationError::RemovalBreaksContiguity { .. }))
    ));
    engine.remove_chunk_from_zone(world, zone, ChunkPos::new(1, 0)).unwrap();
}

#[test]
fn test_member_precedes_deny_override() {
    let Fixture { engine, world } = fixture();
    let member = player("M");
    let rank = engine.add_rank(Rank::new("guest", PermissionSet::ENTER).unwrap());

    engine.claim_chunk(world, ORIGIN, Some(player("P"))).unwrap();
    engine
        .add_member(world, ContextRef::Chunk(ORIGIN), Member::new(member.clone(), &rank))
        .unwrap();
    engine
        .set_public_permission(world, ContextRef::Chunk(ORIGIN), Permission::Enter, Tristate::False)
        .unwrap();

    assert!(engine.resolve_permission(world, ORIGIN, Permission::Enter, member.id(), false));
    assert!(!engine.resolve_permission(world, ORIGIN, Permission::Enter, PlayerId::new_random(), false));
}

#[test]
fn test_chunk_deny_beats_zone_and_world_allow() {
    let Fixture { engine, world } = fixture();
    engine.claim_chunk(world, ORIGIN, None).unwrap();
    let zone = engine.create_zone(world, "Z").unwrap();
    engine.add_chunk_to_zone(world, zone, ORIGIN).unwrap();

    engine
        .set_public_permission(world, ContextRef::Zone(zone), Permission::Modify, Tristate::True)
        .unwrap();
    engine
        .set_public_permission(world, ContextRef::WorldFallback, Permission::Modify, Tristate::True)
        .unwrap();
    let anyone = PlayerId::new_random();
    assert!(engine.resolve_permission(world, ORIGIN, Permission::Modify, anyone, false));

    engine
        .set_public_permission(world, ContextRef::Chunk(ORIGIN), Permission::Modify, Tristate::False)
        .unwrap();
    assert!(!engine.resolve_permission(world, ORIGIN, Permission::Modify, anyone, false));
}

#[test]
fn test_world_fallback_precedes_global_default() {
    let Fixture { engine, world } = fixture();
    engine.claim_chunk(world, ORIGIN, None).unwrap();
    let anyone = PlayerId::new_random();

    engine
        .set_public_permission(world, ContextRef::WorldFallback, Permission::Enter, Tristate::False)
        .unwrap();
    assert!(!engine.resolve_permission(world, ORIGIN, Permission::Enter, anyone, false));

    // Wilderness overrides only affect unclaimed land
    engine
        .set_public_permission(world, ContextRef::Wilderness, Permission::Modify, Tristate::True)
        .unwrap();
    assert!(!engine.resolve_permission(world, ORIGIN, Permission::Modify, anyone, false));
    assert!(engine.resolve_permission(world, ChunkPos::new(4, 4), Permission::Modify, anyone, false));
}

#[test]
fn test_cross_world_zone_addition_rejected() {
    let Fixture { engine, world } = fixture();
    let other = WorldId::new_random();
    engine.load_world(other, "nether", WorldOverrides::default());

    let zone = engine.create_zone(world, "Z").unwrap();
    engine.claim_chunk(other, ORIGIN, None).unwrap();

    // The zone is not visible from the other world
    assert!(matches!(
        engine.add_chunk_to_zone(other, zone, ORIGIN),
        Err(ClaimError::ZoneNotFound(_))
    ));
}

#[test]
fn test_cascade_leaves_sold_chunks() {
    let Fixture { engine, world } = fixture();
    let (alice, bob, carol) = (player("Alice"), player("Bob"), player("Carol"));
    let zone = engine.create_zone(world, "Market").unwrap();
    for x in 0..3 {
        engine.claim_chunk(world, ChunkPos::new(x, 0), None).unwrap();
        engine.add_chunk_to_zone(world, zone, ChunkPos::new(x, 0)).unwrap();
    }
    engine.set_owner(world, ContextRef::Zone(zone), Some(alice.clone())).unwrap();
    engine
        .set_owner(world, ContextRef::Chunk(ChunkPos::new(2, 0)), Some(bob.clone()))
        .unwrap();

    let integrated_before: Vec<bool> = (0..3)
        .map(|x| engine.is_integrated(world, zone, ChunkPos::new(x, 0)).unwrap())
        .collect();
    assert_eq!(integrated_before, vec![true, true, false]);

    engine.set_owner(world, ContextRef::Zone(zone), Some(carol.clone())).unwrap();
    let owners: Vec<Option<Identity>> = engine
        .with_world(world, |state| {
            (0..3)
                .map(|x| state.chunk(ChunkPos::new(x, 0)).and_then(|c| c.owner().cloned()))
                .collect()
        })
        .unwrap();
    assert_eq!(owners, vec![Some(carol.clone()), Some(carol), Some(bob)]);
}

#[test]
fn test_symbol_zone_name_is_generated() {
    let Fixture { engine, world } = fixture();
    let zone = engine.create_zone(world, "★★★").unwrap();

    let name = engine
        .with_world(world, |state| state.zone(zone).map(|z| z.name().to_string()))
        .unwrap()
        .unwrap();
    assert!(name.starts_with("Unnamed Zone "));

    assert!(matches!(
        engine.create_zone(world, "  "),
        Err(ClaimError::Validation(ValidationError::EmptyName))
    ));
    assert!(matches!(
        engine.rename_zone(world, zone, "Market "),
        Err(ClaimError::Validation(ValidationError::UntrimmedName(_)))
    ));
}
