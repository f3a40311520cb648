//! Zones: named groups of contiguous chunks sharing one access context

use std::collections::BTreeSet;

use crate::access::{AccessContext, RankRegistry};
use crate::error::ValidationError;
use crate::identity::{WorldId, ZoneId};
use crate::normalize::normalize_identifier;
use crate::position::ChunkPos;
use crate::storage::{member_records, restore_context, ZoneRecord};

/// A group of cardinally connected chunks in one world
#[derive(Debug, Clone)]
pub struct Zone {
    id: ZoneId,
    world: WorldId,
    name: String,
    positions: BTreeSet<ChunkPos>,
    context: AccessContext,
}

impl Zone {
    /// Create an empty zone, dirty until saved.
    ///
    /// The name is trimmed. A name made only of symbols is replaced by
    /// `Unnamed Zone <unix millis>`.
    pub fn new(world: WorldId, name: &str) -> Result<Self, ValidationError> {
        let mut zone = Self::with_id(ZoneId::new_random(), world, name)?;
        zone.context.touch();
        Ok(zone)
    }

    pub fn with_id(id: ZoneId, world: WorldId, name: &str) -> Result<Self, ValidationError> {
        Ok(Self {
            id,
            world,
            name: lenient_name(name)?,
            positions: BTreeSet::new(),
            context: AccessContext::new(),
        })
    }

    pub fn id(&self) -> ZoneId {
        self.id
    }

    pub fn world(&self) -> WorldId {
        self.world
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rename the zone, rejecting untrimmed names and names without letters or digits
    pub fn set_name(&mut self, name: &str) -> Result<(), ValidationError> {
        if name.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }
        if name.trim() != name {
            return Err(ValidationError::UntrimmedName(name.to_string()));
        }
        if normalize_identifier(name).is_empty() {
            return Err(ValidationError::NormalizedNameEmpty(name.to_string()));
        }

        if self.name != name {
            self.name = name.to_string();
            self.context.touch();
        }
        Ok(())
    }

    pub fn normalized_name(&self) -> String {
        normalize_identifier(&self.name)
    }

    pub fn positions(&self) -> impl Iterator<Item = ChunkPos> + '_ {
        self.positions.iter().copied()
    }

    pub fn contains(&self, position: ChunkPos) -> bool {
        self.positions.contains(&position)
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Check if a position has a cardinal neighbour in the zone
    pub fn touches(&self, position: ChunkPos) -> bool {
        position
            .cardinal_neighbors()
            .iter()
            .any(|n| self.positions.contains(n))
    }

    /// Check if a chunk of `world` at `position` may join the zone.
    ///
    /// The first chunk is always accepted. Later chunks must touch the zone.
    pub fn validate_addition(&self, world: WorldId, position: ChunkPos) -> Result<(), ValidationError> {
        if world != self.world {
            return Err(ValidationError::WorldMismatch {
                position,
                expected: self.world,
                found: world,
            });
        }

        if self.positions.is_empty() || self.contains(position) || self.touches(position) {
            Ok(())
        } else {
            Err(ValidationError::NotAdjacent {
                position,
                zone: self.id,
            })
        }
    }

    /// Local check whether removing `position` could split the zone.
    ///
    /// Looks only at the four neighbours of the position: removal is blocked
    /// when one occupied neighbour has no diagonal corner chunk linking it
    /// to another occupied neighbour. This is not a full connectivity check.
    pub fn is_removal_blocked(&self, position: ChunkPos) -> bool {
        if self.positions.len() <= 2 || !self.contains(position) {
            return false;
        }

        let occupied: Vec<ChunkPos> = position
            .cardinal_neighbors()
            .into_iter()
            .filter(|n| self.positions.contains(n))
            .collect();
        if occupied.len() < 2 {
            return false;
        }

        occupied.iter().any(|n| {
            !occupied
                .iter()
                .filter(|m| *m != n)
                .any(|m| self.has_bridge(position, n, m))
        })
    }

    // A zone chunk other than `position` touching both `n` and `m`
    fn has_bridge(&self, position: ChunkPos, n: &ChunkPos, m: &ChunkPos) -> bool {
        n.cardinal_neighbors()
            .iter()
            .filter(|d| **d != position && self.positions.contains(d))
            .any(|d| d.is_cardinal_neighbor(m))
    }

    pub(crate) fn insert_position(&mut self, position: ChunkPos) -> bool {
        let inserted = self.positions.insert(position);
        if inserted {
            self.context.touch();
        }
        inserted
    }

    pub(crate) fn remove_position(&mut self, position: ChunkPos) -> bool {
        let removed = self.positions.remove(&position);
        if removed {
            self.context.touch();
        }
        removed
    }

    pub fn context(&self) -> &AccessContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut AccessContext {
        &mut self.context
    }

    pub fn is_modified(&self) -> bool {
        self.context.is_modified()
    }

    pub fn mark_clean(&mut self) {
        self.context.mark_clean();
    }

    pub fn to_record(&self) -> ZoneRecord {
        ZoneRecord {
            id: self.id,
            world: self.world,
            name: self.name.clone(),
            owner: self.context.owner().cloned(),
            members: member_records(&self.context),
            overrides: self.context.overrides().clone(),
            positions: self.positions().collect(),
        }
    }

    pub fn from_record(record: ZoneRecord, ranks: &RankRegistry) -> Result<Self, ValidationError> {
        let mut zone = Self::with_id(record.id, record.world, &record.name)?;
        zone.positions = record.positions.into_iter().collect();
        zone.context = restore_context(record.owner, record.members, record.overrides, ranks);
        Ok(zone)
    }
}

fn lenient_name(name: &str) -> Result<String, ValidationError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ValidationError::EmptyName);
    }
    if normalize_identifier(name).is_empty() {
        return Ok(format!("Unnamed Zone {}", chrono::Utc::now().timestamp_millis()));
    }
    Ok(name.to_string())
}
