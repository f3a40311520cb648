//! A claimed chunk

use crate::access::{AccessContext, RankRegistry};
use crate::identity::{Identity, WorldId, ZoneId};
use crate::position::ChunkPos;
use crate::storage::{member_records, restore_context, ChunkRecord};

/// Access context bound to one chunk, optionally linked to a zone
#[derive(Debug, Clone)]
pub struct ClaimedChunk {
    world: WorldId,
    position: ChunkPos,
    zone: Option<ZoneId>,
    context: AccessContext,
}

impl ClaimedChunk {
    /// A fresh claim, dirty until saved. `None` leaves the chunk to the
    /// server admins.
    pub fn new(world: WorldId, position: ChunkPos, owner: Option<Identity>) -> Self {
        let mut context = AccessContext::new();
        context.set_owner(owner);
        context.touch();
        Self {
            world,
            position,
            zone: None,
            context,
        }
    }

    /// Admin-owned claim used when the stored record could not be read.
    ///
    /// Not marked dirty so the unreadable record is never overwritten.
    pub fn safe_default(world: WorldId, position: ChunkPos) -> Self {
        let mut chunk = Self::new(world, position, Some(Identity::admins()));
        chunk.mark_clean();
        chunk
    }

    pub fn world(&self) -> WorldId {
        self.world
    }

    pub fn position(&self) -> ChunkPos {
        self.position
    }

    pub fn zone(&self) -> Option<ZoneId> {
        self.zone
    }

    pub(crate) fn set_zone(&mut self, zone: Option<ZoneId>) {
        if self.zone != zone {
            self.zone = zone;
            self.context.touch();
        }
    }

    pub fn owner(&self) -> Option<&Identity> {
        self.context.owner()
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

    pub fn to_record(&self) -> ChunkRecord {
        ChunkRecord {
            world: self.world,
            x: self.position.x,
            z: self.position.z,
            owner: self.context.owner().cloned(),
            zone: self.zone,
            members: member_records(&self.context),
            overrides: self.context.overrides().clone(),
        }
    }

    pub fn from_record(record: ChunkRecord, ranks: &RankRegistry) -> Self {
        let position = record.position();
        Self {
            world: record.world,
            position,
            zone: record.zone,
            context: restore_context(record.owner, record.members, record.overrides, ranks),
        }
    }
}
