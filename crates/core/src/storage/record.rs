//! Persisted shapes of chunks, zones and ranks
//!
//! Records are plain serde structs. The claim types convert to and from
//! them; ranks are referenced by id and resolved through the
//! [`RankRegistry`] on load.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::access::{AccessContext, Member, Rank, RankRegistry};
use crate::error::ValidationError;
use crate::identity::{Identity, RankId, WorldId, ZoneId};
use crate::permissions::{Permission, Tristate};
use crate::position::ChunkPos;

/// One (player, rank) association
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberRecord {
    pub player: Identity,
    pub rank: RankId,
}

/// Persisted claimed chunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub world: WorldId,
    pub x: i32,
    pub z: i32,
    #[serde(default)]
    pub owner: Option<Identity>,
    #[serde(default)]
    pub zone: Option<ZoneId>,
    #[serde(default)]
    pub members: Vec<MemberRecord>,
    #[serde(default)]
    pub overrides: BTreeMap<Permission, bool>,
}

impl ChunkRecord {
    pub fn position(&self) -> ChunkPos {
        ChunkPos::new(self.x, self.z)
    }
}

/// Persisted zone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneRecord {
    pub id: ZoneId,
    pub world: WorldId,
    pub name: String,
    #[serde(default)]
    pub owner: Option<Identity>,
    #[serde(default)]
    pub members: Vec<MemberRecord>,
    #[serde(default)]
    pub overrides: BTreeMap<Permission, bool>,
    #[serde(default)]
    pub positions: Vec<ChunkPos>,
}

/// Persisted rank
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankRecord {
    pub id: RankId,
    pub name: String,
    #[serde(default)]
    pub permissions: Vec<Permission>,
}

impl RankRecord {
    pub fn from_rank(rank: &Rank) -> Self {
        Self {
            id: rank.id(),
            name: rank.name().to_string(),
            permissions: rank.permissions().kinds().collect(),
        }
    }

    pub fn into_rank(self) -> Result<Rank, ValidationError> {
        Rank::with_id(self.id, &self.name, self.permissions.into_iter().collect())
    }
}

/// Member associations of a context, sorted for stable output
pub(crate) fn member_records(context: &AccessContext) -> Vec<MemberRecord> {
    let mut records: Vec<MemberRecord> = context
        .members()
        .map(|m| MemberRecord {
            player: m.player().clone(),
            rank: m.rank_id(),
        })
        .collect();
    records.sort_by_key(|r| (r.player.id(), r.rank));
    records
}

/// Rebuild a context from persisted parts.
///
/// Memberships whose rank is no longer registered are dropped.
pub(crate) fn restore_context(
    owner: Option<Identity>,
    members: Vec<MemberRecord>,
    overrides: BTreeMap<Permission, bool>,
    ranks: &RankRegistry,
) -> AccessContext {
    let mut context = AccessContext::new();
    context.set_owner(owner);
    for (permission, value) in overrides {
        context.set_public_permission(permission, Tristate::from(value));
    }
    for record in members {
        match ranks.get(record.rank) {
            Some(rank) => context.add_member(Member::new(record.player, &rank)),
            None => tracing::warn!(
                "Dropping membership of {} ({}): unknown rank {}",
                record.player,
                record.player.id(),
                record.rank
            ),
        }
    }
    context.mark_clean();
    context
}
