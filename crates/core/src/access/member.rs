//! Context membership

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::identity::{Identity, RankId};
use crate::permissions::Permission;

use super::rank::SharedRank;

/// A player holding a rank on a context
///
/// Members are immutable pairs: changing a player's rank means removing the
/// old member and adding a new one. Two members are equal when they refer to
/// the same player and the same rank id.
#[derive(Debug, Clone)]
pub struct Member {
    player: Identity,
    rank_id: RankId,
    rank: SharedRank,
}

impl Member {
    pub fn new(player: Identity, rank: &SharedRank) -> Self {
        let rank_id = rank.read().id();
        Self {
            player,
            rank_id,
            rank: Arc::clone(rank),
        }
    }

    pub fn player(&self) -> &Identity {
        &self.player
    }

    pub fn rank_id(&self) -> RankId {
        self.rank_id
    }

    pub fn rank(&self) -> &SharedRank {
        &self.rank
    }

    /// Check if this member's rank grants the permission
    pub fn grants(&self, permission: Permission) -> bool {
        self.rank.read().permission(permission).unwrap_or(false)
    }
}

impl PartialEq for Member {
    fn eq(&self, other: &Self) -> bool {
        self.player.id() == other.player.id() && self.rank_id == other.rank_id
    }
}

impl Eq for Member {}

impl Hash for Member {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.player.id().hash(state);
        self.rank_id.hash(state);
    }
}
