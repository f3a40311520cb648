//! Error types for claim, zone and naming operations

use crate::claims::ContextRef;
use crate::identity::{WorldId, ZoneId};
use crate::position::ChunkPos;

/// Rejected input that the caller has to correct
///
/// Validation errors are always surfaced synchronously and are never retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Name is empty or contains only whitespace
    #[error("Name is empty")]
    EmptyName,

    /// Name has leading or trailing whitespace
    #[error("Name has trailing or leading whitespace: {0:?}")]
    UntrimmedName(String),

    /// Name has no letters or digits left after normalization
    #[error("Normalized name is empty: {0:?}")]
    NormalizedNameEmpty(String),

    /// Chunk belongs to a different world than the zone or world it is added to
    #[error("Chunk {position} is in world {found}, expected world {expected}")]
    WorldMismatch {
        position: ChunkPos,
        expected: WorldId,
        found: WorldId,
    },

    /// Chunk does not touch any chunk already in the zone
    #[error("The chunk {position} is not touching any chunk of zone {zone}")]
    NotAdjacent { position: ChunkPos, zone: ZoneId },

    /// Removing the chunk would split the zone in two
    #[error("Removing the chunk {position} would split zone {zone}")]
    RemovalBreaksContiguity { position: ChunkPos, zone: ZoneId },
}

/// Errors returned by the claim engine
#[derive(Debug, thiserror::Error)]
pub enum ClaimError {
    /// World has not been loaded (or was already unloaded)
    #[error("World not loaded: {0}")]
    WorldNotLoaded(WorldId),

    /// No claim exists at the position
    #[error("Chunk {0} is not claimed")]
    NotClaimed(ChunkPos),

    /// A claim already exists at the position
    #[error("Chunk {0} is already claimed")]
    AlreadyClaimed(ChunkPos),

    /// Zone id is unknown in the world
    #[error("Zone not found: {0}")]
    ZoneNotFound(ZoneId),

    /// Owner or member change on a layer that only holds overrides
    #[error("{0:?} only holds permission overrides")]
    OverridesOnly(ContextRef),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Result type for claim engine operations
pub type ClaimResult<T> = Result<T, ClaimError>;
