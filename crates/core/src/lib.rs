//! MyChunks - Core Logic
//!
//! Layered authorization for a grid of claimed chunks. A permission query
//! for (world, chunk, permission, actor) walks chunk → zone → world fallback
//! → global default and returns one verdict.
//!
//! # Modules
//!
//! - [`access`] - owner/member/override contexts, ranks and members
//! - [`claims`] - claimed chunks, zones, per-world state and the resolution chain
//! - [`permissions`] - permission kinds, defaults and host admin nodes
//! - [`storage`] - storage contract, in-memory backend and save queue
//! - [`config`] - TOML configuration files
//! - [`engine`] - the cross-world [`ClaimEngine`]

pub mod access;
pub mod claims;
pub mod config;
pub mod engine;
pub mod error;
pub mod identity;
pub mod listeners;
pub mod normalize;
pub mod permissions;
pub mod position;
pub mod storage;

// Re-export commonly used items
pub use access::{AccessContext, Member, Rank, RankRegistry, SharedRank};
pub use claims::{ClaimedChunk, ContextRef, Layer, Resolution, Source, Terminal, WorldOverrides, WorldState, Zone};
pub use engine::{ClaimEngine, SaveReport};
pub use error::{ClaimError, ClaimResult, ValidationError};
pub use identity::{Identity, PlayerId, RankId, WorldId, ZoneId, ADMINS_ID, WILDERNESS_ID};
pub use listeners::{DenialEvent, ListenerKey};
pub use position::{BlockPos, ChunkPos, RegionPos};

// Re-export permission types
pub use permissions::{
    AdminPredicate, NoAdmins, NodeRegistry, Permission, PermissionDefaults, PermissionSet, Tristate, ADMIN_NODE,
};

// Re-export storage types
pub use storage::{ChunkRecord, ChunkStorage, MemberRecord, MemoryStorage, RankRecord, StorageError, ZoneRecord};

// Re-export config types
pub use config::{ConfigError, ConfigFile, ConfigResult, DefaultsConfig, MainConfig, WorldConfig};
