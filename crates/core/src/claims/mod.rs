//! Claimed chunks, zones and the per-world state that links them
//!
//! ```text
//! WorldState
//!   ├── fallback context      (overrides only)
//!   ├── wilderness context    (overrides only)
//!   ├── chunks: ChunkPos → ClaimedChunk ──zone id──┐
//!   └── zones:  ZoneId   → Zone { positions } ◄────┘
//! ```
//!
//! The zone's position set is the source of truth for membership; the zone
//! id stored on a chunk is kept in sync with it.

mod chain;
mod chunk;
mod world;
mod zone;

pub use chain::{Chain, Layer, Resolution, Source, Terminal};
pub use chunk::ClaimedChunk;
pub use world::{ContextRef, DirtyRecords, OwnerCascade, WorldOverrides, WorldState};
pub use zone::Zone;
