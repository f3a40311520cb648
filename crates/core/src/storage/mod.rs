//! Storage collaborator contract
//!
//! The core never reads or writes files itself. It calls a [`ChunkStorage`]
//! implementation when a chunk is loaded, and hands dirty records to a
//! [`SaveQueue`] that forwards them in the background.
//!
//! ```text
//!  chunk load ──► ChunkStorage::load_chunk ──► Ok(Some) → claimed chunk
//!                                          ├─► Ok(None) → wilderness
//!                                          └─► Err      → admin-owned safe default
//!
//!  world save ──► SaveQueue::enqueue ──► worker thread ──► ChunkStorage::save_chunk
//! ```

mod memory;
mod queue;
mod record;

use std::path::PathBuf;

pub use memory::MemoryStorage;
pub use queue::{SaveJob, SaveQueue, DEFAULT_QUEUE_CAPACITY};
pub use record::{ChunkRecord, MemberRecord, RankRecord, ZoneRecord};
pub(crate) use record::{member_records, restore_context};

use crate::identity::{WorldId, ZoneId};
use crate::position::ChunkPos;

/// Errors raised by storage implementations
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Failed to read or write a file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored file could not be decoded
    #[error("Failed to decode {path:?}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A record could not be encoded
    #[error("Failed to encode record: {0}")]
    Encode(#[source] serde_json::Error),

    /// The backend is not able to serve requests
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Load/save of claim records
///
/// Implementations must be safe to call from the save worker thread and
/// from the thread that loads chunks at the same time.
pub trait ChunkStorage: Send + Sync {
    /// Load the claim at a position, `Ok(None)` if it was never claimed
    fn load_chunk(&self, world: WorldId, position: ChunkPos) -> StorageResult<Option<ChunkRecord>>;

    /// Insert or replace a claim
    fn save_chunk(&self, record: &ChunkRecord) -> StorageResult<()>;

    /// Forget a claim
    fn remove_chunk(&self, world: WorldId, position: ChunkPos) -> StorageResult<()>;

    /// Every zone defined in a world
    fn load_zones(&self, world: WorldId) -> StorageResult<Vec<ZoneRecord>>;

    /// Insert or replace a zone
    fn save_zone(&self, record: &ZoneRecord) -> StorageResult<()>;

    /// Forget a zone
    fn remove_zone(&self, world: WorldId, zone: ZoneId) -> StorageResult<()>;

    /// Every rank on the server
    fn load_ranks(&self) -> StorageResult<Vec<RankRecord>>;

    /// Insert or replace a rank
    fn save_rank(&self, record: &RankRecord) -> StorageResult<()>;
}
