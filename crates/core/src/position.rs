//! Block, chunk and region coordinates
//!
//! A chunk groups 16x16 blocks on the X/Z plane; a region groups 32x32
//! chunks. Height is ignored for claims, so chunk and region positions are
//! planar.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Number of bits to shift a block coordinate to get its chunk coordinate
const CHUNK_SHIFT: i32 = 4;

/// Number of bits to shift a chunk coordinate to get its region coordinate
const REGION_SHIFT: i32 = 5;

/// A block position in a world
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// The chunk containing this block
    pub const fn chunk(&self) -> ChunkPos {
        ChunkPos::new(self.x >> CHUNK_SHIFT, self.z >> CHUNK_SHIFT)
    }
}

/// A chunk position in a world (height discarded)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChunkPos {
    pub x: i32,
    pub z: i32,
}

impl ChunkPos {
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// The region file that stores this chunk
    pub const fn region(&self) -> RegionPos {
        RegionPos::new(self.x >> REGION_SHIFT, self.z >> REGION_SHIFT)
    }

    /// The block with the lowest coordinates inside this chunk
    pub const fn min_block(&self) -> BlockPos {
        BlockPos::new(self.x << CHUNK_SHIFT, 0, self.z << CHUNK_SHIFT)
    }

    /// The four positions sharing an edge with this one
    pub const fn cardinal_neighbors(&self) -> [ChunkPos; 4] {
        [
            ChunkPos::new(self.x - 1, self.z),
            ChunkPos::new(self.x + 1, self.z),
            ChunkPos::new(self.x, self.z - 1),
            ChunkPos::new(self.x, self.z + 1),
        ]
    }

    /// Check if exactly one axis differs by one and the other is equal
    pub fn is_cardinal_neighbor(&self, other: &ChunkPos) -> bool {
        let dx = (self.x - other.x).abs();
        let dz = (self.z - other.z).abs();
        matches!((dx, dz), (1, 0) | (0, 1))
    }
}

impl fmt::Display for ChunkPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.z)
    }
}

/// A region position (32x32 chunks)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RegionPos {
    pub x: i32,
    pub z: i32,
}

impl RegionPos {
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// The chunk with the lowest coordinates inside this region
    pub const fn min_chunk(&self) -> ChunkPos {
        ChunkPos::new(self.x << REGION_SHIFT, self.z << REGION_SHIFT)
    }
}

impl fmt::Display for RegionPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r.{}.{}", self.x, self.z)
    }
}
