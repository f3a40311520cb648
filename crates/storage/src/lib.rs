//! MyChunks storage - JSON files on disk
//!
//! Layout under the save directory:
//!
//! ```text
//! <save_dir>/
//! ├── ranks.json
//! └── <world uuid>/
//!     ├── zones.json
//!     ├── r.0.0.json      chunk records of region (0, 0)
//!     └── r.-1.0.json
//! ```
//!
//! A region covers 32×32 chunks. Region files are cached in memory and
//! written through on every change; cached regions that have not been used
//! for a while are dropped.

mod files;
mod json;

pub use json::{JsonStorage, DEFAULT_CACHE_IDLE};
