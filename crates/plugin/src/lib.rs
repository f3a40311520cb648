//! MyChunks host glue
//!
//! Wires the TOML configuration, the JSON storage and the claim engine
//! together, and turns host world/chunk events into engine calls.
//!
//! ```ignore
//! let plugin = mychunks::MyChunks::enable("plugins/MyChunks")?;
//! plugin.on_world_load(world, "world")?;
//! plugin.on_chunk_load(world, ChunkPos::new(0, 0))?;
//! // ...
//! plugin.disable();
//! ```

mod error;
mod host;
mod logging;

pub use error::{PluginError, PluginResult};
pub use host::MyChunks;
pub use logging::init_logging;
