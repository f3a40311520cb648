//! Config path resolution
//!
//! Every path is relative to the config directory handed over by the host.

use std::path::{Path, PathBuf};

/// Path: `<config_dir>/mychunks.toml`
pub fn main_config_path(config_dir: &Path) -> PathBuf {
    config_dir.join("mychunks.toml")
}

/// Path: `<config_dir>/default-permissions.toml`
pub fn defaults_config_path(config_dir: &Path) -> PathBuf {
    config_dir.join("default-permissions.toml")
}

/// Path: `<config_dir>/worlds/`
pub fn worlds_dir(config_dir: &Path) -> PathBuf {
    config_dir.join("worlds")
}

/// Path: `<config_dir>/worlds/{world_file_name}.toml`
pub fn world_config_path(config_dir: &Path, world_name: &str) -> PathBuf {
    worlds_dir(config_dir).join(format!("{}.toml", world_file_name(world_name)))
}

/// World name with everything but ASCII letters, digits and `-` replaced by `_`
pub fn world_file_name(world_name: &str) -> String {
    world_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}
