//! JSON file helpers

use std::io::ErrorKind;
use std::path::Path;

use serde::{de::DeserializeOwned, Serialize};

use mychunks_core::storage::{StorageError, StorageResult};

/// Read a JSON file. A missing file yields the default value.
pub(crate) fn read_json<T>(path: &Path) -> StorageResult<T>
where
    T: DeserializeOwned + Default,
{
    let content = match std::fs::read(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(T::default()),
        Err(e) => return Err(e.into()),
    };

    serde_json::from_slice(&content).map_err(|source| StorageError::Decode {
        path: path.to_path_buf(),
        source,
    })
}

/// Write a JSON file through a temporary file and a rename
pub(crate) fn write_json<T>(path: &Path, value: &T) -> StorageResult<()>
where
    T: Serialize + ?Sized,
{
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let content = serde_json::to_vec_pretty(value).map_err(StorageError::Encode)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, content)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Delete a file, ignoring one that does not exist
pub(crate) fn remove_file(path: &Path) -> StorageResult<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
