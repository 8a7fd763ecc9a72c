//! Crash-safe JSON files.
//!
//! State is written to a temporary file in the target directory and then
//! renamed over the old file, so a crash leaves either the old or the new
//! contents on disk, never a torn write.

use std::fs;
use std::io::Write;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{PersistenceError, Result};

/// Replaces the contents of `path` with `data` in one rename.
///
/// Missing parent directories are created.
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(|source| PersistenceError::DirectoryError {
        path: dir.to_path_buf(),
        source,
    })?;

    let write_err = |source| PersistenceError::WriteError {
        path: path.to_path_buf(),
        source,
    };

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(data).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}

/// Serializes `value` as pretty JSON and writes it atomically.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_vec_pretty(value)?;
    atomic_write(path, &json)
}

/// Reads a JSON state file, returning `None` when it does not exist.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let data = match fs::read(path) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(PersistenceError::ReadError {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    Ok(Some(serde_json::from_slice(&data)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::tempdir;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Cursor {
        since_id: String,
    }

    #[test]
    fn test_write_creates_nested_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state/nested/cursor.json");

        write_json(&path, &Cursor { since_id: "42".into() }).unwrap();

        let loaded: Option<Cursor> = read_json(&path).unwrap();
        assert_eq!(loaded.unwrap().since_id, "42");
    }

    #[test]
    fn test_overwrite_replaces_contents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("file.txt");

        atomic_write(&path, b"first version, longer").unwrap();
        atomic_write(&path, b"second").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "second");
    }

    #[test]
    fn test_missing_file_is_none() {
        let dir = tempdir().unwrap();
        let loaded: Option<Cursor> = read_json(&dir.path().join("absent.json")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_corrupt_file_is_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "{not json").unwrap();

        let result: Result<Option<Cursor>> = read_json(&path);
        assert!(matches!(result, Err(PersistenceError::Json(_))));
    }
}
