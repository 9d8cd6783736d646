use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("directory missing or not writable: {0}")]
    Dir(String),
    #[error("failed to serialize credential record: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("credential record at {0:?} could not be read back")]
    ReadBack(PathBuf),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Ensure the directory holding `path` exists; create it if missing.
pub fn ensure_parent_dir(path: &Path) -> Result<PathBuf, PersistError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    if dir.exists() {
        let meta = fs::metadata(&dir).map_err(|e| PersistError::Dir(e.to_string()))?;
        if !meta.is_dir() {
            return Err(PersistError::Dir(format!("{dir:?} is not a directory")));
        }
    } else {
        fs::create_dir_all(&dir).map_err(|e| PersistError::Dir(e.to_string()))?;
    }
    Ok(dir)
}

/// Atomically replaces a single file by writing a sibling temp file then renaming.
pub struct AtomicFileWriter {
    target: PathBuf,
}

impl AtomicFileWriter {
    pub fn new(target: PathBuf) -> Self {
        Self { target }
    }

    pub fn write(&self, content: &str) -> Result<&Path, PersistError> {
        let dir = ensure_parent_dir(&self.target)?;

        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.flush()?;
        tmp.as_file_mut().sync_all()?;

        tmp.persist(&self.target)
            .map_err(|e| PersistError::Io(e.error))?;
        Ok(&self.target)
    }
}
