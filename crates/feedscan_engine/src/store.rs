use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use scan_logging::{scan_debug, scan_info, scan_warn};

use crate::persist::{AtomicFileWriter, PersistError};
use crate::Credentials;

/// Durable holder for exactly one captured request template.
///
/// The record is an opaque pass-through cache: header content is never validated.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the stored record. Missing or corrupt state yields `None`.
    pub fn load(&self) -> Option<Credentials> {
        let content = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                scan_debug!("No credential record at {:?}", self.path);
                return None;
            }
            Err(err) => {
                scan_warn!("Failed to read credential record {:?}: {}", self.path, err);
                return None;
            }
        };

        match serde_json::from_str::<Credentials>(&content) {
            Ok(credentials) => {
                scan_info!(
                    "Loaded credential record from {:?} ({} headers)",
                    self.path,
                    credentials.headers.len()
                );
                Some(credentials)
            }
            Err(err) => {
                scan_warn!("Failed to parse credential record {:?}: {}", self.path, err);
                None
            }
        }
    }

    pub fn save(&self, credentials: &Credentials) -> Result<(), PersistError> {
        let content = serde_json::to_string_pretty(credentials)?;
        AtomicFileWriter::new(self.path.clone()).write(&content)?;
        scan_info!("Saved credential record to {:?}", self.path);
        Ok(())
    }
}
