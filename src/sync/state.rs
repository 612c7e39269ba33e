//! Persisted sync state
//!
//! On disk: `{"lastSync": <epoch-ms>, "files": [[path, {size, mtime, hash}], ...],
//! "symbols": {path: {package, symbols}}, "version": "..."}`.
//! Writes go through a temporary file in the same directory followed by a
//! rename, so an interrupted run leaves the previous state intact.

use super::fingerprint::{FileFingerprint, FingerprintMap};
use crate::error::{GraphError, Result};
use crate::graph::symbols::SymbolMap;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Schema version written to new state files. Older versions lack the
/// symbol cache and degrade to a full sync.
pub const STATE_VERSION: &str = "2";

/// Fingerprints recorded by the last completed sync
#[derive(Debug, Clone, PartialEq)]
pub struct SyncState {
    /// Epoch ms of the last completed sync, 0 when never synced
    pub last_sync: i64,
    pub files: FingerprintMap,
    /// Declarations of every file parsed by the last completed sync
    pub symbols: SymbolMap,
    pub version: String,
}

impl Default for SyncState {
    fn default() -> Self {
        Self {
            last_sync: 0,
            files: FingerprintMap::new(),
            symbols: SymbolMap::new(),
            version: STATE_VERSION.to_string(),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct StateFile {
    #[serde(rename = "lastSync")]
    last_sync: i64,
    files: Vec<(String, FileFingerprint)>,
    #[serde(default)]
    symbols: SymbolMap,
    version: String,
}

impl SyncState {
    pub fn new(last_sync: i64, files: FingerprintMap) -> Self {
        Self {
            last_sync,
            files,
            symbols: SymbolMap::new(),
            version: STATE_VERSION.to_string(),
        }
    }

    pub fn with_symbols(mut self, symbols: SymbolMap) -> Self {
        self.symbols = symbols;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Read the state file. `Ok(None)` when it does not exist.
    pub fn try_load(path: &Path) -> Result<Option<Self>> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(GraphError::StateCorruption {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })
            }
        };

        let file: StateFile =
            serde_json::from_str(&contents).map_err(|e| GraphError::StateCorruption {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        if file.version != STATE_VERSION {
            return Err(GraphError::StateCorruption {
                path: path.to_path_buf(),
                message: format!("unsupported version {:?}", file.version),
            });
        }

        Ok(Some(Self {
            last_sync: file.last_sync,
            files: file.files.into_iter().collect(),
            symbols: file.symbols,
            version: file.version,
        }))
    }

    /// Read the state file, degrading to an empty state when it is missing
    /// or unreadable
    pub fn load(path: &Path) -> Self {
        match Self::try_load(path) {
            Ok(Some(state)) => {
                tracing::debug!(
                    files = state.files.len(),
                    "Loaded sync state from {}",
                    path.display()
                );
                state
            }
            Ok(None) => {
                tracing::debug!("No sync state at {}, first run", path.display());
                Self::default()
            }
            Err(e) => {
                tracing::warn!("{}. Starting from an empty state.", e);
                Self::default()
            }
        }
    }

    /// Write the state atomically
    pub fn save(&self, path: &Path) -> Result<()> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)?;

        let file = StateFile {
            last_sync: self.last_sync,
            files: self
                .files
                .iter()
                .map(|(path, fp)| (path.clone(), fp.clone()))
                .collect(),
            symbols: self.symbols.clone(),
            version: self.version.clone(),
        };

        let mut tmp = NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut tmp, &file).map_err(std::io::Error::from)?;
        tmp.flush()?;
        tmp.persist(path).map_err(|e| e.error)?;

        tracing::debug!(files = self.files.len(), "Saved sync state to {}", path.display());
        Ok(())
    }

    /// Delete the state file if present
    pub fn remove(path: &Path) -> Result<()> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
