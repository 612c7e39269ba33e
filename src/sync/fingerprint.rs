//! File fingerprints: size, modification time and content hash

use crate::parser::content_hash;
use crate::parser::walker::{discover_files, relative_path, ExtractionConfig};
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Fingerprint of one file, keyed by its project-relative path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFingerprint {
    pub size: u64,
    /// Modification time, epoch ms
    pub mtime: i64,
    /// SHA-256 of the content, empty when the file could not be read
    pub hash: String,
    #[serde(default = "readable_default", skip_serializing_if = "is_readable")]
    pub readable: bool,
}

fn readable_default() -> bool {
    true
}

fn is_readable(readable: &bool) -> bool {
    *readable
}

impl FileFingerprint {
    pub fn unreadable(size: u64, mtime: i64) -> Self {
        Self {
            size,
            mtime,
            hash: String::new(),
            readable: false,
        }
    }
}

/// Fingerprints keyed by project-relative path
pub type FingerprintMap = BTreeMap<String, FileFingerprint>;

/// Fingerprint one file. Read failures yield an unreadable fingerprint.
pub fn fingerprint_file(path: &Path) -> FileFingerprint {
    let (size, mtime) = match std::fs::metadata(path) {
        Ok(meta) => {
            let mtime = meta
                .modified()
                .map(|t| DateTime::<Utc>::from(t).timestamp_millis())
                .unwrap_or(0);
            (meta.len(), mtime)
        }
        Err(e) => {
            tracing::warn!("Cannot stat {}: {}", path.display(), e);
            return FileFingerprint::unreadable(0, 0);
        }
    };

    match std::fs::read(path) {
        Ok(bytes) => FileFingerprint {
            size,
            mtime,
            hash: content_hash(&bytes),
            readable: true,
        },
        Err(e) => {
            tracing::warn!("Cannot read {}: {}", path.display(), e);
            FileFingerprint::unreadable(size, mtime)
        }
    }
}

/// Walk `root` and fingerprint every source file in parallel
pub fn scan_fingerprints(root: &Path, config: &ExtractionConfig) -> FingerprintMap {
    let files = discover_files(root, config);
    files
        .par_iter()
        .map(|path| (relative_path(root, path), fingerprint_file(path)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_fingerprint_tracks_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.ts");
        fs::write(&path, "export const a = 1;").unwrap();

        let first = fingerprint_file(&path);
        assert!(first.readable);
        assert_eq!(first.size, 19);
        assert_eq!(first.hash.len(), 64);

        fs::write(&path, "export const a = 2;").unwrap();
        let second = fingerprint_file(&path);
        assert_ne!(first.hash, second.hash);
    }

    #[test]
    fn test_missing_file_is_unreadable() {
        let dir = TempDir::new().unwrap();
        let fp = fingerprint_file(&dir.path().join("gone.ts"));
        assert!(!fp.readable);
        assert!(fp.hash.is_empty());
    }

    #[test]
    fn test_scan_uses_relative_paths_and_prunes() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::create_dir_all(dir.path().join("node_modules/lib")).unwrap();
        fs::write(dir.path().join("src/a.ts"), "a").unwrap();
        fs::write(dir.path().join("node_modules/lib/b.ts"), "b").unwrap();
        fs::write(dir.path().join("README.md"), "readme").unwrap();

        let map = scan_fingerprints(dir.path(), &ExtractionConfig::default());
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["src/a.ts"]);
    }

    #[test]
    fn test_readable_flag_is_omitted_when_true() {
        let fp = FileFingerprint {
            size: 1,
            mtime: 2,
            hash: "h".into(),
            readable: true,
        };
        let json = serde_json::to_value(&fp).unwrap();
        assert!(json.get("readable").is_none());

        let back: FileFingerprint = serde_json::from_value(json).unwrap();
        assert!(back.readable);
    }
}
