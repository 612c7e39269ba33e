//! Change detection between the persisted state and the working tree

use super::fingerprint::{scan_fingerprints, FingerprintMap};
use super::state::SyncState;
use crate::error::Result;
use crate::graph::symbols::SymbolMap;
use crate::parser::walker::ExtractionConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

/// Sync settings (`sync` section of the config file)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// State file location, relative to the project root unless absolute
    pub state_path: PathBuf,
    /// Force a full sync when the last one is older than this
    pub full_sync_after_days: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            state_path: PathBuf::from(".codegraph/sync-state.json"),
            full_sync_after_days: 7,
        }
    }
}

/// Paths grouped by how they changed since the last sync. Every list is sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    pub added: Vec<String>,
    pub changed: Vec<String>,
    pub deleted: Vec<String>,
    pub unchanged: Vec<String>,
}

impl ChangeSet {
    /// Nothing to extract or retire
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.changed.is_empty() && self.deleted.is_empty()
    }

    pub fn pending(&self) -> usize {
        self.added.len() + self.changed.len() + self.deleted.len()
    }

    pub fn summary(&self) -> ChangeSummary {
        ChangeSummary {
            added: self.added.len(),
            changed: self.changed.len(),
            deleted: self.deleted.len(),
            unchanged: self.unchanged.len(),
        }
    }

    /// Files to (re)extract
    pub fn to_extract(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.added.iter().chain(&self.changed).cloned().collect();
        paths.sort();
        paths
    }
}

/// File counts of a change set
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSummary {
    pub added: usize,
    pub changed: usize,
    pub deleted: usize,
    pub unchanged: usize,
}

/// What a sync run will do
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncPlan {
    pub full: bool,
    pub changes: ChangeSet,
    /// Files whose previous graph contribution must be retired first
    pub retire: Vec<String>,
    #[serde(skip)]
    pub fingerprints: FingerprintMap,
}

/// Compute the change set between two fingerprint maps.
///
/// A file that cannot be read now is `changed` when it was known before
/// (with a warning) and `added` otherwise.
pub fn diff(previous: &FingerprintMap, current: &FingerprintMap) -> ChangeSet {
    let mut changes = ChangeSet::default();

    for (path, fingerprint) in current {
        match previous.get(path) {
            None => changes.added.push(path.clone()),
            Some(_) if !fingerprint.readable => {
                tracing::warn!("{} is unreadable, treating it as changed", path);
                changes.changed.push(path.clone());
            }
            Some(old) if old == fingerprint => changes.unchanged.push(path.clone()),
            Some(_) => changes.changed.push(path.clone()),
        }
    }

    changes.deleted = previous
        .keys()
        .filter(|path| !current.contains_key(*path))
        .cloned()
        .collect();

    // BTreeMap iteration keeps every list sorted
    changes
}

/// Drives fingerprinting, diffing and state persistence for one project root
pub struct SyncManager {
    root: PathBuf,
    extraction: ExtractionConfig,
    config: SyncConfig,
}

impl SyncManager {
    pub fn new(root: impl Into<PathBuf>, extraction: ExtractionConfig, config: SyncConfig) -> Self {
        Self {
            root: root.into(),
            extraction,
            config,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn extraction_config(&self) -> &ExtractionConfig {
        &self.extraction
    }

    pub fn state_path(&self) -> PathBuf {
        if self.config.state_path.is_absolute() {
            self.config.state_path.clone()
        } else {
            self.root.join(&self.config.state_path)
        }
    }

    pub fn load_state(&self) -> SyncState {
        SyncState::load(&self.state_path())
    }

    /// Fingerprint every source file under the root
    pub fn scan(&self) -> FingerprintMap {
        scan_fingerprints(&self.root, &self.extraction)
    }

    /// True when there is no usable history or it is too old to trust
    pub fn should_force_full_sync(&self, state: &SyncState, now_ms: i64) -> bool {
        if state.files.is_empty() {
            return true;
        }
        let max_age = i64::from(self.config.full_sync_after_days) * DAY_MS;
        now_ms - state.last_sync > max_age
    }

    /// Plan a run against `state`. A full run extracts every current file
    /// and retires every previously known one.
    pub fn plan(&self, state: &SyncState, current: FingerprintMap, now_ms: i64, force_full: bool) -> SyncPlan {
        let full = force_full || self.should_force_full_sync(state, now_ms);

        if full {
            let changes = ChangeSet {
                added: current.keys().cloned().collect(),
                deleted: state
                    .files
                    .keys()
                    .filter(|path| !current.contains_key(*path))
                    .cloned()
                    .collect(),
                ..Default::default()
            };
            return SyncPlan {
                full,
                changes,
                retire: state.files.keys().cloned().collect(),
                fingerprints: current,
            };
        }

        let changes = diff(&state.files, &current);
        let mut retire: Vec<String> = changes
            .changed
            .iter()
            .chain(&changes.deleted)
            .cloned()
            .collect();
        retire.sort();

        SyncPlan {
            full,
            changes,
            retire,
            fingerprints: current,
        }
    }

    /// Persist the fingerprints and symbols of a completed run
    pub fn commit(&self, fingerprints: FingerprintMap, symbols: SymbolMap, now_ms: i64) -> Result<()> {
        SyncState::new(now_ms, fingerprints)
            .with_symbols(symbols)
            .save(&self.state_path())
    }

    pub fn clear_state(&self) -> Result<()> {
        SyncState::remove(&self.state_path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::fingerprint::FileFingerprint;
    use tempfile::TempDir;

    fn fp(hash: &str) -> FileFingerprint {
        FileFingerprint {
            size: 1,
            mtime: 1,
            hash: hash.to_string(),
            readable: true,
        }
    }

    fn map(entries: &[(&str, FileFingerprint)]) -> FingerprintMap {
        entries
            .iter()
            .map(|(p, f)| (p.to_string(), f.clone()))
            .collect()
    }

    fn manager(root: &Path) -> SyncManager {
        SyncManager::new(root, ExtractionConfig::default(), SyncConfig::default())
    }

    #[test]
    fn test_diff_classifies_every_path() {
        let previous = map(&[("f1", fp("a")), ("f2", fp("b")), ("f3", fp("c"))]);
        let current = map(&[("f1", fp("a")), ("f2", fp("b2")), ("f4", fp("d"))]);

        let changes = diff(&previous, &current);
        assert_eq!(changes.added, vec!["f4"]);
        assert_eq!(changes.changed, vec!["f2"]);
        assert_eq!(changes.deleted, vec!["f3"]);
        assert_eq!(changes.unchanged, vec!["f1"]);
        assert_eq!(changes.pending(), 3);
    }

    #[test]
    fn test_diff_detects_metadata_only_changes() {
        let previous = map(&[("f1", fp("a"))]);
        let mut touched = fp("a");
        touched.mtime = 2;
        let changes = diff(&previous, &map(&[("f1", touched)]));
        assert_eq!(changes.changed, vec!["f1"]);
    }

    #[test]
    fn test_unreadable_known_file_is_always_changed() {
        let previous = map(&[("f1", FileFingerprint::unreadable(1, 1))]);
        let current = map(&[
            ("f1", FileFingerprint::unreadable(1, 1)),
            ("f2", FileFingerprint::unreadable(1, 1)),
        ]);
        let changes = diff(&previous, &current);
        assert_eq!(changes.changed, vec!["f1"]);
        assert_eq!(changes.added, vec!["f2"]);
        assert!(changes.unchanged.is_empty());
    }

    #[test]
    fn test_force_full_sync_policy() {
        let dir = TempDir::new().unwrap();
        let manager = manager(dir.path());
        let now = 1_700_000_000_000;

        assert!(manager.should_force_full_sync(&SyncState::default(), now));

        let files = map(&[("f1", fp("a"))]);
        let six_days = SyncState::new(now - 6 * DAY_MS, files.clone());
        assert!(!manager.should_force_full_sync(&six_days, now));

        let eight_days = SyncState::new(now - 8 * DAY_MS, files);
        assert!(manager.should_force_full_sync(&eight_days, now));
    }

    #[test]
    fn test_full_plan_extracts_everything_and_retires_known_files() {
        let dir = TempDir::new().unwrap();
        let manager = manager(dir.path());
        let now = 1_700_000_000_000;
        let state = SyncState::new(now, map(&[("f1", fp("a")), ("f3", fp("c"))]));
        let current = map(&[("f1", fp("a")), ("f2", fp("b"))]);

        let plan = manager.plan(&state, current, now, true);
        assert!(plan.full);
        assert_eq!(plan.changes.added, vec!["f1", "f2"]);
        assert_eq!(plan.changes.deleted, vec!["f3"]);
        assert_eq!(plan.retire, vec!["f1", "f3"]);
    }

    #[test]
    fn test_incremental_plan_retires_changed_and_deleted() {
        let dir = TempDir::new().unwrap();
        let manager = manager(dir.path());
        let now = 1_700_000_000_000;
        let state = SyncState::new(now, map(&[("f1", fp("a")), ("f2", fp("b")), ("f3", fp("c"))]));
        let current = map(&[("f1", fp("a")), ("f2", fp("b2")), ("f4", fp("d"))]);

        let plan = manager.plan(&state, current, now + 1000, false);
        assert!(!plan.full);
        assert_eq!(plan.changes.to_extract(), vec!["f2", "f4"]);
        assert_eq!(plan.retire, vec!["f2", "f3"]);
    }

    #[test]
    fn test_commit_then_scan_is_unchanged() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.ts"), "export const a = 1;").unwrap();
        let manager = manager(dir.path());

        let first = manager.scan();
        manager.commit(first, SymbolMap::new(), 1_000).unwrap();

        let state = manager.load_state();
        let plan = manager.plan(&state, manager.scan(), 2_000, false);
        assert!(plan.changes.is_empty());
        assert_eq!(plan.changes.unchanged, vec!["a.ts"]);
        assert!(manager.state_path().ends_with(".codegraph/sync-state.json"));
    }
}
