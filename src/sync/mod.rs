//! Incremental sync: fingerprint the tree, diff against the last run, persist

pub mod fingerprint;
pub mod manager;
pub mod state;

pub use fingerprint::{FileFingerprint, FingerprintMap};
pub use manager::{diff, ChangeSet, ChangeSummary, SyncConfig, SyncManager, SyncPlan};
pub use state::SyncState;
