//! Operation runner: check, sync, clean, reset, stats and query

use crate::graph::dedup::{deduplicate, DedupStats, QualityBreakdown};
use crate::graph::models::GraphStats;
use crate::graph::{FileSymbols, GraphBuilder, SymbolIndex, SymbolMap};
use crate::neo4j::models::{ImportSummary, RetireSummary};
use crate::neo4j::{GraphStore, Neo4jClient};
use crate::parser::walker::extract_files;
use crate::query::{QueryEngine, QueryResponse};
use crate::sync::{ChangeSet, ChangeSummary, SyncManager};
use crate::Config;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// Runs the graph operations for one project root
pub struct Orchestrator {
    store: Arc<dyn GraphStore>,
    sync: SyncManager,
    query: QueryEngine,
}

impl Orchestrator {
    /// Create an orchestrator over an existing store
    pub fn new(store: Arc<dyn GraphStore>, root: impl Into<PathBuf>, config: &Config) -> Self {
        let sync = SyncManager::new(root, config.extraction.clone(), config.sync.clone());
        let query = QueryEngine::new(store.clone(), config.query.clone());
        Self { store, sync, query }
    }

    /// Connect to Neo4j and create an orchestrator over it
    pub async fn connect(root: impl Into<PathBuf>, config: &Config) -> Result<Self> {
        let client = Neo4jClient::connect(&config.neo4j)
            .await
            .context("Failed to connect to Neo4j")?;
        Ok(Self::new(Arc::new(client), root, config))
    }

    pub fn store(&self) -> &dyn GraphStore {
        self.store.as_ref()
    }

    pub fn root(&self) -> &Path {
        self.sync.root()
    }

    pub fn sync_manager(&self) -> &SyncManager {
        &self.sync
    }

    // ========================================================================
    // Operations
    // ========================================================================

    /// Pending changes since the last sync. Touches neither the graph nor the state.
    pub fn check(&self) -> CheckReport {
        check(&self.sync)
    }

    /// Bring the graph up to date with the working tree.
    ///
    /// Falls back to a full sync when the state is empty or stale, or when
    /// `force_full` is set. The state file is written only after the import
    /// has been committed.
    pub async fn sync(&self, force_full: bool) -> Result<SyncReport> {
        let started = Instant::now();
        let now = Utc::now().timestamp_millis();

        let state = self.sync.load_state();
        let current = self.sync.scan();
        let plan = self.sync.plan(&state, current, now, force_full);

        tracing::info!(
            full = plan.full,
            added = plan.changes.added.len(),
            changed = plan.changes.changed.len(),
            deleted = plan.changes.deleted.len(),
            "Sync started"
        );

        let retired = if plan.retire.is_empty() {
            RetireSummary::default()
        } else {
            self.store
                .retire_files(&plan.retire)
                .await
                .context("Failed to retire changed files")?
        };

        let paths: Vec<PathBuf> = plan
            .changes
            .to_extract()
            .iter()
            .map(|rel| self.sync.root().join(rel))
            .collect();
        let outcome = extract_files(self.sync.root(), &paths, self.sync.extraction_config());

        // Unchanged files resolve through their cached declarations
        let mut symbols: SymbolMap = if plan.full {
            SymbolMap::new()
        } else {
            state
                .symbols
                .into_iter()
                .filter(|(path, _)| plan.changes.unchanged.binary_search(path).is_ok())
                .collect()
        };
        for file in &outcome.files {
            symbols.insert(file.path.clone(), FileSymbols::from_parsed(file));
        }
        let index = SymbolIndex::from_symbols(&symbols);

        let batch = GraphBuilder::new().build_with_index(&outcome.files, &index);
        let dedup = deduplicate(batch.relationships);

        let import = self
            .store
            .import_data(&batch.nodes, &dedup.relationships)
            .await
            .context("Failed to import graph batch")?;

        self.sync
            .commit(plan.fingerprints, symbols, now)
            .context("Failed to save sync state")?;

        let report = SyncReport {
            full: plan.full,
            changes: plan.changes.summary(),
            files_parsed: outcome.files.len(),
            parse_failures: outcome.failures.iter().map(|e| e.to_string()).collect(),
            retired,
            dedup: dedup.stats,
            import,
            duration_ms: started.elapsed().as_millis() as u64,
        };

        tracing::info!(
            parsed = report.files_parsed,
            failed = report.parse_failures.len(),
            nodes = report.import.nodes_written,
            relationships = report.import.relationships_written,
            "Sync finished in {} ms",
            report.duration_ms
        );
        Ok(report)
    }

    /// Re-run the deduplicator over every stored relationship and delete the losers
    pub async fn clean(&self) -> Result<CleanReport> {
        let stored = self
            .store
            .fetch_relationships()
            .await
            .context("Failed to fetch relationships")?;

        let report = deduplicate(stored.clone());
        let removed_ids = report.removed_ids(&stored);
        let removed = if removed_ids.is_empty() {
            0
        } else {
            self.store
                .replace_relationships(&removed_ids)
                .await
                .context("Failed to delete redundant relationships")?
        };

        tracing::info!(before = stored.len(), removed, "Clean finished");
        Ok(CleanReport {
            before: stored.len(),
            after: report.relationships.len(),
            removed,
            stats: report.stats,
            quality: report.quality,
        })
    }

    /// Clear the graph and the sync state, then run a full sync
    pub async fn reset(&self) -> Result<SyncReport> {
        self.store.clear().await.context("Failed to clear the graph")?;
        self.sync
            .clear_state()
            .context("Failed to delete sync state")?;
        tracing::info!("Graph and sync state cleared");
        self.sync(true).await
    }

    pub async fn stats(&self) -> Result<GraphStats> {
        self.store
            .get_stats()
            .await
            .context("Failed to read graph statistics")
    }

    pub async fn query(&self, text: &str, limit: Option<usize>) -> Result<QueryResponse> {
        Ok(self.query.query(text, limit).await?)
    }
}

/// Pending changes for `manager`'s root, without mutating anything
pub fn check(manager: &SyncManager) -> CheckReport {
    let now = Utc::now().timestamp_millis();
    let state = manager.load_state();
    let plan = manager.plan(&state, manager.scan(), now, false);

    CheckReport {
        full_sync_required: plan.full,
        last_sync: (state.last_sync > 0)
            .then(|| DateTime::<Utc>::from_timestamp_millis(state.last_sync))
            .flatten(),
        tracked_files: state.files.len(),
        changes: plan.changes,
    }
}

// ============================================================================
// Reports
// ============================================================================

/// Result of `check`
#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    pub full_sync_required: bool,
    pub last_sync: Option<DateTime<Utc>>,
    pub tracked_files: usize,
    pub changes: ChangeSet,
}

impl CheckReport {
    pub fn is_up_to_date(&self) -> bool {
        !self.full_sync_required && self.changes.is_empty()
    }
}

/// Result of `sync` and `reset`
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub full: bool,
    pub changes: ChangeSummary,
    pub files_parsed: usize,
    pub parse_failures: Vec<String>,
    pub retired: RetireSummary,
    pub dedup: DedupStats,
    pub import: ImportSummary,
    pub duration_ms: u64,
}

/// Result of `clean`
#[derive(Debug, Clone, Serialize)]
pub struct CleanReport {
    pub before: usize,
    pub after: usize,
    pub removed: u64,
    pub stats: DedupStats,
    pub quality: QualityBreakdown,
}
