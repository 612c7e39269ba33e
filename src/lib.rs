//! Codegraph
//!
//! A knowledge graph of a TypeScript/JavaScript codebase:
//! - Tree-sitter extraction of declarations, calls, imports and exports
//! - Deterministic ids and a multi-stage relationship deduplicator
//! - Neo4j storage with merge-on-import
//! - Incremental sync driven by file fingerprints
//! - Rule-based free-text queries translated to Cypher

pub mod error;
pub mod graph;
pub mod neo4j;
pub mod orchestrator;
pub mod parser;
pub mod query;
pub mod sync;

use anyhow::Result;
use parser::walker::ExtractionConfig;
use query::QueryConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use sync::SyncConfig;

/// Config file looked up in the working directory when none is given
pub const DEFAULT_CONFIG_FILE: &str = "codegraph.yaml";

// ============================================================================
// YAML config structs (deserialization targets)
// ============================================================================

/// Top-level YAML configuration file structure
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub neo4j: Neo4jYamlConfig,
    pub extraction: ExtractionConfig,
    pub sync: SyncConfig,
    pub query: QueryConfig,
}

/// Neo4j configuration section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Neo4jYamlConfig {
    pub uri: String,
    pub user: String,
    pub password: String,
    pub database: Option<String>,
    pub max_pool_size: usize,
    pub max_transaction_retry_ms: u64,
    pub batch_size: usize,
}

impl Default for Neo4jYamlConfig {
    fn default() -> Self {
        Self {
            uri: "bolt://localhost:7687".into(),
            user: "neo4j".into(),
            password: String::new(),
            database: None,
            max_pool_size: 16,
            max_transaction_retry_ms: 30_000,
            batch_size: 500,
        }
    }
}

// ============================================================================
// Runtime config (what the application actually uses)
// ============================================================================

/// Connection settings for the graph database
#[derive(Debug, Clone)]
pub struct Neo4jConfig {
    pub uri: String,
    pub user: String,
    pub password: String,
    pub database: Option<String>,
    pub max_pool_size: usize,
    /// Total time a failing write batch is retried for
    pub max_transaction_retry_ms: u64,
    /// Rows per import transaction
    pub batch_size: usize,
}

impl Neo4jConfig {
    /// Credentials are required before connecting
    pub fn validate(&self) -> error::Result<()> {
        if self.uri.trim().is_empty() {
            return Err(error::GraphError::Config("NEO4J_URI is empty".into()));
        }
        if self.user.trim().is_empty() || self.password.is_empty() {
            return Err(error::GraphError::Config(
                "NEO4J_USER and NEO4J_PASSWORD are required".into(),
            ));
        }
        if self.batch_size == 0 {
            return Err(error::GraphError::Config("batch_size must be positive".into()));
        }
        Ok(())
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub neo4j: Neo4jConfig,
    pub extraction: ExtractionConfig,
    pub sync: SyncConfig,
    pub query: QueryConfig,
}

fn env_parse<T: std::str::FromStr>(name: &str, fallback: T) -> T {
    match std::env::var(name) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring invalid {}={:?}", name, raw);
            fallback
        }),
        Err(_) => fallback,
    }
}

impl Config {
    /// Load configuration from environment variables only.
    /// Equivalent to from_yaml_and_env(None).
    pub fn from_env() -> Result<Self> {
        Self::from_yaml_and_env(None)
    }

    /// Load configuration from an optional YAML file, then override with env vars.
    ///
    /// Priority: env var > YAML > default
    ///
    /// If `yaml_path` is None, tries "codegraph.yaml" in CWD. If the file doesn't
    /// exist, falls back to pure env var / defaults.
    pub fn from_yaml_and_env(yaml_path: Option<&Path>) -> Result<Self> {
        // 1. Load YAML config (or defaults if file not found)
        let yaml = Self::load_yaml(yaml_path);

        // 2. Build Config with env var overrides
        let database = std::env::var("NEO4J_DATABASE")
            .ok()
            .or(yaml.neo4j.database)
            .filter(|db| !db.trim().is_empty());

        let mut sync = yaml.sync;
        if let Ok(path) = std::env::var("CODEGRAPH_STATE_PATH") {
            sync.state_path = PathBuf::from(path);
        }

        Ok(Self {
            neo4j: Neo4jConfig {
                uri: std::env::var("NEO4J_URI").unwrap_or(yaml.neo4j.uri),
                user: std::env::var("NEO4J_USER").unwrap_or(yaml.neo4j.user),
                password: std::env::var("NEO4J_PASSWORD").unwrap_or(yaml.neo4j.password),
                database,
                max_pool_size: env_parse("NEO4J_MAX_POOL_SIZE", yaml.neo4j.max_pool_size),
                max_transaction_retry_ms: env_parse(
                    "NEO4J_MAX_TX_RETRY_MS",
                    yaml.neo4j.max_transaction_retry_ms,
                ),
                batch_size: yaml.neo4j.batch_size,
            },
            extraction: yaml.extraction,
            sync,
            query: yaml.query,
        })
    }

    /// Try to load and parse a YAML config file. Returns defaults on any failure.
    fn load_yaml(yaml_path: Option<&Path>) -> YamlConfig {
        let default_path = Path::new(DEFAULT_CONFIG_FILE);
        let path = yaml_path.unwrap_or(default_path);

        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_yaml::from_str(&contents) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                    YamlConfig::default()
                }
            },
            Err(_) => {
                tracing::debug!(
                    "No config file at {}, using env vars / defaults",
                    path.display()
                );
                YamlConfig::default()
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
