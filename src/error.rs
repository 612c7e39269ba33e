//! Error taxonomy for the knowledge graph pipeline
//!
//! Each variant maps to one recovery policy:
//! - `Parse` and `StateCorruption` are recovered where they occur (logged, counted)
//! - `Connection`, `Transaction` (after retries) and `QueryExecution` propagate
//!   to the caller and make the binary exit non-zero

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the extraction, storage, sync and query components
#[derive(Debug, Error)]
pub enum GraphError {
    /// A single source file could not be read or parsed
    #[error("failed to parse {path}: {message}")]
    Parse { path: String, message: String },

    /// The graph database is unreachable or rejected the credentials
    #[error("graph database connection failed: {0}")]
    Connection(String),

    /// A write batch failed and was rolled back
    #[error("transaction for {batch} failed after {attempts} attempt(s): {message}")]
    Transaction {
        batch: String,
        attempts: u32,
        message: String,
    },

    /// The persisted sync state could not be decoded
    #[error("sync state at {} is unreadable: {message}", path.display())]
    StateCorruption { path: PathBuf, message: String },

    /// A rendered query failed to execute
    #[error("query failed: {message}\n  query: {query}")]
    QueryExecution { query: String, message: String },

    /// Invalid configuration value
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl GraphError {
    pub fn parse(path: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub fn query(query: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::QueryExecution {
            query: query.into(),
            message: message.to_string(),
        }
    }

    /// Whether the error is recovered locally rather than aborting the run
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Parse { .. } | Self::StateCorruption { .. })
    }
}

pub type Result<T, E = GraphError> = std::result::Result<T, E>;
