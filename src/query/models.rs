//! Query engine types

use super::intent::QueryIntent;
use crate::graph::models::{GraphNode, GraphRelationship};
use serde::{Deserialize, Serialize};

/// Query settings (`query` section of the config file)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    pub default_limit: usize,
    pub max_limit: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_limit: 20,
            max_limit: 200,
        }
    }
}

/// Everything derived from the raw text before touching the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryContext {
    pub raw_query: String,
    pub intent: QueryIntent,
    pub entities: Vec<String>,
    pub result_limit: usize,
}

/// Answer to a free-text query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub success: bool,
    pub intent: QueryIntent,
    pub entities: Vec<String>,
    pub confidence: f64,
    pub nodes: Vec<GraphNode>,
    pub relationships: Vec<GraphRelationship>,
    pub explanation: String,
    pub suggestions: Vec<String>,
    /// Rendered query, for debugging
    pub cypher: String,
    pub execution_time_ms: u64,
}

impl QueryResponse {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.relationships.is_empty()
    }
}
