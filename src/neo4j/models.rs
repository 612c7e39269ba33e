//! Storage-side result types

use crate::graph::models::{GraphNode, GraphRelationship};
use serde::{Deserialize, Serialize};

/// Outcome of an `import_data` call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub nodes_written: usize,
    pub relationships_written: usize,
    /// Transactions committed
    pub batches: usize,
    /// Name of the relationship import strategy used
    pub strategy: String,
}

impl ImportSummary {
    pub fn absorb(&mut self, other: ImportSummary) {
        self.nodes_written += other.nodes_written;
        self.relationships_written += other.relationships_written;
        self.batches += other.batches;
        if self.strategy.is_empty() {
            self.strategy = other.strategy;
        }
    }
}

/// Nodes and relationships rebuilt from a query's rows, deduplicated by id
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub nodes: Vec<GraphNode>,
    pub relationships: Vec<GraphRelationship>,
    pub rows: usize,
}

impl QueryResult {
    pub fn push_node(&mut self, node: GraphNode) {
        if !self.nodes.iter().any(|n| n.id == node.id) {
            self.nodes.push(node);
        }
    }

    pub fn push_relationship(&mut self, rel: GraphRelationship) {
        if !self.relationships.iter().any(|r| r.id == rel.id) {
            self.relationships.push(rel);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.relationships.is_empty()
    }
}

/// Outcome of retiring the graph contribution of a set of files
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetireSummary {
    pub relationships_removed: u64,
    pub nodes_unresolved: u64,
    pub nodes_pruned: u64,
}
