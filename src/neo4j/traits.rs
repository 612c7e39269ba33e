//! GraphStore trait definition
//!
//! Abstract interface over the graph database, enabling testing with the
//! in-memory mock and future backend swaps.

use super::models::{ImportSummary, QueryResult, RetireSummary};
use crate::error::Result;
use crate::graph::models::{GraphNode, GraphRelationship, GraphStats, Properties};
use async_trait::async_trait;

/// Abstract interface for all graph database operations.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Verify the database answers a trivial query
    async fn health_check(&self) -> Result<()>;

    /// Merge nodes, then relationships, by id. Missing endpoints become stubs.
    async fn import_data(
        &self,
        nodes: &[GraphNode],
        relationships: &[GraphRelationship],
    ) -> Result<ImportSummary>;

    /// Run a read query and rebuild the nodes and relationships it returns
    async fn query(&self, cypher: &str, params: &Properties) -> Result<QueryResult>;

    /// Node and relationship counts, overall and per type
    async fn get_stats(&self) -> Result<GraphStats>;

    /// Every stored relationship
    async fn fetch_relationships(&self) -> Result<Vec<GraphRelationship>>;

    /// Delete relationships by id, returning how many were removed
    async fn replace_relationships(&self, removed_ids: &[String]) -> Result<u64>;

    /// Drop the edges extracted from `paths`, mark their nodes unresolved and
    /// prune unresolved nodes left without edges
    async fn retire_files(&self, paths: &[String]) -> Result<RetireSummary>;

    /// Delete every node and relationship
    async fn clear(&self) -> Result<()>;
}
