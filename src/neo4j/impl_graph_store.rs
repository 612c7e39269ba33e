//! `GraphStore` implementation for `Neo4jClient`.
//!
//! Every method simply delegates to the corresponding inherent method on `Neo4jClient`.

use async_trait::async_trait;

use super::client::Neo4jClient;
use super::models::*;
use super::traits::GraphStore;
use crate::error::Result;
use crate::graph::models::{GraphNode, GraphRelationship, GraphStats, Properties};

#[async_trait]
impl GraphStore for Neo4jClient {
    async fn health_check(&self) -> Result<()> {
        self.health_check().await
    }

    // ========================================================================
    // Writes
    // ========================================================================

    async fn import_data(
        &self,
        nodes: &[GraphNode],
        relationships: &[GraphRelationship],
    ) -> Result<ImportSummary> {
        self.import_data(nodes, relationships).await
    }

    async fn replace_relationships(&self, removed_ids: &[String]) -> Result<u64> {
        self.replace_relationships(removed_ids).await
    }

    async fn retire_files(&self, paths: &[String]) -> Result<RetireSummary> {
        self.retire_files(paths).await
    }

    async fn clear(&self) -> Result<()> {
        self.clear().await
    }

    // ========================================================================
    // Reads
    // ========================================================================

    async fn query(&self, cypher: &str, params: &Properties) -> Result<QueryResult> {
        self.query(cypher, params).await
    }

    async fn get_stats(&self) -> Result<GraphStats> {
        self.get_stats().await
    }

    async fn fetch_relationships(&self) -> Result<Vec<GraphRelationship>> {
        self.fetch_relationships().await
    }
}
