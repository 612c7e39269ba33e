//! Neo4j client for the code knowledge graph

use super::models::*;
use super::strategy::{node_statements, select_strategy, AcceleratedImport, ImportStrategy, Statement};
use crate::error::{GraphError, Result};
use crate::graph::ids::relationship_id;
use crate::graph::models::*;
use crate::Neo4jConfig;
use neo4rs::{query, BoltType, ConfigBuilder, Graph, Query};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Edge properties that describe the edge itself rather than its payload
const RELATIONSHIP_ENVELOPE: &[&str] = &["id", "source", "target", "updated_at"];
const NODE_ENVELOPE: &[&str] = &["id", "type", "name"];

/// Client for Neo4j operations
pub struct Neo4jClient {
    graph: Arc<Graph>,
    strategy: Box<dyn ImportStrategy>,
    batch_size: usize,
    max_retry: Duration,
}

impl Neo4jClient {
    /// Connect, verify connectivity, initialize the schema and pick the
    /// relationship import strategy. Connection failures are not retried.
    pub async fn connect(config: &Neo4jConfig) -> Result<Self> {
        config.validate()?;

        let mut builder = ConfigBuilder::default()
            .uri(config.uri.as_str())
            .user(config.user.as_str())
            .password(config.password.as_str())
            .max_connections(config.max_pool_size);
        if let Some(db) = config.database.as_deref().filter(|d| !d.is_empty()) {
            builder = builder.db(db);
        }
        let neo_config = builder
            .build()
            .map_err(|e| GraphError::Connection(e.to_string()))?;

        let graph = Graph::connect(neo_config)
            .await
            .map_err(|e| GraphError::Connection(format!("{}: {}", config.uri, e)))?;

        graph
            .run(query("RETURN 1"))
            .await
            .map_err(|e| GraphError::Connection(format!("{}: {}", config.uri, e)))?;

        let mut client = Self {
            graph: Arc::new(graph),
            strategy: select_strategy(false),
            batch_size: config.batch_size.max(1),
            max_retry: Duration::from_millis(config.max_transaction_retry_ms),
        };

        client.init_schema().await;

        let apoc = client.has_procedure(AcceleratedImport::REQUIRED_PROCEDURE).await;
        client.strategy = select_strategy(apoc);
        tracing::info!(
            uri = %config.uri,
            strategy = client.strategy.name(),
            "Connected to Neo4j"
        );

        Ok(client)
    }

    /// Initialize the graph schema with constraints and indexes
    async fn init_schema(&self) {
        let constraints = [
            "CREATE CONSTRAINT entity_id IF NOT EXISTS FOR (n:Entity) REQUIRE n.id IS UNIQUE",
        ];

        let indexes = [
            "CREATE INDEX entity_type IF NOT EXISTS FOR (n:Entity) ON (n.type)",
            "CREATE INDEX entity_name IF NOT EXISTS FOR (n:Entity) ON (n.name)",
            "CREATE INDEX entity_file_path IF NOT EXISTS FOR (n:Entity) ON (n.file_path)",
        ];

        for constraint in constraints {
            if let Err(e) = self.graph.run(query(constraint)).await {
                tracing::warn!("Constraint may already exist: {}", e);
            }
        }

        for index in indexes {
            if let Err(e) = self.graph.run(query(index)).await {
                tracing::warn!("Index may already exist: {}", e);
            }
        }
    }

    /// Capability check through `SHOW PROCEDURES`
    async fn has_procedure(&self, name: &str) -> bool {
        let q = query("SHOW PROCEDURES YIELD name WHERE name = $name RETURN count(*) AS found")
            .param("name", name);
        match self.execute_with_params(q, "SHOW PROCEDURES").await {
            Ok(rows) => rows
                .first()
                .and_then(|row| row.get::<i64>("found").ok())
                .map(|found| found > 0)
                .unwrap_or(false),
            Err(e) => {
                tracing::debug!("Procedure listing unavailable, assuming no {}: {}", name, e);
                false
            }
        }
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    /// Execute a parameterized Cypher query and collect its rows
    async fn execute_with_params(&self, q: Query, cypher: &str) -> Result<Vec<neo4rs::Row>> {
        let mut result = self
            .graph
            .execute(q)
            .await
            .map_err(|e| GraphError::query(cypher, e))?;
        let mut rows = Vec::new();
        while let Some(row) = result.next().await.map_err(|e| GraphError::query(cypher, e))? {
            rows.push(row);
        }
        Ok(rows)
    }

    async fn run(&self, q: Query, cypher: &str) -> Result<()> {
        self.graph
            .run(q)
            .await
            .map_err(|e| GraphError::query(cypher, e))
    }

    // ========================================================================
    // Import
    // ========================================================================

    /// Run one statement in its own transaction, retrying until the
    /// configured retry time has elapsed.
    async fn run_statement(&self, statement: &Statement) -> Result<()> {
        let started = Instant::now();
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            match self.run_in_transaction(statement).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    let elapsed = started.elapsed();
                    if elapsed >= self.max_retry {
                        return Err(GraphError::Transaction {
                            batch: statement.label.clone(),
                            attempts,
                            message: e.to_string(),
                        });
                    }
                    let backoff = Duration::from_millis(100 * 2u64.pow(attempts.min(6)))
                        .min(self.max_retry - elapsed);
                    tracing::warn!(
                        batch = %statement.label,
                        attempt = attempts,
                        "Transaction failed, retrying in {:?}: {}",
                        backoff,
                        e
                    );
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }

    async fn run_in_transaction(&self, statement: &Statement) -> std::result::Result<(), neo4rs::Error> {
        let rows: Vec<BoltType> = statement
            .rows
            .iter()
            .map(|row| json_to_bolt(&Value::Object(row.clone())))
            .collect();
        let q = query(&statement.cypher).param("rows", rows);

        let mut txn = self.graph.start_txn().await?;
        if let Err(e) = txn.run(q).await {
            if let Err(rollback) = txn.rollback().await {
                tracing::warn!(batch = %statement.label, "Rollback failed: {}", rollback);
            }
            return Err(e);
        }
        txn.commit().await
    }

    /// Merge nodes then relationships, one transaction per chunk
    pub async fn import_data(
        &self,
        nodes: &[GraphNode],
        relationships: &[GraphRelationship],
    ) -> Result<ImportSummary> {
        let mut summary = ImportSummary {
            strategy: self.strategy.name().to_string(),
            ..Default::default()
        };

        for statement in node_statements(nodes, self.batch_size) {
            self.run_statement(&statement).await?;
            summary.nodes_written += statement.rows.len();
            summary.batches += 1;
        }

        for statement in self
            .strategy
            .relationship_statements(relationships, self.batch_size)
        {
            self.run_statement(&statement).await?;
            summary.relationships_written += statement.rows.len();
            summary.batches += 1;
        }

        tracing::debug!(
            nodes = summary.nodes_written,
            relationships = summary.relationships_written,
            batches = summary.batches,
            "Import committed"
        );
        Ok(summary)
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Run a read query. Nodes are read from columns `n`, `m`, `source`,
    /// `target` and `nodes` (list); relationships from `r` and `rels` (list).
    pub async fn query(&self, cypher: &str, params: &Properties) -> Result<QueryResult> {
        let mut q = query(cypher);
        for (key, value) in params {
            q = q.param(key.as_str(), json_to_bolt(value));
        }

        let rows = self.execute_with_params(q, cypher).await?;
        let mut result = QueryResult {
            rows: rows.len(),
            ..Default::default()
        };

        for row in &rows {
            for column in ["n", "m", "source", "target"] {
                if let Ok(node) = row.get::<neo4rs::Node>(column) {
                    result.push_node(node_from_bolt(&node));
                }
            }
            if let Ok(nodes) = row.get::<Vec<neo4rs::Node>>("nodes") {
                for node in &nodes {
                    result.push_node(node_from_bolt(node));
                }
            }
            if let Ok(rel) = row.get::<neo4rs::Relation>("r") {
                if let Some(rel) = relationship_from_bolt(&rel) {
                    result.push_relationship(rel);
                }
            }
            if let Ok(rels) = row.get::<Vec<neo4rs::Relation>>("rels") {
                for rel in &rels {
                    if let Some(rel) = relationship_from_bolt(rel) {
                        result.push_relationship(rel);
                    }
                }
            }
        }

        Ok(result)
    }

    pub async fn get_stats(&self) -> Result<GraphStats> {
        let mut stats = GraphStats::default();

        let cypher = "MATCH (n:Entity) RETURN coalesce(n.type, 'Unknown') AS type, count(n) AS count";
        for row in self.execute_with_params(query(cypher), cypher).await? {
            let node_type: String = row.get("type").unwrap_or_else(|_| "Unknown".to_string());
            let count: i64 = row.get("count").unwrap_or(0);
            stats.total_nodes += count as u64;
            *stats.nodes_by_type.entry(node_type).or_default() += count as u64;
        }

        let cypher = "MATCH (:Entity)-[r]->(:Entity) RETURN type(r) AS type, count(r) AS count";
        for row in self.execute_with_params(query(cypher), cypher).await? {
            let rel_type: String = row.get("type").unwrap_or_default();
            let count: i64 = row.get("count").unwrap_or(0);
            stats.total_relationships += count as u64;
            *stats.relationships_by_type.entry(rel_type).or_default() += count as u64;
        }

        Ok(stats)
    }

    pub async fn fetch_relationships(&self) -> Result<Vec<GraphRelationship>> {
        let cypher = "MATCH (:Entity)-[r]->(:Entity) RETURN r";
        let rows = self.execute_with_params(query(cypher), cypher).await?;
        Ok(rows
            .iter()
            .filter_map(|row| row.get::<neo4rs::Relation>("r").ok())
            .filter_map(|rel| relationship_from_bolt(&rel))
            .collect())
    }

    // ========================================================================
    // Writes outside import
    // ========================================================================

    pub async fn replace_relationships(&self, removed_ids: &[String]) -> Result<u64> {
        let cypher = r#"
            UNWIND $ids AS rid
            MATCH (:Entity)-[r {id: rid}]->(:Entity)
            DELETE r
            RETURN count(r) AS removed
        "#;
        let mut removed = 0u64;
        for chunk in removed_ids.chunks(self.batch_size) {
            let q = query(cypher).param("ids", chunk.to_vec());
            let rows = self.execute_with_params(q, cypher).await?;
            removed += rows
                .first()
                .and_then(|row| row.get::<i64>("removed").ok())
                .unwrap_or(0) as u64;
        }
        Ok(removed)
    }

    pub async fn retire_files(&self, paths: &[String]) -> Result<RetireSummary> {
        let mut summary = RetireSummary::default();
        if paths.is_empty() {
            return Ok(summary);
        }

        let drop_edges = r#"
            MATCH (:Entity)-[r]->(:Entity)
            WHERE r.file_path IN $paths
            DELETE r
            RETURN count(r) AS count
        "#;
        let unresolve = r#"
            MATCH (n:Entity)
            WHERE n.file_path IN $paths
            SET n.resolved = false
            RETURN count(n) AS count
        "#;
        let prune = r#"
            MATCH (n:Entity)
            WHERE n.resolved = false AND NOT (n)--()
            DELETE n
            RETURN count(n) AS count
        "#;

        let count = |rows: Vec<neo4rs::Row>| -> u64 {
            rows.first()
                .and_then(|row| row.get::<i64>("count").ok())
                .unwrap_or(0) as u64
        };

        let paths = paths.to_vec();
        summary.relationships_removed = count(
            self.execute_with_params(query(drop_edges).param("paths", paths.clone()), drop_edges)
                .await?,
        );
        summary.nodes_unresolved = count(
            self.execute_with_params(query(unresolve).param("paths", paths), unresolve)
                .await?,
        );
        summary.nodes_pruned = count(self.execute_with_params(query(prune), prune).await?);

        tracing::debug!(
            removed = summary.relationships_removed,
            unresolved = summary.nodes_unresolved,
            pruned = summary.nodes_pruned,
            "Retired files"
        );
        Ok(summary)
    }

    pub async fn clear(&self) -> Result<()> {
        let cypher = "MATCH (n:Entity) DETACH DELETE n";
        self.run(query(cypher), cypher).await
    }

    pub async fn health_check(&self) -> Result<()> {
        self.graph
            .run(query("RETURN 1"))
            .await
            .map_err(|e| GraphError::Connection(e.to_string()))
    }
}

// ============================================================================
// Conversions
// ============================================================================

/// Convert a JSON parameter into a Bolt value
pub(crate) fn json_to_bolt(value: &Value) -> BoltType {
    match value {
        Value::Null => BoltType::Null(neo4rs::BoltNull),
        Value::Bool(b) => (*b).into(),
        Value::Number(n) => match n.as_i64() {
            Some(i) => i.into(),
            None => n.as_f64().unwrap_or_default().into(),
        },
        Value::String(s) => s.clone().into(),
        Value::Array(items) => items.iter().map(json_to_bolt).collect::<Vec<BoltType>>().into(),
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| (k.clone(), json_to_bolt(v)))
            .collect::<HashMap<String, BoltType>>()
            .into(),
    }
}

/// Split stored properties back into properties and `metadata_` entries
fn split_properties<'a>(
    keys: impl Iterator<Item = &'a str>,
    envelope: &[&str],
    get: impl Fn(&str) -> Option<Value>,
) -> (Properties, Properties) {
    let mut properties = Properties::new();
    let mut metadata = Properties::new();
    for key in keys {
        if envelope.contains(&key) {
            continue;
        }
        let Some(value) = get(key) else { continue };
        match key.strip_prefix("metadata_") {
            Some(meta_key) => {
                metadata.insert(meta_key.to_string(), value);
            }
            None => {
                properties.insert(key.to_string(), value);
            }
        }
    }
    (properties, metadata)
}

fn node_from_bolt(node: &neo4rs::Node) -> GraphNode {
    let id = node.get::<String>("id").unwrap_or_else(|_| {
        tracing::warn!("Node without id property, using internal id {}", node.id());
        format!("neo4j:{}", node.id())
    });
    let node_type = node
        .get::<String>("type")
        .ok()
        .and_then(|t| t.parse::<NodeType>().ok())
        .unwrap_or_else(|| {
            tracing::warn!(id = %id, "Node without a known type, treating as Unknown");
            NodeType::Unknown
        });
    let name = node.get::<String>("name").unwrap_or_else(|_| id.clone());

    let (properties, metadata) = split_properties(node.keys().into_iter(), NODE_ENVELOPE, |key| {
        node.get::<Value>(key).ok()
    });

    GraphNode {
        id,
        node_type,
        name,
        properties,
        metadata,
    }
}

fn relationship_from_bolt(rel: &neo4rs::Relation) -> Option<GraphRelationship> {
    let rel_type = match rel.typ().parse::<RelationshipType>() {
        Ok(t) => t,
        Err(e) => {
            tracing::warn!("Skipping relationship: {}", e);
            return None;
        }
    };
    let source = rel
        .get::<String>("source")
        .unwrap_or_else(|_| format!("neo4j:{}", rel.start_node_id()));
    let target = rel
        .get::<String>("target")
        .unwrap_or_else(|_| format!("neo4j:{}", rel.end_node_id()));
    let id = rel.get::<String>("id").unwrap_or_else(|_| {
        tracing::warn!("Relationship without id property, deriving one");
        relationship_id(rel_type, &source, &target)
    });

    let (properties, metadata) = split_properties(rel.keys().into_iter(), RELATIONSHIP_ENVELOPE, |key| {
        rel.get::<Value>(key).ok()
    });

    Some(GraphRelationship {
        id,
        rel_type,
        source,
        target,
        properties,
        metadata,
    })
}
