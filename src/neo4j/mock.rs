//! In-memory mock implementation of GraphStore for testing.
//!
//! Nodes and relationships live in `tokio::sync::RwLock<HashMap<K, V>>`
//! collections and are merged by id exactly like the Neo4j adapter.
//! `query` ignores the Cypher text and interprets the parameters the query
//! templates produce (`mode`, `node_types`, `terms`, `search_fields`,
//! `rel_types`, `from`, `to`, `limit`).
//! Conditionally compiled with `#[cfg(test)]`.

use crate::error::{GraphError, Result};
use crate::graph::models::*;
use crate::neo4j::models::*;
use crate::neo4j::traits::GraphStore;
use crate::query::templates::MAX_PATH_HOPS;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

/// Node as stored, with its resolution flag
#[derive(Debug, Clone)]
pub struct StoredNode {
    pub node: GraphNode,
    pub resolved: bool,
}

/// In-memory mock implementation of GraphStore for testing.
pub struct MockGraphStore {
    pub nodes: RwLock<HashMap<String, StoredNode>>,
    pub relationships: RwLock<HashMap<String, GraphRelationship>>,
    /// Every (cypher, params) pair passed to `query`
    pub queries: RwLock<Vec<(String, Properties)>>,
    /// When set, `query` fails with a `QueryExecution` error
    pub fail_queries: AtomicBool,
}

impl Default for MockGraphStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGraphStore {
    /// Create a new empty MockGraphStore.
    pub fn new() -> Self {
        Self {
            nodes: RwLock::new(HashMap::new()),
            relationships: RwLock::new(HashMap::new()),
            queries: RwLock::new(Vec::new()),
            fail_queries: AtomicBool::new(false),
        }
    }

    pub async fn with_nodes(self, nodes: Vec<GraphNode>) -> Self {
        self.merge_nodes(&nodes).await;
        self
    }

    pub async fn with_relationships(self, relationships: Vec<GraphRelationship>) -> Self {
        self.merge_relationships(&relationships).await;
        self
    }

    pub fn failing(self) -> Self {
        self.fail_queries.store(true, Ordering::SeqCst);
        self
    }

    pub async fn node(&self, id: &str) -> Option<StoredNode> {
        self.nodes.read().await.get(id).cloned()
    }

    async fn merge_nodes(&self, nodes: &[GraphNode]) {
        let mut stored = self.nodes.write().await;
        for node in nodes {
            match stored.get_mut(&node.id) {
                Some(existing) => {
                    existing.node.node_type = node.node_type;
                    existing.node.name = node.name.clone();
                    for (k, v) in &node.properties {
                        existing.node.properties.insert(k.clone(), v.clone());
                    }
                    for (k, v) in &node.metadata {
                        existing.node.metadata.insert(k.clone(), v.clone());
                    }
                    existing.resolved = true;
                }
                None => {
                    stored.insert(
                        node.id.clone(),
                        StoredNode {
                            node: node.clone(),
                            resolved: true,
                        },
                    );
                }
            }
        }
    }

    async fn merge_relationships(&self, relationships: &[GraphRelationship]) {
        {
            let mut stored = self.nodes.write().await;
            for rel in relationships {
                for endpoint in [&rel.source, &rel.target] {
                    stored.entry(endpoint.clone()).or_insert_with(|| StoredNode {
                        node: GraphNode::new(endpoint.clone(), NodeType::Unknown, endpoint.clone()),
                        resolved: false,
                    });
                }
            }
        }

        let mut stored = self.relationships.write().await;
        for rel in relationships {
            match stored.get_mut(&rel.id) {
                Some(existing) => {
                    for (k, v) in &rel.properties {
                        existing.properties.insert(k.clone(), v.clone());
                    }
                    for (k, v) in &rel.metadata {
                        existing.metadata.insert(k.clone(), v.clone());
                    }
                }
                None => {
                    stored.insert(rel.id.clone(), rel.clone());
                }
            }
        }
    }
}

// ============================================================================
// Parameter interpretation
// ============================================================================

fn string_list(params: &Properties, key: &str) -> Vec<String> {
    params
        .get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

struct NodeFilter {
    node_types: Vec<String>,
    terms: Vec<String>,
    fields: Vec<String>,
}

impl NodeFilter {
    fn from_params(params: &Properties) -> Self {
        let mut fields = string_list(params, "search_fields");
        if fields.is_empty() {
            fields.push("name".to_string());
        }
        Self {
            node_types: string_list(params, "node_types"),
            terms: string_list(params, "terms"),
            fields,
        }
    }

    fn matches(&self, node: &GraphNode) -> bool {
        if !self.node_types.is_empty()
            && !self.node_types.iter().any(|t| t == node.node_type.as_str())
        {
            return false;
        }
        if self.terms.is_empty() {
            return true;
        }
        self.terms.iter().any(|term| {
            self.fields.iter().any(|field| {
                field_text(node, field)
                    .map(|text| text.to_lowercase().contains(term.as_str()))
                    .unwrap_or(false)
            })
        })
    }
}

fn field_text(node: &GraphNode, field: &str) -> Option<String> {
    match field {
        "name" => Some(node.name.clone()),
        "id" => Some(node.id.clone()),
        "type" => Some(node.node_type.as_str().to_string()),
        other => node.properties.get(other).map(|v| match v {
            Value::String(s) => s.clone(),
            v => v.to_string(),
        }),
    }
}

fn rel_type_allowed(rel_types: &[String], rel: &GraphRelationship) -> bool {
    rel_types.is_empty() || rel_types.iter().any(|t| t == rel.rel_type.as_str())
}

fn shortest_path<'a>(
    from: &str,
    to: &str,
    relationships: &'a HashMap<String, GraphRelationship>,
) -> Option<Vec<&'a GraphRelationship>> {
    let mut adjacency: HashMap<&str, Vec<&GraphRelationship>> = HashMap::new();
    for rel in relationships.values() {
        adjacency.entry(rel.source.as_str()).or_default().push(rel);
        adjacency.entry(rel.target.as_str()).or_default().push(rel);
    }
    for edges in adjacency.values_mut() {
        edges.sort_by(|a, b| a.id.cmp(&b.id));
    }

    let mut visited: HashSet<&str> = HashSet::from([from]);
    let mut queue: VecDeque<(&str, Vec<&GraphRelationship>)> = VecDeque::from([(from, vec![])]);
    while let Some((current, path)) = queue.pop_front() {
        if current == to {
            return Some(path);
        }
        if path.len() >= MAX_PATH_HOPS {
            continue;
        }
        for rel in adjacency.get(current).into_iter().flatten() {
            let next = if rel.source == current {
                rel.target.as_str()
            } else {
                rel.source.as_str()
            };
            if visited.insert(next) {
                let mut extended = path.clone();
                extended.push(*rel);
                queue.push_back((next, extended));
            }
        }
    }
    None
}

#[async_trait]
impl GraphStore for MockGraphStore {
    async fn health_check(&self) -> Result<()> {
        Ok(())
    }

    async fn import_data(
        &self,
        nodes: &[GraphNode],
        relationships: &[GraphRelationship],
    ) -> Result<ImportSummary> {
        self.merge_nodes(nodes).await;
        self.merge_relationships(relationships).await;
        Ok(ImportSummary {
            nodes_written: nodes.len(),
            relationships_written: relationships.len(),
            batches: usize::from(!nodes.is_empty()) + usize::from(!relationships.is_empty()),
            strategy: "mock".to_string(),
        })
    }

    async fn query(&self, cypher: &str, params: &Properties) -> Result<QueryResult> {
        self.queries
            .write()
            .await
            .push((cypher.to_string(), params.clone()));
        if self.fail_queries.load(Ordering::SeqCst) {
            return Err(GraphError::query(cypher, "mock failure"));
        }

        let nodes = self.nodes.read().await;
        let relationships = self.relationships.read().await;
        let limit = params
            .get("limit")
            .and_then(Value::as_u64)
            .unwrap_or(u64::MAX) as usize;
        let mode = params.get("mode").and_then(Value::as_str).unwrap_or("nodes");
        let filter = NodeFilter::from_params(params);
        let rel_types = string_list(params, "rel_types");

        let mut result = QueryResult::default();
        match mode {
            "outgoing" | "incoming" | "neighbors" => {
                let mut rels: Vec<&GraphRelationship> = relationships
                    .values()
                    .filter(|rel| rel_type_allowed(&rel_types, rel))
                    .filter(|rel| {
                        let source_matches = nodes
                            .get(&rel.source)
                            .map(|n| filter.matches(&n.node))
                            .unwrap_or(false);
                        let target_matches = nodes
                            .get(&rel.target)
                            .map(|n| filter.matches(&n.node))
                            .unwrap_or(false);
                        match mode {
                            "outgoing" => source_matches,
                            "incoming" => target_matches,
                            _ => source_matches || target_matches,
                        }
                    })
                    .collect();
                rels.sort_by(|a, b| a.id.cmp(&b.id));
                for rel in rels.into_iter().take(limit) {
                    for endpoint in [&rel.source, &rel.target] {
                        if let Some(stored) = nodes.get(endpoint) {
                            result.push_node(stored.node.clone());
                        }
                    }
                    result.push_relationship(rel.clone());
                    result.rows += 1;
                }
            }
            "path" => {
                let from = params.get("from").and_then(Value::as_str).unwrap_or_default();
                let to = params.get("to").and_then(Value::as_str).unwrap_or_default();
                let mut starts: Vec<&StoredNode> = nodes
                    .values()
                    .filter(|n| n.node.name.to_lowercase().contains(from))
                    .collect();
                starts.sort_by(|a, b| a.node.id.cmp(&b.node.id));
                let mut ends: Vec<&StoredNode> = nodes
                    .values()
                    .filter(|n| n.node.name.to_lowercase().contains(to))
                    .collect();
                ends.sort_by(|a, b| a.node.id.cmp(&b.node.id));

                'search: for start in &starts {
                    for end in &ends {
                        if start.node.id == end.node.id {
                            continue;
                        }
                        if let Some(path) = shortest_path(&start.node.id, &end.node.id, &relationships)
                        {
                            for rel in path {
                                for endpoint in [&rel.source, &rel.target] {
                                    if let Some(stored) = nodes.get(endpoint) {
                                        result.push_node(stored.node.clone());
                                    }
                                }
                                result.push_relationship(rel.clone());
                            }
                            result.rows = 1;
                            break 'search;
                        }
                    }
                }
            }
            _ => {
                let mut matched: Vec<&StoredNode> =
                    nodes.values().filter(|n| filter.matches(&n.node)).collect();
                matched.sort_by(|a, b| a.node.name.cmp(&b.node.name).then(a.node.id.cmp(&b.node.id)));
                for stored in matched.into_iter().take(limit) {
                    result.push_node(stored.node.clone());
                    result.rows += 1;
                }
            }
        }
        Ok(result)
    }

    async fn get_stats(&self) -> Result<GraphStats> {
        let nodes = self.nodes.read().await;
        let relationships = self.relationships.read().await;
        let mut stats = GraphStats {
            total_nodes: nodes.len() as u64,
            total_relationships: relationships.len() as u64,
            ..Default::default()
        };
        for stored in nodes.values() {
            *stats
                .nodes_by_type
                .entry(stored.node.node_type.as_str().to_string())
                .or_default() += 1;
        }
        for rel in relationships.values() {
            *stats
                .relationships_by_type
                .entry(rel.rel_type.as_str().to_string())
                .or_default() += 1;
        }
        Ok(stats)
    }

    async fn fetch_relationships(&self) -> Result<Vec<GraphRelationship>> {
        let mut rels: Vec<GraphRelationship> =
            self.relationships.read().await.values().cloned().collect();
        rels.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(rels)
    }

    async fn replace_relationships(&self, removed_ids: &[String]) -> Result<u64> {
        let mut stored = self.relationships.write().await;
        Ok(removed_ids
            .iter()
            .filter(|id| stored.remove(id.as_str()).is_some())
            .count() as u64)
    }

    async fn retire_files(&self, paths: &[String]) -> Result<RetireSummary> {
        let mut summary = RetireSummary::default();
        let mut rels = self.relationships.write().await;
        let before = rels.len();
        rels.retain(|_, rel| {
            rel.file_path()
                .map(|p| !paths.iter().any(|retired| retired == p))
                .unwrap_or(true)
        });
        summary.relationships_removed = (before - rels.len()) as u64;

        let mut nodes = self.nodes.write().await;
        for stored in nodes.values_mut() {
            if let Some(path) = stored.node.file_path() {
                if paths.iter().any(|retired| retired == path) {
                    stored.resolved = false;
                    summary.nodes_unresolved += 1;
                }
            }
        }

        let connected: HashSet<&str> = rels
            .values()
            .flat_map(|rel| [rel.source.as_str(), rel.target.as_str()])
            .collect();
        let before = nodes.len();
        nodes.retain(|id, stored| stored.resolved || connected.contains(id.as_str()));
        summary.nodes_pruned = (before - nodes.len()) as u64;

        Ok(summary)
    }

    async fn clear(&self) -> Result<()> {
        self.nodes.write().await.clear();
        self.relationships.write().await.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(value: Value) -> Properties {
        value.as_object().cloned().unwrap()
    }

    fn function(id: &str, name: &str, file: &str) -> GraphNode {
        GraphNode::new(id, NodeType::Function, name).with_property(PROP_FILE_PATH, file)
    }

    fn edge(rel_type: RelationshipType, source: &str, target: &str, file: &str) -> GraphRelationship {
        GraphRelationship::new(rel_type, source, target).with_property(PROP_FILE_PATH, file)
    }

    #[tokio::test]
    async fn test_import_is_idempotent() {
        let store = MockGraphStore::new();
        let nodes = vec![function("fn:a", "a", "a.ts"), function("fn:b", "b", "b.ts")];
        let rels = vec![edge(RelationshipType::Calls, "fn:a", "fn:b", "a.ts")];

        store.import_data(&nodes, &rels).await.unwrap();
        let first = store.get_stats().await.unwrap();
        store.import_data(&nodes, &rels).await.unwrap();
        let second = store.get_stats().await.unwrap();

        assert_eq!(first, second);
        assert_eq!(second.total_nodes, 2);
        assert_eq!(second.total_relationships, 1);
    }

    #[tokio::test]
    async fn test_missing_endpoints_become_unresolved_stubs() {
        let store = MockGraphStore::new();
        let rels = vec![edge(RelationshipType::Calls, "fn:a", "fn:ghost", "a.ts")];
        store
            .import_data(&[function("fn:a", "a", "a.ts")], &rels)
            .await
            .unwrap();

        let stub = store.node("fn:ghost").await.unwrap();
        assert_eq!(stub.node.node_type, NodeType::Unknown);
        assert!(!stub.resolved);
        assert!(store.node("fn:a").await.unwrap().resolved);

        // A later extraction resolves the stub in place
        store
            .import_data(&[function("fn:ghost", "ghost", "g.ts")], &[])
            .await
            .unwrap();
        let resolved = store.node("fn:ghost").await.unwrap();
        assert!(resolved.resolved);
        assert_eq!(resolved.node.node_type, NodeType::Function);
    }

    #[tokio::test]
    async fn test_node_mode_filters_by_type_and_term() {
        let store = MockGraphStore::new()
            .with_nodes(vec![
                function("fn:1", "createLogger", "log.ts"),
                function("fn:2", "createServer", "srv.ts"),
                GraphNode::new("class:1", NodeType::Class, "Logger"),
            ])
            .await;

        let result = store
            .query(
                "",
                &params(json!({
                    "mode": "nodes",
                    "node_types": ["Function"],
                    "terms": ["logger"],
                    "search_fields": ["name"],
                    "limit": 10
                })),
            )
            .await
            .unwrap();
        assert_eq!(result.nodes.len(), 1);
        assert_eq!(result.nodes[0].name, "createLogger");
    }

    #[tokio::test]
    async fn test_path_mode_finds_shortest_path() {
        let store = MockGraphStore::new()
            .with_nodes(vec![
                function("fn:a", "alpha", "a.ts"),
                function("fn:b", "beta", "b.ts"),
                function("fn:c", "gamma", "c.ts"),
            ])
            .await
            .with_relationships(vec![
                edge(RelationshipType::Calls, "fn:a", "fn:b", "a.ts"),
                edge(RelationshipType::Calls, "fn:b", "fn:c", "b.ts"),
            ])
            .await;

        let result = store
            .query(
                "",
                &params(json!({"mode": "path", "from": "alpha", "to": "gamma", "limit": 5})),
            )
            .await
            .unwrap();
        assert_eq!(result.relationships.len(), 2);
        assert_eq!(result.nodes.len(), 3);
    }

    #[tokio::test]
    async fn test_retire_files_prunes_orphaned_nodes() {
        let store = MockGraphStore::new()
            .with_nodes(vec![
                function("fn:a", "a", "a.ts"),
                function("fn:b", "b", "b.ts"),
            ])
            .await
            .with_relationships(vec![edge(RelationshipType::Calls, "fn:b", "fn:a", "b.ts")])
            .await;

        let summary = store.retire_files(&["a.ts".to_string()]).await.unwrap();
        assert_eq!(summary.relationships_removed, 0);
        assert_eq!(summary.nodes_unresolved, 1);
        // fn:a is still referenced by b.ts's edge
        assert_eq!(summary.nodes_pruned, 0);

        let summary = store.retire_files(&["b.ts".to_string()]).await.unwrap();
        assert_eq!(summary.relationships_removed, 1);
        assert_eq!(summary.nodes_pruned, 2);
        assert_eq!(store.get_stats().await.unwrap().total_nodes, 0);
    }
}
