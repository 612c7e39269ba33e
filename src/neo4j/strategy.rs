//! Import statement planning
//!
//! Nodes are always merged with one statement per (type, chunk). How
//! relationships are merged depends on the [`ImportStrategy`] picked at
//! connect time from the server's capabilities.

use super::flatten::flatten_record;
use crate::graph::models::{GraphNode, GraphRelationship, NodeType, Properties, RelationshipType};
use serde_json::Value;
use std::collections::BTreeMap;

/// One parameterized statement run with `$rows` in its own transaction
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    /// Human-readable batch name used in logs and errors
    pub label: String,
    pub cypher: String,
    pub rows: Vec<Properties>,
}

/// Merge-by-id for nodes. Extraction always produces resolved nodes.
const NODE_MERGE: &str = r#"
UNWIND $rows AS row
MERGE (n:Entity {id: row.id})
ON CREATE SET n.created_at = timestamp()
SET n += row.props, n.updated_at = timestamp(), n.resolved = true
"#;

/// Endpoint merge shared by both strategies; absent endpoints become stubs
const ENDPOINT_MERGE: &str = r#"
UNWIND $rows AS row
MERGE (s:Entity {id: row.source})
ON CREATE SET s.type = 'Unknown', s.name = row.source, s.resolved = false, s.created_at = timestamp()
MERGE (t:Entity {id: row.target})
ON CREATE SET t.type = 'Unknown', t.name = row.target, t.resolved = false, t.created_at = timestamp()
"#;

/// Row for a node: `{id, props}`
pub fn node_record(node: &GraphNode) -> Properties {
    let mut props = flatten_record(&node.properties, &node.metadata);
    props.insert("id".into(), Value::String(node.id.clone()));
    props.insert("type".into(), Value::String(node.node_type.as_str().to_string()));
    props.insert("name".into(), Value::String(node.name.clone()));

    let mut row = Properties::new();
    row.insert("id".into(), Value::String(node.id.clone()));
    row.insert("props".into(), Value::Object(props));
    row
}

/// Row for a relationship: `{id, type, source, target, props}`.
/// Endpoint ids are also stored on the edge so it can be rebuilt from the
/// edge alone.
pub fn relationship_record(rel: &GraphRelationship) -> Properties {
    let mut props = flatten_record(&rel.properties, &rel.metadata);
    props.insert("id".into(), Value::String(rel.id.clone()));
    props.insert("source".into(), Value::String(rel.source.clone()));
    props.insert("target".into(), Value::String(rel.target.clone()));

    let mut row = Properties::new();
    row.insert("id".into(), Value::String(rel.id.clone()));
    row.insert("type".into(), Value::String(rel.rel_type.as_str().to_string()));
    row.insert("source".into(), Value::String(rel.source.clone()));
    row.insert("target".into(), Value::String(rel.target.clone()));
    row.insert("props".into(), Value::Object(props));
    row
}

/// Node statements, grouped by node type and chunked
pub fn node_statements(nodes: &[GraphNode], batch_size: usize) -> Vec<Statement> {
    let mut by_type: BTreeMap<NodeType, Vec<&GraphNode>> = BTreeMap::new();
    for node in nodes {
        by_type.entry(node.node_type).or_default().push(node);
    }

    let mut statements = Vec::new();
    for (node_type, group) in by_type {
        for (i, chunk) in group.chunks(batch_size.max(1)).enumerate() {
            statements.push(Statement {
                label: format!("{} nodes #{}", node_type, i + 1),
                cypher: NODE_MERGE.to_string(),
                rows: chunk.iter().map(|n| node_record(n)).collect(),
            });
        }
    }
    statements
}

/// How relationships are merged
pub trait ImportStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn relationship_statements(
        &self,
        relationships: &[GraphRelationship],
        batch_size: usize,
    ) -> Vec<Statement>;
}

/// One statement per relationship type. The type name is spliced from the
/// closed [`RelationshipType`] enum, never from input text.
pub struct GroupedImport;

impl GroupedImport {
    fn cypher(rel_type: RelationshipType) -> String {
        format!(
            "{}MERGE (s)-[r:{} {{id: row.id}}]->(t)\nSET r += row.props, r.updated_at = timestamp()\n",
            ENDPOINT_MERGE,
            rel_type.as_str()
        )
    }
}

impl ImportStrategy for GroupedImport {
    fn name(&self) -> &'static str {
        "grouped"
    }

    fn relationship_statements(
        &self,
        relationships: &[GraphRelationship],
        batch_size: usize,
    ) -> Vec<Statement> {
        let mut by_type: BTreeMap<RelationshipType, Vec<&GraphRelationship>> = BTreeMap::new();
        for rel in relationships {
            by_type.entry(rel.rel_type).or_default().push(rel);
        }

        let mut statements = Vec::new();
        for (rel_type, group) in by_type {
            let cypher = Self::cypher(rel_type);
            for (i, chunk) in group.chunks(batch_size.max(1)).enumerate() {
                statements.push(Statement {
                    label: format!("{} relationships #{}", rel_type, i + 1),
                    cypher: cypher.clone(),
                    rows: chunk.iter().map(|r| relationship_record(r)).collect(),
                });
            }
        }
        statements
    }
}

/// One statement per chunk regardless of type, through `apoc.merge.relationship`
pub struct AcceleratedImport;

impl AcceleratedImport {
    /// Procedure whose presence enables this strategy
    pub const REQUIRED_PROCEDURE: &'static str = "apoc.merge.relationship";
}

impl ImportStrategy for AcceleratedImport {
    fn name(&self) -> &'static str {
        "accelerated"
    }

    fn relationship_statements(
        &self,
        relationships: &[GraphRelationship],
        batch_size: usize,
    ) -> Vec<Statement> {
        let cypher = format!(
            "{}CALL apoc.merge.relationship(s, row.type, {{id: row.id}}, row.props, t, row.props) YIELD rel\nSET rel.updated_at = timestamp()\n",
            ENDPOINT_MERGE
        );
        relationships
            .chunks(batch_size.max(1))
            .enumerate()
            .map(|(i, chunk)| Statement {
                label: format!("relationships #{}", i + 1),
                cypher: cypher.clone(),
                rows: chunk.iter().map(relationship_record).collect(),
            })
            .collect()
    }
}

/// Pick the strategy for a server given whether APOC's merge procedure exists
pub fn select_strategy(apoc_available: bool) -> Box<dyn ImportStrategy> {
    if apoc_available {
        Box::new(AcceleratedImport)
    } else {
        Box::new(GroupedImport)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rels() -> Vec<GraphRelationship> {
        vec![
            GraphRelationship::new(RelationshipType::Calls, "a", "b"),
            GraphRelationship::new(RelationshipType::Calls, "b", "c"),
            GraphRelationship::new(RelationshipType::Imports, "a", "c"),
        ]
    }

    #[test]
    fn test_node_statements_group_by_type_and_chunk() {
        let mut nodes: Vec<GraphNode> = (0..1200)
            .map(|i| GraphNode::new(format!("fn:{}", i), NodeType::Function, format!("f{}", i)))
            .collect();
        nodes.push(GraphNode::new("file:1", NodeType::File, "a.ts"));

        let statements = node_statements(&nodes, 500);
        assert_eq!(statements.len(), 4);
        assert_eq!(statements[0].rows.len(), 1);
        assert_eq!(statements[1].rows.len(), 500);
        assert_eq!(statements[3].rows.len(), 200);
        assert!(statements.iter().all(|s| s.cypher.contains("resolved = true")));
    }

    #[test]
    fn test_grouped_emits_one_statement_per_type() {
        let statements = GroupedImport.relationship_statements(&rels(), 500);
        assert_eq!(statements.len(), 2);
        assert!(statements[0].cypher.contains("[r:IMPORTS {id: row.id}]"));
        assert!(statements[1].cypher.contains("[r:CALLS {id: row.id}]"));
        assert_eq!(statements[1].rows.len(), 2);
        assert!(statements.iter().all(|s| s.cypher.contains("'Unknown'")));
    }

    #[test]
    fn test_accelerated_mixes_types_in_one_statement() {
        let statements = AcceleratedImport.relationship_statements(&rels(), 500);
        assert_eq!(statements.len(), 1);
        assert_eq!(statements[0].rows.len(), 3);
        assert!(statements[0].cypher.contains("apoc.merge.relationship"));
    }

    #[test]
    fn test_select_strategy() {
        assert_eq!(select_strategy(true).name(), "accelerated");
        assert_eq!(select_strategy(false).name(), "grouped");
    }

    #[test]
    fn test_records_flatten_metadata() {
        let node = GraphNode::new("fn:1", NodeType::Function, "run")
            .with_property("line_start", 3)
            .with_metadata("params", json!([{"name": "x"}]));
        let row = node_record(&node);
        let props = row["props"].as_object().unwrap();
        assert_eq!(props["type"], "Function");
        assert_eq!(props["line_start"], 3);
        assert_eq!(props["metadata_params"], json!("[{\"name\":\"x\"}]"));

        let rel = GraphRelationship::new(RelationshipType::Calls, "a", "b").with_confidence(0.8);
        let row = relationship_record(&rel);
        assert_eq!(row["type"], "CALLS");
        assert_eq!(row["props"]["source"], "a");
        assert_eq!(row["props"]["confidence"], 0.8);
    }
}
