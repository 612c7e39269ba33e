//! Parameterized Cypher templates, one per intent
//!
//! Every template reads its inputs from parameters. The same parameters are
//! understood by the in-memory store used in tests:
//!
//! | param | meaning |
//! |---|---|
//! | `mode` | `nodes`, `outgoing`, `incoming`, `neighbors` or `path` |
//! | `node_types` | allowed node types, empty for any |
//! | `terms` | lowercase substrings, any of which may match |
//! | `search_fields` | node properties the terms are matched against |
//! | `rel_types` | allowed relationship types, empty for any |
//! | `from`, `to` | path endpoints (lowercase name substrings) |
//! | `limit` | maximum rows |

use super::intent::QueryIntent;
use super::models::QueryContext;
use crate::graph::models::{NodeType, Properties, RelationshipType};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Maximum hops considered by path queries
pub const MAX_PATH_HOPS: usize = 6;

/// Result shape of a template
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryShape {
    /// Matching nodes only
    Nodes,
    /// Matching nodes and what they point to
    Outgoing,
    /// Matching nodes and what points to them
    Incoming,
    /// Matching nodes and any adjacent node
    Neighbors,
    /// Shortest path between two matches
    Path,
}

impl QueryShape {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Nodes => "nodes",
            Self::Outgoing => "outgoing",
            Self::Incoming => "incoming",
            Self::Neighbors => "neighbors",
            Self::Path => "path",
        }
    }
}

/// A rendered query: Cypher text plus its parameters
#[derive(Debug, Clone, PartialEq)]
pub struct GraphQuery {
    pub cypher: String,
    pub params: Properties,
    pub shape: QueryShape,
}

const NODE_FILTER: &str = "(size($node_types) = 0 OR n.type IN $node_types)
  AND (size($terms) = 0 OR any(term IN $terms WHERE any(field IN $search_fields
       WHERE toLower(toString(coalesce(n[field], ''))) CONTAINS term)))";

const REL_FILTER: &str = "(size($rel_types) = 0 OR type(r) IN $rel_types)";

fn cypher_for(shape: QueryShape) -> String {
    match shape {
        QueryShape::Nodes => format!(
            "MATCH (n:Entity)\nWHERE {}\nRETURN n\nORDER BY n.name\nLIMIT $limit",
            NODE_FILTER
        ),
        QueryShape::Outgoing => format!(
            "MATCH (n:Entity)-[r]->(m:Entity)\nWHERE {}\n  AND {}\nRETURN n, r, m\nORDER BY n.name, m.name\nLIMIT $limit",
            NODE_FILTER, REL_FILTER
        ),
        QueryShape::Incoming => format!(
            "MATCH (m:Entity)-[r]->(n:Entity)\nWHERE {}\n  AND {}\nRETURN n, r, m\nORDER BY n.name, m.name\nLIMIT $limit",
            NODE_FILTER, REL_FILTER
        ),
        QueryShape::Neighbors => format!(
            "MATCH (n:Entity)-[r]-(m:Entity)\nWHERE {}\n  AND {}\nRETURN n, r, m\nORDER BY n.name, m.name\nLIMIT $limit",
            NODE_FILTER, REL_FILTER
        ),
        QueryShape::Path => format!(
            "MATCH (a:Entity), (b:Entity)\nWHERE toLower(a.name) CONTAINS $from AND toLower(b.name) CONTAINS $to AND a.id <> b.id\nMATCH p = shortestPath((a)-[*..{}]-(b))\nRETURN nodes(p) AS nodes, relationships(p) AS rels\nORDER BY length(p)\nLIMIT $limit",
            MAX_PATH_HOPS
        ),
    }
}

fn names<T: AsRef<str>>(items: &[T]) -> Value {
    Value::Array(items.iter().map(|i| Value::String(i.as_ref().to_string())).collect())
}

fn node_types(types: &[NodeType]) -> Vec<&'static str> {
    types.iter().map(NodeType::as_str).collect()
}

fn rel_types(types: &[RelationshipType]) -> Vec<&'static str> {
    types.iter().map(RelationshipType::as_str).collect()
}

/// Relationships followed by dependency and usage queries
const DEPENDENCY_EDGES: &[RelationshipType] = &[
    RelationshipType::Imports,
    RelationshipType::DependsOn,
    RelationshipType::Calls,
    RelationshipType::Extends,
    RelationshipType::Implements,
    RelationshipType::UsesType,
];

const USAGE_EDGES: &[RelationshipType] = &[
    RelationshipType::Calls,
    RelationshipType::DependsOn,
    RelationshipType::Extends,
    RelationshipType::Implements,
    RelationshipType::UsesType,
    RelationshipType::References,
];

/// Render the query for a classified context
pub fn build_query(ctx: &QueryContext) -> GraphQuery {
    let terms: Vec<String> = ctx.entities.iter().map(|e| e.to_lowercase()).collect();
    let name_only = ["name"];
    let broad = ["name", "description", "file_path"];

    let (shape, types, edges, fields): (QueryShape, Vec<&str>, Vec<&str>, &[&str]) = match ctx.intent {
        QueryIntent::FindFunction => (
            QueryShape::Nodes,
            node_types(&[NodeType::Function]),
            vec![],
            &name_only[..],
        ),
        QueryIntent::FindClass => (
            QueryShape::Nodes,
            node_types(&[NodeType::Class]),
            vec![],
            &name_only[..],
        ),
        QueryIntent::FindInterface => (
            QueryShape::Nodes,
            node_types(&[NodeType::Interface, NodeType::TypeAlias]),
            vec![],
            &name_only[..],
        ),
        QueryIntent::FindDependencies => (
            QueryShape::Outgoing,
            if terms.is_empty() {
                node_types(&[NodeType::File])
            } else {
                vec![]
            },
            rel_types(DEPENDENCY_EDGES),
            &name_only[..],
        ),
        QueryIntent::FindUsage => (
            QueryShape::Incoming,
            vec![],
            rel_types(USAGE_EDGES),
            &name_only[..],
        ),
        QueryIntent::FindRelated => (QueryShape::Neighbors, vec![], vec![], &name_only[..]),
        QueryIntent::AnalyzePath if terms.len() >= 2 => {
            (QueryShape::Path, vec![], vec![], &name_only[..])
        }
        QueryIntent::AnalyzePath => (QueryShape::Neighbors, vec![], vec![], &name_only[..]),
        QueryIntent::ExplainConcept | QueryIntent::FindGeneral | QueryIntent::Unknown => {
            (QueryShape::Nodes, vec![], vec![], &broad[..])
        }
    };

    let mut params = Properties::new();
    params.insert("mode".into(), json!(shape.as_str()));
    params.insert("limit".into(), json!(ctx.result_limit));

    if shape == QueryShape::Path {
        params.insert("from".into(), json!(terms[0]));
        params.insert("to".into(), json!(terms[1]));
    } else {
        params.insert("node_types".into(), names(&types));
        params.insert("terms".into(), names(&terms));
        params.insert("search_fields".into(), names(fields));
        if shape != QueryShape::Nodes {
            params.insert("rel_types".into(), names(&edges));
        }
    }

    GraphQuery {
        cypher: cypher_for(shape),
        params,
        shape,
    }
}
