//! Logical property-graph model
//!
//! Nodes and relationships are label-free: the node kind is an ordinary
//! `type` property. Storage adapters decide which labels and indexes they need.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Key/value attributes attached to nodes and relationships
pub type Properties = Map<String, Value>;

/// Relationship property holding the extraction confidence (0.0..=1.0)
pub const PROP_CONFIDENCE: &str = "confidence";
/// Relationship property holding the creation time (epoch ms)
pub const PROP_CREATED_AT: &str = "created_at";
/// Relationship property holding a human-readable description
pub const PROP_DESCRIPTION: &str = "description";
/// Property naming the source file an entity or edge was extracted from
pub const PROP_FILE_PATH: &str = "file_path";

/// Confidence assumed for relationships that carry none
pub const DEFAULT_CONFIDENCE: f64 = 0.5;

// ============================================================================
// Node kinds
// ============================================================================

/// Kind of a graph node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NodeType {
    File,
    Function,
    Class,
    Interface,
    TypeAlias,
    Import,
    Export,
    /// External package referenced by an import
    Module,
    /// Endpoint created only because an edge referenced it
    Unknown,
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::File => "File",
            Self::Function => "Function",
            Self::Class => "Class",
            Self::Interface => "Interface",
            Self::TypeAlias => "TypeAlias",
            Self::Import => "Import",
            Self::Export => "Export",
            Self::Module => "Module",
            Self::Unknown => "Unknown",
        }
    }

    /// Short prefix used in generated ids
    pub fn id_prefix(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Function => "fn",
            Self::Class => "class",
            Self::Interface => "iface",
            Self::TypeAlias => "type",
            Self::Import => "import",
            Self::Export => "export",
            Self::Module => "module",
            Self::Unknown => "node",
        }
    }

    pub fn all() -> &'static [Self] {
        &[
            Self::File,
            Self::Function,
            Self::Class,
            Self::Interface,
            Self::TypeAlias,
            Self::Import,
            Self::Export,
            Self::Module,
            Self::Unknown,
        ]
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| format!("unknown node type: {}", s))
    }
}

// ============================================================================
// Relationship kinds
// ============================================================================

/// Kind of a graph relationship
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationshipType {
    Imports,
    Exports,
    Contains,
    Defines,
    Implements,
    Extends,
    HasMethod,
    Calls,
    UsesType,
    DependsOn,
    References,
    RelatedTo,
    Documents,
}

impl RelationshipType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Imports => "IMPORTS",
            Self::Exports => "EXPORTS",
            Self::Contains => "CONTAINS",
            Self::Defines => "DEFINES",
            Self::Implements => "IMPLEMENTS",
            Self::Extends => "EXTENDS",
            Self::HasMethod => "HAS_METHOD",
            Self::Calls => "CALLS",
            Self::UsesType => "USES_TYPE",
            Self::DependsOn => "DEPENDS_ON",
            Self::References => "REFERENCES",
            Self::RelatedTo => "RELATED_TO",
            Self::Documents => "DOCUMENTS",
        }
    }

    /// Position in the dedup priority table. Lower wins.
    pub fn priority(&self) -> u8 {
        match self {
            Self::Imports => 1,
            Self::Exports => 2,
            Self::Contains => 3,
            Self::Defines => 4,
            Self::Implements => 5,
            Self::Extends => 6,
            Self::HasMethod => 7,
            Self::Calls => 8,
            Self::UsesType => 9,
            Self::DependsOn => 10,
            Self::References => 11,
            Self::RelatedTo => 12,
            Self::Documents => 13,
        }
    }

    /// All relationship types in priority order
    pub fn all() -> &'static [Self] {
        &[
            Self::Imports,
            Self::Exports,
            Self::Contains,
            Self::Defines,
            Self::Implements,
            Self::Extends,
            Self::HasMethod,
            Self::Calls,
            Self::UsesType,
            Self::DependsOn,
            Self::References,
            Self::RelatedTo,
            Self::Documents,
        ]
    }
}

impl fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelationshipType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| format!("unknown relationship type: {}", s))
    }
}

// ============================================================================
// Nodes and relationships
// ============================================================================

/// A node of the code knowledge graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub name: String,
    #[serde(default)]
    pub properties: Properties,
    #[serde(default)]
    pub metadata: Properties,
}

impl GraphNode {
    pub fn new(id: impl Into<String>, node_type: NodeType, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            node_type,
            name: name.into(),
            properties: Properties::new(),
            metadata: Properties::new(),
        }
    }

    /// Builder-style property setter
    pub fn with_property(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn property_str(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(Value::as_str)
    }

    pub fn file_path(&self) -> Option<&str> {
        self.property_str(PROP_FILE_PATH)
    }
}

/// A directed, typed edge between two node ids
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphRelationship {
    pub id: String,
    #[serde(rename = "type")]
    pub rel_type: RelationshipType,
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub properties: Properties,
    #[serde(default)]
    pub metadata: Properties,
}

impl GraphRelationship {
    /// Create a relationship whose id is derived from (type, source, target)
    pub fn new(
        rel_type: RelationshipType,
        source: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        let source = source.into();
        let target = target.into();
        Self {
            id: super::ids::relationship_id(rel_type, &source, &target),
            rel_type,
            source,
            target,
            properties: Properties::new(),
            metadata: Properties::new(),
        }
    }

    pub fn with_property(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }

    pub fn with_confidence(self, confidence: f64) -> Self {
        self.with_property(PROP_CONFIDENCE, confidence)
    }

    pub fn with_description(self, description: impl Into<String>) -> Self {
        self.with_property(PROP_DESCRIPTION, description.into())
    }

    pub fn with_created_at(self, epoch_ms: i64) -> Self {
        self.with_property(PROP_CREATED_AT, epoch_ms)
    }

    pub fn confidence(&self) -> f64 {
        self.properties
            .get(PROP_CONFIDENCE)
            .and_then(Value::as_f64)
            .unwrap_or(DEFAULT_CONFIDENCE)
    }

    pub fn created_at(&self) -> i64 {
        self.properties
            .get(PROP_CREATED_AT)
            .and_then(Value::as_i64)
            .unwrap_or(0)
    }

    pub fn description(&self) -> Option<&str> {
        self.properties
            .get(PROP_DESCRIPTION)
            .and_then(Value::as_str)
            .filter(|d| !d.trim().is_empty())
    }

    pub fn file_path(&self) -> Option<&str> {
        self.properties.get(PROP_FILE_PATH).and_then(Value::as_str)
    }
}

/// Node and relationship counts, overall and per type
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphStats {
    pub total_nodes: u64,
    pub total_relationships: u64,
    pub nodes_by_type: std::collections::BTreeMap<String, u64>,
    pub relationships_by_type: std::collections::BTreeMap<String, u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_table_is_strict_total_order() {
        let priorities: Vec<u8> = RelationshipType::all().iter().map(|t| t.priority()).collect();
        assert_eq!(priorities, (1..=13).collect::<Vec<u8>>());
    }

    #[test]
    fn test_relationship_type_round_trips_through_str() {
        for t in RelationshipType::all() {
            assert_eq!(t.as_str().parse::<RelationshipType>().unwrap(), *t);
        }
        assert!("FRIENDS_WITH".parse::<RelationshipType>().is_err());
    }

    #[test]
    fn test_node_type_parse_is_case_insensitive() {
        assert_eq!("typealias".parse::<NodeType>().unwrap(), NodeType::TypeAlias);
        assert_eq!("Function".parse::<NodeType>().unwrap(), NodeType::Function);
    }

    #[test]
    fn test_relationship_serializes_type_in_screaming_case() {
        let rel = GraphRelationship::new(RelationshipType::HasMethod, "a", "b");
        let json = serde_json::to_value(&rel).unwrap();
        assert_eq!(json["type"], "HAS_METHOD");
    }

    #[test]
    fn test_relationship_defaults() {
        let rel = GraphRelationship::new(RelationshipType::Calls, "a", "b");
        assert_eq!(rel.confidence(), DEFAULT_CONFIDENCE);
        assert_eq!(rel.created_at(), 0);
        assert!(rel.description().is_none());

        let rel = rel.with_description("   ");
        assert!(rel.description().is_none());
    }
}
