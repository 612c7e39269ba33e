//! Code knowledge graph model.
//!
//! ## Modules
//!
//! - [`models`]: Nodes, relationships and their closed type sets
//! - [`ids`]: Deterministic content-derived identifiers
//! - [`symbols`]: Declared names, their id scheme and lookup
//! - [`transform`]: Declaration facts to nodes and relationships
//! - [`dedup`]: Four-stage relationship reduction

pub mod dedup;
pub mod ids;
pub mod models;
pub mod symbols;
pub mod transform;

pub use dedup::{deduplicate, DedupReport, DedupStats, QualityBreakdown};
pub use models::{GraphNode, GraphRelationship, GraphStats, NodeType, RelationshipType};
pub use symbols::{FileSymbols, SymbolIndex, SymbolMap};
pub use transform::{GraphBatch, GraphBuilder};
