//! Intent-driven queries over the knowledge graph

pub mod engine;
pub mod entities;
pub mod intent;
pub mod models;
pub mod templates;

pub use engine::QueryEngine;
pub use intent::QueryIntent;
pub use models::{QueryConfig, QueryContext, QueryResponse};
pub use templates::{build_query, GraphQuery, QueryShape};
