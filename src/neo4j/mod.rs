//! Neo4j storage for the code knowledge graph

pub mod client;
pub mod flatten;
mod impl_graph_store;
pub mod models;
pub mod strategy;
pub mod traits;

pub use client::Neo4jClient;
pub use models::*;
pub use strategy::{select_strategy, AcceleratedImport, GroupedImport, ImportStrategy};
pub use traits::GraphStore;

#[cfg(test)]
pub(crate) mod mock;
