//! Deterministic identifiers for nodes and relationships
//!
//! Ids are pure functions of their inputs: re-extracting unchanged source
//! yields the same ids, which makes merge-on-import idempotent and lets
//! independent workers agree on ids without coordination.

use super::models::{NodeType, RelationshipType};
use sha2::{Digest, Sha256};

/// Hex characters kept from the digest (128 bits)
const ID_HEX_LEN: usize = 32;

/// Feed a field into the hasher with a length prefix so that
/// ("ab", "c") and ("a", "bc") never collide.
fn update_field(hasher: &mut Sha256, field: &str) {
    hasher.update((field.len() as u64).to_be_bytes());
    hasher.update(field.as_bytes());
}

fn finish(prefix: &str, hasher: Sha256) -> String {
    let digest = hex::encode(hasher.finalize());
    format!("{}:{}", prefix, &digest[..ID_HEX_LEN])
}

/// Id of a node from its kind, namespace (package), name and optional
/// disambiguator (file path, owning class, ...).
pub fn node_id(
    kind: NodeType,
    namespace: &str,
    name: &str,
    disambiguator: Option<&str>,
) -> String {
    let mut hasher = Sha256::new();
    update_field(&mut hasher, kind.as_str());
    update_field(&mut hasher, namespace);
    update_field(&mut hasher, name);
    update_field(&mut hasher, disambiguator.unwrap_or(""));
    finish(kind.id_prefix(), hasher)
}

/// Id of a relationship from (type, source id, target id)
pub fn relationship_id(rel_type: RelationshipType, source: &str, target: &str) -> String {
    let mut hasher = Sha256::new();
    update_field(&mut hasher, rel_type.as_str());
    update_field(&mut hasher, source);
    update_field(&mut hasher, target);
    finish("rel", hasher)
}

/// Id of a source file node. Files are keyed by project-relative path only.
pub fn file_id(relative_path: &str) -> String {
    node_id(NodeType::File, "", relative_path, None)
}

/// Id of an external package node
pub fn module_id(package: &str) -> String {
    node_id(NodeType::Module, "", package, None)
}
