//! Extraction -> graph -> deduplication pipeline over a real project tree
//!
//! These tests don't require external services.
//! Run with: cargo test --test pipeline_tests

use codegraph::graph::dedup::deduplicate;
use codegraph::graph::ids::{file_id, module_id, node_id};
use codegraph::graph::models::{GraphRelationship, NodeType, RelationshipType};
use codegraph::graph::transform::GraphBuilder;
use codegraph::parser::walker::{discover_files, extract_files, ExtractionConfig};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// Small two-file project with a resolved internal import and an external one
fn sample_project() -> TempDir {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "package.json", r#"{"name": "shop"}"#);
    write(
        dir.path(),
        "src/logger.ts",
        r#"
export interface Logger { info(msg: string): void }
export function createLogger(name: string): Logger {
    return { info: (msg) => console.log(name, msg) };
}
"#,
    );
    write(
        dir.path(),
        "src/app.ts",
        r#"
import { createLogger } from "./logger";
import express from "express";

export class App {
    start() {
        const log = createLogger("app");
        this.listen();
    }
    listen() {}
}
"#,
    );
    write(dir.path(), "node_modules/express/index.js", "module.exports = {};");
    dir
}

#[test]
fn test_project_to_graph() {
    let dir = sample_project();
    let config = ExtractionConfig::default();

    let paths = discover_files(dir.path(), &config);
    assert_eq!(paths.len(), 2, "node_modules is pruned");

    let outcome = extract_files(dir.path(), &paths, &config);
    assert!(outcome.failures.is_empty());
    assert!(outcome.files.iter().all(|f| f.package == "shop"));

    let app = outcome.files.iter().find(|f| f.path == "src/app.ts").unwrap();
    assert_eq!(
        app.resolved_imports,
        vec![("./logger".to_string(), "src/logger.ts".to_string())]
    );

    let batch = GraphBuilder::with_timestamp(1_000).build(&outcome.files);
    let edge = |rel_type: RelationshipType, source: &str, target: &str| {
        batch
            .relationships
            .iter()
            .any(|r| r.rel_type == rel_type && r.source == source && r.target == target)
    };

    let app_file = file_id("src/app.ts");
    let start = node_id(NodeType::Function, "shop", "start", Some("App"));
    let create_logger = node_id(NodeType::Function, "shop", "createLogger", None);

    assert!(edge(RelationshipType::DependsOn, &app_file, &file_id("src/logger.ts")));
    assert!(edge(RelationshipType::DependsOn, &app_file, &module_id("express")));
    assert!(edge(RelationshipType::Calls, &start, &create_logger));
    assert!(edge(
        RelationshipType::UsesType,
        &create_logger,
        &node_id(NodeType::Interface, "shop", "Logger", None)
    ));

    let ids: HashSet<&str> = batch.nodes.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids.len(), batch.nodes.len(), "node ids are unique within a batch");
}

#[test]
fn test_dedup_over_built_graph_is_idempotent() {
    let dir = sample_project();
    let config = ExtractionConfig::default();
    let paths = discover_files(dir.path(), &config);
    let outcome = extract_files(dir.path(), &paths, &config);
    let batch = GraphBuilder::with_timestamp(1_000).build(&outcome.files);

    let first = deduplicate(batch.relationships.clone());
    assert_eq!(first.stats.input, batch.relationships.len());
    assert_eq!(first.stats.output, first.relationships.len());
    assert!(first.relationships.len() <= batch.relationships.len());

    // Every surviving edge is unique per (type, source, target)
    let keys: HashSet<(RelationshipType, &str, &str)> = first
        .relationships
        .iter()
        .map(|r| (r.rel_type, r.source.as_str(), r.target.as_str()))
        .collect();
    assert_eq!(keys.len(), first.relationships.len());

    let second = deduplicate(first.relationships.clone());
    assert_eq!(second.relationships, first.relationships);
    assert_eq!(second.stats.input, second.stats.output);
}

#[test]
fn test_dedup_keeps_most_specific_edge_per_pair() {
    let rels = vec![
        GraphRelationship::new(RelationshipType::References, "a", "b").with_confidence(0.9),
        GraphRelationship::new(RelationshipType::Calls, "a", "b").with_confidence(0.6),
        GraphRelationship::new(RelationshipType::RelatedTo, "a", "c").with_confidence(0.3),
        GraphRelationship::new(RelationshipType::Imports, "x", "y").with_confidence(0.1),
    ];

    let report = deduplicate(rels.clone());
    let kept: Vec<(RelationshipType, &str)> = report
        .relationships
        .iter()
        .map(|r| (r.rel_type, r.target.as_str()))
        .collect();

    assert_eq!(kept, vec![(RelationshipType::Calls, "b")]);
    assert_eq!(report.removed_ids(&rels).len(), 3);
    assert_eq!(report.quality.medium, 1);
}

#[test]
fn test_rebuilding_after_edit_changes_only_that_file() {
    let dir = sample_project();
    let config = ExtractionConfig::default();
    let paths = discover_files(dir.path(), &config);
    let before = GraphBuilder::with_timestamp(1).build(&extract_files(dir.path(), &paths, &config).files);

    write(
        dir.path(),
        "src/logger.ts",
        "export function createLogger(name: string) { return name; }\nexport function flush() {}",
    );
    let after = GraphBuilder::with_timestamp(1).build(&extract_files(dir.path(), &paths, &config).files);

    let flush = node_id(NodeType::Function, "shop", "flush", None);
    assert!(!before.nodes.iter().any(|n| n.id == flush));
    assert!(after.nodes.iter().any(|n| n.id == flush));

    // Ids of untouched declarations are stable
    let app = node_id(NodeType::Class, "shop", "App", None);
    assert!(before.nodes.iter().any(|n| n.id == app));
    assert!(after.nodes.iter().any(|n| n.id == app));
}
