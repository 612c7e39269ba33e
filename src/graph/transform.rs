//! Declaration facts to property-graph conversion
//!
//! A [`GraphBuilder`] turns a batch of [`ParsedFile`]s into nodes and
//! relationships. Cross-file targets (call targets, base classes, type
//! references) are resolved against a [`SymbolIndex`], by default the one
//! declared by the batch itself.

use super::ids::{file_id, module_id, node_id};
use super::models::*;
use super::symbols::{FileScope, SymbolIndex};
use crate::parser::helpers::type_identifiers;
use crate::parser::{Declaration, ExportDecl, FunctionDecl, ImportDecl, ParsedFile};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};

/// Confidence of edges read straight off the syntax tree
const STRUCTURAL: f64 = 1.0;
const RESOLVED_REFERENCE: f64 = 0.9;
const RESOLVED_CALL: f64 = 0.8;
const UNRESOLVED_HERITAGE: f64 = 0.7;
const TYPE_USAGE: f64 = 0.7;
const UNRESOLVED_CALL: f64 = 0.5;

/// Callees never synthesized when nothing in the index declares them
const BUILTIN_CALLS: &[&str] = &[
    "require", "log", "warn", "error", "push", "pop", "map", "filter", "forEach", "reduce",
    "then", "catch", "finally", "toString", "setTimeout", "setInterval", "clearTimeout",
    "parseInt", "parseFloat", "stringify", "parse", "keys", "values", "entries", "resolve",
    "reject", "slice", "splice", "join", "split", "includes", "indexOf", "assign",
];

/// Nodes and relationships produced from one batch of files
#[derive(Debug, Clone, Default)]
pub struct GraphBatch {
    pub nodes: Vec<GraphNode>,
    pub relationships: Vec<GraphRelationship>,
}

impl GraphBatch {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.relationships.is_empty()
    }
}

/// Converts extracted facts into graph elements
pub struct GraphBuilder {
    created_at: i64,
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self {
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Builder stamping every relationship with a fixed creation time
    pub fn with_timestamp(created_at: i64) -> Self {
        Self { created_at }
    }

    pub fn build(&self, files: &[ParsedFile]) -> GraphBatch {
        self.build_with_index(files, &SymbolIndex::from_parsed(files))
    }

    /// Build `files`, resolving references against `index`
    pub fn build_with_index(&self, files: &[ParsedFile], index: &SymbolIndex) -> GraphBatch {
        let mut out = BatchWriter::default();

        for file in files {
            self.build_file(file, index, &mut out);
        }

        tracing::debug!(
            files = files.len(),
            nodes = out.batch.nodes.len(),
            relationships = out.batch.relationships.len(),
            "Built graph batch"
        );
        out.batch
    }

    fn edge(
        &self,
        rel_type: RelationshipType,
        source: &str,
        target: &str,
        confidence: f64,
        description: String,
        file: &ParsedFile,
        line: u32,
    ) -> GraphRelationship {
        GraphRelationship::new(rel_type, source, target)
            .with_confidence(confidence)
            .with_created_at(self.created_at)
            .with_description(description)
            .with_property(PROP_FILE_PATH, file.path.as_str())
            .with_property("line", line)
    }

    fn build_file(&self, file: &ParsedFile, index: &SymbolIndex, out: &mut BatchWriter) {
        let pkg = file.package.as_str();
        let path = file.path.as_str();
        let scope = FileScope::new(file);
        let file_node_id = file_id(&file.path);
        let file_name = file.path.rsplit('/').next().unwrap_or(&file.path);

        out.node(
            GraphNode::new(&file_node_id, NodeType::File, file_name)
                .with_property("path", file.path.as_str())
                .with_property(PROP_FILE_PATH, file.path.as_str())
                .with_property("language", file.language.as_str())
                .with_property("hash", file.hash.as_str())
                .with_property("package", pkg)
                .with_property("line_count", file.line_count),
        );

        // Local declaration name -> id, for export references
        let mut local: HashMap<&str, String> = HashMap::new();

        for decl in &file.declarations {
            match decl {
                Declaration::Function(f) => {
                    let id = match &f.class_name {
                        Some(class) => scope.method_id(class, &f.name),
                        None => scope.top_level_id(NodeType::Function, &f.name),
                    };
                    out.node(function_node(&id, f, file));
                    match &f.class_name {
                        Some(class) => {
                            let class_id = scope.class_id(class);
                            out.rel(self.edge(
                                RelationshipType::HasMethod,
                                &class_id,
                                &id,
                                STRUCTURAL,
                                format!("{} has method {}", class, f.name),
                                file,
                                f.line_start,
                            ));
                        }
                        None => {
                            local.insert(&f.name, id.clone());
                            out.rel(self.edge(
                                RelationshipType::Contains,
                                &file_node_id,
                                &id,
                                STRUCTURAL,
                                format!("{} contains function {}", file.path, f.name),
                                file,
                                f.line_start,
                            ));
                        }
                    }
                    self.function_edges(f, &id, file, &scope, index, out);
                }
                Declaration::Class(c) => {
                    let id = scope.top_level_id(NodeType::Class, &c.name);
                    local.insert(&c.name, id.clone());
                    out.node(
                        declared_node(&id, NodeType::Class, &c.name, file, c.line_start, c.line_end)
                            .with_property("abstract", c.is_abstract)
                            .with_property("exported", c.is_exported)
                            .with_property("access", c.access.map(|a| a.as_str()))
                            .with_property("description", c.docstring.clone())
                            .with_metadata("methods", c.methods.clone())
                            .with_metadata("properties", c.properties.clone()),
                    );
                    out.rel(self.edge(
                        RelationshipType::Contains,
                        &file_node_id,
                        &id,
                        STRUCTURAL,
                        format!("{} contains class {}", file.path, c.name),
                        file,
                        c.line_start,
                    ));
                    if let Some(base) = &c.superclass {
                        let (target, confidence) = resolve_or_synthesize(
                            index.class(base, pkg, path),
                            NodeType::Class,
                            pkg,
                            base,
                        );
                        out.rel(self.edge(
                            RelationshipType::Extends,
                            &id,
                            &target,
                            confidence,
                            format!("{} extends {}", c.name, base),
                            file,
                            c.line_start,
                        ));
                    }
                    for iface in &c.implements {
                        let (target, confidence) = resolve_or_synthesize(
                            index.interface(iface, pkg, path),
                            NodeType::Interface,
                            pkg,
                            iface,
                        );
                        out.rel(self.edge(
                            RelationshipType::Implements,
                            &id,
                            &target,
                            confidence,
                            format!("{} implements {}", c.name, iface),
                            file,
                            c.line_start,
                        ));
                    }
                }
                Declaration::Interface(i) => {
                    let id = scope.top_level_id(NodeType::Interface, &i.name);
                    local.insert(&i.name, id.clone());
                    let members: Vec<Value> = i
                        .properties
                        .iter()
                        .chain(i.methods.iter())
                        .map(|m| json!({"name": m.name, "type": m.type_text, "optional": m.optional}))
                        .collect();
                    out.node(
                        declared_node(&id, NodeType::Interface, &i.name, file, i.line_start, i.line_end)
                            .with_property("exported", i.is_exported)
                            .with_property("description", i.docstring.clone())
                            .with_metadata("members", members),
                    );
                    out.rel(self.edge(
                        RelationshipType::Defines,
                        &file_node_id,
                        &id,
                        STRUCTURAL,
                        format!("{} defines interface {}", file.path, i.name),
                        file,
                        i.line_start,
                    ));
                    for base in &i.extends {
                        let (target, confidence) = resolve_or_synthesize(
                            index.interface(base, pkg, path),
                            NodeType::Interface,
                            pkg,
                            base,
                        );
                        out.rel(self.edge(
                            RelationshipType::Extends,
                            &id,
                            &target,
                            confidence,
                            format!("{} extends {}", i.name, base),
                            file,
                            i.line_start,
                        ));
                    }
                }
                Declaration::TypeAlias(t) => {
                    let id = scope.top_level_id(NodeType::TypeAlias, &t.name);
                    local.insert(&t.name, id.clone());
                    out.node(
                        declared_node(&id, NodeType::TypeAlias, &t.name, file, t.line_start, t.line_end)
                            .with_property("definition", t.definition.as_str())
                            .with_property("exported", t.is_exported),
                    );
                    out.rel(self.edge(
                        RelationshipType::Defines,
                        &file_node_id,
                        &id,
                        STRUCTURAL,
                        format!("{} defines type {}", file.path, t.name),
                        file,
                        t.line_start,
                    ));
                }
                Declaration::Import(import) => {
                    self.import_edges(import, &file_node_id, file, out);
                }
                // Exports reference declarations that may come later in the file
                Declaration::Export(_) => {}
            }
        }

        for export in file.exports() {
            self.export_edges(export, &file_node_id, &local, file, out);
        }
    }

    fn function_edges(
        &self,
        f: &FunctionDecl,
        id: &str,
        file: &ParsedFile,
        scope: &FileScope<'_>,
        index: &SymbolIndex,
        out: &mut BatchWriter,
    ) {
        let pkg = file.package.as_str();
        let path = file.path.as_str();
        let class_id = f.class_name.as_ref().map(|class| scope.class_id(class));

        for callee in &f.calls {
            let own_method = class_id
                .as_deref()
                .and_then(|class_id| index.method(class_id, callee));

            let (target, confidence) = if let Some(method) = own_method {
                (method.to_string(), RESOLVED_CALL)
            } else if let Some(found) = index.function(callee, pkg, path) {
                (found.to_string(), RESOLVED_CALL)
            } else if BUILTIN_CALLS.contains(&callee.as_str()) {
                continue;
            } else {
                (node_id(NodeType::Function, pkg, callee, None), UNRESOLVED_CALL)
            };

            out.rel(self.edge(
                RelationshipType::Calls,
                id,
                &target,
                confidence,
                format!("{} calls {}", f.name, callee),
                file,
                f.line_start,
            ));
        }

        let mut type_names: Vec<String> = Vec::new();
        for text in f
            .params
            .iter()
            .filter_map(|p| p.type_name.as_deref())
            .chain(f.return_type.as_deref())
        {
            for name in type_identifiers(text) {
                if !type_names.contains(&name) {
                    type_names.push(name);
                }
            }
        }
        for name in type_names {
            if let Some(target) = index.type_like(&name, pkg, path) {
                out.rel(self.edge(
                    RelationshipType::UsesType,
                    id,
                    target,
                    TYPE_USAGE,
                    format!("{} uses type {}", f.name, name),
                    file,
                    f.line_start,
                ));
            }
        }
    }

    fn import_edges(&self, import: &ImportDecl, file_node_id: &str, file: &ParsedFile, out: &mut BatchWriter) {
        let pkg = file.package.as_str();
        let id = node_id(NodeType::Import, pkg, &import.module, Some(&file.path));
        let kinds: Vec<&str> = import.kinds.iter().map(|k| k.as_str()).collect();
        let specifiers: Vec<Value> = import
            .specifiers
            .iter()
            .map(|s| json!({"name": s.name, "alias": s.alias}))
            .collect();

        out.node(
            GraphNode::new(&id, NodeType::Import, import.module.as_str())
                .with_property("module", import.module.as_str())
                .with_property("internal", import.is_internal)
                .with_property("kind", kinds.join(","))
                .with_property(PROP_FILE_PATH, file.path.as_str())
                .with_property("line", import.line)
                .with_metadata("specifiers", specifiers),
        );
        out.rel(self.edge(
            RelationshipType::Imports,
            file_node_id,
            &id,
            STRUCTURAL,
            format!("{} imports {}", file.path, import.module),
            file,
            import.line,
        ));

        if import.is_internal {
            let resolved = file
                .resolved_imports
                .iter()
                .find(|(module, _)| *module == import.module)
                .map(|(_, target)| target);
            if let Some(target) = resolved {
                out.rel(self.edge(
                    RelationshipType::DependsOn,
                    file_node_id,
                    &file_id(target),
                    0.95,
                    format!("{} depends on {}", file.path, target),
                    file,
                    import.line,
                ));
            }
        } else if let Some(package) = import.package_name() {
            let module = module_id(&package);
            out.node(
                GraphNode::new(&module, NodeType::Module, package.as_str())
                    .with_property("external", true),
            );
            out.rel(self.edge(
                RelationshipType::DependsOn,
                file_node_id,
                &module,
                RESOLVED_REFERENCE,
                format!("{} depends on package {}", file.path, package),
                file,
                import.line,
            ));
        }
    }

    fn export_edges(
        &self,
        export: &ExportDecl,
        file_node_id: &str,
        local: &HashMap<&str, String>,
        file: &ParsedFile,
        out: &mut BatchWriter,
    ) {
        let display = if export.names.is_empty() {
            match &export.source {
                Some(source) => format!("* from {}", source),
                None => export.kind.as_str().to_string(),
            }
        } else {
            export.names.join(", ")
        };
        let id = node_id(NodeType::Export, &file.package, &display, Some(&file.path));

        out.node(
            GraphNode::new(&id, NodeType::Export, display.as_str())
                .with_property("kind", export.kind.as_str())
                .with_property("source", export.source.clone())
                .with_property(PROP_FILE_PATH, file.path.as_str())
                .with_property("line", export.line)
                .with_metadata("names", export.names.clone()),
        );
        out.rel(self.edge(
            RelationshipType::Exports,
            file_node_id,
            &id,
            STRUCTURAL,
            format!("{} exports {}", file.path, display),
            file,
            export.line,
        ));

        // Re-exported names live in another module
        if export.source.is_some() {
            return;
        }
        for name in &export.names {
            if let Some(target) = local.get(name.as_str()) {
                out.rel(self.edge(
                    RelationshipType::References,
                    &id,
                    target,
                    RESOLVED_REFERENCE,
                    format!("export of {}", name),
                    file,
                    export.line,
                ));
            }
        }
    }
}

fn resolve_or_synthesize(found: Option<&str>, kind: NodeType, package: &str, name: &str) -> (String, f64) {
    match found {
        Some(id) => (id.to_string(), RESOLVED_REFERENCE),
        None => (node_id(kind, package, name, None), UNRESOLVED_HERITAGE),
    }
}

fn declared_node(
    id: &str,
    kind: NodeType,
    name: &str,
    file: &ParsedFile,
    line_start: u32,
    line_end: u32,
) -> GraphNode {
    GraphNode::new(id, kind, name)
        .with_property(PROP_FILE_PATH, file.path.as_str())
        .with_property("package", file.package.as_str())
        .with_property("line_start", line_start)
        .with_property("line_end", line_end)
}

fn function_node(id: &str, f: &FunctionDecl, file: &ParsedFile) -> GraphNode {
    let params: Vec<Value> = f
        .params
        .iter()
        .map(|p| {
            json!({
                "name": p.name,
                "type": p.type_name,
                "optional": p.optional,
                "default": p.default_value,
            })
        })
        .collect();
    let signature = format!(
        "{}{}({}){}",
        if f.is_async { "async " } else { "" },
        f.name,
        f.params
            .iter()
            .map(|p| match &p.type_name {
                Some(t) => format!("{}: {}", p.name, t),
                None => p.name.clone(),
            })
            .collect::<Vec<_>>()
            .join(", "),
        f.return_type
            .as_ref()
            .map(|r| format!(": {}", r))
            .unwrap_or_default()
    );

    declared_node(id, NodeType::Function, &f.name, file, f.line_start, f.line_end)
        .with_property("signature", signature)
        .with_property("async", f.is_async)
        .with_property("generator", f.is_generator)
        .with_property("exported", f.is_exported)
        .with_property("static", f.is_static)
        .with_property("access", f.access.map(|a| a.as_str()))
        .with_property("class_name", f.class_name.clone())
        .with_property("return_type", f.return_type.clone())
        .with_property("complexity", f.complexity)
        .with_property("description", f.docstring.clone())
        .with_metadata("params", params)
        .with_metadata("calls", f.calls.clone())
}

/// Accumulates a batch, keeping the first node seen per id
#[derive(Default)]
struct BatchWriter {
    batch: GraphBatch,
    seen_nodes: HashSet<String>,
}

impl BatchWriter {
    fn node(&mut self, node: GraphNode) {
        if self.seen_nodes.insert(node.id.clone()) {
            self.batch.nodes.push(node);
        }
    }

    fn rel(&mut self, rel: GraphRelationship) {
        self.batch.relationships.push(rel);
    }
}
