//! TypeScript/JavaScript language extractor
//!
//! Emits [`Declaration`] facts for:
//! - Functions (regular, generator, arrow and function expressions bound to variables)
//! - Classes with methods, properties, access modifiers and heritage clauses
//! - Interfaces with extended interfaces and member signatures
//! - Type aliases
//! - Static and dynamic imports, exports and re-exports

use crate::parser::helpers::*;
use crate::parser::models::*;

/// Extract TypeScript/JavaScript declarations from a syntax tree
pub fn extract(root: &tree_sitter::Node, source: &str, out: &mut Vec<Declaration>) {
    extract_recursive(root, source, false, out);
    extract_dynamic_imports(root, source, out);
}

fn extract_recursive(
    node: &tree_sitter::Node,
    source: &str,
    exported: bool,
    out: &mut Vec<Declaration>,
) {
    let mut cursor = node.walk();

    for child in node.children(&mut cursor) {
        match child.kind() {
            "function_declaration" | "generator_function_declaration" => {
                if let Some(func) = extract_function(&child, source, exported) {
                    out.push(Declaration::Function(func));
                }
            }
            "class_declaration" | "abstract_class_declaration" => {
                extract_class(&child, source, exported, out);
            }
            "interface_declaration" => {
                if let Some(iface) = extract_interface(&child, source, exported) {
                    out.push(Declaration::Interface(iface));
                }
            }
            "type_alias_declaration" => {
                if let Some(alias) = extract_type_alias(&child, source, exported) {
                    out.push(Declaration::TypeAlias(alias));
                }
            }
            "import_statement" => {
                if let Some(import) = extract_import(&child, source) {
                    out.push(Declaration::Import(import));
                }
            }
            "export_statement" => {
                extract_export(&child, source, out);
            }
            "lexical_declaration" | "variable_declaration" => {
                extract_variable_functions(&child, source, exported, out);
            }
            // Namespace members are exported only by their own `export`
            "internal_module" | "module" => {
                if let Some(body) = child.child_by_field_name("body") {
                    extract_recursive(&body, source, false, out);
                }
            }
            // Function bodies belong to their declaration
            "statement_block" | "arrow_function" | "function_expression" | "function" => {}
            _ => extract_recursive(&child, source, exported, out),
        }
    }
}

fn extract_function(node: &tree_sitter::Node, source: &str, exported: bool) -> Option<FunctionDecl> {
    let name = get_field_text(node, "name", source)?;
    Some(build_function(node, node, name, exported, None, source))
}

/// Shared construction for declarations, methods and function-valued variables.
/// `decl` carries the span and doc comment, `func` carries the signature and body.
fn build_function(
    decl: &tree_sitter::Node,
    func: &tree_sitter::Node,
    name: String,
    exported: bool,
    class_name: Option<String>,
    source: &str,
) -> FunctionDecl {
    let params = match func.child_by_field_name("parameters") {
        Some(p) => extract_ts_params(&p, source),
        // `x => ...`
        None => func
            .child_by_field_name("parameter")
            .and_then(|p| get_text(&p, source))
            .map(|n| {
                vec![Parameter {
                    name: n.to_string(),
                    type_name: None,
                    optional: false,
                    default_value: None,
                }]
            })
            .unwrap_or_default(),
    };

    let return_type = func
        .child_by_field_name("return_type")
        .and_then(|r| annotation_text(&r, source));

    let calls = func
        .child_by_field_name("body")
        .map(|body| extract_calls_from_node(&body, source))
        .unwrap_or_default();

    FunctionDecl {
        name,
        params,
        return_type,
        is_async: has_child_kind(func, "async"),
        is_generator: func.kind().starts_with("generator") || has_child_kind(func, "*"),
        is_exported: exported,
        is_static: has_child_kind(func, "static"),
        access: get_ts_access(func, source),
        class_name,
        line_start: start_line(decl),
        line_end: end_line(decl),
        calls,
        complexity: calculate_complexity(func),
        docstring: get_jsdoc(decl, source),
    }
}

fn extract_class(node: &tree_sitter::Node, source: &str, exported: bool, out: &mut Vec<Declaration>) {
    let Some(name) = get_field_text(node, "name", source) else {
        return;
    };

    let mut superclass = None;
    let mut implements = Vec::new();
    if let Some(heritage) = find_child_by_kind(node, "class_heritage") {
        for clause in heritage.children(&mut heritage.walk()) {
            match clause.kind() {
                "extends_clause" => {
                    superclass = clause
                        .child_by_field_name("value")
                        .and_then(|v| base_type_name(&v, source));
                }
                "implements_clause" => {
                    implements.extend(
                        clause
                            .named_children(&mut clause.walk())
                            .filter_map(|t| base_type_name(&t, source)),
                    );
                }
                _ => {}
            }
        }
    }

    let mut methods = Vec::new();
    let mut properties = Vec::new();
    let mut method_decls = Vec::new();

    if let Some(body) = node.child_by_field_name("body") {
        for member in body.children(&mut body.walk()) {
            match member.kind() {
                "method_definition" | "abstract_method_signature" | "method_signature" => {
                    if let Some(method_name) = get_field_text(&member, "name", source) {
                        methods.push(method_name.clone());
                        method_decls.push(build_function(
                            &member,
                            &member,
                            method_name,
                            false,
                            Some(name.clone()),
                            source,
                        ));
                    }
                }
                "public_field_definition" | "field_definition" => {
                    if let Some(prop) = member
                        .child_by_field_name("name")
                        .or_else(|| member.child_by_field_name("property"))
                        .and_then(|n| get_text(&n, source))
                    {
                        properties.push(prop.to_string());
                    }
                }
                _ => {}
            }
        }
    }

    out.push(Declaration::Class(ClassDecl {
        name,
        is_abstract: node.kind() == "abstract_class_declaration" || has_child_kind(node, "abstract"),
        is_exported: exported,
        superclass,
        implements,
        methods,
        properties,
        access: get_ts_access(node, source),
        line_start: start_line(node),
        line_end: end_line(node),
        docstring: get_jsdoc(node, source),
    }));
    out.extend(method_decls.into_iter().map(Declaration::Function));
}

fn extract_interface(node: &tree_sitter::Node, source: &str, exported: bool) -> Option<InterfaceDecl> {
    let name = get_field_text(node, "name", source)?;

    let extends = find_child_by_kind(node, "extends_type_clause")
        .map(|clause| {
            clause
                .named_children(&mut clause.walk())
                .filter_map(|t| base_type_name(&t, source))
                .collect()
        })
        .unwrap_or_default();

    let mut properties = Vec::new();
    let mut methods = Vec::new();
    if let Some(body) = node.child_by_field_name("body") {
        for member in body.named_children(&mut body.walk()) {
            let Some(member_name) = get_field_text(&member, "name", source) else {
                continue;
            };
            match member.kind() {
                "property_signature" => properties.push(MemberSignature {
                    name: member_name,
                    type_text: member
                        .child_by_field_name("type")
                        .and_then(|t| annotation_text(&t, source)),
                    optional: has_child_kind(&member, "?"),
                }),
                "method_signature" => methods.push(MemberSignature {
                    name: member_name,
                    type_text: get_text(&member, source).map(|s| s.trim_end_matches([';', ',']).to_string()),
                    optional: has_child_kind(&member, "?"),
                }),
                _ => {}
            }
        }
    }

    Some(InterfaceDecl {
        name,
        is_exported: exported,
        extends,
        properties,
        methods,
        line_start: start_line(node),
        line_end: end_line(node),
        docstring: get_jsdoc(node, source),
    })
}

fn extract_type_alias(node: &tree_sitter::Node, source: &str, exported: bool) -> Option<TypeAliasDecl> {
    let name = get_field_text(node, "name", source)?;
    let definition = get_field_text(node, "value", source).unwrap_or_default();

    Some(TypeAliasDecl {
        name,
        definition,
        is_exported: exported,
        line_start: start_line(node),
        line_end: end_line(node),
    })
}

fn extract_import(node: &tree_sitter::Node, source: &str) -> Option<ImportDecl> {
    let module = node
        .child_by_field_name("source")
        .or_else(|| find_child_by_kind(node, "string"))
        .and_then(|s| get_text(&s, source))
        .map(unquote)?;

    let mut kinds = Vec::new();
    let mut specifiers = Vec::new();

    if let Some(clause) = find_child_by_kind(node, "import_clause") {
        for part in clause.named_children(&mut clause.walk()) {
            match part.kind() {
                "identifier" => {
                    kinds.push(ImportKind::Default);
                    if let Some(text) = get_text(&part, source) {
                        specifiers.push(ImportSpecifier {
                            name: text.to_string(),
                            alias: None,
                        });
                    }
                }
                "namespace_import" => {
                    kinds.push(ImportKind::Namespace);
                    if let Some(alias) = find_child_by_kind(&part, "identifier")
                        .and_then(|i| get_text(&i, source))
                    {
                        specifiers.push(ImportSpecifier {
                            name: "*".to_string(),
                            alias: Some(alias.to_string()),
                        });
                    }
                }
                "named_imports" => {
                    kinds.push(ImportKind::Named);
                    for spec in part.named_children(&mut part.walk()) {
                        if spec.kind() != "import_specifier" {
                            continue;
                        }
                        if let Some(name) = get_field_text(&spec, "name", source) {
                            specifiers.push(ImportSpecifier {
                                name,
                                alias: get_field_text(&spec, "alias", source),
                            });
                        }
                    }
                }
                _ => {}
            }
        }
    }

    if kinds.is_empty() {
        kinds.push(ImportKind::SideEffect);
    }

    Some(ImportDecl {
        is_internal: ImportDecl::is_internal_reference(&module),
        module,
        kinds,
        specifiers,
        line: start_line(node),
    })
}

/// `import("./module")` calls with a literal argument, anywhere in the file
fn extract_dynamic_imports(root: &tree_sitter::Node, source: &str, out: &mut Vec<Declaration>) {
    let mut stack = vec![*root];
    while let Some(node) = stack.pop() {
        if node.kind() == "call_expression" {
            let is_import = node
                .child_by_field_name("function")
                .map(|f| f.kind() == "import")
                .unwrap_or(false);
            if is_import {
                let module = node
                    .child_by_field_name("arguments")
                    .and_then(|args| args.named_child(0))
                    .filter(|arg| arg.kind() == "string")
                    .and_then(|arg| get_text(&arg, source))
                    .map(unquote);
                if let Some(module) = module {
                    out.push(Declaration::Import(ImportDecl {
                        is_internal: ImportDecl::is_internal_reference(&module),
                        module,
                        kinds: vec![ImportKind::Dynamic],
                        specifiers: Vec::new(),
                        line: start_line(&node),
                    }));
                }
            }
        }
        for i in (0..node.child_count()).rev() {
            if let Some(child) = node.child(i) {
                stack.push(child);
            }
        }
    }
}

fn extract_export(node: &tree_sitter::Node, source: &str, out: &mut Vec<Declaration>) {
    let line = start_line(node);
    let reexport_source = node
        .child_by_field_name("source")
        .and_then(|s| get_text(&s, source))
        .map(unquote);
    let is_default = has_child_kind(node, "default");

    if let Some(declaration) = node.child_by_field_name("declaration") {
        let before = out.len();
        extract_recursive(node, source, true, out);
        let names = match declaration.kind() {
            "internal_module" | "module" => get_field_text(&declaration, "name", source)
                .map(|n| vec![unquote(&n)])
                .unwrap_or_default(),
            _ => out[before..]
                .iter()
                .filter_map(|d| match d {
                    // Methods of an exported class are not exports themselves
                    Declaration::Function(f) if f.class_name.is_some() => None,
                    other => other.name().map(str::to_string),
                })
                .collect(),
        };
        let kind = if is_default {
            ExportKind::Default
        } else {
            ExportKind::Declaration
        };
        out.push(Declaration::Export(ExportDecl {
            kind,
            names,
            source: None,
            line,
        }));
        return;
    }

    if let Some(clause) = find_child_by_kind(node, "export_clause") {
        let names = clause
            .named_children(&mut clause.walk())
            .filter(|s| s.kind() == "export_specifier")
            .filter_map(|s| get_field_text(&s, "name", source))
            .collect();
        out.push(Declaration::Export(ExportDecl {
            kind: ExportKind::Named,
            names,
            source: reexport_source,
            line,
        }));
        return;
    }

    if has_child_kind(node, "*") || has_child_kind(node, "namespace_export") {
        out.push(Declaration::Export(ExportDecl {
            kind: ExportKind::All,
            names: Vec::new(),
            source: reexport_source,
            line,
        }));
        return;
    }

    if is_default {
        let names = node
            .child_by_field_name("value")
            .filter(|v| v.kind() == "identifier")
            .and_then(|v| get_text(&v, source))
            .map(|n| vec![n.to_string()])
            .unwrap_or_default();
        out.push(Declaration::Export(ExportDecl {
            kind: ExportKind::Default,
            names,
            source: None,
            line,
        }));
    }
}

fn extract_variable_functions(
    node: &tree_sitter::Node,
    source: &str,
    exported: bool,
    out: &mut Vec<Declaration>,
) {
    for child in node.children(&mut node.walk()) {
        if child.kind() != "variable_declarator" {
            continue;
        }
        let name = get_field_text(&child, "name", source);
        let value = child.child_by_field_name("value");

        if let (Some(name), Some(value)) = (name, value) {
            if matches!(
                value.kind(),
                "arrow_function" | "function_expression" | "function" | "generator_function"
            ) {
                out.push(Declaration::Function(build_function(
                    node, &value, name, exported, None, source,
                )));
            }
        }
    }
}

fn extract_ts_params(node: &tree_sitter::Node, source: &str) -> Vec<Parameter> {
    let mut params = Vec::new();

    for child in node.named_children(&mut node.walk()) {
        match child.kind() {
            "required_parameter" | "optional_parameter" => {
                let name = child
                    .child_by_field_name("pattern")
                    .or_else(|| find_child_by_kind(&child, "identifier"))
                    .and_then(|n| get_text(&n, source))
                    .unwrap_or("_")
                    .to_string();

                let type_name = child
                    .child_by_field_name("type")
                    .and_then(|t| annotation_text(&t, source));

                let default_value = get_field_text(&child, "value", source);

                params.push(Parameter {
                    name,
                    type_name,
                    optional: child.kind() == "optional_parameter" || default_value.is_some(),
                    default_value,
                });
            }
            // Untyped JavaScript parameters
            "identifier" => {
                if let Some(name) = get_text(&child, source) {
                    params.push(Parameter {
                        name: name.to_string(),
                        type_name: None,
                        optional: false,
                        default_value: None,
                    });
                }
            }
            _ => {}
        }
    }

    params
}

fn get_ts_access(node: &tree_sitter::Node, source: &str) -> Option<AccessModifier> {
    find_child_by_kind(node, "accessibility_modifier")
        .and_then(|m| get_text(&m, source))
        .and_then(AccessModifier::from_keyword)
}
