//! Common helper functions for walking tree-sitter syntax trees

/// Get the text content of a node
pub fn get_text<'a>(node: &tree_sitter::Node<'a>, source: &'a str) -> Option<&'a str> {
    node.utf8_text(source.as_bytes()).ok()
}

/// Get text from a named field in a node
pub fn get_field_text<'a>(
    node: &tree_sitter::Node<'a>,
    field: &str,
    source: &'a str,
) -> Option<String> {
    node.child_by_field_name(field)
        .and_then(|n| get_text(&n, source))
        .map(|s| s.to_string())
}

/// 1-based first line of a node
pub fn start_line(node: &tree_sitter::Node) -> u32 {
    node.start_position().row as u32 + 1
}

/// 1-based last line of a node
pub fn end_line(node: &tree_sitter::Node) -> u32 {
    node.end_position().row as u32 + 1
}

/// Find a child node by kind
pub fn find_child_by_kind<'a>(
    node: &tree_sitter::Node<'a>,
    kind: &str,
) -> Option<tree_sitter::Node<'a>> {
    node.children(&mut node.walk()).find(|c| c.kind() == kind)
}

/// Check if a node has a child of a specific kind
pub fn has_child_kind(node: &tree_sitter::Node, kind: &str) -> bool {
    node.children(&mut node.walk()).any(|c| c.kind() == kind)
}

/// Strip the quotes around a string literal
pub fn unquote(text: &str) -> String {
    text.trim()
        .trim_matches(|c| c == '"' || c == '\'' || c == '`')
        .to_string()
}

/// Text of a type annotation without its leading colon
pub fn annotation_text(node: &tree_sitter::Node, source: &str) -> Option<String> {
    get_text(node, source)
        .map(|s| s.trim_start_matches(':').trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Cyclomatic complexity of a function body
pub fn calculate_complexity(node: &tree_sitter::Node) -> u32 {
    let mut complexity = 1u32;
    let mut cursor = node.walk();

    fn count_branches(cursor: &mut tree_sitter::TreeCursor, complexity: &mut u32) {
        loop {
            let node = cursor.node();
            match node.kind() {
                "if_statement" | "while_statement" | "do_statement" | "for_statement"
                | "for_in_statement" | "switch_case" | "catch_clause" | "ternary_expression" => {
                    *complexity += 1;
                }
                "binary_expression" => {
                    if let Some(op) = node.child_by_field_name("operator") {
                        if matches!(op.kind(), "&&" | "||" | "??") {
                            *complexity += 1;
                        }
                    }
                }
                _ => {}
            }

            if cursor.goto_first_child() {
                count_branches(cursor, complexity);
                cursor.goto_parent();
            }

            if !cursor.goto_next_sibling() {
                break;
            }
        }
    }

    count_branches(&mut cursor, &mut complexity);
    complexity
}

/// JSDoc block directly above a declaration.
///
/// Exported declarations carry their comment above the `export` keyword, so
/// the parent statement is checked as well.
pub fn get_jsdoc(node: &tree_sitter::Node, source: &str) -> Option<String> {
    let anchor = match node.parent() {
        Some(parent) if parent.kind() == "export_statement" => parent,
        _ => *node,
    };

    let sibling = anchor.prev_sibling()?;
    if sibling.kind() != "comment" {
        return None;
    }
    let text = get_text(&sibling, source)?;
    if !text.starts_with("/**") {
        return None;
    }

    let doc = text
        .trim_start_matches("/**")
        .trim_end_matches("*/")
        .lines()
        .map(|l| l.trim().trim_start_matches('*').trim())
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    if doc.is_empty() {
        None
    } else {
        Some(doc)
    }
}

/// Names of functions called anywhere below `node`, in source order, deduplicated.
///
/// `obj.method()` yields `method`; `import()` and `super()` are skipped.
pub fn extract_calls_from_node(node: &tree_sitter::Node, source: &str) -> Vec<String> {
    let mut calls = Vec::new();
    let mut cursor = node.walk();
    extract_calls_recursive(&mut cursor, source, &mut calls);
    calls
}

fn extract_calls_recursive(
    cursor: &mut tree_sitter::TreeCursor,
    source: &str,
    calls: &mut Vec<String>,
) {
    loop {
        let node = cursor.node();

        if node.kind() == "call_expression" {
            if let Some(callee) = extract_callee_name(&node, source) {
                if !calls.contains(&callee) {
                    calls.push(callee);
                }
            }
        }

        if cursor.goto_first_child() {
            extract_calls_recursive(cursor, source, calls);
            cursor.goto_parent();
        }

        if !cursor.goto_next_sibling() {
            break;
        }
    }
}

/// Extract the callee name from a call expression
fn extract_callee_name(node: &tree_sitter::Node, source: &str) -> Option<String> {
    let func = node.child_by_field_name("function")?;

    match func.kind() {
        "identifier" => get_text(&func, source).map(|s| s.to_string()),
        "member_expression" => func
            .child_by_field_name("property")
            .and_then(|p| get_text(&p, source))
            .map(|s| s.to_string()),
        // import(), super(), IIFEs and friends
        _ => None,
    }
}

/// Name of a type reference without its type arguments (`Repo<User>` -> `Repo`)
pub fn base_type_name(node: &tree_sitter::Node, source: &str) -> Option<String> {
    let named = match node.kind() {
        "generic_type" => node.child_by_field_name("name").unwrap_or(*node),
        _ => *node,
    };
    let text = get_text(&named, source)?;
    let base = text.split('<').next().unwrap_or(text).trim();
    if base.is_empty() {
        None
    } else {
        Some(base.to_string())
    }
}

/// Identifier-like tokens in a type expression (`Promise<User[]> | null` -> `Promise`, `User`)
pub fn type_identifiers(type_text: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut current = String::new();
    for c in type_text.chars().chain(std::iter::once(' ')) {
        if c.is_alphanumeric() || c == '_' || c == '$' {
            current.push(c);
        } else if !current.is_empty() {
            let token = std::mem::take(&mut current);
            let starts_alpha = token
                .chars()
                .next()
                .map(|f| f.is_alphabetic() || f == '_' || f == '$')
                .unwrap_or(false);
            if starts_alpha && !names.contains(&token) {
                names.push(token);
            }
        }
    }
    names
}
