//! Entity extraction from free-text queries
//!
//! Quoted strings are taken verbatim first, then identifiers that look like
//! code (camelCase, PascalCase, snake_case, dotted), then any remaining word
//! that is not a stop word. Order is preserved and duplicates are dropped
//! case-insensitively.

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

static QUOTED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""([^"]+)"|'([^']+)'|`([^`]+)`"#).expect("valid pattern")
});

static TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z_$@][A-Za-z0-9_$./-]*").expect("valid pattern")
});

const STOP_WORDS: &[&str] = &[
    "a", "about", "all", "an", "and", "any", "are", "as", "associated", "at", "between", "by",
    "call", "called", "caller", "callers", "calls", "can", "class", "classes", "code",
    "component", "components", "connected", "contract", "contracts", "defined", "depend",
    "dependencies", "dependency", "depending", "depends", "describe", "did", "do", "does",
    "explain", "file", "files", "find", "flow", "flows", "fn", "for", "from", "func",
    "function", "functions", "get", "handler", "handlers", "how", "i", "import", "imports", "in",
    "interface", "interfaces", "is", "it", "list", "me", "method", "methods", "module",
    "modules", "need", "of", "on", "or", "package", "path", "reach", "reference", "references",
    "related", "require", "requires", "search", "show", "similar", "that", "the", "this", "to",
    "type", "types", "usage", "usages", "use", "used", "uses", "using", "what", "where",
    "which", "who", "why", "with",
];

/// Whether a token looks like a code identifier rather than an English word
fn is_code_identifier(token: &str) -> bool {
    let has_inner_upper = token.chars().skip(1).any(|c| c.is_uppercase());
    let has_lower = token.chars().any(|c| c.is_lowercase());

    token.contains('_')
        || token.contains('.')
        || token.contains('/')
        || (has_inner_upper && has_lower)
}

fn is_stop_word(token: &str) -> bool {
    let lower = token.to_lowercase();
    STOP_WORDS.binary_search(&lower.as_str()).is_ok()
}

/// Entities mentioned in `text`
pub fn extract_entities(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut entities = Vec::new();
    let mut push = |entity: &str| {
        let entity = entity.trim();
        if !entity.is_empty() && seen.insert(entity.to_lowercase()) {
            entities.push(entity.to_string());
        }
    };

    for caps in QUOTED.captures_iter(text) {
        if let Some(m) = caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3)) {
            push(m.as_str());
        }
    }

    let remainder = QUOTED.replace_all(text, " ");
    let tokens: Vec<&str> = TOKEN
        .find_iter(&remainder)
        .map(|m| m.as_str().trim_end_matches(['.', '/', '-']))
        .filter(|t| !t.is_empty())
        .collect();

    for token in tokens.iter().filter(|t| is_code_identifier(t)) {
        push(token);
    }

    for token in tokens
        .iter()
        .filter(|t| !is_code_identifier(t) && !is_stop_word(t) && t.len() > 1)
    {
        push(token);
    }

    entities
}
