//! Tree-sitter based code parser
//!
//! Parses TypeScript and JavaScript sources into [`Declaration`] facts.
//! [`walker`] drives the parser over a whole project in parallel.

pub mod helpers;
pub mod languages;
pub mod models;
pub mod walker;

pub use models::*;

use crate::error::{GraphError, Result};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::Path;
use tree_sitter::{Language, Parser};

/// Supported grammars
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SupportedLanguage {
    TypeScript,
    /// TypeScript with JSX, also used for `.jsx`
    Tsx,
}

impl SupportedLanguage {
    /// Detect grammar from file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "ts" | "mts" | "cts" | "js" | "mjs" | "cjs" => Some(Self::TypeScript),
            "tsx" | "jsx" => Some(Self::Tsx),
            _ => None,
        }
    }

    /// Get the tree-sitter language
    pub fn tree_sitter_language(&self) -> Language {
        match self {
            Self::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            Self::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
        }
    }

    pub fn all() -> &'static [Self] {
        &[Self::TypeScript, Self::Tsx]
    }
}

/// Source language name reported on File nodes
pub fn language_name(ext: &str) -> &'static str {
    match ext.to_lowercase().as_str() {
        "js" | "jsx" | "mjs" | "cjs" => "javascript",
        _ => "typescript",
    }
}

/// Content hash used for File nodes and sync fingerprints
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Code parser using tree-sitter. Not `Sync`: each worker owns one.
pub struct CodeParser {
    parsers: HashMap<SupportedLanguage, Parser>,
}

impl CodeParser {
    /// Create a new code parser
    pub fn new() -> Result<Self> {
        let mut parsers = HashMap::new();

        for lang in SupportedLanguage::all() {
            let mut parser = Parser::new();
            parser
                .set_language(&lang.tree_sitter_language())
                .map_err(|e| GraphError::Config(format!("grammar {:?}: {}", lang, e)))?;
            parsers.insert(*lang, parser);
        }

        Ok(Self { parsers })
    }

    /// Parse a file and extract its declarations.
    ///
    /// `path` is the project-relative path recorded on the result; package
    /// and import resolution are filled in by the walker.
    pub fn parse_file(&mut self, path: &Path, content: &str) -> Result<ParsedFile> {
        let path_str = path.to_string_lossy().replace('\\', "/");
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();

        let language = SupportedLanguage::from_extension(ext).ok_or_else(|| {
            GraphError::parse(&path_str, format!("unsupported file extension: {:?}", ext))
        })?;

        let parser = self
            .parsers
            .get_mut(&language)
            .ok_or_else(|| GraphError::parse(&path_str, "parser not initialized"))?;

        let tree = parser
            .parse(content, None)
            .ok_or_else(|| GraphError::parse(&path_str, "parser returned no tree"))?;

        let root = tree.root_node();
        if root.has_error() {
            tracing::debug!(path = %path_str, "Syntax errors present, extracting what parsed");
        }

        let mut declarations = Vec::new();
        languages::typescript::extract(&root, content, &mut declarations);

        Ok(ParsedFile {
            path: path_str,
            language: language_name(ext).to_string(),
            hash: content_hash(content.as_bytes()),
            package: String::new(),
            line_count: content.lines().count() as u32,
            declarations,
            resolved_imports: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    // =========================================================================
    // SupportedLanguage Tests
    // =========================================================================

    #[test]
    fn test_from_extension_typescript() {
        assert_eq!(
            SupportedLanguage::from_extension("ts"),
            Some(SupportedLanguage::TypeScript)
        );
        assert_eq!(
            SupportedLanguage::from_extension("TSX"),
            Some(SupportedLanguage::Tsx)
        );
    }

    #[test]
    fn test_from_extension_javascript_uses_ts_grammars() {
        assert_eq!(
            SupportedLanguage::from_extension("mjs"),
            Some(SupportedLanguage::TypeScript)
        );
        assert_eq!(
            SupportedLanguage::from_extension("jsx"),
            Some(SupportedLanguage::Tsx)
        );
        assert_eq!(language_name("cjs"), "javascript");
        assert_eq!(language_name("tsx"), "typescript");
    }

    #[test]
    fn test_from_extension_unsupported() {
        assert_eq!(SupportedLanguage::from_extension("rs"), None);
        assert_eq!(SupportedLanguage::from_extension(""), None);
    }

    // =========================================================================
    // CodeParser Tests
    // =========================================================================

    #[test]
    fn test_parse_file_records_hash_and_lines() {
        let mut parser = CodeParser::new().unwrap();
        let code = "export function a() {}\nexport function b() {}\n";

        let parsed = parser.parse_file(&PathBuf::from("src/a.ts"), code).unwrap();
        assert_eq!(parsed.path, "src/a.ts");
        assert_eq!(parsed.language, "typescript");
        assert_eq!(parsed.hash, content_hash(code.as_bytes()));
        assert_eq!(parsed.hash.len(), 64);
        assert_eq!(parsed.line_count, 2);
        assert_eq!(parsed.functions().count(), 2);
    }

    #[test]
    fn test_parse_tsx_component() {
        let mut parser = CodeParser::new().unwrap();
        let code = r#"
export const Button = (props: ButtonProps) => <button onClick={props.onClick}>{props.label}</button>;
"#;
        let parsed = parser.parse_file(&PathBuf::from("ui/Button.tsx"), code).unwrap();
        let func = parsed.functions().next().unwrap();
        assert_eq!(func.name, "Button");
        assert_eq!(func.params[0].type_name.as_deref(), Some("ButtonProps"));
    }

    #[test]
    fn test_unsupported_extension_is_parse_error() {
        let mut parser = CodeParser::new().unwrap();
        let err = parser.parse_file(&PathBuf::from("main.rs"), "fn main() {}").unwrap_err();
        assert!(matches!(err, GraphError::Parse { .. }));
        assert!(err.is_recoverable());
    }
}
