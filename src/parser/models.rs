//! Raw structural facts emitted by the extractors
//!
//! The set of declaration kinds is closed: every consumer matches on
//! [`Declaration`] exhaustively.

use serde::{Deserialize, Serialize};

/// A function or method parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub type_name: Option<String>,
    pub optional: bool,
    pub default_value: Option<String>,
}

/// TypeScript access modifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessModifier {
    Public,
    Private,
    Protected,
}

impl AccessModifier {
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword.trim() {
            "public" => Some(Self::Public),
            "private" => Some(Self::Private),
            "protected" => Some(Self::Protected),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
            Self::Protected => "protected",
        }
    }
}

/// A function, method, or function-valued variable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDecl {
    pub name: String,
    pub params: Vec<Parameter>,
    pub return_type: Option<String>,
    pub is_async: bool,
    pub is_generator: bool,
    pub is_exported: bool,
    pub is_static: bool,
    pub access: Option<AccessModifier>,
    /// Owning class for methods
    pub class_name: Option<String>,
    pub line_start: u32,
    pub line_end: u32,
    /// Identifiers called from the body, in source order, deduplicated
    pub calls: Vec<String>,
    pub complexity: u32,
    pub docstring: Option<String>,
}

/// A class declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassDecl {
    pub name: String,
    pub is_abstract: bool,
    pub is_exported: bool,
    pub superclass: Option<String>,
    pub implements: Vec<String>,
    pub methods: Vec<String>,
    pub properties: Vec<String>,
    pub access: Option<AccessModifier>,
    pub line_start: u32,
    pub line_end: u32,
    pub docstring: Option<String>,
}

/// A property or method signature inside an interface body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberSignature {
    pub name: String,
    pub type_text: Option<String>,
    pub optional: bool,
}

/// An interface declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterfaceDecl {
    pub name: String,
    pub is_exported: bool,
    pub extends: Vec<String>,
    pub properties: Vec<MemberSignature>,
    pub methods: Vec<MemberSignature>,
    pub line_start: u32,
    pub line_end: u32,
    pub docstring: Option<String>,
}

/// A `type X = ...` declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeAliasDecl {
    pub name: String,
    pub definition: String,
    pub is_exported: bool,
    pub line_start: u32,
    pub line_end: u32,
}

/// How a module is brought into scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportKind {
    Default,
    Named,
    Namespace,
    Dynamic,
    /// `import "./polyfill"`
    SideEffect,
}

impl ImportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Named => "named",
            Self::Namespace => "namespace",
            Self::Dynamic => "dynamic",
            Self::SideEffect => "side_effect",
        }
    }
}

/// One imported binding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportSpecifier {
    pub name: String,
    pub alias: Option<String>,
}

/// An import statement or dynamic `import()` call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportDecl {
    /// Module reference exactly as written
    pub module: String,
    pub kinds: Vec<ImportKind>,
    pub specifiers: Vec<ImportSpecifier>,
    /// Relative or absolute path (resolves inside the project)
    pub is_internal: bool,
    pub line: u32,
}

impl ImportDecl {
    /// Whether a module reference points into the project rather than a package
    pub fn is_internal_reference(module: &str) -> bool {
        module.starts_with("./") || module.starts_with("../") || module.starts_with('/')
            || module == "." || module == ".."
    }

    /// Package name of an external reference (`@scope/pkg/sub` -> `@scope/pkg`)
    pub fn package_name(&self) -> Option<String> {
        if self.is_internal {
            return None;
        }
        let mut parts = self.module.split('/');
        let first = parts.next()?;
        if first.starts_with('@') {
            parts.next().map(|second| format!("{}/{}", first, second))
        } else {
            Some(first.to_string())
        }
    }
}

/// Kind of export statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportKind {
    /// `export default ...`
    Default,
    /// `export { a, b as c }`
    Named,
    /// `export * from "./x"`
    All,
    /// `export function f() {}` and friends
    Declaration,
}

impl ExportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Named => "named",
            Self::All => "all",
            Self::Declaration => "declaration",
        }
    }
}

/// An export statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportDecl {
    pub kind: ExportKind,
    /// Local names being exported
    pub names: Vec<String>,
    /// Re-export source (`export ... from "x"`)
    pub source: Option<String>,
    pub line: u32,
}

/// Closed set of facts an extractor can emit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Declaration {
    Function(FunctionDecl),
    Class(ClassDecl),
    Interface(InterfaceDecl),
    TypeAlias(TypeAliasDecl),
    Import(ImportDecl),
    Export(ExportDecl),
}

impl Declaration {
    /// Declared name, if the fact declares one
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Function(f) => Some(&f.name),
            Self::Class(c) => Some(&c.name),
            Self::Interface(i) => Some(&i.name),
            Self::TypeAlias(t) => Some(&t.name),
            Self::Import(_) | Self::Export(_) => None,
        }
    }
}

/// Everything extracted from one source file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedFile {
    /// Path relative to the project root, `/`-separated
    pub path: String,
    pub language: String,
    pub hash: String,
    /// Enclosing package name
    pub package: String,
    pub line_count: u32,
    pub declarations: Vec<Declaration>,
    /// Internal imports resolved to project files: (module reference, relative path)
    pub resolved_imports: Vec<(String, String)>,
}

impl ParsedFile {
    pub fn functions(&self) -> impl Iterator<Item = &FunctionDecl> {
        self.declarations.iter().filter_map(|d| match d {
            Declaration::Function(f) => Some(f),
            _ => None,
        })
    }

    pub fn classes(&self) -> impl Iterator<Item = &ClassDecl> {
        self.declarations.iter().filter_map(|d| match d {
            Declaration::Class(c) => Some(c),
            _ => None,
        })
    }

    pub fn interfaces(&self) -> impl Iterator<Item = &InterfaceDecl> {
        self.declarations.iter().filter_map(|d| match d {
            Declaration::Interface(i) => Some(i),
            _ => None,
        })
    }

    pub fn type_aliases(&self) -> impl Iterator<Item = &TypeAliasDecl> {
        self.declarations.iter().filter_map(|d| match d {
            Declaration::TypeAlias(t) => Some(t),
            _ => None,
        })
    }

    pub fn imports(&self) -> impl Iterator<Item = &ImportDecl> {
        self.declarations.iter().filter_map(|d| match d {
            Declaration::Import(i) => Some(i),
            _ => None,
        })
    }

    pub fn exports(&self) -> impl Iterator<Item = &ExportDecl> {
        self.declarations.iter().filter_map(|d| match d {
            Declaration::Export(e) => Some(e),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn import(module: &str) -> ImportDecl {
        ImportDecl {
            module: module.to_string(),
            kinds: vec![ImportKind::Named],
            specifiers: vec![],
            is_internal: ImportDecl::is_internal_reference(module),
            line: 1,
        }
    }

    #[test]
    fn test_internal_reference_detection() {
        assert!(ImportDecl::is_internal_reference("./logger"));
        assert!(ImportDecl::is_internal_reference("../utils/index"));
        assert!(ImportDecl::is_internal_reference("/abs/path"));
        assert!(!ImportDecl::is_internal_reference("react"));
        assert!(!ImportDecl::is_internal_reference("@nestjs/core"));
    }

    #[test]
    fn test_package_name_of_external_imports() {
        assert_eq!(import("lodash/fp").package_name().as_deref(), Some("lodash"));
        assert_eq!(
            import("@scope/pkg/deep/path").package_name().as_deref(),
            Some("@scope/pkg")
        );
        assert_eq!(import("./local").package_name(), None);
    }

    #[test]
    fn test_access_modifier_keywords() {
        assert_eq!(AccessModifier::from_keyword("protected"), Some(AccessModifier::Protected));
        assert_eq!(AccessModifier::from_keyword("readonly"), None);
    }
}
