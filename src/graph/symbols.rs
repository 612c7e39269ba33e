//! Declared names and the ids they map to
//!
//! Exported top-level declarations are keyed by package and name, so a
//! reference from anywhere in the project reconciles with them. Everything
//! else is also keyed by its file, so same-named private helpers in different
//! files stay distinct nodes.
//!
//! [`FileSymbols`] is persisted with the sync state: an incremental run
//! resolves the files it re-extracts against the symbols of every file in
//! the tree, not only the changed ones.

use super::ids::node_id;
use super::models::NodeType;
use crate::parser::{Declaration, ParsedFile};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Cached symbols keyed by project-relative path
pub type SymbolMap = BTreeMap<String, FileSymbols>;

/// One declared name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    pub kind: NodeType,
    pub name: String,
    pub id: String,
    pub exported: bool,
    /// Id of the owning class, for methods
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
}

/// Everything one file declares
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSymbols {
    pub package: String,
    pub symbols: Vec<Symbol>,
}

impl FileSymbols {
    pub fn from_parsed(file: &ParsedFile) -> Self {
        let scope = FileScope::new(file);
        let mut symbols = Vec::new();

        for decl in &file.declarations {
            let (kind, name) = match decl {
                Declaration::Function(f) => {
                    if let Some(class) = &f.class_name {
                        symbols.push(Symbol {
                            kind: NodeType::Function,
                            name: f.name.clone(),
                            id: scope.method_id(class, &f.name),
                            exported: false,
                            owner: Some(scope.class_id(class)),
                        });
                        continue;
                    }
                    (NodeType::Function, &f.name)
                }
                Declaration::Class(c) => (NodeType::Class, &c.name),
                Declaration::Interface(i) => (NodeType::Interface, &i.name),
                Declaration::TypeAlias(t) => (NodeType::TypeAlias, &t.name),
                Declaration::Import(_) | Declaration::Export(_) => continue,
            };
            symbols.push(Symbol {
                kind,
                name: name.clone(),
                id: scope.top_level_id(kind, name),
                exported: scope.is_exported(name),
                owner: None,
            });
        }

        Self {
            package: file.package.clone(),
            symbols,
        }
    }
}

// ============================================================================
// Per-file id scheme
// ============================================================================

/// Id scheme for the declarations of one file
pub(crate) struct FileScope<'a> {
    package: &'a str,
    path: &'a str,
    /// Top-level names exported by a modifier or a local export clause
    exported: HashSet<&'a str>,
}

impl<'a> FileScope<'a> {
    pub(crate) fn new(file: &'a ParsedFile) -> Self {
        let mut exported = HashSet::new();
        for decl in &file.declarations {
            match decl {
                Declaration::Function(f) if f.class_name.is_none() && f.is_exported => {
                    exported.insert(f.name.as_str());
                }
                Declaration::Class(c) if c.is_exported => {
                    exported.insert(c.name.as_str());
                }
                Declaration::Interface(i) if i.is_exported => {
                    exported.insert(i.name.as_str());
                }
                Declaration::TypeAlias(t) if t.is_exported => {
                    exported.insert(t.name.as_str());
                }
                Declaration::Export(e) if e.source.is_none() => {
                    exported.extend(e.names.iter().map(String::as_str));
                }
                _ => {}
            }
        }
        Self {
            package: &file.package,
            path: &file.path,
            exported,
        }
    }

    pub(crate) fn is_exported(&self, name: &str) -> bool {
        self.exported.contains(name)
    }

    pub(crate) fn top_level_id(&self, kind: NodeType, name: &str) -> String {
        if self.is_exported(name) {
            node_id(kind, self.package, name, None)
        } else {
            node_id(kind, self.package, name, Some(self.path))
        }
    }

    pub(crate) fn class_id(&self, class: &str) -> String {
        self.top_level_id(NodeType::Class, class)
    }

    pub(crate) fn method_id(&self, class: &str, method: &str) -> String {
        if self.is_exported(class) {
            node_id(NodeType::Function, self.package, method, Some(class))
        } else {
            let owner = format!("{}#{}", self.path, class);
            node_id(NodeType::Function, self.package, method, Some(&owner))
        }
    }
}

// ============================================================================
// Lookup
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct Candidate {
    package: String,
    path: String,
    exported: bool,
    id: String,
}

/// Declared names visible to a build
#[derive(Debug, Default)]
pub struct SymbolIndex {
    functions: HashMap<String, Vec<Candidate>>,
    classes: HashMap<String, Vec<Candidate>>,
    interfaces: HashMap<String, Vec<Candidate>>,
    /// Classes, interfaces and type aliases
    types: HashMap<String, Vec<Candidate>>,
    /// (class id, method name) -> method id
    methods: HashMap<(String, String), String>,
}

impl SymbolIndex {
    pub fn from_symbols<'a>(files: impl IntoIterator<Item = (&'a String, &'a FileSymbols)>) -> Self {
        let mut index = Self::default();
        for (path, file) in files {
            for symbol in &file.symbols {
                if let Some(owner) = &symbol.owner {
                    index
                        .methods
                        .insert((owner.clone(), symbol.name.clone()), symbol.id.clone());
                    continue;
                }
                let candidate = Candidate {
                    package: file.package.clone(),
                    path: path.clone(),
                    exported: symbol.exported,
                    id: symbol.id.clone(),
                };
                let name = symbol.name.clone();
                match symbol.kind {
                    NodeType::Function => push_unique(&mut index.functions, name, candidate),
                    NodeType::Class => {
                        push_unique(&mut index.classes, name.clone(), candidate.clone());
                        push_unique(&mut index.types, name, candidate);
                    }
                    NodeType::Interface => {
                        push_unique(&mut index.interfaces, name.clone(), candidate.clone());
                        push_unique(&mut index.types, name, candidate);
                    }
                    NodeType::TypeAlias => push_unique(&mut index.types, name, candidate),
                    _ => {}
                }
            }
        }
        for candidates in index
            .functions
            .values_mut()
            .chain(index.classes.values_mut())
            .chain(index.interfaces.values_mut())
            .chain(index.types.values_mut())
        {
            candidates.sort();
        }
        index
    }

    /// Index over the files of one batch
    pub fn from_parsed(files: &[ParsedFile]) -> Self {
        let symbols: SymbolMap = files
            .iter()
            .map(|f| (f.path.clone(), FileSymbols::from_parsed(f)))
            .collect();
        Self::from_symbols(&symbols)
    }

    pub fn function(&self, name: &str, package: &str, path: &str) -> Option<&str> {
        pick(self.functions.get(name), package, path)
    }

    pub fn class(&self, name: &str, package: &str, path: &str) -> Option<&str> {
        pick(self.classes.get(name), package, path)
    }

    pub fn interface(&self, name: &str, package: &str, path: &str) -> Option<&str> {
        pick(self.interfaces.get(name), package, path)
    }

    pub fn type_like(&self, name: &str, package: &str, path: &str) -> Option<&str> {
        pick(self.types.get(name), package, path)
    }

    pub fn method(&self, class_id: &str, name: &str) -> Option<&str> {
        self.methods
            .get(&(class_id.to_string(), name.to_string()))
            .map(String::as_str)
    }
}

fn push_unique(map: &mut HashMap<String, Vec<Candidate>>, name: String, candidate: Candidate) {
    let entry = map.entry(name).or_default();
    if !entry.iter().any(|existing| existing.id == candidate.id) {
        entry.push(candidate);
    }
}

/// Same file first, then an export of the same package, then any export,
/// then a private declaration of the same package
fn pick<'a>(candidates: Option<&'a Vec<Candidate>>, package: &str, path: &str) -> Option<&'a str> {
    let candidates = candidates?;
    candidates
        .iter()
        .find(|c| c.path == path)
        .or_else(|| candidates.iter().find(|c| c.exported && c.package == package))
        .or_else(|| candidates.iter().find(|c| c.exported))
        .or_else(|| candidates.iter().find(|c| c.package == package))
        .map(|c| c.id.as_str())
}
