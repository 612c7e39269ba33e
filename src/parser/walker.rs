//! Project walking and parallel extraction
//!
//! File discovery is shared with the sync manager so both agree on which
//! files belong to the graph.

use super::{CodeParser, ParsedFile};
use crate::error::{GraphError, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Directories never descended into
pub const DEFAULT_IGNORED_DIRS: &[&str] = &[
    "node_modules",
    "dist",
    "build",
    "out",
    "target",
    "coverage",
    "vendor",
    "__pycache__",
];

/// Extensions parsed by default
pub const DEFAULT_EXTENSIONS: &[&str] = &["ts", "tsx", "js", "jsx", "mjs", "cjs"];

/// Which files are part of the project graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    pub extensions: Vec<String>,
    pub ignored_dirs: Vec<String>,
    /// Files larger than this are skipped (bytes)
    pub max_file_size: u64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            extensions: DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            ignored_dirs: DEFAULT_IGNORED_DIRS.iter().map(|s| s.to_string()).collect(),
            max_file_size: 2 * 1024 * 1024,
        }
    }
}

impl ExtractionConfig {
    pub fn is_ignored_dir(&self, name: &str) -> bool {
        name.starts_with('.') || self.ignored_dirs.iter().any(|d| d == name)
    }

    pub fn has_allowed_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|ext| self.extensions.iter().any(|a| a.eq_ignore_ascii_case(ext)))
            .unwrap_or(false)
    }
}

/// Project-relative `/`-separated path
pub fn relative_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

/// All source files below `root`, sorted, with ignored directories pruned
pub fn discover_files(root: &Path, config: &ExtractionConfig) -> Vec<PathBuf> {
    let keep = |entry: &DirEntry| {
        // The root itself may be a dot-directory
        entry.depth() == 0
            || !entry.file_type().is_dir()
            || !config.is_ignored_dir(&entry.file_name().to_string_lossy())
    };

    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(keep)
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!("Skipping unreadable entry: {}", e);
                None
            }
        })
        .filter(|e| e.file_type().is_file() && config.has_allowed_extension(e.path()))
        .map(|e| e.into_path())
        .collect();

    files.sort();
    files
}

// ============================================================================
// Extraction context
// ============================================================================

/// Per-worker state for one extraction run
pub struct ExtractionContext {
    root: PathBuf,
    /// Absolute, lexically normalized root used for import resolution
    anchor: PathBuf,
    root_name: String,
    /// Directory -> package name resolved for it
    package_cache: HashMap<PathBuf, String>,
}

impl ExtractionContext {
    pub fn new(root: &Path) -> Self {
        let anchor = anchored(root).unwrap_or_else(|| root.to_path_buf());
        let root_name = anchor
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "root".to_string());
        Self {
            root: root.to_path_buf(),
            anchor,
            root_name,
            package_cache: HashMap::new(),
        }
    }

    /// Package enclosing `file`: `name` of the nearest `package.json` up to the
    /// root, else the name of the directory holding it, else the root name.
    pub fn package_for(&mut self, file: &Path) -> String {
        let dir = file.parent().unwrap_or(&self.root).to_path_buf();
        if let Some(cached) = self.package_cache.get(&dir) {
            return cached.clone();
        }

        let mut current = Some(dir.as_path());
        let mut resolved = None;
        while let Some(candidate) = current {
            if !candidate.starts_with(&self.root) {
                break;
            }
            if let Some(hit) = self.package_cache.get(candidate) {
                resolved = Some(hit.clone());
                break;
            }
            let manifest = candidate.join("package.json");
            if manifest.is_file() {
                resolved = Some(read_package_name(&manifest).unwrap_or_else(|| {
                    candidate
                        .file_name()
                        .map(|n| n.to_string_lossy().to_string())
                        .unwrap_or_else(|| self.root_name.clone())
                }));
                break;
            }
            current = candidate.parent();
        }

        let package = resolved.unwrap_or_else(|| self.root_name.clone());
        self.package_cache.insert(dir, package.clone());
        package
    }

    /// Resolve an internal module reference to a project file, if one exists
    pub fn resolve_import(&self, from_file: &Path, module: &str, config: &ExtractionConfig) -> Option<String> {
        let base = if module.starts_with('/') {
            self.root.join(module.trim_start_matches('/'))
        } else {
            from_file.parent()?.join(module)
        };
        let base = anchored(&base)?;
        if !base.starts_with(&self.anchor) {
            return None;
        }

        let mut candidates = vec![base.clone()];
        // ESM style: "./util.js" written for "./util.ts"
        if let Some(stem) = base.to_str().and_then(|s| s.strip_suffix(".js")) {
            candidates.push(PathBuf::from(format!("{}.ts", stem)));
            candidates.push(PathBuf::from(format!("{}.tsx", stem)));
        }
        for ext in &config.extensions {
            candidates.push(PathBuf::from(format!("{}.{}", base.display(), ext)));
        }
        for ext in &config.extensions {
            candidates.push(base.join(format!("index.{}", ext)));
        }

        candidates
            .into_iter()
            .find(|c| c.is_file() && config.has_allowed_extension(c))
            .map(|c| relative_path(&self.anchor, &c))
    }
}

fn read_package_name(manifest: &Path) -> Option<String> {
    let raw = std::fs::read_to_string(manifest).ok()?;
    let json: serde_json::Value = serde_json::from_str(&raw).ok()?;
    json.get("name")
        .and_then(|n| n.as_str())
        .filter(|n| !n.is_empty())
        .map(|n| n.to_string())
}

/// Absolute form of `path` with `.` and `..` resolved, symlinks untouched
fn anchored(path: &Path) -> Option<PathBuf> {
    normalize(&std::path::absolute(path).ok()?)
}

/// Lexically resolve `.` and `..` without touching the filesystem
fn normalize(path: &Path) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    return None;
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    Some(out)
}

// ============================================================================
// Parallel extraction
// ============================================================================

/// Outcome of extracting a set of files
#[derive(Debug, Default)]
pub struct ExtractionOutcome {
    pub files: Vec<ParsedFile>,
    pub failures: Vec<GraphError>,
}

/// Read, parse and contextualize one file
pub fn extract_file(
    parser: &mut CodeParser,
    ctx: &mut ExtractionContext,
    path: &Path,
    config: &ExtractionConfig,
) -> Result<ParsedFile> {
    let rel = relative_path(&ctx.root, path);

    let metadata = std::fs::metadata(path).map_err(|e| GraphError::parse(&rel, e))?;
    if metadata.len() > config.max_file_size {
        return Err(GraphError::parse(
            &rel,
            format!("file too large ({} bytes)", metadata.len()),
        ));
    }

    let bytes = std::fs::read(path).map_err(|e| GraphError::parse(&rel, e))?;
    let content = String::from_utf8(bytes).map_err(|_| GraphError::parse(&rel, "not valid UTF-8"))?;

    let mut parsed = parser.parse_file(Path::new(&rel), &content)?;
    parsed.package = ctx.package_for(path);

    let mut resolved = Vec::new();
    for import in parsed.imports().filter(|i| i.is_internal) {
        if let Some(target) = ctx.resolve_import(path, &import.module, config) {
            resolved.push((import.module.clone(), target));
        }
    }
    parsed.resolved_imports = resolved;

    Ok(parsed)
}

/// Extract `paths` in parallel. Failing files are logged and collected, never fatal.
pub fn extract_files(root: &Path, paths: &[PathBuf], config: &ExtractionConfig) -> ExtractionOutcome {
    let results: Vec<Result<ParsedFile>> = paths
        .par_iter()
        .map_init(
            || (CodeParser::new(), ExtractionContext::new(root)),
            |(parser, ctx), path| {
                let parser = parser
                    .as_mut()
                    .map_err(|e| GraphError::parse(relative_path(root, path), e))?;
                extract_file(parser, ctx, path, config)
            },
        )
        .collect();

    let mut outcome = ExtractionOutcome::default();
    for result in results {
        match result {
            Ok(parsed) => outcome.files.push(parsed),
            Err(e) => {
                tracing::warn!("Skipping file: {}", e);
                outcome.failures.push(e);
            }
        }
    }

    tracing::debug!(
        parsed = outcome.files.len(),
        failed = outcome.failures.len(),
        "Extraction finished"
    );
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_discover_prunes_ignored_and_hidden_dirs() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "src/a.ts", "");
        write(dir.path(), "src/b.md", "");
        write(dir.path(), "node_modules/x/index.js", "");
        write(dir.path(), ".git/hooks/pre.js", "");
        write(dir.path(), "dist/a.js", "");
        write(dir.path(), "web/App.tsx", "");

        let files: Vec<String> = discover_files(dir.path(), &ExtractionConfig::default())
            .iter()
            .map(|p| relative_path(dir.path(), p))
            .collect();
        assert_eq!(files, vec!["src/a.ts", "web/App.tsx"]);
    }

    #[test]
    fn test_package_name_from_nearest_manifest() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "package.json", r#"{"name": "monorepo"}"#);
        write(dir.path(), "packages/core/package.json", r#"{"name": "@acme/core"}"#);
        write(dir.path(), "packages/bare/package.json", r#"{"private": true}"#);

        let mut ctx = ExtractionContext::new(dir.path());
        assert_eq!(
            ctx.package_for(&dir.path().join("packages/core/src/deep/x.ts")),
            "@acme/core"
        );
        assert_eq!(ctx.package_for(&dir.path().join("packages/bare/x.ts")), "bare");
        assert_eq!(ctx.package_for(&dir.path().join("scripts/x.ts")), "monorepo");
    }

    #[test]
    fn test_package_name_falls_back_to_root_name() {
        let dir = TempDir::new().unwrap();
        let mut ctx = ExtractionContext::new(dir.path());
        let expected = dir.path().file_name().unwrap().to_string_lossy().to_string();
        assert_eq!(ctx.package_for(&dir.path().join("a.ts")), expected);
    }

    #[test]
    fn test_resolve_internal_imports() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "src/logger.ts", "");
        write(dir.path(), "src/utils/index.ts", "");
        write(dir.path(), "src/app.ts", "");
        let config = ExtractionConfig::default();
        let ctx = ExtractionContext::new(dir.path());
        let from = dir.path().join("src/app.ts");

        assert_eq!(ctx.resolve_import(&from, "./logger", &config).as_deref(), Some("src/logger.ts"));
        assert_eq!(ctx.resolve_import(&from, "./logger.js", &config).as_deref(), Some("src/logger.ts"));
        assert_eq!(ctx.resolve_import(&from, "./utils", &config).as_deref(), Some("src/utils/index.ts"));
        assert_eq!(ctx.resolve_import(&from, "./missing", &config), None);
        assert_eq!(ctx.resolve_import(&from, "../../../etc/passwd", &config), None);
    }

    #[test]
    fn test_resolve_imports_under_relative_root() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "proj/src/logger.ts", "");
        write(dir.path(), "proj/src/app.ts", "");
        let config = ExtractionConfig::default();

        // Relative roots with `.` components, as a caller may pass them
        let cwd = std::env::current_dir().unwrap();
        let rel_root = pathdiff(&dir.path().join("proj"), &cwd);
        let root = Path::new(".").join(&rel_root);
        let ctx = ExtractionContext::new(&root);
        let from = root.join("src/app.ts");

        assert_eq!(ctx.resolve_import(&from, "./logger", &config).as_deref(), Some("src/logger.ts"));
        assert_eq!(ctx.resolve_import(&from, "../../outside", &config), None);
        assert_eq!(ctx.root_name, "proj");
    }

    /// `path` relative to `base`, both absolute
    fn pathdiff(path: &Path, base: &Path) -> PathBuf {
        let path: Vec<_> = path.components().collect();
        let base: Vec<_> = base.components().collect();
        let common = path.iter().zip(&base).take_while(|(a, b)| a == b).count();
        let mut out = PathBuf::new();
        for _ in common..base.len() {
            out.push("..");
        }
        for c in &path[common..] {
            out.push(c.as_os_str());
        }
        out
    }

    #[test]
    fn test_extract_files_skips_failures() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "ok.ts", "export function ok() { return helper(); }");
        fs::write(dir.path().join("bad.ts"), [0xff, 0xfe, 0x00]).unwrap();

        let paths = discover_files(dir.path(), &ExtractionConfig::default());
        let outcome = extract_files(dir.path(), &paths, &ExtractionConfig::default());

        assert_eq!(outcome.files.len(), 1);
        assert_eq!(outcome.files[0].path, "ok.ts");
        assert_eq!(outcome.failures.len(), 1);
        assert!(outcome.failures[0].is_recoverable());
    }
}
