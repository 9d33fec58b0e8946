//! Project context gathered for every change request.
//!
//! The model sees a bounded slice of the project: the source tree layout, the
//! declared dependencies, a handful of configuration files and the files whose
//! paths match words in the request.

use log::{ debug, warn };
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::collections::{ BTreeMap, HashSet };
use std::fs;
use std::path::{ Path, PathBuf };
use std::sync::Arc;
use walkdir::{ DirEntry, WalkDir };

use crate::error::AssistantError;
use crate::workspace::guard::normalize_path;
use crate::workspace::resolve_project_path;

pub const SKIP_DIRS: [&str; 4] = ["node_modules", ".git", ".next", ".versions"];
pub const KEY_FILE_CANDIDATES: [&str; 5] = [
    "app/globals.css",
    "styles/globals.css",
    "tailwind.config.ts",
    "tsconfig.json",
    "lib/utils.ts",
];
pub const TREE_ROOT: &str = "app";
pub const MAX_RELEVANT_FILES: usize = 8;
pub const DEFAULT_MAX_FILE_SIZE: u64 = 100 * 1024;

static KEYWORD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[a-z0-9][a-z0-9_-]{2,}").expect("keyword pattern is valid")
});

#[derive(Debug, Clone, Copy)]
pub struct ContextLimits {
    pub max_file_size: u64,
    pub max_depth: usize,
    pub max_entries: usize,
}

impl Default for ContextLimits {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_depth: 16,
            max_entries: 5000,
        }
    }
}

#[derive(Deserialize)]
struct Manifest {
    #[serde(default)]
    dependencies: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectContextBundle {
    pub file_tree: String,
    pub dependencies: BTreeMap<String, String>,
    pub files: Vec<(String, String)>,
}

impl ProjectContextBundle {
    pub fn render(&self) -> String {
        let dependencies = serde_json::to_string_pretty(&self.dependencies)
            .unwrap_or_else(|_| "{}".to_string());
        let files_section = if self.files.is_empty() {
            "No files included.".to_string()
        } else {
            self.files
                .iter()
                .map(|(path, content)| format!("File: {}\n{}", path, content))
                .collect::<Vec<_>>()
                .join("\n\n")
        };
        let tree = if self.file_tree.is_empty() { "(empty)" } else { self.file_tree.as_str() };

        [
            "PROJECT STRUCTURE:",
            tree,
            "",
            "DEPENDENCIES:",
            &dependencies,
            "",
            "EXISTING FILES:",
            &files_section,
        ].join("\n")
    }
}

/// Lowercase keywords of at least three characters, first occurrence order.
pub fn extract_keywords(prompt: &str) -> Vec<String> {
    let lower = prompt.to_lowercase();
    let mut seen = HashSet::new();
    KEYWORD_RE.find_iter(&lower)
        .map(|m| m.as_str().to_string())
        .filter(|k| seen.insert(k.clone()))
        .collect()
}

fn is_skipped(entry: &DirEntry) -> bool {
    entry.depth() > 0 && entry.file_name().to_str().is_some_and(|name| SKIP_DIRS.contains(&name))
}

#[derive(Debug, Clone)]
pub struct ProjectContext {
    root: PathBuf,
    source_roots: Vec<String>,
    limits: ContextLimits,
}

impl ProjectContext {
    pub fn new(root: impl Into<PathBuf>, source_roots: &[String], limits: ContextLimits) -> Self {
        Self {
            root: root.into(),
            source_roots: source_roots.to_vec(),
            limits,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn walk(&self, dir: &Path) -> impl Iterator<Item = DirEntry> {
        let max_entries = self.limits.max_entries;
        let mut visited = 0usize;
        WalkDir::new(dir)
            .min_depth(1)
            .max_depth(self.limits.max_depth)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !is_skipped(e))
            .filter_map(Result::ok)
            .take_while(move |_| {
                visited += 1;
                if visited > max_entries {
                    warn!("Project walk stopped after {} entries", max_entries);
                }
                visited <= max_entries
            })
    }

    /// Indented listing of the `app` directory; empty when it can't be read.
    pub fn generate_file_tree(&self) -> String {
        let mut lines = Vec::new();
        for entry in self.walk(&self.root.join(TREE_ROOT)) {
            let indent = "  ".repeat(entry.depth() - 1);
            let name = entry.file_name().to_string_lossy();
            if entry.file_type().is_dir() {
                lines.push(format!("{}{}/", indent, name));
            } else if entry.file_type().is_file() {
                lines.push(format!("{}{}", indent, name));
            }
        }
        lines.join("\n")
    }

    pub fn get_project_dependencies(&self) -> BTreeMap<String, String> {
        let path = self.root.join("package.json");
        let parsed = fs::read_to_string(&path)
            .ok()
            .and_then(|raw| serde_json::from_str::<Manifest>(&raw).ok());
        match parsed {
            Some(manifest) => manifest.dependencies,
            None => {
                debug!("No usable manifest at {}", path.display());
                BTreeMap::new()
            }
        }
    }

    pub fn get_key_files(&self) -> Vec<String> {
        KEY_FILE_CANDIDATES
            .iter()
            .filter(|candidate| self.root.join(candidate).exists())
            .map(|candidate| candidate.to_string())
            .collect()
    }

    fn list_source_files(&self) -> Vec<String> {
        let mut files = Vec::new();
        for source_root in &self.source_roots {
            for entry in self.walk(&self.root.join(source_root)) {
                if !entry.file_type().is_file() {
                    continue;
                }
                if let Ok(relative) = entry.path().strip_prefix(&self.root) {
                    files.push(normalize_path(&relative.to_string_lossy()));
                }
            }
        }
        files
    }

    /// Up to eight source files ranked by how many prompt keywords appear in
    /// their path; ties are broken by path.
    pub fn find_relevant_files(&self, prompt: &str) -> Vec<String> {
        let keywords = extract_keywords(prompt);
        if keywords.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(usize, String)> = self
            .list_source_files()
            .into_iter()
            .filter_map(|path| {
                let lower = path.to_lowercase();
                let score = keywords.iter().filter(|k| lower.contains(k.as_str())).count();
                (score > 0).then_some((score, path))
            })
            .collect();

        scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
        scored.truncate(MAX_RELEVANT_FILES);
        scored.into_iter().map(|(_, path)| path).collect()
    }

    /// File text, or `None` when the path leaves the project, is not a
    /// regular file, is over the size ceiling or is not UTF-8.
    pub fn read_file_content(&self, path: &str) -> Option<String> {
        let resolved = resolve_project_path(&self.root, path).ok()?;
        let canonical_root = self.root.canonicalize().ok()?;
        let canonical = resolved.canonicalize().ok()?;
        if !canonical.starts_with(&canonical_root) {
            return None;
        }
        let metadata = fs::metadata(&canonical).ok()?;
        if !metadata.is_file() || metadata.len() > self.limits.max_file_size {
            return None;
        }
        fs::read_to_string(&canonical).ok()
    }

    /// Runs the four read-only lookups concurrently on the blocking pool and
    /// reads the union of key and relevant files.
    pub async fn build_bundle(
        self: &Arc<Self>,
        prompt: &str
    ) -> Result<ProjectContextBundle, AssistantError> {
        let (tree, dependencies, key_files, relevant) = tokio::join!(
            tokio::task::spawn_blocking({
                let ctx = Arc::clone(self);
                move || ctx.generate_file_tree()
            }),
            tokio::task::spawn_blocking({
                let ctx = Arc::clone(self);
                move || ctx.get_project_dependencies()
            }),
            tokio::task::spawn_blocking({
                let ctx = Arc::clone(self);
                move || ctx.get_key_files()
            }),
            tokio::task::spawn_blocking({
                let ctx = Arc::clone(self);
                let prompt = prompt.to_string();
                move || ctx.find_relevant_files(&prompt)
            })
        );

        let mut seen = HashSet::new();
        let paths: Vec<String> = key_files?
            .into_iter()
            .chain(relevant?)
            .filter(|p| seen.insert(p.clone()))
            .collect();

        let ctx = Arc::clone(self);
        let files = tokio::task::spawn_blocking(move || {
            paths
                .into_iter()
                .filter_map(|path| ctx.read_file_content(&path).map(|content| (path, content)))
                .collect::<Vec<_>>()
        }).await?;

        Ok(ProjectContextBundle {
            file_tree: tree?,
            dependencies: dependencies?,
            files,
        })
    }
}
