use std::path::Path;

pub const DEFAULT_ALLOWED_ROOTS: [&str; 4] = ["app", "components", "lib", "hooks"];
pub const DEFAULT_DENIED_SUFFIXES: [&str; 2] = ["package.json", "next.config.js"];

/// Separators become `/` and leading slashes are dropped.
pub fn normalize_path(path: &str) -> String {
    path.replace('\\', "/").trim_start_matches('/').to_string()
}

/// Allow-list of writable source roots plus a deny-list of sensitive files.
#[derive(Debug, Clone)]
pub struct PathGuard {
    allowed_roots: Vec<String>,
    denied_suffixes: Vec<String>,
}

impl Default for PathGuard {
    fn default() -> Self {
        Self::new(&DEFAULT_ALLOWED_ROOTS, &DEFAULT_DENIED_SUFFIXES)
    }
}

impl PathGuard {
    pub fn new(allowed_roots: &[&str], denied_suffixes: &[&str]) -> Self {
        Self {
            allowed_roots: allowed_roots
                .iter()
                .map(|r| r.trim_end_matches('/').to_string())
                .collect(),
            denied_suffixes: denied_suffixes.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn allowed_roots(&self) -> &[String] {
        &self.allowed_roots
    }

    pub fn is_path_safe(&self, path: &str) -> bool {
        if Path::new(path).is_absolute() {
            return false;
        }
        let normalized = normalize_path(path);
        if normalized.is_empty() || Path::new(&normalized).is_absolute() {
            return false;
        }
        if normalized.split('/').any(|segment| segment == "..") {
            return false;
        }
        let base_name = normalized.rsplit('/').next().unwrap_or_default();
        if base_name.starts_with(".env") {
            return false;
        }
        if self.denied_suffixes.iter().any(|suffix| normalized.ends_with(suffix.as_str())) {
            return false;
        }
        self.allowed_roots.iter().any(|root| {
            normalized == *root
                || normalized
                    .strip_prefix(root.as_str())
                    .is_some_and(|rest| rest.starts_with('/'))
        })
    }

    /// Every path that fails [`PathGuard::is_path_safe`], in input order.
    pub fn unsafe_paths<'a, I>(&self, paths: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a String>,
    {
        paths
            .into_iter()
            .filter(|p| !self.is_path_safe(p))
            .cloned()
            .collect()
    }
}
