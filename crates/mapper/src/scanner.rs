use crate::error::{MapperError, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};

/// Scanner for finding analyzable files under a repository root.
///
/// `.gitignore` rules are honored, a built-in set of tooling/cache scopes is
/// skipped, and callers may layer extra `.gitignore`-style globs on top.
pub struct FileScanner {
    root: PathBuf,
    extra_ignores: GlobSet,
}

impl FileScanner {
    pub fn new(root: impl AsRef<Path>, ignore_patterns: &[String]) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in ignore_patterns {
            let glob = Glob::new(pattern)
                .map_err(|e| MapperError::other(format!("Bad ignore pattern {pattern:?}: {e}")))?;
            builder.add(glob);
        }
        let extra_ignores = builder
            .build()
            .map_err(|e| MapperError::other(format!("Failed to build ignore set: {e}")))?;

        Ok(Self {
            root: root.as_ref().to_path_buf(),
            extra_ignores,
        })
    }

    /// Scan for files, returning root-relative `/`-separated paths in
    /// lexicographic order paired with their absolute paths.
    pub fn scan(&self) -> Vec<(String, PathBuf)> {
        let mut files = Vec::new();

        let root = self.root.clone();
        let mut builder = WalkBuilder::new(&self.root);
        builder
            .hidden(true) // do not index hidden files by default
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true)
            .require_git(false); // honor .gitignore even without a .git dir
        builder.filter_entry(move |entry| !Self::is_ignored_scope(entry.path(), &root));

        for result in builder.build() {
            match result {
                Ok(entry) => {
                    let Some(file_type) = entry.file_type() else {
                        continue;
                    };
                    if !file_type.is_file() {
                        continue;
                    }

                    let path = entry.path();
                    if let Ok(meta) = entry.metadata() {
                        if meta.len() > MAX_FILE_SIZE_BYTES {
                            log::debug!(
                                "Skipping large file {} ({} bytes > {})",
                                path.display(),
                                meta.len(),
                                MAX_FILE_SIZE_BYTES
                            );
                            continue;
                        }
                    }

                    if Self::is_noise_file(path) {
                        continue;
                    }

                    let Some(rel) = self.relative_key(path) else {
                        continue;
                    };
                    if self.extra_ignores.is_match(&rel) {
                        log::debug!("Skipping {rel} (ignore pattern)");
                        continue;
                    }

                    files.push((rel, path.to_path_buf()));
                }
                Err(e) => log::warn!("Failed to read entry: {e}"),
            }
        }

        // Deterministic ordering regardless of walk order
        files.sort_by(|a, b| a.0.cmp(&b.0));
        log::info!("Found {} files under {}", files.len(), self.root.display());
        files
    }

    /// Root-relative `/`-separated key for a path
    pub fn relative_key(&self, path: &Path) -> Option<String> {
        let rel = path.strip_prefix(&self.root).ok()?;
        let mut parts = Vec::new();
        for component in rel.components() {
            if let std::path::Component::Normal(name) = component {
                parts.push(name.to_str()?.to_string());
            }
        }
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("/"))
        }
    }

    fn is_ignored_scope(path: &Path, root: &Path) -> bool {
        if let Ok(relative) = path.strip_prefix(root) {
            for component in relative.components() {
                if let std::path::Component::Normal(name) = component {
                    let lowered = name.to_string_lossy().to_lowercase();
                    if IGNORED_SCOPES.iter().any(|ignored| ignored == &lowered) {
                        return true;
                    }
                }
            }
        }
        false
    }

    fn is_noise_file(path: &Path) -> bool {
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            if NOISE_FILE_NAMES
                .iter()
                .any(|candidate| name.eq_ignore_ascii_case(candidate))
            {
                return true;
            }
        }
        false
    }
}

/// Directories never worth indexing (tooling, caches, build output)
pub const IGNORED_SCOPES: &[&str] = &[
    // VCS / tooling
    ".git",
    ".hg",
    ".svn",
    ".idea",
    ".vscode",
    // our own snapshot cache
    ".repo-intel",
    // caches / builds
    ".cache",
    "node_modules",
    ".next",
    ".turbo",
    "build",
    "dist",
    "coverage",
    "target",
    ".venv",
    "venv",
    ".tox",
    ".pytest_cache",
    ".mypy_cache",
    "__pycache__",
    // data / vendor
    "vendor",
    "third_party",
    "third-party",
];

const NOISE_FILE_NAMES: &[&str] = &[
    ".gitignore",
    ".gitmodules",
    "package-lock.json",
    "pnpm-lock.yaml",
    "yarn.lock",
    "go.sum",
];

const MAX_FILE_SIZE_BYTES: u64 = 1_048_576; // 1 MB
