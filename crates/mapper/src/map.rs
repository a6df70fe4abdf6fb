use crate::diagnostics::Diagnostic;
use crate::watermark::FsWatermark;
use repo_intel_analyzer::FileNode;
use repo_intel_graph::DependencyGraph;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

/// Complete structural picture of one repository.
///
/// Created by a full scan, mutated in place by incremental updates, and
/// replaced wholesale only on an explicit rescan. All other structural
/// entities are owned transitively through it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RepositoryMap {
    /// Absolute root path as given to the mapper
    pub root_path: String,

    /// Every file seen by the scanner, unreadable ones included
    pub total_files: usize,

    /// Sum of line counts over readable files
    pub total_lines: usize,

    /// language tag -> file count
    pub languages: BTreeMap<String, usize>,

    /// path -> structural summary; BTreeMap keeps ordering lexicographic
    /// so two scans of an unchanged tree serialize byte-identically
    pub modules: BTreeMap<String, FileNode>,

    /// File-level dependency edges, cycles, and external imports
    pub graph: DependencyGraph,

    /// path -> importance in [0, 1]
    pub scores: BTreeMap<String, f32>,

    /// Detected entry-point files
    pub entry_points: Vec<String>,

    /// Detected test files
    pub test_files: Vec<String>,

    /// Unix milliseconds when this map (or its last update) was produced
    pub generated_at_ms: u64,

    /// Whole-map content key; the snapshot cache is keyed by this
    pub aggregate_hash: u64,

    /// Filesystem state the map was derived from
    pub watermark: FsWatermark,

    /// Accumulated per-file and per-edge issues
    pub diagnostics: Vec<Diagnostic>,
}

impl RepositoryMap {
    /// Last path component of the root, for display headers
    pub fn project_name(&self) -> &str {
        self.root_path
            .trim_end_matches(['/', '\\'])
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(&self.root_path)
    }

    /// Importance score for a path (0 when unknown)
    pub fn score_of(&self, path: &str) -> f32 {
        self.scores.get(path).copied().unwrap_or(0.0)
    }

    /// Languages sorted by file count descending, then name
    pub fn top_languages(&self) -> Vec<(&str, usize)> {
        let mut langs: Vec<(&str, usize)> = self
            .languages
            .iter()
            .map(|(lang, count)| (lang.as_str(), *count))
            .collect();
        langs.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        langs
    }

    /// Recompute the derived totals from `modules` after a mutation.
    ///
    /// `unreadable` is the count of scanned files that produced no node.
    pub fn refresh_totals(&mut self, unreadable: usize) {
        self.total_files = self.modules.len() + unreadable;
        self.total_lines = self.modules.values().map(|n| n.lines).sum();
        self.languages.clear();
        for node in self.modules.values() {
            *self.languages.entry(node.language.clone()).or_insert(0) += 1;
        }
        self.aggregate_hash = aggregate_hash(&self.modules, &self.diagnostics);
    }

    /// Count of unreadable files currently recorded in diagnostics
    pub fn unreadable_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| matches!(d, Diagnostic::Unreadable { .. }))
            .count()
    }
}

/// Whole-map content key: hashes every (path, content-hash) pair in
/// deterministic order, plus the unreadable file set.
pub fn aggregate_hash(modules: &BTreeMap<String, FileNode>, diagnostics: &[Diagnostic]) -> u64 {
    let hashes: BTreeMap<String, u64> = modules
        .iter()
        .map(|(path, node)| (path.clone(), node.content_hash))
        .collect();
    let unreadable: Vec<String> = diagnostics
        .iter()
        .filter_map(|d| match d {
            Diagnostic::Unreadable { path } => Some(path.clone()),
            _ => None,
        })
        .collect();
    aggregate_hash_from_parts(&hashes, &unreadable)
}

/// Same key computed from bare (path, content-hash) pairs, so a snapshot can
/// be validated against the live tree without parsing anything.
pub fn aggregate_hash_from_parts(hashes: &BTreeMap<String, u64>, unreadable: &[String]) -> u64 {
    let mut hasher = DefaultHasher::new();
    for (path, content_hash) in hashes {
        path.hash(&mut hasher);
        content_hash.hash(&mut hasher);
    }
    let mut unreadable: Vec<&str> = unreadable.iter().map(String::as_str).collect();
    unreadable.sort_unstable();
    unreadable.dedup();
    for path in unreadable {
        path.hash(&mut hasher);
    }
    hasher.finish()
}
