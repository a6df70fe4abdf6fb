use crate::types::DependencyGraph;
use repo_intel_analyzer::FileNode;
use std::collections::{BTreeMap, BTreeSet};

/// Tunable knobs for importance scoring and entry-point/test detection.
///
/// The naming conventions are deliberately configuration, not constants: the
/// right "main" convention differs between a Python package, a Go module and
/// a JS workspace.
#[derive(Debug, Clone)]
pub struct ScorerConfig {
    /// Flat additive bonus for detected entry points
    pub entry_point_bonus: f32,

    /// Flat penalty for test files (deprioritized, never excluded)
    pub test_penalty: f32,

    /// File names treated as entry points regardless of graph shape
    pub entry_point_names: Vec<String>,

    /// File-stem prefixes marking test files
    pub test_name_prefixes: Vec<String>,

    /// File-stem suffixes marking test files
    pub test_name_suffixes: Vec<String>,

    /// Directory names whose contents are test files
    pub test_dir_names: Vec<String>,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            entry_point_bonus: 0.25,
            test_penalty: 0.15,
            entry_point_names: [
                "main.py",
                "__main__.py",
                "cli.py",
                "app.py",
                "main.go",
                "main.js",
                "main.ts",
                "index.js",
                "index.ts",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            test_name_prefixes: vec!["test_".to_string()],
            test_name_suffixes: vec![
                "_test".to_string(),
                ".test".to_string(),
                ".spec".to_string(),
            ],
            test_dir_names: vec![
                "tests".to_string(),
                "test".to_string(),
                "__tests__".to_string(),
            ],
        }
    }
}

impl ScorerConfig {
    /// Check a path against the test-file naming conventions
    pub fn is_test_path(&self, path: &str) -> bool {
        if path
            .split('/')
            .any(|component| self.test_dir_names.iter().any(|d| d == component))
        {
            return true;
        }

        let stem = file_stem(path);
        self.test_name_prefixes.iter().any(|p| stem.starts_with(p.as_str()))
            || self.test_name_suffixes.iter().any(|s| stem.ends_with(s.as_str()))
    }

    /// Check a path against the entry-point naming conventions
    pub fn is_entry_point_name(&self, path: &str) -> bool {
        let name = file_name(path);
        self.entry_point_names.iter().any(|n| n == name)
    }
}

/// Files with no incoming internal edges but real outgoing edges, plus
/// anything matching the configured "main" naming convention.
pub fn detect_entry_points(
    graph: &DependencyGraph,
    file_nodes: &BTreeMap<String, FileNode>,
    config: &ScorerConfig,
) -> Vec<String> {
    file_nodes
        .keys()
        .filter(|path| {
            config.is_entry_point_name(path)
                || (!config.is_test_path(path)
                    && graph.in_degree(path) == 0
                    && graph.out_degree(path) > 0)
        })
        .cloned()
        .collect()
}

/// Files matching the configured test naming conventions
pub fn detect_test_files(
    file_nodes: &BTreeMap<String, FileNode>,
    config: &ScorerConfig,
) -> Vec<String> {
    file_nodes
        .keys()
        .filter(|path| config.is_test_path(path))
        .cloned()
        .collect()
}

/// Assigns each file a relative importance in [0, 1].
///
/// The base score is normalized in-degree, so the score is monotonically
/// non-decreasing both in the number of dependents and in entry-point
/// membership.
pub struct ImportanceScorer {
    config: ScorerConfig,
}

impl ImportanceScorer {
    pub fn new(config: ScorerConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(ScorerConfig::default())
    }

    pub fn config(&self) -> &ScorerConfig {
        &self.config
    }

    /// Score every file in the map
    pub fn score(
        &self,
        graph: &DependencyGraph,
        file_nodes: &BTreeMap<String, FileNode>,
        entry_points: &[String],
        test_files: &[String],
    ) -> BTreeMap<String, f32> {
        let entries: BTreeSet<&str> = entry_points.iter().map(String::as_str).collect();
        let tests: BTreeSet<&str> = test_files.iter().map(String::as_str).collect();

        file_nodes
            .keys()
            .map(|path| {
                (
                    path.clone(),
                    self.score_one(path, graph, file_nodes.len(), &entries, &tests),
                )
            })
            .collect()
    }

    /// Recompute only the scores of `affected` paths after a localized graph
    /// change. Full rescoring stays available as the correctness fallback for
    /// structural changes (file count shifts move every denominator).
    pub fn rescore(
        &self,
        scores: &mut BTreeMap<String, f32>,
        affected: &BTreeSet<String>,
        graph: &DependencyGraph,
        file_nodes: &BTreeMap<String, FileNode>,
        entry_points: &[String],
        test_files: &[String],
    ) {
        let entries: BTreeSet<&str> = entry_points.iter().map(String::as_str).collect();
        let tests: BTreeSet<&str> = test_files.iter().map(String::as_str).collect();

        for path in affected {
            if file_nodes.contains_key(path) {
                scores.insert(
                    path.clone(),
                    self.score_one(path, graph, file_nodes.len(), &entries, &tests),
                );
            } else {
                scores.remove(path);
            }
        }
    }

    fn score_one(
        &self,
        path: &str,
        graph: &DependencyGraph,
        total_files: usize,
        entries: &BTreeSet<&str>,
        tests: &BTreeSet<&str>,
    ) -> f32 {
        let mut score = if total_files > 1 {
            graph.in_degree(path) as f32 / (total_files - 1) as f32
        } else {
            0.0
        };

        if entries.contains(path) {
            score += self.config.entry_point_bonus;
        }
        if tests.contains(path) {
            score -= self.config.test_penalty;
        }

        score.clamp(0.0, 1.0)
    }

    /// Order files by score descending.
    ///
    /// Ties break toward the file with fewer lines (smaller, more focused
    /// files win when the token budget is tight), then lexicographically, so
    /// the ranking is stable across runs given identical inputs.
    pub fn rank(
        &self,
        scores: &BTreeMap<String, f32>,
        file_nodes: &BTreeMap<String, FileNode>,
    ) -> Vec<(String, f32)> {
        let lines = |path: &str| file_nodes.get(path).map_or(0, |n| n.lines);

        let mut ranked: Vec<(String, f32)> =
            scores.iter().map(|(p, s)| (p.clone(), *s)).collect();
        ranked.sort_by(|a, b| {
            b.1.total_cmp(&a.1)
                .then_with(|| lines(&a.0).cmp(&lines(&b.0)))
                .then_with(|| a.0.cmp(&b.0))
        });
        ranked
    }
}

fn file_name(path: &str) -> &str {
    path.rsplit_once('/').map(|(_, name)| name).unwrap_or(path)
}

fn file_stem(path: &str) -> &str {
    let name = file_name(path);
    name.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(name)
}
