use repo_intel_graph::ScorerConfig;

/// Knobs for repository scanning and caching.
///
/// Everything the source material leaves "configurable" is an explicit field
/// here rather than a hard-coded constant, so multiple independent mapper
/// instances can coexist in one process (and one test run).
#[derive(Debug, Clone)]
pub struct MapperConfig {
    /// Extra `.gitignore`-style globs excluded from scanning, one per entry
    pub ignore_patterns: Vec<String>,

    /// Directory (under the root) holding the on-disk snapshot
    pub cache_dir_name: String,

    /// Per-file analyses slower than this are logged, never failed
    pub slow_parse_warn_ms: u64,

    /// Capacity of the content-hash-keyed analysis cache
    pub analysis_cache_size: usize,

    /// Upper bound on worker concurrency; 0 means "available parallelism"
    pub max_workers: usize,

    /// Entry-point/test-file conventions and score weights
    pub scorer: ScorerConfig,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            ignore_patterns: Vec::new(),
            cache_dir_name: ".repo-intel".to_string(),
            slow_parse_warn_ms: 2_000,
            analysis_cache_size: 2_048,
            max_workers: 0,
            scorer: ScorerConfig::default(),
        }
    }
}

impl MapperConfig {
    /// Effective worker-pool size, bounded by available CPU cores
    pub fn worker_count(&self) -> usize {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        if self.max_workers == 0 {
            cores
        } else {
            self.max_workers.min(cores).max(1)
        }
    }
}
