use crate::config::MapperConfig;
use crate::diagnostics::Diagnostic;
use crate::error::{MapperError, Result};
use crate::map::{aggregate_hash_from_parts, RepositoryMap};
use crate::scanner::FileScanner;
use crate::snapshot::{load_snapshot, save_snapshot};
use crate::watermark::{compute_watermark, mtime_ms};
use lru::LruCache;
use repo_intel_analyzer::{analyze_source, content_fingerprint, decode_utf8, FileNode};
use repo_intel_graph::{
    detect_entry_points, detect_test_files, DependencyGraphBuilder, ImportanceScorer,
};
use std::collections::{BTreeMap, BTreeSet};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::{RwLock, Semaphore};
use tokio::task::JoinSet;

/// Cooperative cancellation flag for long scans.
///
/// In-flight workers finish their current file (parsing is not preemptible
/// mid-file), no further files are dispatched, and the partial map is
/// discarded.
#[derive(Debug, Clone, Default)]
pub struct ScanCancel(Arc<AtomicBool>);

impl ScanCancel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Outcome of analyzing one file
enum Analysis {
    Node(Box<FileNode>),
    Unreadable(String),
}

type AnalysisCache = Mutex<LruCache<(String, u64), FileNode>>;

/// High-level repository analysis orchestrator.
///
/// Owns the long-lived `RepositoryMap` behind a read-write lock: parsing
/// happens entirely outside the lock, writers take it only for the short
/// merge/swap step, and readers receive an `Arc` snapshot that stays
/// consistent for as long as they hold it.
pub struct RepositoryMapper {
    root: PathBuf,
    config: MapperConfig,
    scorer: ImportanceScorer,
    state: RwLock<Option<Arc<RepositoryMap>>>,
    analysis_cache: Arc<AnalysisCache>,
}

impl RepositoryMapper {
    /// Create a mapper for a repository root.
    ///
    /// An unreadable or missing root is the one fatal condition in this
    /// subsystem.
    pub fn new(root: impl AsRef<Path>, config: MapperConfig) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let meta = std::fs::metadata(&root).map_err(|e| {
            MapperError::root_unavailable(format!("{}: {e}", root.display()))
        })?;
        if !meta.is_dir() {
            return Err(MapperError::root_unavailable(format!(
                "{} is not a directory",
                root.display()
            )));
        }

        let capacity = NonZeroUsize::new(config.analysis_cache_size.max(1))
            .unwrap_or(NonZeroUsize::MIN);
        let scorer = ImportanceScorer::new(config.scorer.clone());

        Ok(Self {
            root,
            config,
            scorer,
            state: RwLock::new(None),
            analysis_cache: Arc::new(Mutex::new(LruCache::new(capacity))),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &MapperConfig {
        &self.config
    }

    fn cache_dir(&self) -> PathBuf {
        self.root.join(&self.config.cache_dir_name)
    }

    /// The current in-memory map, if a scan has completed
    pub async fn current_map(&self) -> Option<Arc<RepositoryMap>> {
        self.state.read().await.clone()
    }

    /// Full repository scan (snapshot-accelerated)
    pub async fn scan_repository(&self) -> Result<Arc<RepositoryMap>> {
        self.scan_with_cancel(&ScanCancel::new()).await
    }

    /// Full repository scan honoring a cancellation flag.
    ///
    /// The scan either completes fully or is abandoned; a cancelled scan
    /// never exposes a partially-merged map to readers.
    pub async fn scan_with_cancel(&self, cancel: &ScanCancel) -> Result<Arc<RepositoryMap>> {
        if !self.root.is_dir() {
            return Err(MapperError::root_unavailable(
                self.root.display().to_string(),
            ));
        }

        let scanner = FileScanner::new(&self.root, &self.config.ignore_patterns)?;
        let files = scanner.scan();

        // Snapshot short-circuit: validating costs file reads, not parses
        let (live_hashes, live_unreadable) = live_parts(&files);
        let expected = aggregate_hash_from_parts(&live_hashes, &live_unreadable);
        if let Some(map) = load_snapshot(&self.cache_dir(), expected) {
            let map = Arc::new(map);
            *self.state.write().await = Some(map.clone());
            return Ok(map);
        }

        let started = Instant::now();
        let watermark = compute_watermark(&self.root);
        let (nodes, diagnostics) = self.analyze_files(&files, cancel).await?;
        let mut map = RepositoryMap {
            root_path: self.root.display().to_string(),
            modules: nodes,
            diagnostics,
            watermark,
            ..Default::default()
        };
        self.finish_map(&mut map, true);
        log::info!(
            "Scanned {} files ({} lines) in {} ms",
            map.total_files,
            map.total_lines,
            started.elapsed().as_millis()
        );

        let map = Arc::new(map);
        *self.state.write().await = Some(map.clone());
        save_snapshot(&self.cache_dir(), &map);
        Ok(map)
    }

    /// Re-analyze exactly one file after an external change notification.
    ///
    /// Content edits update only the file's own node, its outgoing edges and
    /// the scores reachable from the change; additions and removals fall
    /// back to a full graph rebuild and rescore, which is the documented
    /// correctness fallback for structural changes.
    pub async fn update_on_file_change(
        &self,
        file_path: impl AsRef<Path>,
    ) -> Result<Arc<RepositoryMap>> {
        let map = self.apply_file_change(file_path.as_ref()).await?;
        save_snapshot(&self.cache_dir(), &map);
        Ok(map)
    }

    /// Return a fresh map for context assembly, scanning or incrementally
    /// updating first when the filesystem has moved since the last look.
    pub async fn ensure_fresh(&self) -> Result<Arc<RepositoryMap>> {
        let Some(map) = self.current_map().await else {
            return self.scan_repository().await;
        };

        let live = compute_watermark(&self.root);
        if live == map.watermark {
            return Ok(map);
        }
        log::debug!("Filesystem watermark moved; refreshing changed files");

        let scanner = FileScanner::new(&self.root, &self.config.ignore_patterns)?;
        let files = scanner.scan();
        let live_keys: BTreeSet<&String> = files.iter().map(|(rel, _)| rel).collect();

        // Removed files first, then changed/added ones. Unreadable files
        // live only in diagnostics, so their paths are swept as well.
        let mut removed: BTreeSet<String> = map
            .modules
            .keys()
            .filter(|path| !live_keys.contains(path))
            .cloned()
            .collect();
        removed.extend(
            map.diagnostics
                .iter()
                .map(|d| d.path().to_string())
                .filter(|path| !live_keys.contains(&path)),
        );
        for rel in removed {
            self.apply_file_change(&self.root.join(&rel)).await?;
        }

        let current = self.current_map().await.unwrap_or(map);
        for (rel, abs) in &files {
            let known_mtime = current.modules.get(rel).map(|n| n.mtime_ms);
            if known_mtime != Some(mtime_ms(abs)) {
                self.apply_file_change(abs).await?;
            }
        }

        // Stamp the watermark even when nothing indexed actually changed
        let mut stamped = self
            .current_map()
            .await
            .map(|m| (*m).clone())
            .unwrap_or_default();
        stamped.watermark = compute_watermark(&self.root);
        let stamped = Arc::new(stamped);
        *self.state.write().await = Some(stamped.clone());
        save_snapshot(&self.cache_dir(), &stamped);
        Ok(stamped)
    }

    /// Root-relative `/`-separated key for a user-supplied path
    pub fn relative_key(&self, path: &Path) -> Option<String> {
        let rel = if path.is_absolute() {
            path.strip_prefix(&self.root).ok()?
        } else {
            path
        };
        let mut parts = Vec::new();
        for component in rel.components() {
            match component {
                std::path::Component::Normal(name) => parts.push(name.to_str()?.to_string()),
                std::path::Component::CurDir => {}
                _ => return None,
            }
        }
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("/"))
        }
    }

    // ----- internals -----

    /// Bounded-parallel per-file analysis with a join barrier.
    ///
    /// No shared mutable state is touched while parsing; every worker
    /// produces an independent `FileNode` that is merged only after all
    /// workers complete, so the merged ordering is deterministic.
    async fn analyze_files(
        &self,
        files: &[(String, PathBuf)],
        cancel: &ScanCancel,
    ) -> Result<(BTreeMap<String, FileNode>, Vec<Diagnostic>)> {
        let semaphore = Arc::new(Semaphore::new(self.config.worker_count()));
        let mut join_set: JoinSet<Analysis> = JoinSet::new();
        let mut cancelled = false;

        for (rel, abs) in files.iter().cloned() {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| MapperError::other(format!("worker pool closed: {e}")))?;
            let slow_warn_ms = self.config.slow_parse_warn_ms;
            let cache = self.analysis_cache.clone();
            join_set.spawn_blocking(move || {
                let _permit = permit;
                analyze_one(&rel, &abs, slow_warn_ms, &cache)
            });
        }

        // Join barrier: in-flight workers finish even when cancelled
        let mut nodes = BTreeMap::new();
        let mut diagnostics = Vec::new();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(Analysis::Node(node)) => {
                    if node.partial {
                        diagnostics.push(Diagnostic::PartialParse {
                            path: node.path.clone(),
                        });
                    }
                    nodes.insert(node.path.clone(), *node);
                }
                Ok(Analysis::Unreadable(path)) => {
                    diagnostics.push(Diagnostic::Unreadable { path });
                }
                Err(e) => {
                    return Err(MapperError::other(format!("analysis worker failed: {e}")))
                }
            }
        }

        if cancelled || cancel.is_cancelled() {
            log::info!("Scan cancelled; discarding partial results");
            return Err(MapperError::Cancelled);
        }
        Ok((nodes, diagnostics))
    }

    /// Rebuild everything derived from `modules` on a map under construction
    fn finish_map(&self, map: &mut RepositoryMap, rebuild_graph: bool) {
        if rebuild_graph {
            map.graph = DependencyGraphBuilder::build(&map.modules);
        }
        let graph = &map.graph;
        for (path, node) in map.modules.iter_mut() {
            node.dependencies = graph.dependencies_of(path);
        }

        map.entry_points = detect_entry_points(&map.graph, &map.modules, self.scorer.config());
        map.test_files = detect_test_files(&map.modules, self.scorer.config());
        map.scores = self
            .scorer
            .score(&map.graph, &map.modules, &map.entry_points, &map.test_files);

        sync_unresolved_diagnostics(map);
        map.diagnostics.sort();
        map.diagnostics.dedup();
        map.generated_at_ms = now_ms();
        map.refresh_totals(map.unreadable_count());
    }

    /// Parse (outside the lock) and merge one changed file
    async fn apply_file_change(&self, path: &Path) -> Result<Arc<RepositoryMap>> {
        let Some(rel) = self.relative_key(path) else {
            return Err(MapperError::other(format!(
                "{} is outside the repository root",
                path.display()
            )));
        };
        let abs = self.root.join(&rel);

        let analysis = if abs.is_file() {
            let slow_warn_ms = self.config.slow_parse_warn_ms;
            let cache = self.analysis_cache.clone();
            let rel_for_task = rel.clone();
            Some(
                tokio::task::spawn_blocking(move || {
                    analyze_one(&rel_for_task, &abs, slow_warn_ms, &cache)
                })
                .await
                .map_err(|e| MapperError::other(format!("analysis worker failed: {e}")))?,
            )
        } else {
            None
        };

        // Merge step: the write lock is held only from here on
        let mut state = self.state.write().await;
        let mut map = match state.as_ref() {
            Some(existing) => (**existing).clone(),
            None => RepositoryMap {
                root_path: self.root.display().to_string(),
                ..Default::default()
            },
        };

        let previously_known = map.modules.contains_key(&rel);
        map.diagnostics.retain(|d| d.path() != rel);

        match analysis {
            None => {
                // File removed
                map.modules.remove(&rel);
                if previously_known {
                    log::debug!("Removed {rel} from repository map");
                }
                self.finish_map(&mut map, true);
            }
            Some(Analysis::Unreadable(path)) => {
                map.modules.remove(&rel);
                map.diagnostics.push(Diagnostic::Unreadable { path });
                self.finish_map(&mut map, true);
            }
            Some(Analysis::Node(node)) => {
                if node.partial {
                    map.diagnostics.push(Diagnostic::PartialParse {
                        path: node.path.clone(),
                    });
                }

                if previously_known {
                    // Content edit: touch only this file's outgoing edges and
                    // the scores reachable from the change
                    let old_deps = map.graph.dependencies_of(&rel);
                    let changed = (*node).clone();
                    map.modules.insert(rel.clone(), *node);
                    DependencyGraphBuilder::update_file(&mut map.graph, &changed, &map.modules);

                    let graph = &map.graph;
                    for (path, module) in map.modules.iter_mut() {
                        module.dependencies = graph.dependencies_of(path);
                    }

                    let old_entries = map.entry_points.clone();
                    let old_tests = map.test_files.clone();
                    map.entry_points =
                        detect_entry_points(&map.graph, &map.modules, self.scorer.config());
                    map.test_files = detect_test_files(&map.modules, self.scorer.config());

                    if map.entry_points != old_entries || map.test_files != old_tests {
                        // Detection shifted under us: full rescore fallback
                        map.scores = self.scorer.score(
                            &map.graph,
                            &map.modules,
                            &map.entry_points,
                            &map.test_files,
                        );
                    } else {
                        let mut affected: BTreeSet<String> = old_deps;
                        affected.extend(map.graph.dependencies_of(&rel));
                        affected.insert(rel.clone());
                        self.scorer.rescore(
                            &mut map.scores,
                            &affected,
                            &map.graph,
                            &map.modules,
                            &map.entry_points,
                            &map.test_files,
                        );
                    }

                    sync_unresolved_diagnostics(&mut map);
                    map.diagnostics.sort();
                    map.diagnostics.dedup();
                    map.generated_at_ms = now_ms();
                    map.refresh_totals(map.unreadable_count());
                } else {
                    // Addition: other files' unresolved imports may now
                    // resolve here, so rebuild the graph (correctness
                    // fallback for structural changes)
                    map.modules.insert(rel.clone(), *node);
                    self.finish_map(&mut map, true);
                }
            }
        }

        map.watermark = compute_watermark(&self.root);
        let map = Arc::new(map);
        *state = Some(map.clone());
        Ok(map)
    }
}

/// Read, hash, decode, and analyze one file. Never fails the scan: IO and
/// decode problems degrade to an `Unreadable` record.
fn analyze_one(rel: &str, abs: &Path, slow_warn_ms: u64, cache: &AnalysisCache) -> Analysis {
    let started = Instant::now();

    let bytes = match std::fs::read(abs) {
        Ok(bytes) => bytes,
        Err(e) => {
            log::debug!("Unreadable {rel}: {e}");
            return Analysis::Unreadable(rel.to_string());
        }
    };
    let hash = content_fingerprint(&bytes);
    let mtime = mtime_ms(abs);

    // Unchanged content re-analyzes for free
    if let Ok(mut cache) = cache.lock() {
        if let Some(cached) = cache.get(&(rel.to_string(), hash)) {
            let mut node = cached.clone();
            node.mtime_ms = mtime;
            return Analysis::Node(Box::new(node));
        }
    }

    let text = match decode_utf8(rel, &bytes) {
        Ok(text) => text,
        Err(_) => {
            log::debug!("Unreadable {rel}: not valid UTF-8");
            return Analysis::Unreadable(rel.to_string());
        }
    };

    let node = match analyze_source(rel, text, mtime) {
        Ok(node) => node,
        Err(e) => {
            log::warn!("Analysis failed for {rel}: {e}");
            return Analysis::Unreadable(rel.to_string());
        }
    };

    let elapsed_ms = started.elapsed().as_millis() as u64;
    if elapsed_ms > slow_warn_ms {
        log::warn!("Slow analysis for {rel}: {elapsed_ms} ms");
    }

    if let Ok(mut cache) = cache.lock() {
        cache.put((rel.to_string(), hash), node.clone());
    }
    Analysis::Node(Box::new(node))
}

/// (path -> content hash, unreadable paths) for the live tree, read-only
fn live_parts(files: &[(String, PathBuf)]) -> (BTreeMap<String, u64>, Vec<String>) {
    let mut hashes = BTreeMap::new();
    let mut unreadable = Vec::new();

    for (rel, abs) in files {
        match std::fs::read(abs) {
            Ok(bytes) if std::str::from_utf8(&bytes).is_ok() => {
                hashes.insert(rel.clone(), content_fingerprint(&bytes));
            }
            _ => unreadable.push(rel.clone()),
        }
    }

    (hashes, unreadable)
}

/// Regenerate the unresolved-import diagnostics from the graph's external
/// side set, leaving the per-file Unreadable/PartialParse entries alone
fn sync_unresolved_diagnostics(map: &mut RepositoryMap) {
    map.diagnostics
        .retain(|d| !matches!(d, Diagnostic::UnresolvedImport { .. }));
    let paths: Vec<String> = map.modules.keys().cloned().collect();
    for path in paths {
        for import in map.graph.external_of(&path) {
            map.diagnostics.push(Diagnostic::UnresolvedImport {
                path: path.clone(),
                import,
            });
        }
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
