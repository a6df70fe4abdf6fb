use crate::error::{MapperError, Result};
use crate::mapper::RepositoryMapper;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

/// Watches the repository root and feeds debounced change events into
/// `RepositoryMapper::update_on_file_change`.
///
/// Dropping the watcher stops event delivery; the forwarding thread exits
/// once the channel disconnects.
pub struct MapWatcher {
    _watcher: RecommendedWatcher,
    _thread: std::thread::JoinHandle<()>,
}

impl MapWatcher {
    /// Start watching. Must be called from within a tokio runtime; updates
    /// are applied on that runtime.
    pub fn start(mapper: Arc<RepositoryMapper>, debounce_ms: u64) -> Result<Self> {
        let handle = tokio::runtime::Handle::current();
        let (tx, rx) = mpsc::channel::<notify::Result<notify::Event>>();

        let mut watcher = notify::recommended_watcher(move |event| {
            // A full channel or gone receiver just means we are shutting down
            let _ = tx.send(event);
        })
        .map_err(|e| MapperError::watch(e.to_string()))?;

        watcher
            .watch(mapper.root(), RecursiveMode::Recursive)
            .map_err(|e| MapperError::watch(e.to_string()))?;
        log::info!("Watching {} for changes", mapper.root().display());

        let cache_dir = mapper.root().join(&mapper.config().cache_dir_name);
        let thread = std::thread::spawn(move || {
            forward_events(&mapper, &handle, &rx, debounce_ms, &cache_dir);
        });

        Ok(Self {
            _watcher: watcher,
            _thread: thread,
        })
    }
}

/// Collect events until the debounce window closes, then apply the batch
fn forward_events(
    mapper: &RepositoryMapper,
    handle: &tokio::runtime::Handle,
    rx: &mpsc::Receiver<notify::Result<notify::Event>>,
    debounce_ms: u64,
    cache_dir: &Path,
) {
    while let Ok(first) = rx.recv() {
        let mut pending = BTreeSet::new();
        collect_paths(first, &mut pending, cache_dir);

        // Keep absorbing events until the tree goes quiet
        while let Ok(more) = rx.recv_timeout(Duration::from_millis(debounce_ms)) {
            collect_paths(more, &mut pending, cache_dir);
        }

        for path in pending {
            if let Err(e) = handle.block_on(mapper.update_on_file_change(&path)) {
                log::warn!("Failed to apply change for {}: {e}", path.display());
            }
        }
    }
}

fn collect_paths(
    event: notify::Result<notify::Event>,
    pending: &mut BTreeSet<PathBuf>,
    cache_dir: &Path,
) {
    match event {
        Ok(event) => {
            for path in event.paths {
                if path.starts_with(cache_dir) || path.is_dir() {
                    continue;
                }
                pending.insert(path);
            }
        }
        Err(e) => log::warn!("Watch event error: {e}"),
    }
}
