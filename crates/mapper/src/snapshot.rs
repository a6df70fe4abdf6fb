use crate::map::RepositoryMap;
use std::path::Path;

pub const SNAPSHOT_SCHEMA_VERSION: u32 = 1;
const SNAPSHOT_FILE_NAME: &str = "map.json";

/// On-disk snapshot of a `RepositoryMap`, keyed by its aggregate hash.
///
/// The snapshot is an optimization only: corrupted, mismatched, or
/// version-skewed snapshots are discarded silently in favor of a fresh scan.
#[derive(serde::Serialize, serde::Deserialize)]
struct Snapshot {
    schema_version: u32,
    aggregate_hash: u64,
    map: RepositoryMap,
}

/// Snapshot location inside the cache directory
pub fn snapshot_path(cache_dir: &Path) -> std::path::PathBuf {
    cache_dir.join(SNAPSHOT_FILE_NAME)
}

/// Persist the map. Failures are logged and swallowed; a missing snapshot
/// only costs the next process start a full scan.
pub fn save_snapshot(cache_dir: &Path, map: &RepositoryMap) {
    let snapshot = Snapshot {
        schema_version: SNAPSHOT_SCHEMA_VERSION,
        aggregate_hash: map.aggregate_hash,
        map: map.clone(),
    };

    let path = snapshot_path(cache_dir);
    let result = std::fs::create_dir_all(cache_dir)
        .map_err(|e| e.to_string())
        .and_then(|()| serde_json::to_vec(&snapshot).map_err(|e| e.to_string()))
        .and_then(|bytes| std::fs::write(&path, bytes).map_err(|e| e.to_string()));

    match result {
        Ok(()) => log::debug!("Saved snapshot to {}", path.display()),
        Err(e) => log::warn!("Failed to save snapshot {}: {e}", path.display()),
    }
}

/// Load the snapshot when its stored key matches `expected_hash`
/// (the aggregate hash recomputed from the live tree).
pub fn load_snapshot(cache_dir: &Path, expected_hash: u64) -> Option<RepositoryMap> {
    let path = snapshot_path(cache_dir);
    let bytes = std::fs::read(&path).ok()?;

    let snapshot: Snapshot = match serde_json::from_slice(&bytes) {
        Ok(s) => s,
        Err(e) => {
            log::warn!("Discarding corrupt snapshot {}: {e}", path.display());
            return None;
        }
    };

    if snapshot.schema_version != SNAPSHOT_SCHEMA_VERSION {
        log::warn!(
            "Discarding snapshot {} (schema {} != {})",
            path.display(),
            snapshot.schema_version,
            SNAPSHOT_SCHEMA_VERSION
        );
        return None;
    }
    if snapshot.aggregate_hash != expected_hash || snapshot.map.aggregate_hash != expected_hash {
        log::info!("Snapshot {} is stale; rescanning", path.display());
        return None;
    }

    log::info!("Loaded repository map from snapshot {}", path.display());
    Some(snapshot.map)
}
