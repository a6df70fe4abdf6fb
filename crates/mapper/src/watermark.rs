use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::UNIX_EPOCH;
use walkdir::WalkDir;

/// Cheap filesystem fingerprint for staleness assessment.
///
/// Comparing watermarks costs one directory sweep with no file reads; a
/// mismatch triggers the per-file mtime/content-hash diff, a match lets
/// `ensure_fresh` return the cached map untouched.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FsWatermark {
    pub file_count: u64,
    pub max_mtime_ms: u64,
    pub total_bytes: u64,
}

/// Sweep the tree and compute the current watermark.
///
/// Hidden entries and the well-known tooling scopes are skipped so snapshot
/// writes into the cache directory do not invalidate the map they describe.
pub fn compute_watermark(root: &Path) -> FsWatermark {
    let mut mark = FsWatermark::default();

    let walker = WalkDir::new(root).into_iter().filter_entry(|entry| {
        let name = entry.file_name().to_string_lossy();
        if entry.depth() == 0 {
            return true;
        }
        if name.starts_with('.') {
            return false;
        }
        !crate::scanner::IGNORED_SCOPES.contains(&name.to_lowercase().as_str())
    });

    for entry in walker.flatten() {
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(meta) = entry.metadata() else {
            continue;
        };

        mark.file_count += 1;
        mark.total_bytes += meta.len();
        if let Ok(modified) = meta.modified() {
            if let Ok(elapsed) = modified.duration_since(UNIX_EPOCH) {
                mark.max_mtime_ms = mark.max_mtime_ms.max(elapsed.as_millis() as u64);
            }
        }
    }

    mark
}

/// Modification time of one file in unix milliseconds (0 when unavailable)
pub fn mtime_ms(path: &Path) -> u64 {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
