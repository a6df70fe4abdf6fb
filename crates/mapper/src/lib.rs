//! # Repo Intel Mapper
//!
//! Repository scanning, caching, and incremental updates.
//!
//! ## Pipeline
//!
//! ```text
//! Directory
//!     │
//!     ├──> File Scanner (.gitignore aware + configurable globs)
//!     │      └─> Candidate files
//!     │
//!     ├──> Bounded worker pool (join barrier)
//!     │      └─> FileNode per file
//!     │
//!     └──> Merge under a write lock
//!            ├─> Dependency graph + cycles
//!            ├─> Entry points / test files / importance scores
//!            └─> RepositoryMap (+ optional disk snapshot)
//! ```
//!
//! The map cache is explicit process-scoped state owned by a
//! `RepositoryMapper` instance, so multiple independent mappers can coexist
//! in a single test run.
//!
//! ## Example
//!
//! ```no_run
//! use repo_intel_mapper::{MapperConfig, RepositoryMapper};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mapper = RepositoryMapper::new("/path/to/project", MapperConfig::default())?;
//!     let map = mapper.scan_repository().await?;
//!
//!     println!("Indexed {} files, {} lines", map.total_files, map.total_lines);
//!     Ok(())
//! }
//! ```

mod config;
mod diagnostics;
mod error;
mod map;
mod mapper;
mod scanner;
mod snapshot;
mod watcher;
mod watermark;

pub use config::MapperConfig;
pub use diagnostics::Diagnostic;
pub use error::{MapperError, Result};
pub use map::{aggregate_hash, aggregate_hash_from_parts, RepositoryMap};
pub use mapper::{RepositoryMapper, ScanCancel};
pub use scanner::FileScanner;
pub use snapshot::{load_snapshot, save_snapshot, snapshot_path, SNAPSHOT_SCHEMA_VERSION};
pub use watcher::MapWatcher;
pub use watermark::{compute_watermark, mtime_ms, FsWatermark};
