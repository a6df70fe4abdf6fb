//! # Repo Intel Graph
//!
//! File-level dependency graph and importance scoring.
//!
//! ## Pipeline
//!
//! ```text
//! FileNode imports
//!     │
//!     ├──> Import Resolution (per-language rules)
//!     │      ├─> internal edge (path -> path)
//!     │      └─> external dependency (side set)
//!     │
//!     ├──> Cycle Detection (SCCs; reported, never fatal)
//!     │
//!     └──> Importance Scoring
//!            ├─> normalized in-degree base
//!            ├─> entry-point bonus
//!            └─> test-file penalty
//! ```
//!
//! The graph is an adjacency mapping keyed by file paths, so cycles are data,
//! not a memory-management problem, and single-file updates touch only the
//! affected edges.

mod builder;
mod scorer;
mod types;

pub use builder::{detect_cycles, resolve_import, DependencyGraphBuilder};
pub use scorer::{detect_entry_points, detect_test_files, ImportanceScorer, ScorerConfig};
pub use types::DependencyGraph;
