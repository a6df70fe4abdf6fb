//! # Repo Intel Context
//!
//! Token-bounded context assembly on top of the repository map.
//!
//! ## Pipeline
//!
//! ```text
//! (operation, target?, token budget)
//!     │
//!     ├──> Freshness gate (incremental map update when stale)
//!     │
//!     ├──> Candidate selection
//!     │      ├─> BFS from target within hop limit, or
//!     │      └─> top-N by importance (no target)
//!     │
//!     ├──> Skeleton rendering (signatures + doc lines, no bodies)
//!     │
//!     └──> Greedy packing under the budget
//!            └─> project header + file sections + external deps
//! ```
//!
//! This crate is the subsystem's only outward surface: the chat/command
//! layer and the auto-healing loop call [`ContextProvider::get_context`] and
//! receive a single string.
//!
//! ## Example
//!
//! ```no_run
//! use repo_intel_context::{ContextProvider, OperationKind};
//! use repo_intel_mapper::{MapperConfig, RepositoryMapper};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mapper = Arc::new(RepositoryMapper::new(".", MapperConfig::default())?);
//!     let provider = ContextProvider::new(mapper);
//!
//!     let result = provider
//!         .get_context(OperationKind::Generate, None, 4_000)
//!         .await?;
//!     println!("{}", result.context);
//!     Ok(())
//! }
//! ```

mod budget;
mod budgeter;
mod error;
mod provider;
mod skeleton;

pub use budget::{BudgeterConfig, ContextBudget, OperationKind, TokenEstimator};
pub use budgeter::{Section, Selection, TokenBudgeter};
pub use error::{ContextError, Result};
pub use provider::{ContextProvider, ContextResult};
pub use skeleton::{render_single_line, render_skeleton, truncate_to_fit};
