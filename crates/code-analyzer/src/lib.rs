//! # Repo Intel Analyzer
//!
//! Language-aware structural analysis of single source files.
//!
//! ## Pipeline
//!
//! ```text
//! File text
//!     │
//!     ├──> Language Detection (from extension)
//!     │
//!     ├──> Tree-sitter Parsing → AST (error-tolerant)
//!     │
//!     └──> Structural Extraction
//!          ├─> Function/class signatures with doc summaries
//!          ├─> Cyclomatic complexity (decision points + 1)
//!          └─> Raw import strings (resolution happens in the graph layer)
//! ```
//!
//! Files with syntax errors still produce a best-effort `FileNode` tagged
//! `partial: true`; unrecognized extensions produce a zero-signature node so
//! repository totals stay accurate.
//!
//! ## Example
//!
//! ```rust
//! use repo_intel_analyzer::analyze_source;
//!
//! let code = "def greet(name):\n    return f\"hi {name}\"\n";
//! let node = analyze_source("src/greet.py", code, 0).unwrap();
//!
//! assert_eq!(node.language, "python");
//! assert_eq!(node.functions[0].name, "greet");
//! ```

mod analyzer;
mod error;
mod language;
mod types;

pub use analyzer::{analyze_source, decode_utf8, FileAnalyzer};
pub use error::{AnalyzerError, Result};
pub use language::Language;
pub use types::{content_fingerprint, ClassSignature, FileNode, FunctionSignature};
