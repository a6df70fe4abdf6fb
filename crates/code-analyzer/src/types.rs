use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fmt;

/// Function metadata extracted from a syntax tree
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionSignature {
    /// Declared name
    pub name: String,

    /// Enclosing module path (dotted for Python, slash-relative otherwise)
    pub module_path: String,

    /// Start line (1-indexed)
    pub line_start: usize,

    /// End line (1-indexed, inclusive)
    pub line_end: usize,

    /// Ordered parameter names, with surface type annotations when present
    pub parameters: Vec<String>,

    /// Declared return type if the surface syntax carries one
    pub return_type: Option<String>,

    /// Doc comment / docstring, if present
    pub doc: Option<String>,

    /// Cyclomatic complexity (decision points + 1)
    pub complexity: u32,

    /// Async function / coroutine
    pub is_async: bool,

    /// Defined inside a class body
    pub is_method: bool,
}

impl FunctionSignature {
    /// First line of the doc comment, for skeleton rendering
    pub fn doc_summary(&self) -> Option<&str> {
        self.doc
            .as_deref()
            .and_then(|d| d.lines().find(|l| !l.trim().is_empty()))
            .map(str::trim)
    }
}

impl fmt::Display for FunctionSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_async {
            write!(f, "async ")?;
        }
        write!(f, "{}({})", self.name, self.parameters.join(", "))?;
        if let Some(ret) = &self.return_type {
            write!(f, " -> {ret}")?;
        }
        Ok(())
    }
}

/// Class (or struct/interface) metadata extracted from a syntax tree
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClassSignature {
    /// Declared name
    pub name: String,

    /// Enclosing module path
    pub module_path: String,

    /// Start line (1-indexed)
    pub line_start: usize,

    /// End line (1-indexed, inclusive)
    pub line_end: usize,

    /// Ordered base-type names
    pub bases: Vec<String>,

    /// Ordered method signatures
    pub methods: Vec<FunctionSignature>,

    /// Doc comment / docstring, if present
    pub doc: Option<String>,
}

impl fmt::Display for ClassSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "class {}", self.name)?;
        if !self.bases.is_empty() {
            write!(f, "({})", self.bases.join(", "))?;
        }
        Ok(())
    }
}

/// File-level structural summary
///
/// `dependencies` holds resolved paths of other indexed files as plain
/// strings (back-references only); the graph layer owns the edge structure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileNode {
    /// Path relative to the repository root, `/`-separated (unique key)
    pub path: String,

    /// Detected language tag
    pub language: String,

    /// Total line count
    pub lines: usize,

    /// Top-level functions, in source order
    pub functions: Vec<FunctionSignature>,

    /// Top-level classes, in source order
    pub classes: Vec<ClassSignature>,

    /// Raw import strings, in source order, deduplicated
    pub imports: Vec<String>,

    /// Resolved internal dependency paths (filled by the graph builder)
    #[serde(default)]
    pub dependencies: BTreeSet<String>,

    /// Content fingerprint for change detection
    pub content_hash: u64,

    /// Modification time of the file when scanned, in unix milliseconds
    pub mtime_ms: u64,

    /// Syntax errors were present; signatures are best-effort
    #[serde(default)]
    pub partial: bool,
}

impl FileNode {
    /// Create an empty node for a file we could not structurally analyze
    pub fn basic(path: impl Into<String>, language: &str, lines: usize, mtime_ms: u64) -> Self {
        Self {
            path: path.into(),
            language: language.to_string(),
            lines,
            functions: Vec::new(),
            classes: Vec::new(),
            imports: Vec::new(),
            dependencies: BTreeSet::new(),
            content_hash: 0,
            mtime_ms,
            partial: false,
        }
    }

    /// Total number of extracted signatures (functions + methods + classes)
    pub fn symbol_count(&self) -> usize {
        self.functions.len()
            + self.classes.len()
            + self.classes.iter().map(|c| c.methods.len()).sum::<usize>()
    }
}

/// Stable 64-bit fingerprint of file contents.
///
/// Truncated SHA-256 so fingerprints are reproducible across platforms and
/// process restarts, which the snapshot cache relies on.
#[must_use]
pub fn content_fingerprint(content: &[u8]) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(content);
    let digest = hasher.finalize();
    u64::from_be_bytes([
        digest[0], digest[1], digest[2], digest[3], digest[4], digest[5], digest[6], digest[7],
    ])
}
