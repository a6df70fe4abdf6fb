use serde::{Deserialize, Serialize};
use std::fmt;

/// Per-file and per-edge issues accumulated during scanning.
///
/// Diagnostics are available for inspection but never block normal
/// operation; only a missing root path is a hard error.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// IO or UTF-8 decode failure; the file is counted but carries no
    /// structural data
    Unreadable { path: String },

    /// Recoverable syntax errors; best-effort signatures were kept
    PartialParse { path: String },

    /// Import string could not be mapped to an indexed file
    UnresolvedImport { path: String, import: String },
}

impl Diagnostic {
    /// Path this diagnostic is attached to
    pub fn path(&self) -> &str {
        match self {
            Diagnostic::Unreadable { path }
            | Diagnostic::PartialParse { path }
            | Diagnostic::UnresolvedImport { path, .. } => path,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::Unreadable { path } => write!(f, "unreadable: {path}"),
            Diagnostic::PartialParse { path } => write!(f, "partial parse: {path}"),
            Diagnostic::UnresolvedImport { path, import } => {
                write!(f, "unresolved import {import:?} in {path}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_and_path_accessor() {
        let d = Diagnostic::UnresolvedImport {
            path: "a.py".to_string(),
            import: "numpy".to_string(),
        };
        assert_eq!(d.path(), "a.py");
        assert_eq!(d.to_string(), "unresolved import \"numpy\" in a.py");
    }
}
