use thiserror::Error;

/// Result type for analyzer operations
pub type Result<T> = std::result::Result<T, AnalyzerError>;

/// Errors that can occur during single-file analysis
#[derive(Error, Debug)]
pub enum AnalyzerError {
    /// File bytes could not be decoded as UTF-8
    #[error("Unreadable file {0}: not valid UTF-8")]
    Unreadable(String),

    /// Parser could not produce a syntax tree at all
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Language has no tree-sitter grammar
    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),

    /// Tree-sitter rejected the grammar
    #[error("Tree-sitter error: {0}")]
    TreeSitterError(String),

    /// IO error occurred
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl AnalyzerError {
    /// Create an unreadable-file error
    pub fn unreadable(path: impl Into<String>) -> Self {
        Self::Unreadable(path.into())
    }

    /// Create a parse error
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::ParseError(msg.into())
    }

    /// Create an unsupported language error
    pub fn unsupported_language(lang: impl Into<String>) -> Self {
        Self::UnsupportedLanguage(lang.into())
    }

    /// Create a tree-sitter error
    pub fn tree_sitter(msg: impl Into<String>) -> Self {
        Self::TreeSitterError(msg.into())
    }
}
