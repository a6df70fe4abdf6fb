use thiserror::Error;

pub type Result<T> = std::result::Result<T, MapperError>;

#[derive(Error, Debug)]
pub enum MapperError {
    /// The repository root cannot be opened at all.
    /// This is the only condition that aborts a scan entirely.
    #[error("Repository root unavailable: {0}")]
    RootUnavailable(String),

    /// A scan was cancelled by the caller; the partial map was discarded
    #[error("Scan cancelled")]
    Cancelled,

    /// Filesystem watcher could not be started
    #[error("Watch error: {0}")]
    WatchError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl MapperError {
    pub fn root_unavailable(msg: impl Into<String>) -> Self {
        Self::RootUnavailable(msg.into())
    }

    pub fn watch(msg: impl Into<String>) -> Self {
        Self::WatchError(msg.into())
    }

    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}
