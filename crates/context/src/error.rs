use thiserror::Error;

pub type Result<T> = std::result::Result<T, ContextError>;

#[derive(Error, Debug)]
pub enum ContextError {
    /// Token budget must be a positive integer
    #[error("Invalid token budget: {0}")]
    InvalidBudget(String),

    /// Requested target file is not part of the repository map
    #[error("Target file not found in repository: {0}")]
    TargetNotFound(String),

    /// Underlying mapper failure (only RootUnavailable is fatal there)
    #[error("Mapper error: {0}")]
    Mapper(#[from] repo_intel_mapper::MapperError),
}

impl ContextError {
    pub fn invalid_budget(msg: impl Into<String>) -> Self {
        Self::InvalidBudget(msg.into())
    }

    pub fn target_not_found(path: impl Into<String>) -> Self {
        Self::TargetNotFound(path.into())
    }
}
