use crate::error::{ContextError, Result};
use serde::{Deserialize, Serialize};

/// Kind of downstream operation the context is assembled for.
///
/// The kind steers graph traversal: fixes walk toward dependencies,
/// refactors toward dependents, generation and explanation look both ways.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Generate,
    Fix,
    Refactor,
    Explain,
}

impl OperationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            OperationKind::Generate => "generate",
            OperationKind::Fix => "fix",
            OperationKind::Refactor => "refactor",
            OperationKind::Explain => "explain",
        }
    }
}

/// Validated request for a token-bounded context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextBudget {
    pub operation: OperationKind,
    pub target_file: Option<String>,
    pub max_tokens: usize,
}

impl ContextBudget {
    /// Create a budget; a zero token budget is rejected up front
    pub fn new(
        operation: OperationKind,
        target_file: Option<String>,
        max_tokens: usize,
    ) -> Result<Self> {
        if max_tokens == 0 {
            return Err(ContextError::invalid_budget(
                "max_tokens must be positive".to_string(),
            ));
        }
        Ok(Self {
            operation,
            target_file,
            max_tokens,
        })
    }
}

/// Character-count token approximation.
///
/// `ceil(chars / chars_per_token)`: not exact, but monotonic (more text never
/// estimates smaller) and consistent within one invocation, which is all the
/// packing algorithm needs.
#[derive(Debug, Clone, Copy)]
pub struct TokenEstimator {
    chars_per_token: usize,
}

impl TokenEstimator {
    pub fn new(chars_per_token: usize) -> Self {
        Self {
            chars_per_token: chars_per_token.max(1),
        }
    }

    pub fn estimate(&self, text: &str) -> usize {
        self.estimate_chars(text.len())
    }

    pub fn estimate_chars(&self, chars: usize) -> usize {
        chars.div_ceil(self.chars_per_token)
    }
}

impl Default for TokenEstimator {
    fn default() -> Self {
        Self::new(4)
    }
}

/// Knobs for candidate selection and packing
#[derive(Debug, Clone)]
pub struct BudgeterConfig {
    /// Divisor for the character-count token approximation
    pub chars_per_token: usize,

    /// How many dependency hops from the target are candidates
    pub hop_limit: usize,

    /// How many top-scored files to consider when no target is given
    pub fallback_top_n: usize,

    /// Imports listed per file skeleton
    pub max_imports_shown: usize,
}

impl Default for BudgeterConfig {
    fn default() -> Self {
        Self {
            chars_per_token: 4,
            hop_limit: 2,
            fallback_top_n: 10,
            max_imports_shown: 10,
        }
    }
}
