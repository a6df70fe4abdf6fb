use crate::budget::{BudgeterConfig, ContextBudget, OperationKind};
use crate::budgeter::TokenBudgeter;
use crate::error::{ContextError, Result};
use crate::skeleton::render_single_line;
use repo_intel_mapper::{RepositoryMap, RepositoryMapper};
use std::path::Path;
use std::sync::Arc;

/// Result of context extraction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextResult {
    /// The rendered context block
    pub context: String,

    /// Files whose skeletons made it into the context, in order
    pub files_included: Vec<String>,

    /// Estimated token count of `context`
    pub token_estimate: usize,

    /// Whether anything was dropped or trimmed to respect the budget
    pub truncated: bool,
}

/// The subsystem's public façade.
///
/// Callers (the chat/command layer, the auto-healing loop) go through
/// `get_context` and receive a single rendered block; they never touch the
/// mapper, graph, or budgeter directly. The call is synchronous from the
/// caller's perspective even though file analysis may run concurrently
/// underneath.
///
/// ## Output layout
///
/// ```text
/// PROJECT: <name>
/// FILES: <n> | LINES: <m>
/// LANGUAGES: <top three by file count>
///
/// FILE: <path> (<lines> lines, <language>)
///   IMPORTS: ...
///   FUNCTIONS:
///     - <signature>
///         <one-line doc>
///   CLASSES:
///     - class <name>(<bases>)
///         - <method signature>
///
/// ... more file sections, importance-ordered ...
///
/// EXTERNAL DEPENDENCIES:
///   - <import>
/// ```
pub struct ContextProvider {
    mapper: Arc<RepositoryMapper>,
    budgeter: TokenBudgeter,
}

impl ContextProvider {
    pub fn new(mapper: Arc<RepositoryMapper>) -> Self {
        Self::with_config(mapper, BudgeterConfig::default())
    }

    pub fn with_config(mapper: Arc<RepositoryMapper>, config: BudgeterConfig) -> Self {
        Self {
            mapper,
            budgeter: TokenBudgeter::new(config),
        }
    }

    pub fn mapper(&self) -> &Arc<RepositoryMapper> {
        &self.mapper
    }

    /// Assemble a token-bounded context block for one operation.
    ///
    /// The estimated token count of the returned context never exceeds the
    /// budget, with one documented exception: when the budget cannot fit
    /// even a truncated target skeleton, the smallest possible single-line
    /// skeleton is returned rather than nothing.
    pub async fn get_context(
        &self,
        operation: OperationKind,
        target_file: Option<&str>,
        max_tokens: usize,
    ) -> Result<ContextResult> {
        let budget = ContextBudget::new(
            operation,
            target_file.map(|s| s.to_string()),
            max_tokens,
        )?;
        self.get_context_with_budget(&budget).await
    }

    /// Context for one file with default operation semantics
    pub async fn get_context_for_file(
        &self,
        file_path: &str,
        max_tokens: usize,
    ) -> Result<ContextResult> {
        self.get_context(OperationKind::Generate, Some(file_path), max_tokens)
            .await
    }

    /// Budget-first entry point used by both public methods
    pub async fn get_context_with_budget(&self, budget: &ContextBudget) -> Result<ContextResult> {
        // Freshness gate: stale maps are incrementally updated first
        let map = self.mapper.ensure_fresh().await?;

        let target = match budget.target_file.as_deref() {
            Some(raw) => Some(self.resolve_target(&map, raw)?),
            None => None,
        };

        let estimator = self.budgeter.estimator();
        let header = render_header(&map);
        let header_cost = estimator.estimate(&header) + estimator.estimate("\n\n");

        if header_cost > budget.max_tokens {
            // Budget cannot fit even the project header: fall back to the
            // smallest possible single line (sole budget-invariant exception)
            let line = match &target {
                Some(target) => map
                    .modules
                    .get(target)
                    .map(render_single_line)
                    .unwrap_or_else(|| header.lines().next().unwrap_or_default().to_string()),
                None => header.lines().next().unwrap_or_default().to_string(),
            };
            let token_estimate = estimator.estimate(&line);
            return Ok(ContextResult {
                files_included: target.into_iter().collect(),
                context: line,
                token_estimate,
                truncated: true,
            });
        }

        let available = budget.max_tokens - header_cost;
        let selection = self
            .budgeter
            .select(&map, budget, target.as_deref(), available);

        let mut parts = vec![header];
        let mut files_included = Vec::new();
        for section in &selection.sections {
            files_included.push(section.path.clone());
            parts.push(section.text.clone());
        }

        let mut truncated = selection.truncated;
        if let Some(externals) =
            render_externals(&map, estimator, selection.remaining_tokens)
        {
            parts.push(externals);
        } else if !map.graph.external_all().is_empty() {
            truncated = true;
        }

        let context = parts.join("\n\n");
        let token_estimate = estimator.estimate(&context);
        log::debug!(
            "Assembled {} context: {} files, ~{} of {} tokens",
            budget.operation.as_str(),
            files_included.len(),
            token_estimate,
            budget.max_tokens
        );

        Ok(ContextResult {
            context,
            files_included,
            token_estimate,
            truncated,
        })
    }

    /// Normalize a caller-supplied path and require it to be indexed
    fn resolve_target(&self, map: &RepositoryMap, raw: &str) -> Result<String> {
        let rel = self
            .mapper
            .relative_key(Path::new(raw))
            .unwrap_or_else(|| raw.replace('\\', "/"));
        if map.modules.contains_key(&rel) {
            Ok(rel)
        } else {
            Err(ContextError::target_not_found(raw))
        }
    }
}

/// Project summary header: name, totals, top languages
fn render_header(map: &RepositoryMap) -> String {
    let mut lines = vec![
        format!("PROJECT: {}", map.project_name()),
        format!("FILES: {} | LINES: {}", map.total_files, map.total_lines),
    ];

    let top: Vec<String> = map
        .top_languages()
        .into_iter()
        .take(3)
        .map(|(lang, count)| format!("{lang}: {count}"))
        .collect();
    if !top.is_empty() {
        lines.push(format!("LANGUAGES: {}", top.join(", ")));
    }

    lines.join("\n")
}

/// External-dependency section, trimmed to whatever budget is left
fn render_externals(
    map: &RepositoryMap,
    estimator: &crate::budget::TokenEstimator,
    available_tokens: usize,
) -> Option<String> {
    let externals = map.graph.external_all();
    if externals.is_empty() {
        return None;
    }

    let mut lines = vec!["EXTERNAL DEPENDENCIES:".to_string()];
    for import in externals {
        lines.push(format!("  - {import}"));
    }

    // Drop entries from the tail until the section fits
    while lines.len() > 1 {
        let text = lines.join("\n");
        if estimator.estimate(&text) + estimator.estimate("\n\n") <= available_tokens {
            return Some(text);
        }
        lines.pop();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use repo_intel_mapper::MapperConfig;
    use std::fs;
    use tempfile::tempdir;

    async fn provider_for(files: &[(&str, &str)]) -> (tempfile::TempDir, ContextProvider) {
        let temp = tempdir().unwrap();
        for (rel, content) in files {
            let path = temp.path().join(rel);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(path, content).unwrap();
        }
        let mapper =
            Arc::new(RepositoryMapper::new(temp.path(), MapperConfig::default()).unwrap());
        (temp, ContextProvider::new(mapper))
    }

    #[tokio::test]
    async fn header_names_the_project_and_totals() {
        let (_temp, provider) = provider_for(&[
            ("main.py", "from utils import helper\n"),
            ("utils.py", "def helper():\n    return 1\n"),
        ])
        .await;

        let result = provider
            .get_context(OperationKind::Generate, None, 4_000)
            .await
            .unwrap();

        assert!(result.context.starts_with("PROJECT: "));
        assert!(result.context.contains("FILES: 2 | LINES:"));
        assert!(result.context.contains("LANGUAGES: python: 2"));
    }

    #[tokio::test]
    async fn unknown_target_is_an_error() {
        let (_temp, provider) = provider_for(&[("a.py", "x = 1\n")]).await;

        let err = provider
            .get_context(OperationKind::Fix, Some("missing.py"), 1_000)
            .await
            .unwrap_err();
        assert!(matches!(err, ContextError::TargetNotFound(_)));
    }

    #[tokio::test]
    async fn zero_budget_is_rejected_up_front() {
        let (_temp, provider) = provider_for(&[("a.py", "x = 1\n")]).await;

        let err = provider
            .get_context(OperationKind::Generate, None, 0)
            .await
            .unwrap_err();
        assert!(matches!(err, ContextError::InvalidBudget(_)));
    }
}
