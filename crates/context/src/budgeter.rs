use crate::budget::{BudgeterConfig, ContextBudget, OperationKind, TokenEstimator};
use crate::skeleton::{render_single_line, render_skeleton, truncate_to_fit};
use repo_intel_mapper::RepositoryMap;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// One packed context section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub path: String,
    pub text: String,
}

/// Result of greedy packing
#[derive(Debug, Clone, Default)]
pub struct Selection {
    /// Ordered sections, target first when one was requested
    pub sections: Vec<Section>,

    /// Tokens left from the available budget after packing
    pub remaining_tokens: usize,

    /// Some candidate was skipped or the target skeleton was truncated
    pub truncated: bool,
}

/// Budget-constrained candidate selection and packing.
///
/// Candidates are files reachable from the target within a hop limit (top-N
/// by importance when no target is given), compressed to skeletons, and
/// packed greedily by importance then graph proximity. The packed total
/// never exceeds the available budget; an overflowing candidate is skipped
/// and packing continues with the next, smaller one.
pub struct TokenBudgeter {
    config: BudgeterConfig,
    estimator: TokenEstimator,
}

impl TokenBudgeter {
    pub fn new(config: BudgeterConfig) -> Self {
        let estimator = TokenEstimator::new(config.chars_per_token);
        Self { config, estimator }
    }

    pub fn with_defaults() -> Self {
        Self::new(BudgeterConfig::default())
    }

    pub fn estimator(&self) -> &TokenEstimator {
        &self.estimator
    }

    /// Pack skeletons into `available_tokens`.
    ///
    /// `target` must already be validated against `map.modules`. The sole
    /// case in which a returned section can exceed the budget is the
    /// single-line fallback for a target whose header alone does not fit.
    pub fn select(
        &self,
        map: &RepositoryMap,
        budget: &ContextBudget,
        target: Option<&str>,
        available_tokens: usize,
    ) -> Selection {
        let mut selection = Selection {
            remaining_tokens: available_tokens,
            ..Default::default()
        };
        // Sections are joined with a blank line; charge it to the section
        let separator_cost = self.estimator.estimate("\n\n");

        let distances = match target {
            Some(target) => self.distances_from(map, target, budget.operation),
            None => BTreeMap::new(),
        };

        if let Some(target) = target {
            if !self.pack_target(map, target, separator_cost, &mut selection) {
                return selection;
            }
        }

        for path in self.candidate_order(map, target, &distances) {
            let Some(node) = map.modules.get(&path) else {
                continue;
            };
            let text = render_skeleton(node, self.config.max_imports_shown);
            let cost = self.estimator.estimate(&text) + separator_cost;

            if cost <= selection.remaining_tokens {
                selection.remaining_tokens -= cost;
                selection.sections.push(Section { path, text });
            } else {
                // Skip and keep going: a smaller candidate may still fit
                selection.truncated = true;
            }
        }

        selection
    }

    /// The target always leads, truncated to fit if necessary.
    /// Returns false when packing should stop (single-line fallback taken).
    fn pack_target(
        &self,
        map: &RepositoryMap,
        target: &str,
        separator_cost: usize,
        selection: &mut Selection,
    ) -> bool {
        let Some(node) = map.modules.get(target) else {
            return true;
        };

        let full = render_skeleton(node, self.config.max_imports_shown);
        let full_cost = self.estimator.estimate(&full) + separator_cost;
        if full_cost <= selection.remaining_tokens {
            selection.remaining_tokens -= full_cost;
            selection.sections.push(Section {
                path: target.to_string(),
                text: full,
            });
            return true;
        }

        selection.truncated = true;
        let trimmed_budget = selection.remaining_tokens.saturating_sub(separator_cost);
        if let Some(trimmed) =
            truncate_to_fit(node, self.config.max_imports_shown, &self.estimator, trimmed_budget)
        {
            let cost = self.estimator.estimate(&trimmed) + separator_cost;
            selection.remaining_tokens = selection.remaining_tokens.saturating_sub(cost);
            selection.sections.push(Section {
                path: target.to_string(),
                text: trimmed,
            });
            return true;
        }

        // Budget cannot fit even a truncated skeleton: emit the single-line
        // form anyway rather than returning nothing.
        log::warn!("Token budget too small for target {target}; returning a single line");
        selection.sections.push(Section {
            path: target.to_string(),
            text: render_single_line(node),
        });
        selection.remaining_tokens = 0;
        false
    }

    /// Candidates ordered by importance descending, then graph distance
    /// ascending, then the scorer tie-break (fewer lines first, then path)
    fn candidate_order(
        &self,
        map: &RepositoryMap,
        target: Option<&str>,
        distances: &BTreeMap<String, usize>,
    ) -> Vec<String> {
        let mut candidates: Vec<(String, f32, usize, usize)> = match target {
            Some(target) => distances
                .iter()
                .filter(|(path, _)| path.as_str() != target)
                .map(|(path, dist)| {
                    let lines = map.modules.get(path).map_or(0, |n| n.lines);
                    (path.clone(), map.score_of(path), *dist, lines)
                })
                .collect(),
            None => map
                .modules
                .iter()
                .map(|(path, node)| (path.clone(), map.score_of(path), 0, node.lines))
                .collect(),
        };

        candidates.sort_by(|a, b| {
            b.1.total_cmp(&a.1)
                .then_with(|| a.2.cmp(&b.2))
                .then_with(|| a.3.cmp(&b.3))
                .then_with(|| a.0.cmp(&b.0))
        });

        if target.is_none() {
            candidates.truncate(self.config.fallback_top_n);
        }
        candidates.into_iter().map(|(path, ..)| path).collect()
    }

    /// BFS over the dependency graph within the hop limit.
    /// Direction depends on the operation: fixes follow dependencies,
    /// refactors follow dependents, generation/explanation follow both.
    fn distances_from(
        &self,
        map: &RepositoryMap,
        start: &str,
        operation: OperationKind,
    ) -> BTreeMap<String, usize> {
        let mut distances = BTreeMap::new();
        distances.insert(start.to_string(), 0usize);
        let mut queue = VecDeque::from([start.to_string()]);

        while let Some(path) = queue.pop_front() {
            let depth = distances[&path];
            if depth >= self.config.hop_limit {
                continue;
            }
            for neighbor in neighbor_set(map, &path, operation) {
                if !distances.contains_key(&neighbor) {
                    distances.insert(neighbor.clone(), depth + 1);
                    queue.push_back(neighbor);
                }
            }
        }

        distances
    }
}

fn neighbor_set(map: &RepositoryMap, path: &str, operation: OperationKind) -> BTreeSet<String> {
    match operation {
        OperationKind::Fix => map.graph.dependencies_of(path),
        OperationKind::Refactor => map.graph.dependents_of(path),
        OperationKind::Generate | OperationKind::Explain => {
            let mut both = map.graph.dependencies_of(path);
            both.extend(map.graph.dependents_of(path));
            both
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use repo_intel_analyzer::FileNode;
    use repo_intel_graph::DependencyGraphBuilder;

    fn node(path: &str, lines: usize, imports: &[&str]) -> FileNode {
        let mut n = FileNode::basic(path, "python", lines, 0);
        n.imports = imports.iter().map(|s| s.to_string()).collect();
        n
    }

    fn sample_map() -> RepositoryMap {
        let mut map = RepositoryMap {
            root_path: "/work/demo".to_string(),
            ..Default::default()
        };
        for n in [
            node("main.py", 10, &["utils"]),
            node("utils.py", 10, &["deep"]),
            node("deep.py", 10, &[]),
            node("stray.py", 10, &[]),
        ] {
            map.modules.insert(n.path.clone(), n);
        }
        map.graph = DependencyGraphBuilder::build(&map.modules);
        map.scores = [
            ("main.py", 0.3),
            ("utils.py", 0.9),
            ("deep.py", 0.5),
            ("stray.py", 0.8),
        ]
        .into_iter()
        .map(|(p, s)| (p.to_string(), s))
        .collect();
        map.refresh_totals(0);
        map
    }

    fn budget(op: OperationKind, target: Option<&str>, tokens: usize) -> ContextBudget {
        ContextBudget::new(op, target.map(|s| s.to_string()), tokens).unwrap()
    }

    #[test]
    fn target_candidates_stay_within_hop_limit() {
        let map = sample_map();
        let budgeter = TokenBudgeter::new(BudgeterConfig {
            hop_limit: 1,
            ..Default::default()
        });

        let selection = budgeter.select(
            &map,
            &budget(OperationKind::Fix, Some("main.py"), 10_000),
            Some("main.py"),
            10_000,
        );
        let paths: Vec<&str> = selection.sections.iter().map(|s| s.path.as_str()).collect();

        // Fix follows dependencies one hop: utils, but not deep or stray
        assert_eq!(paths, vec!["main.py", "utils.py"]);
    }

    #[test]
    fn fallback_without_target_takes_top_scored_files() {
        let map = sample_map();
        let budgeter = TokenBudgeter::new(BudgeterConfig {
            fallback_top_n: 2,
            ..Default::default()
        });

        let selection = budgeter.select(
            &map,
            &budget(OperationKind::Generate, None, 10_000),
            None,
            10_000,
        );
        let paths: Vec<&str> = selection.sections.iter().map(|s| s.path.as_str()).collect();

        assert_eq!(paths, vec!["utils.py", "stray.py"]);
    }

    #[test]
    fn packed_total_never_exceeds_available_budget() {
        let map = sample_map();
        let budgeter = TokenBudgeter::with_defaults();

        for available in [1usize, 5, 10, 20, 50, 200] {
            let selection = budgeter.select(
                &map,
                &budget(OperationKind::Generate, None, available),
                None,
                available,
            );
            let spent: usize = selection
                .sections
                .iter()
                .map(|s| budgeter.estimator().estimate(&s.text) + 1)
                .sum();
            assert!(spent <= available || selection.sections.is_empty());
        }
    }

    #[test]
    fn overflowing_candidate_is_skipped_not_fatal() {
        let map = sample_map();
        let budgeter = TokenBudgeter::with_defaults();

        // Room for roughly one small skeleton
        let selection = budgeter.select(
            &map,
            &budget(OperationKind::Generate, None, 15),
            None,
            15,
        );

        assert!(selection.truncated || selection.sections.len() == map.modules.len());
        assert!(!selection.sections.is_empty());
    }

    #[test]
    fn tiny_budget_with_target_degrades_to_single_line() {
        let map = sample_map();
        let budgeter = TokenBudgeter::with_defaults();

        let selection = budgeter.select(
            &map,
            &budget(OperationKind::Fix, Some("main.py"), 2),
            Some("main.py"),
            2,
        );

        assert_eq!(selection.sections.len(), 1);
        assert_eq!(selection.sections[0].path, "main.py");
        assert!(selection.sections[0].text.starts_with("FILE: main.py"));
        assert!(!selection.sections[0].text.contains('\n'));
        assert!(selection.truncated);
    }

    #[test]
    fn refactor_walks_toward_dependents() {
        let map = sample_map();
        let budgeter = TokenBudgeter::new(BudgeterConfig {
            hop_limit: 1,
            ..Default::default()
        });

        let selection = budgeter.select(
            &map,
            &budget(OperationKind::Refactor, Some("utils.py"), 10_000),
            Some("utils.py"),
            10_000,
        );
        let paths: Vec<&str> = selection.sections.iter().map(|s| s.path.as_str()).collect();

        assert_eq!(paths, vec!["utils.py", "main.py"]);
    }
}
