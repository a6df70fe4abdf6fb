use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Directed file-level dependency graph.
///
/// Represented as an adjacency mapping keyed by repository-relative file
/// paths, never as owning references between nodes, so import cycles cannot
/// create memory-management hazards. A reverse adjacency is kept in lockstep
/// for O(1) dependent lookups.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DependencyGraph {
    /// path -> set of paths it depends on
    edges: BTreeMap<String, BTreeSet<String>>,

    /// path -> set of paths that depend on it
    reverse: BTreeMap<String, BTreeSet<String>>,

    /// Per-file import strings that could not be mapped to an indexed file
    external: BTreeMap<String, BTreeSet<String>>,

    /// Detected import cycles (each a sorted list of member paths)
    pub cycles: Vec<Vec<String>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a directed edge; self-edges are ignored
    pub fn add_edge(&mut self, from: &str, to: &str) {
        if from == to {
            return;
        }
        self.edges
            .entry(from.to_string())
            .or_default()
            .insert(to.to_string());
        self.reverse
            .entry(to.to_string())
            .or_default()
            .insert(from.to_string());
    }

    /// Remove every edge leaving `path`
    pub fn remove_outgoing(&mut self, path: &str) {
        if let Some(targets) = self.edges.remove(path) {
            for target in targets {
                if let Some(sources) = self.reverse.get_mut(&target) {
                    sources.remove(path);
                    if sources.is_empty() {
                        self.reverse.remove(&target);
                    }
                }
            }
        }
    }

    /// Remove every edge touching `path`, in either direction
    pub fn remove_file(&mut self, path: &str) {
        self.remove_outgoing(path);
        if let Some(sources) = self.reverse.remove(path) {
            for source in sources {
                if let Some(targets) = self.edges.get_mut(&source) {
                    targets.remove(path);
                    if targets.is_empty() {
                        self.edges.remove(&source);
                    }
                }
            }
        }
    }

    /// Files `path` depends on
    pub fn dependencies_of(&self, path: &str) -> BTreeSet<String> {
        self.edges.get(path).cloned().unwrap_or_default()
    }

    /// Files that depend on `path`
    pub fn dependents_of(&self, path: &str) -> BTreeSet<String> {
        self.reverse.get(path).cloned().unwrap_or_default()
    }

    /// Number of internal files that depend on `path`
    pub fn in_degree(&self, path: &str) -> usize {
        self.reverse.get(path).map_or(0, BTreeSet::len)
    }

    /// Number of internal files `path` depends on
    pub fn out_degree(&self, path: &str) -> usize {
        self.edges.get(path).map_or(0, BTreeSet::len)
    }

    /// Total edge count
    pub fn edge_count(&self) -> usize {
        self.edges.values().map(BTreeSet::len).sum()
    }

    /// Iterate `(from, to)` pairs in deterministic order
    pub fn iter_edges(&self) -> impl Iterator<Item = (&str, &str)> {
        self.edges.iter().flat_map(|(from, targets)| {
            targets.iter().map(move |to| (from.as_str(), to.as_str()))
        })
    }

    /// Paths that participate in at least one edge, in deterministic order
    pub fn connected_paths(&self) -> BTreeSet<String> {
        self.edges
            .keys()
            .chain(self.reverse.keys())
            .cloned()
            .collect()
    }

    /// Record an import of `path` that resolved to no indexed file
    pub fn record_external(&mut self, path: &str, import: &str) {
        self.external
            .entry(path.to_string())
            .or_default()
            .insert(import.to_string());
    }

    /// Forget the external imports recorded for `path`
    pub fn clear_external(&mut self, path: &str) {
        self.external.remove(path);
    }

    /// External imports recorded for one file
    pub fn external_of(&self, path: &str) -> BTreeSet<String> {
        self.external.get(path).cloned().unwrap_or_default()
    }

    /// Union of all external imports, in deterministic order
    pub fn external_all(&self) -> BTreeSet<String> {
        self.external.values().flatten().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn add_and_query_edges() {
        let mut g = DependencyGraph::new();
        g.add_edge("a.py", "b.py");
        g.add_edge("c.py", "b.py");
        g.add_edge("a.py", "a.py"); // self-edge dropped

        assert_eq!(g.edge_count(), 2);
        assert_eq!(g.in_degree("b.py"), 2);
        assert_eq!(g.out_degree("a.py"), 1);
        assert_eq!(
            g.dependents_of("b.py"),
            ["a.py", "c.py"].iter().map(|s| s.to_string()).collect()
        );
    }

    #[test]
    fn remove_file_clears_both_directions() {
        let mut g = DependencyGraph::new();
        g.add_edge("a.py", "b.py");
        g.add_edge("b.py", "c.py");

        g.remove_file("b.py");

        assert_eq!(g.edge_count(), 0);
        assert_eq!(g.in_degree("c.py"), 0);
        assert_eq!(g.dependencies_of("a.py"), BTreeSet::new());
    }

    #[test]
    fn remove_outgoing_keeps_incoming() {
        let mut g = DependencyGraph::new();
        g.add_edge("a.py", "b.py");
        g.add_edge("b.py", "c.py");

        g.remove_outgoing("b.py");

        assert_eq!(g.in_degree("b.py"), 1);
        assert_eq!(g.in_degree("c.py"), 0);
    }
}
