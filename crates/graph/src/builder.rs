use crate::types::DependencyGraph;
use petgraph::algo::tarjan_scc;
use petgraph::graph::DiGraph;
use repo_intel_analyzer::{FileNode, Language};
use std::collections::BTreeMap;

/// Builds the file-level dependency graph from per-file import lists.
///
/// Raw import strings are resolved against the set of indexed files using
/// language-specific rules; anything that resolves to no indexed file is
/// recorded as an external dependency, not an error.
pub struct DependencyGraphBuilder;

impl DependencyGraphBuilder {
    /// Build a fresh graph from all file nodes
    pub fn build(file_nodes: &BTreeMap<String, FileNode>) -> DependencyGraph {
        let mut graph = DependencyGraph::new();

        for node in file_nodes.values() {
            Self::add_file_edges(&mut graph, node, file_nodes);
        }
        graph.cycles = detect_cycles(&graph);

        log::info!(
            "Built dependency graph: {} files, {} edges, {} cycles",
            file_nodes.len(),
            graph.edge_count(),
            graph.cycles.len()
        );
        graph
    }

    /// Re-resolve a single changed file.
    ///
    /// Only edges leaving `node.path` are removed and re-added; edges into it
    /// from other files are untouched. O(affected edges), not O(all files).
    pub fn update_file(
        graph: &mut DependencyGraph,
        node: &FileNode,
        file_nodes: &BTreeMap<String, FileNode>,
    ) {
        graph.remove_outgoing(&node.path);
        graph.clear_external(&node.path);
        Self::add_file_edges(graph, node, file_nodes);
        graph.cycles = detect_cycles(graph);
    }

    /// Drop a deleted file from the graph, both directions
    pub fn remove_file(graph: &mut DependencyGraph, path: &str) {
        graph.remove_file(path);
        graph.clear_external(path);
        graph.cycles = detect_cycles(graph);
    }

    fn add_file_edges(
        graph: &mut DependencyGraph,
        node: &FileNode,
        file_nodes: &BTreeMap<String, FileNode>,
    ) {
        let language = Language::from_path(&node.path);

        for import in &node.imports {
            let targets = resolve_import(import, &node.path, language, file_nodes);
            if targets.is_empty() {
                graph.record_external(&node.path, import);
            } else {
                for target in targets {
                    graph.add_edge(&node.path, &target);
                }
            }
        }
    }
}

/// Resolve one raw import string to indexed file paths.
///
/// Returns an empty vec for external/third-party imports. Go package imports
/// may resolve to several files (every file of the package directory).
pub fn resolve_import(
    import: &str,
    importer: &str,
    language: Language,
    file_nodes: &BTreeMap<String, FileNode>,
) -> Vec<String> {
    match language {
        Language::Python => resolve_python(import, importer, file_nodes),
        Language::JavaScript | Language::TypeScript => resolve_js(import, importer, file_nodes),
        Language::Go => resolve_go(import, importer, file_nodes),
        Language::Unknown => Vec::new(),
    }
}

/// Dotted-module-to-path mapping.
///
/// The last dotted part may name a symbol rather than a module, so the parent
/// module is probed as well (`pkg.mod.func` -> `pkg/mod.py`).
fn resolve_python(
    import: &str,
    importer: &str,
    file_nodes: &BTreeMap<String, FileNode>,
) -> Vec<String> {
    let dots = import.chars().take_while(|c| *c == '.').count();
    let remainder = &import[dots..];
    let parts: Vec<&str> = remainder.split('.').filter(|p| !p.is_empty()).collect();

    let base = if dots > 0 {
        let mut dir: Vec<&str> = match parent_of(importer) {
            "" => Vec::new(),
            d => d.split('/').collect(),
        };
        // one dot is the importing file's own package; each extra dot climbs
        for _ in 1..dots {
            if dir.pop().is_none() {
                return Vec::new();
            }
        }
        dir.join("/")
    } else {
        String::new()
    };

    let mut suffixes = Vec::new();
    if parts.is_empty() {
        suffixes.push("__init__.py".to_string());
    } else {
        let joined = parts.join("/");
        suffixes.push(format!("{joined}.py"));
        suffixes.push(format!("{joined}/__init__.py"));
        if parts.len() > 1 {
            let parent = parts[..parts.len() - 1].join("/");
            suffixes.push(format!("{parent}.py"));
            suffixes.push(format!("{parent}/__init__.py"));
        }
    }

    for suffix in suffixes {
        let candidate = join_path(&base, &suffix);

        if dots > 0 {
            // Relative imports resolve against the importing file only
            if candidate != importer && file_nodes.contains_key(&candidate) {
                return vec![candidate];
            }
            continue;
        }

        // Absolute imports: exact match from the repository root first, then
        // the first (lexicographically) file that carries the module path as
        // a suffix, for packages nested below the root.
        if candidate != importer && file_nodes.contains_key(&candidate) {
            return vec![candidate];
        }
        let nested = format!("/{candidate}");
        if let Some(found) = file_nodes
            .keys()
            .find(|p| p.as_str() != importer && p.ends_with(&nested))
        {
            return vec![found.clone()];
        }
    }

    Vec::new()
}

/// Relative-specifier resolution with extension and index probing
fn resolve_js(
    import: &str,
    importer: &str,
    file_nodes: &BTreeMap<String, FileNode>,
) -> Vec<String> {
    if !import.starts_with("./") && !import.starts_with("../") && import != "." && import != ".."
    {
        return Vec::new();
    }

    let Some(base) = normalize_join(parent_of(importer), import) else {
        return Vec::new();
    };

    const EXTENSIONS: [&str; 6] = ["ts", "tsx", "js", "jsx", "mjs", "cjs"];

    let mut candidates = Vec::new();
    if !base.is_empty() {
        candidates.push(base.clone());
        for ext in EXTENSIONS {
            candidates.push(format!("{base}.{ext}"));
        }
    }
    for ext in EXTENSIONS {
        candidates.push(join_path(&base, &format!("index.{ext}")));
    }

    candidates
        .into_iter()
        .find(|c| c != importer && file_nodes.contains_key(c))
        .map(|c| vec![c])
        .unwrap_or_default()
}

/// Package-path mapping: the longest trailing segment run that names an
/// indexed directory wins, and the import depends on every Go file in it.
fn resolve_go(
    import: &str,
    importer: &str,
    file_nodes: &BTreeMap<String, FileNode>,
) -> Vec<String> {
    let segments: Vec<&str> = import.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        return Vec::new();
    }

    for take in (1..=segments.len()).rev() {
        let suffix = segments[segments.len() - take..].join("/");
        let nested = format!("/{suffix}");

        let matches: Vec<String> = file_nodes
            .keys()
            .filter(|path| {
                if !path.ends_with(".go") || path.as_str() == importer {
                    return false;
                }
                let dir = parent_of(path);
                dir == suffix || dir.ends_with(&nested)
            })
            .cloned()
            .collect();

        if !matches.is_empty() {
            return matches;
        }
    }

    Vec::new()
}

/// Report every import cycle in the graph.
///
/// Cycles are strongly-connected components with more than one member; they
/// are surfaced for diagnostics and scoring, never treated as errors.
pub fn detect_cycles(graph: &DependencyGraph) -> Vec<Vec<String>> {
    let paths: Vec<String> = graph.connected_paths().into_iter().collect();

    let mut pg: DiGraph<usize, ()> = DiGraph::new();
    let mut index = BTreeMap::new();
    for (i, path) in paths.iter().enumerate() {
        index.insert(path.as_str(), pg.add_node(i));
    }
    for (from, to) in graph.iter_edges() {
        if let (Some(&a), Some(&b)) = (index.get(from), index.get(to)) {
            pg.add_edge(a, b, ());
        }
    }

    let mut cycles = Vec::new();
    for scc in tarjan_scc(&pg) {
        if scc.len() > 1 {
            let mut members: Vec<String> =
                scc.iter().map(|idx| paths[pg[*idx]].clone()).collect();
            members.sort();
            cycles.push(members);
        }
    }
    cycles.sort();
    cycles
}

fn parent_of(path: &str) -> &str {
    path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

fn join_path(base: &str, rest: &str) -> String {
    if base.is_empty() {
        rest.to_string()
    } else {
        format!("{base}/{rest}")
    }
}

/// Join a relative specifier onto a directory, folding `.` and `..`.
/// Returns `None` when the specifier escapes the repository root.
fn normalize_join(dir: &str, spec: &str) -> Option<String> {
    let mut components: Vec<&str> = if dir.is_empty() {
        Vec::new()
    } else {
        dir.split('/').collect()
    };

    for part in spec.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                if components.pop().is_none() {
                    return None;
                }
            }
            other => components.push(other),
        }
    }

    Some(components.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn node(path: &str, imports: &[&str]) -> FileNode {
        let mut n = FileNode::basic(path, Language::from_path(path).as_str(), 10, 0);
        n.imports = imports.iter().map(|s| s.to_string()).collect();
        n
    }

    fn nodes(items: Vec<FileNode>) -> BTreeMap<String, FileNode> {
        items.into_iter().map(|n| (n.path.clone(), n)).collect()
    }

    #[test]
    fn python_absolute_and_relative_imports_resolve() {
        let files = nodes(vec![
            node("app/main.py", &["app.utils", ".handlers.login"]),
            node("app/utils.py", &[]),
            node("app/handlers/login.py", &[]),
            node("app/handlers/__init__.py", &[]),
        ]);

        let graph = DependencyGraphBuilder::build(&files);

        assert_eq!(
            graph.dependencies_of("app/main.py"),
            ["app/utils.py", "app/handlers/login.py"]
                .iter()
                .map(|s| s.to_string())
                .collect()
        );
    }

    #[test]
    fn python_symbol_import_falls_back_to_parent_module() {
        let files = nodes(vec![
            node("pkg/api.py", &["pkg.models.User"]),
            node("pkg/models.py", &[]),
        ]);

        let graph = DependencyGraphBuilder::build(&files);

        assert!(graph.dependencies_of("pkg/api.py").contains("pkg/models.py"));
    }

    #[test]
    fn unresolved_imports_are_recorded_as_external() {
        let files = nodes(vec![node("main.py", &["numpy", "os.path"])]);

        let graph = DependencyGraphBuilder::build(&files);

        assert_eq!(graph.edge_count(), 0);
        assert_eq!(
            graph.external_of("main.py"),
            ["numpy", "os.path"].iter().map(|s| s.to_string()).collect()
        );
    }

    #[test]
    fn js_relative_imports_probe_extensions_and_index() {
        let files = nodes(vec![
            node("src/app.ts", &["./util", "../shared", "react"]),
            node("src/util.ts", &[]),
            node("shared/index.ts", &[]),
        ]);

        let graph = DependencyGraphBuilder::build(&files);

        assert_eq!(
            graph.dependencies_of("src/app.ts"),
            ["src/util.ts", "shared/index.ts"]
                .iter()
                .map(|s| s.to_string())
                .collect()
        );
        assert!(graph.external_of("src/app.ts").contains("react"));
    }

    #[test]
    fn js_specifier_escaping_the_root_is_external() {
        let files = nodes(vec![node("app.js", &["../outside"]), node("lib.js", &[])]);

        let graph = DependencyGraphBuilder::build(&files);

        assert_eq!(graph.edge_count(), 0);
        assert!(graph.external_of("app.js").contains("../outside"));
    }

    #[test]
    fn go_package_imports_resolve_to_all_package_files() {
        let files = nodes(vec![
            node("cmd/main.go", &["example.com/app/store", "fmt"]),
            node("store/db.go", &[]),
            node("store/cache.go", &[]),
        ]);

        let graph = DependencyGraphBuilder::build(&files);

        assert_eq!(
            graph.dependencies_of("cmd/main.go"),
            ["store/cache.go", "store/db.go"]
                .iter()
                .map(|s| s.to_string())
                .collect()
        );
        assert!(graph.external_of("cmd/main.go").contains("fmt"));
    }

    #[test]
    fn cycle_is_reported_but_does_not_block_construction() {
        let files = nodes(vec![
            node("a.py", &["b"]),
            node("b.py", &["c"]),
            node("c.py", &["a"]),
        ]);

        let graph = DependencyGraphBuilder::build(&files);

        assert_eq!(graph.edge_count(), 3);
        assert_eq!(graph.cycles.len(), 1);
        assert_eq!(graph.cycles[0], vec!["a.py", "b.py", "c.py"]);
    }

    #[test]
    fn update_file_only_touches_outgoing_edges() {
        let mut files = nodes(vec![
            node("a.py", &["b"]),
            node("b.py", &["c"]),
            node("c.py", &[]),
        ]);

        let mut graph = DependencyGraphBuilder::build(&files);
        assert!(graph.dependencies_of("b.py").contains("c.py"));

        // b.py no longer imports c.py
        files.get_mut("b.py").unwrap().imports.clear();
        let changed = files.get("b.py").unwrap().clone();
        DependencyGraphBuilder::update_file(&mut graph, &changed, &files);

        assert_eq!(graph.dependencies_of("b.py").len(), 0);
        // a.py -> b.py edge survives
        assert_eq!(graph.in_degree("b.py"), 1);
    }

    #[test]
    fn remove_file_clears_edges_and_externals() {
        let files = nodes(vec![node("a.py", &["b", "requests"]), node("b.py", &[])]);

        let mut graph = DependencyGraphBuilder::build(&files);
        DependencyGraphBuilder::remove_file(&mut graph, "a.py");

        assert_eq!(graph.edge_count(), 0);
        assert!(graph.external_all().is_empty());
    }
}
