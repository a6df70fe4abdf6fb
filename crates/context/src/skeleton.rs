use crate::budget::TokenEstimator;
use repo_intel_analyzer::{ClassSignature, FileNode, FunctionSignature};

/// Compressed textual rendering of a file: signatures and one-line doc
/// summaries, never implementation bodies. This is what goes into the
/// packed context, one section per file.
pub fn render_skeleton(node: &FileNode, max_imports: usize) -> String {
    let functions: Vec<&FunctionSignature> = node.functions.iter().collect();
    let classes: Vec<TrimmedClass<'_>> = node
        .classes
        .iter()
        .map(|class| TrimmedClass {
            class,
            methods: class.methods.iter().collect(),
        })
        .collect();
    render_parts(node, max_imports, &functions, &classes)
}

/// Header-only form, the smallest possible skeleton
pub fn render_single_line(node: &FileNode) -> String {
    header_line(node)
}

/// Shrink a skeleton until it fits `budget_tokens`, dropping the
/// lowest-complexity functions first (then methods, then whole classes).
/// Returns `None` when even the header line alone does not fit.
pub fn truncate_to_fit(
    node: &FileNode,
    max_imports: usize,
    estimator: &TokenEstimator,
    budget_tokens: usize,
) -> Option<String> {
    let mut keep_functions: Vec<&FunctionSignature> = node.functions.iter().collect();
    let mut keep_classes: Vec<TrimmedClass<'_>> = node
        .classes
        .iter()
        .map(|class| TrimmedClass {
            class,
            methods: class.methods.iter().collect(),
        })
        .collect();
    let mut show_imports = max_imports;

    loop {
        let text = render_parts(node, show_imports, &keep_functions, &keep_classes);
        if estimator.estimate(&text) <= budget_tokens {
            return Some(text);
        }

        // Drop in order of least information per token
        if show_imports > 0 {
            show_imports = 0;
            continue;
        }
        if let Some(idx) = lowest_complexity_index(&keep_functions) {
            keep_functions.remove(idx);
            continue;
        }
        if let Some(class_idx) = keep_classes
            .iter()
            .position(|c| !c.methods.is_empty())
        {
            let methods = &mut keep_classes[class_idx].methods;
            if let Some(idx) = lowest_complexity_index(methods) {
                methods.remove(idx);
            }
            continue;
        }
        if !keep_classes.is_empty() {
            keep_classes.pop();
            continue;
        }

        // Header line only
        let header = header_line(node);
        if estimator.estimate(&header) <= budget_tokens {
            return Some(header);
        }
        return None;
    }
}

struct TrimmedClass<'a> {
    class: &'a ClassSignature,
    methods: Vec<&'a FunctionSignature>,
}

fn lowest_complexity_index(functions: &[&FunctionSignature]) -> Option<usize> {
    functions
        .iter()
        .enumerate()
        .min_by_key(|(_, f)| f.complexity)
        .map(|(idx, _)| idx)
}

fn header_line(node: &FileNode) -> String {
    let partial = if node.partial { " [partial]" } else { "" };
    format!(
        "FILE: {} ({} lines, {}){partial}",
        node.path, node.lines, node.language
    )
}

fn render_parts(
    node: &FileNode,
    max_imports: usize,
    functions: &[&FunctionSignature],
    classes: &[TrimmedClass<'_>],
) -> String {
    let mut lines = vec![header_line(node)];

    if max_imports > 0 && !node.imports.is_empty() {
        let shown: Vec<&str> = node
            .imports
            .iter()
            .take(max_imports)
            .map(String::as_str)
            .collect();
        let suffix = if node.imports.len() > shown.len() {
            format!(" (+{} more)", node.imports.len() - shown.len())
        } else {
            String::new()
        };
        lines.push(format!("  IMPORTS: {}{suffix}", shown.join(", ")));
    }

    if !functions.is_empty() {
        lines.push("  FUNCTIONS:".to_string());
        for func in functions {
            lines.push(format!("    - {func}"));
            if let Some(doc) = func.doc_summary() {
                lines.push(format!("        {doc}"));
            }
        }
    }

    if !classes.is_empty() {
        lines.push("  CLASSES:".to_string());
        for trimmed in classes {
            lines.push(format!("    - {}", trimmed.class));
            if let Some(doc) = trimmed
                .class
                .doc
                .as_deref()
                .and_then(|d| d.lines().find(|l| !l.trim().is_empty()))
            {
                lines.push(format!("        {}", doc.trim()));
            }
            for method in &trimmed.methods {
                lines.push(format!("        - {method}"));
            }
        }
    }

    lines.join("\n")
}
