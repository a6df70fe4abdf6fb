use crate::error::{AnalyzerError, Result};
use crate::language::Language;
use crate::types::{content_fingerprint, ClassSignature, FileNode, FunctionSignature};
use std::collections::HashSet;
use tree_sitter::{Node, Parser};

/// AST-based structural analyzer for a single language
///
/// Stateless with respect to the repository: one call consumes one file's
/// text and produces one `FileNode`. Import strings are recorded raw;
/// resolving them against other files is the graph builder's job.
pub struct FileAnalyzer {
    language: Language,
    parser: Parser,
}

impl FileAnalyzer {
    /// Create a new analyzer for a language with AST support
    pub fn new(language: Language) -> Result<Self> {
        if !language.supports_ast() {
            return Err(AnalyzerError::unsupported_language(language.as_str()));
        }

        let ts_language = language.tree_sitter_language()?;
        let mut parser = Parser::new();
        parser
            .set_language(&ts_language)
            .map_err(|e| AnalyzerError::tree_sitter(format!("Failed to set language: {e}")))?;

        Ok(Self { language, parser })
    }

    /// Analyze one file's text into a structural summary.
    ///
    /// Syntax errors never fail the call: tree-sitter recovers what it can
    /// and the resulting node is tagged `partial: true`.
    pub fn analyze(&mut self, rel_path: &str, content: &str, mtime_ms: u64) -> Result<FileNode> {
        let tree = self
            .parser
            .parse(content, None)
            .ok_or_else(|| AnalyzerError::parse(format!("Failed to parse {rel_path}")))?;

        let root = tree.root_node();
        let partial = root.has_error();
        if partial {
            log::debug!("Recovered partial parse for {rel_path}");
        }

        let module_path = module_path_for(rel_path, self.language);

        let mut functions = Vec::new();
        let mut classes = Vec::new();
        match self.language {
            Language::Python => {
                self.extract_python(root, content, &module_path, &mut functions, &mut classes);
            }
            Language::JavaScript | Language::TypeScript => {
                self.extract_js(root, content, &module_path, &mut functions, &mut classes);
            }
            Language::Go => {
                self.extract_go(root, content, &module_path, &mut functions, &mut classes);
            }
            Language::Unknown => {}
        }

        let imports = self.extract_imports(root, content);

        Ok(FileNode {
            path: rel_path.to_string(),
            language: self.language.as_str().to_string(),
            lines: content.lines().count(),
            functions,
            classes,
            imports,
            dependencies: Default::default(),
            content_hash: content_fingerprint(content.as_bytes()),
            mtime_ms,
            partial,
        })
    }

    // ----- Python -----

    fn extract_python(
        &self,
        root: Node,
        src: &str,
        module_path: &str,
        functions: &mut Vec<FunctionSignature>,
        classes: &mut Vec<ClassSignature>,
    ) {
        let mut cursor = root.walk();
        for child in root.named_children(&mut cursor) {
            match child.kind() {
                "function_definition" => {
                    if let Some(f) = self.python_function(child, src, module_path, false) {
                        functions.push(f);
                    }
                }
                "class_definition" => {
                    if let Some(c) = self.python_class(child, src, module_path) {
                        classes.push(c);
                    }
                }
                "decorated_definition" => {
                    if let Some(def) = child.child_by_field_name("definition") {
                        match def.kind() {
                            "function_definition" => {
                                if let Some(f) = self.python_function(def, src, module_path, false)
                                {
                                    functions.push(f);
                                }
                            }
                            "class_definition" => {
                                if let Some(c) = self.python_class(def, src, module_path) {
                                    classes.push(c);
                                }
                            }
                            _ => {}
                        }
                    }
                }
                _ => {}
            }
        }
    }

    fn python_function(
        &self,
        node: Node,
        src: &str,
        module_path: &str,
        is_method: bool,
    ) -> Option<FunctionSignature> {
        let name = node_text(node.child_by_field_name("name")?, src).to_string();

        let mut parameters = Vec::new();
        if let Some(params) = node.child_by_field_name("parameters") {
            let mut cursor = params.walk();
            for p in params.named_children(&mut cursor) {
                if p.kind() != "comment" {
                    parameters.push(node_text(p, src).to_string());
                }
            }
        }

        let return_type = node
            .child_by_field_name("return_type")
            .map(|r| node_text(r, src).to_string());

        let doc = node
            .child_by_field_name("body")
            .and_then(|body| python_docstring(body, src));

        Some(FunctionSignature {
            name,
            module_path: module_path.to_string(),
            line_start: node.start_position().row + 1,
            line_end: node.end_position().row + 1,
            parameters,
            return_type,
            doc,
            complexity: complexity(node, self.language, src),
            is_async: node.child(0).is_some_and(|c| c.kind() == "async"),
            is_method,
        })
    }

    fn python_class(&self, node: Node, src: &str, module_path: &str) -> Option<ClassSignature> {
        let name = node_text(node.child_by_field_name("name")?, src).to_string();

        let mut bases = Vec::new();
        if let Some(superclasses) = node.child_by_field_name("superclasses") {
            let mut cursor = superclasses.walk();
            for base in superclasses.named_children(&mut cursor) {
                if base.kind() != "comment" {
                    bases.push(node_text(base, src).to_string());
                }
            }
        }

        let mut methods = Vec::new();
        let mut doc = None;
        if let Some(body) = node.child_by_field_name("body") {
            doc = python_docstring(body, src);
            let mut cursor = body.walk();
            for item in body.named_children(&mut cursor) {
                let def = if item.kind() == "decorated_definition" {
                    item.child_by_field_name("definition")
                } else {
                    Some(item)
                };
                if let Some(def) = def {
                    if def.kind() == "function_definition" {
                        if let Some(m) = self.python_function(def, src, module_path, true) {
                            methods.push(m);
                        }
                    }
                }
            }
        }

        Some(ClassSignature {
            name,
            module_path: module_path.to_string(),
            line_start: node.start_position().row + 1,
            line_end: node.end_position().row + 1,
            bases,
            methods,
            doc,
        })
    }

    // ----- JavaScript / TypeScript -----

    fn extract_js(
        &self,
        root: Node,
        src: &str,
        module_path: &str,
        functions: &mut Vec<FunctionSignature>,
        classes: &mut Vec<ClassSignature>,
    ) {
        let mut cursor = root.walk();
        for child in root.named_children(&mut cursor) {
            self.js_item(child, child, src, module_path, functions, classes);
        }
    }

    /// `anchor` is the outermost statement node; doc comments sit beside it,
    /// not beside a declaration unwrapped from an `export` wrapper.
    fn js_item(
        &self,
        node: Node,
        anchor: Node,
        src: &str,
        module_path: &str,
        functions: &mut Vec<FunctionSignature>,
        classes: &mut Vec<ClassSignature>,
    ) {
        match node.kind() {
            "export_statement" => {
                if let Some(decl) = node.child_by_field_name("declaration") {
                    self.js_item(decl, anchor, src, module_path, functions, classes);
                }
            }
            "function_declaration" | "generator_function_declaration" => {
                if let Some(f) = self.js_function_with_anchor(node, anchor, src, module_path, false)
                {
                    functions.push(f);
                }
            }
            "class_declaration" => {
                if let Some(c) = self.js_class(node, anchor, src, module_path) {
                    classes.push(c);
                }
            }
            "lexical_declaration" | "variable_declaration" => {
                let mut cursor = node.walk();
                for declarator in node.named_children(&mut cursor) {
                    if declarator.kind() != "variable_declarator" {
                        continue;
                    }
                    let Some(value) = declarator.child_by_field_name("value") else {
                        continue;
                    };
                    if matches!(value.kind(), "arrow_function" | "function_expression") {
                        if let Some(f) =
                            self.js_assigned_function(declarator, value, anchor, src, module_path)
                        {
                            functions.push(f);
                        }
                    }
                }
            }
            _ => {}
        }
    }

    fn js_function(
        &self,
        node: Node,
        src: &str,
        module_path: &str,
        is_method: bool,
    ) -> Option<FunctionSignature> {
        self.js_function_with_anchor(node, node, src, module_path, is_method)
    }

    fn js_function_with_anchor(
        &self,
        node: Node,
        anchor: Node,
        src: &str,
        module_path: &str,
        is_method: bool,
    ) -> Option<FunctionSignature> {
        let name = node_text(node.child_by_field_name("name")?, src).to_string();

        Some(FunctionSignature {
            name,
            module_path: module_path.to_string(),
            line_start: node.start_position().row + 1,
            line_end: node.end_position().row + 1,
            parameters: js_parameters(node, src),
            return_type: js_return_type(node, src),
            doc: leading_comment(anchor, src),
            complexity: complexity(node, self.language, src),
            is_async: node.child(0).is_some_and(|c| c.kind() == "async"),
            is_method,
        })
    }

    /// `const handler = async (req) => {...}` style definitions
    fn js_assigned_function(
        &self,
        declarator: Node,
        value: Node,
        anchor: Node,
        src: &str,
        module_path: &str,
    ) -> Option<FunctionSignature> {
        let name = node_text(declarator.child_by_field_name("name")?, src).to_string();

        Some(FunctionSignature {
            name,
            module_path: module_path.to_string(),
            line_start: declarator.start_position().row + 1,
            line_end: declarator.end_position().row + 1,
            parameters: js_parameters(value, src),
            return_type: js_return_type(value, src),
            doc: leading_comment(anchor, src),
            complexity: complexity(value, self.language, src),
            is_async: value.child(0).is_some_and(|c| c.kind() == "async"),
            is_method: false,
        })
    }

    fn js_class(
        &self,
        node: Node,
        anchor: Node,
        src: &str,
        module_path: &str,
    ) -> Option<ClassSignature> {
        let name = node_text(node.child_by_field_name("name")?, src).to_string();

        // `extends`/`implements` live under class_heritage in both grammars
        let mut bases = Vec::new();
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.kind() != "class_heritage" {
                continue;
            }
            let mut heritage_cursor = child.walk();
            for clause in child.named_children(&mut heritage_cursor) {
                match clause.kind() {
                    "extends_clause" | "implements_clause" => {
                        let mut clause_cursor = clause.walk();
                        for base in clause.named_children(&mut clause_cursor) {
                            bases.push(node_text(base, src).to_string());
                        }
                    }
                    _ => bases.push(node_text(clause, src).to_string()),
                }
            }
        }

        let mut methods = Vec::new();
        if let Some(body) = node.child_by_field_name("body") {
            let mut body_cursor = body.walk();
            for member in body.named_children(&mut body_cursor) {
                if member.kind() == "method_definition" {
                    if let Some(m) = self.js_function(member, src, module_path, true) {
                        methods.push(m);
                    }
                }
            }
        }

        Some(ClassSignature {
            name,
            module_path: module_path.to_string(),
            line_start: node.start_position().row + 1,
            line_end: node.end_position().row + 1,
            bases,
            methods,
            doc: leading_comment(anchor, src),
        })
    }

    // ----- Go -----

    fn extract_go(
        &self,
        root: Node,
        src: &str,
        module_path: &str,
        functions: &mut Vec<FunctionSignature>,
        classes: &mut Vec<ClassSignature>,
    ) {
        let mut cursor = root.walk();
        for child in root.named_children(&mut cursor) {
            match child.kind() {
                "function_declaration" => {
                    if let Some(f) = self.go_function(child, src, module_path, false) {
                        functions.push(f);
                    }
                }
                "method_declaration" => {
                    if let Some(f) = self.go_function(child, src, module_path, true) {
                        functions.push(f);
                    }
                }
                "type_declaration" => {
                    let mut spec_cursor = child.walk();
                    for spec in child.named_children(&mut spec_cursor) {
                        if spec.kind() != "type_spec" {
                            continue;
                        }
                        let is_class_like = spec
                            .child_by_field_name("type")
                            .is_some_and(|t| {
                                matches!(t.kind(), "struct_type" | "interface_type")
                            });
                        if !is_class_like {
                            continue;
                        }
                        if let Some(name) = spec.child_by_field_name("name") {
                            classes.push(ClassSignature {
                                name: node_text(name, src).to_string(),
                                module_path: module_path.to_string(),
                                line_start: spec.start_position().row + 1,
                                line_end: spec.end_position().row + 1,
                                bases: Vec::new(),
                                methods: Vec::new(),
                                doc: leading_comment(child, src),
                            });
                        }
                    }
                }
                _ => {}
            }
        }
    }

    fn go_function(
        &self,
        node: Node,
        src: &str,
        module_path: &str,
        is_method: bool,
    ) -> Option<FunctionSignature> {
        let name = node_text(node.child_by_field_name("name")?, src).to_string();

        let mut parameters = Vec::new();
        if let Some(params) = node.child_by_field_name("parameters") {
            let mut cursor = params.walk();
            for p in params.named_children(&mut cursor) {
                parameters.push(node_text(p, src).to_string());
            }
        }

        let return_type = node
            .child_by_field_name("result")
            .map(|r| node_text(r, src).to_string());

        Some(FunctionSignature {
            name,
            module_path: module_path.to_string(),
            line_start: node.start_position().row + 1,
            line_end: node.end_position().row + 1,
            parameters,
            return_type,
            doc: leading_comment(node, src),
            complexity: complexity(node, self.language, src),
            is_async: false,
            is_method,
        })
    }

    // ----- Imports -----

    /// Collect raw import strings for the whole file, in source order.
    ///
    /// The strings stay unresolved here; language-specific resolution against
    /// the set of indexed files happens in the graph builder.
    fn extract_imports(&self, root: Node, src: &str) -> Vec<String> {
        let mut imports = Vec::new();
        let mut seen = HashSet::new();
        let mut stack = vec![root];

        while let Some(node) = stack.pop() {
            match (self.language, node.kind()) {
                (Language::Python, "import_statement") => {
                    let mut cursor = node.walk();
                    for child in node.named_children(&mut cursor) {
                        match child.kind() {
                            "dotted_name" => {
                                push_unique(&mut imports, &mut seen, node_text(child, src));
                            }
                            "aliased_import" => {
                                if let Some(name) = child.child_by_field_name("name") {
                                    push_unique(&mut imports, &mut seen, node_text(name, src));
                                }
                            }
                            _ => {}
                        }
                    }
                }
                (Language::Python, "import_from_statement") => {
                    let module = node
                        .child_by_field_name("module_name")
                        .map(|m| (m.id(), node_text(m, src)));
                    if let Some((module_id, module_text)) = module {
                        let mut cursor = node.walk();
                        for child in node.named_children(&mut cursor) {
                            if child.id() == module_id {
                                continue;
                            }
                            match child.kind() {
                                "dotted_name" => {
                                    let joined =
                                        join_python_module(module_text, node_text(child, src));
                                    push_unique(&mut imports, &mut seen, &joined);
                                }
                                "aliased_import" => {
                                    if let Some(name) = child.child_by_field_name("name") {
                                        let joined = join_python_module(
                                            module_text,
                                            node_text(name, src),
                                        );
                                        push_unique(&mut imports, &mut seen, &joined);
                                    }
                                }
                                "wildcard_import" => {
                                    push_unique(&mut imports, &mut seen, module_text);
                                }
                                _ => {}
                            }
                        }
                    }
                }
                (Language::JavaScript | Language::TypeScript, "import_statement")
                | (Language::JavaScript | Language::TypeScript, "export_statement") => {
                    if let Some(source) = node.child_by_field_name("source") {
                        push_unique(&mut imports, &mut seen, trim_quotes(node_text(source, src)));
                    }
                }
                (Language::JavaScript | Language::TypeScript, "call_expression") => {
                    // CommonJS require("...")
                    let is_require = node
                        .child_by_field_name("function")
                        .is_some_and(|f| node_text(f, src) == "require");
                    if is_require {
                        if let Some(args) = node.child_by_field_name("arguments") {
                            let mut cursor = args.walk();
                            for arg in args.named_children(&mut cursor) {
                                if arg.kind() == "string" {
                                    push_unique(
                                        &mut imports,
                                        &mut seen,
                                        trim_quotes(node_text(arg, src)),
                                    );
                                }
                            }
                        }
                    }
                }
                (Language::Go, "import_spec") => {
                    if let Some(path) = node.child_by_field_name("path") {
                        push_unique(&mut imports, &mut seen, trim_quotes(node_text(path, src)));
                    }
                }
                _ => {}
            }

            // Depth-first in reverse so pops preserve source order
            for i in (0..node.child_count()).rev() {
                if let Some(child) = node.child(i) {
                    stack.push(child);
                }
            }
        }

        imports
    }
}

/// Analyze one file's text, detecting the language from the path.
///
/// Unknown extensions yield a zero-signature node with a correct line count
/// and the `"unknown"` language tag so repository totals stay accurate.
pub fn analyze_source(rel_path: &str, content: &str, mtime_ms: u64) -> Result<FileNode> {
    let language = Language::from_path(rel_path);
    if !language.supports_ast() {
        let mut node = FileNode::basic(
            rel_path,
            language.as_str(),
            content.lines().count(),
            mtime_ms,
        );
        node.content_hash = content_fingerprint(content.as_bytes());
        return Ok(node);
    }

    let mut analyzer = FileAnalyzer::new(language)?;
    analyzer.analyze(rel_path, content, mtime_ms)
}

/// Decode raw file bytes as UTF-8 or fail with `Unreadable`
pub fn decode_utf8<'a>(rel_path: &str, bytes: &'a [u8]) -> Result<&'a str> {
    std::str::from_utf8(bytes).map_err(|_| AnalyzerError::unreadable(rel_path))
}

/// Module path for a file: dotted for Python, extension-stripped otherwise
fn module_path_for(rel_path: &str, language: Language) -> String {
    match language {
        Language::Python => {
            let stem = rel_path
                .strip_suffix(".py")
                .or_else(|| rel_path.strip_suffix(".pyw"))
                .unwrap_or(rel_path);
            let stem = stem.strip_suffix("/__init__").unwrap_or(stem);
            stem.replace('/', ".")
        }
        _ => match rel_path.rsplit_once('.') {
            Some((stem, _)) => stem.to_string(),
            None => rel_path.to_string(),
        },
    }
}

/// Cyclomatic complexity: decision points in the subtree, plus one
fn complexity(node: Node, language: Language, src: &str) -> u32 {
    let mut count = 1u32;
    let mut stack = vec![node];

    while let Some(n) = stack.pop() {
        for i in 0..n.child_count() {
            if let Some(child) = n.child(i) {
                stack.push(child);
            }
        }
        if n.id() == node.id() {
            continue;
        }
        if is_decision_point(n, language, src) {
            count += 1;
        }
    }

    count
}

fn is_decision_point(node: Node, language: Language, src: &str) -> bool {
    match language {
        Language::Python => matches!(
            node.kind(),
            "if_statement"
                | "elif_clause"
                | "for_statement"
                | "while_statement"
                | "except_clause"
                | "with_statement"
                | "boolean_operator"
                | "conditional_expression"
                | "for_in_clause"
                | "if_clause"
                | "case_clause"
        ),
        Language::JavaScript | Language::TypeScript => match node.kind() {
            "if_statement" | "for_statement" | "for_in_statement" | "while_statement"
            | "do_statement" | "catch_clause" | "ternary_expression" | "switch_case" => true,
            "binary_expression" => is_boolean_binary(node, src),
            _ => false,
        },
        Language::Go => match node.kind() {
            "if_statement" | "for_statement" | "expression_case" | "type_case"
            | "communication_case" => true,
            "binary_expression" => is_boolean_binary(node, src),
            _ => false,
        },
        Language::Unknown => false,
    }
}

fn is_boolean_binary(node: Node, src: &str) -> bool {
    node.child_by_field_name("operator")
        .map(|op| matches!(node_text(op, src), "&&" | "||"))
        .unwrap_or(false)
}

fn node_text<'a>(node: Node, src: &'a str) -> &'a str {
    &src[node.start_byte()..node.end_byte()]
}

/// Parameters of a JS/TS function-like node.
/// Arrow functions with a single bare identifier use the `parameter` field.
fn js_parameters(node: Node, src: &str) -> Vec<String> {
    if let Some(single) = node.child_by_field_name("parameter") {
        return vec![node_text(single, src).to_string()];
    }

    let mut parameters = Vec::new();
    if let Some(params) = node.child_by_field_name("parameters") {
        let mut cursor = params.walk();
        for p in params.named_children(&mut cursor) {
            if p.kind() != "comment" {
                parameters.push(node_text(p, src).to_string());
            }
        }
    }
    parameters
}

/// TypeScript return-type annotation, without the leading `:`
fn js_return_type(node: Node, src: &str) -> Option<String> {
    node.child_by_field_name("return_type").map(|r| {
        node_text(r, src)
            .trim_start_matches(':')
            .trim()
            .to_string()
    })
}

fn push_unique(imports: &mut Vec<String>, seen: &mut HashSet<String>, value: &str) {
    if !value.is_empty() && seen.insert(value.to_string()) {
        imports.push(value.to_string());
    }
}

/// Join a `from X import Y` pair into a single dotted import string.
/// Relative modules keep their leading dots (`.utils` + `helper` -> `.utils.helper`).
fn join_python_module(module: &str, name: &str) -> String {
    if module.ends_with('.') {
        format!("{module}{name}")
    } else {
        format!("{module}.{name}")
    }
}

fn trim_quotes(s: &str) -> &str {
    s.trim_matches(|c| c == '"' || c == '\'' || c == '`')
}

/// First statement of a block, when it is a bare string literal
fn python_docstring(body: Node, src: &str) -> Option<String> {
    let first = body.named_child(0)?;
    if first.kind() != "expression_statement" {
        return None;
    }
    let string = first.named_child(0)?;
    if string.kind() != "string" {
        return None;
    }

    let mut cursor = string.walk();
    for part in string.named_children(&mut cursor) {
        if part.kind() == "string_content" {
            return Some(node_text(part, src).trim().to_string());
        }
    }
    // Grammar without string_content nodes: strip the quotes by hand
    Some(
        node_text(string, src)
            .trim_matches(|c| c == '"' || c == '\'')
            .trim()
            .to_string(),
    )
}

/// Contiguous comment block directly above a node, cleaned of markers
fn leading_comment(node: Node, src: &str) -> Option<String> {
    let mut parts: Vec<&str> = Vec::new();
    let mut expected_row = node.start_position().row;
    let mut prev = node.prev_sibling();

    while let Some(p) = prev {
        if p.kind() != "comment" || p.end_position().row + 1 < expected_row {
            break;
        }
        expected_row = p.start_position().row;
        parts.push(node_text(p, src));
        prev = p.prev_sibling();
    }

    if parts.is_empty() {
        return None;
    }
    parts.reverse();

    let cleaned: Vec<String> = parts
        .iter()
        .flat_map(|part| part.lines())
        .map(clean_comment_line)
        .filter(|l| !l.is_empty())
        .collect();

    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.join("\n"))
    }
}

fn clean_comment_line(line: &str) -> String {
    line.trim()
        .trim_start_matches("/**")
        .trim_start_matches("/*")
        .trim_start_matches("//")
        .trim_start_matches('*')
        .trim_end_matches("*/")
        .trim()
        .to_string()
}
