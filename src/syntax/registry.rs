//! Per-language syntax validation keyed by file extension.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use rustpython_parser::ast;
use rustpython_parser::Parse;
use tree_sitter::{Language, Node, Parser};

use crate::syntax::lines::LineIndex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxIssue {
    /// 1-based line of the first problem, when known.
    pub line: Option<usize>,
    pub message: String,
}

impl std::fmt::Display for SyntaxIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.line {
            Some(line) => write!(f, "line {line}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Checks that a source text is syntactically valid for one language.
pub trait SyntaxCheck: Send + Sync {
    fn language(&self) -> &'static str;
    fn check(&self, source: &str) -> Result<(), SyntaxIssue>;
}

struct PythonCheck;

impl SyntaxCheck for PythonCheck {
    fn language(&self) -> &'static str {
        "python"
    }

    fn check(&self, source: &str) -> Result<(), SyntaxIssue> {
        ast::Suite::parse(source, "<generated>").map(|_| ()).map_err(|err| SyntaxIssue {
            line: Some(LineIndex::new(source).line_of(usize::from(err.offset))),
            message: err.error.to_string(),
        })
    }
}

/// Error-node scan over a tree-sitter parse.
struct TreeSitterCheck {
    name: &'static str,
    language: Language,
}

impl SyntaxCheck for TreeSitterCheck {
    fn language(&self) -> &'static str {
        self.name
    }

    fn check(&self, source: &str) -> Result<(), SyntaxIssue> {
        let mut parser = Parser::new();
        parser.set_language(&self.language).map_err(|e| SyntaxIssue {
            line: None,
            message: format!("{} grammar unavailable: {e}", self.name),
        })?;
        let Some(tree) = parser.parse(source, None) else {
            return Err(SyntaxIssue { line: None, message: "parse cancelled".to_string() });
        };
        let root = tree.root_node();
        if !root.has_error() {
            return Ok(());
        }
        let line = first_error(root).map(|n| n.start_position().row + 1);
        Err(SyntaxIssue { line, message: format!("{} syntax error", self.name) })
    }
}

fn first_error(node: Node<'_>) -> Option<Node<'_>> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    for i in 0..node.child_count() {
        if let Some(child) = node.child(i) {
            if child.has_error() {
                if let Some(found) = first_error(child) {
                    return Some(found);
                }
            }
        }
    }
    None
}

/// Extension → validator table. Unknown extensions always validate.
#[derive(Clone)]
pub struct ParserRegistry {
    checks: HashMap<String, Arc<dyn SyntaxCheck>>,
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

impl ParserRegistry {
    pub fn empty() -> Self {
        Self { checks: HashMap::new() }
    }

    pub fn with_builtin() -> Self {
        let mut registry = Self::empty();
        registry.register(&["py", "pyi"], Arc::new(PythonCheck));
        let tree_sitter: [(&'static str, Language, &[&str]); 4] = [
            ("rust", tree_sitter_rust::LANGUAGE.into(), &["rs"]),
            ("javascript", tree_sitter_javascript::LANGUAGE.into(), &["js", "jsx", "mjs", "cjs"]),
            ("typescript", tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(), &["ts"]),
            ("go", tree_sitter_go::LANGUAGE.into(), &["go"]),
        ];
        for (name, language, extensions) in tree_sitter {
            registry.register(extensions, Arc::new(TreeSitterCheck { name, language }));
        }
        registry.register(
            &["tsx"],
            Arc::new(TreeSitterCheck {
                name: "tsx",
                language: tree_sitter_typescript::LANGUAGE_TSX.into(),
            }),
        );
        registry
    }

    pub fn register(&mut self, extensions: &[&str], check: Arc<dyn SyntaxCheck>) {
        for ext in extensions {
            self.checks.insert(ext.to_ascii_lowercase(), Arc::clone(&check));
        }
    }

    pub fn for_path(&self, path: &str) -> Option<&dyn SyntaxCheck> {
        let ext = Path::new(path).extension()?.to_str()?.to_ascii_lowercase();
        self.checks.get(&ext).map(|c| c.as_ref())
    }

    pub fn validate(&self, path: &str, source: &str) -> Result<(), SyntaxIssue> {
        match self.for_path(path) {
            Some(check) => check.check(source),
            None => Ok(()),
        }
    }

    pub fn supports(&self, path: &str) -> bool {
        self.for_path(path).is_some()
    }
}
