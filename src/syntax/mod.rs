//! Syntax-aware engines: definition lookup, extraction, and removal.

pub mod concrete;
pub mod lines;
pub mod registry;
pub mod structural;

use crate::domain::{RemovalBackend, SymbolKind};
use crate::error::SpliceResult;

pub use concrete::ConcreteTreeRemover;
pub use registry::{ParserRegistry, SyntaxCheck, SyntaxIssue};
pub use structural::AbstractTreeRemover;

/// A function, method, or class located in a module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinitionSpan {
    pub name: String,
    pub kind: SymbolKind,
    /// Enclosing class for methods and nested classes.
    pub parent: Option<String>,
    pub start_line: usize,
    pub end_line: usize,
}

/// Removes named definitions from a module's source text.
pub trait DefinitionRemover: Send + Sync {
    fn backend_name(&self) -> &'static str;

    /// Names that do not exist are ignored; an empty list is a no-op.
    fn remove_definitions(&self, source: &str, names: &[String]) -> SpliceResult<String>;
}

pub fn remover_for(backend: RemovalBackend) -> Box<dyn DefinitionRemover> {
    match backend {
        RemovalBackend::Concrete => Box::new(ConcreteTreeRemover),
        RemovalBackend::Abstract => Box::new(AbstractTreeRemover),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backends_agree_on_simple_removal() {
        let src = "def foo():\n    return 1\n\n\ndef bar():\n    return 2\n";
        for backend in [RemovalBackend::Concrete, RemovalBackend::Abstract] {
            let remover = remover_for(backend);
            let out = remover.remove_definitions(src, &["foo".to_string()]).expect("remove");
            assert_eq!(out, "def bar():\n    return 2\n", "backend {}", remover.backend_name());
        }
    }
}
