//! Lossless definition removal over the tree-sitter concrete syntax tree.
//!
//! A removed definition takes its decorators, the comment lines attached
//! directly above it, and the blank run that separated it from the previous
//! statement. Every other byte survives as it was.

use std::collections::HashSet;

use tree_sitter::{Language, Node, Parser, Tree};

use crate::error::{SpliceError, SpliceResult};
use crate::syntax::lines::{is_blank, split_lines_keep};
use crate::syntax::DefinitionRemover;

const DEFINITION_KINDS: &[&str] = &["function_definition", "class_definition"];

fn parse_python(source: &str) -> SpliceResult<Tree> {
    let language: Language = tree_sitter_python::LANGUAGE.into();
    let mut parser = Parser::new();
    parser
        .set_language(&language)
        .map_err(|e| SpliceError::StructuralTransform(format!("python grammar unavailable: {e}")))?;
    parser
        .parse(source, None)
        .ok_or_else(|| SpliceError::StructuralTransform("python parse was cancelled".to_string()))
}

/// The definition node behind `node`, looking through decorators.
fn definition_of(node: Node<'_>) -> Option<Node<'_>> {
    match node.kind() {
        "decorated_definition" => node.child_by_field_name("definition"),
        kind if DEFINITION_KINDS.contains(&kind) => Some(node),
        _ => None,
    }
}

fn name_of<'a>(definition: Node<'_>, source: &'a str) -> Option<&'a str> {
    definition.child_by_field_name("name")?.utf8_text(source.as_bytes()).ok()
}

/// Inclusive 0-based row span. A node ending at column 0 stops on the row before.
fn row_span(node: Node<'_>) -> (usize, usize) {
    let start = node.start_position().row;
    let end = node.end_position();
    let last = if end.column == 0 && end.row > start { end.row - 1 } else { end.row };
    (start, last)
}

struct RemovalPlan {
    rows: Vec<(usize, usize)>,
    /// Rows that need a `pass` inserted before them so a class body stays valid.
    fillers: Vec<usize>,
}

fn plan_block(block: Node<'_>, source: &str, names: &HashSet<&str>, plan: &mut RemovalPlan) {
    for i in 0..block.named_child_count() {
        let Some(child) = block.named_child(i) else {
            continue;
        };
        let Some(definition) = definition_of(child) else {
            continue;
        };
        let Some(name) = name_of(definition, source) else {
            continue;
        };
        if names.contains(name) {
            plan.rows.push(row_span(child));
            continue;
        }
        if definition.kind() != "class_definition" {
            continue;
        }
        let Some(body) = definition.child_by_field_name("body") else {
            continue;
        };
        let before = plan.rows.len();
        plan_block(body, source, names, plan);
        if plan.rows.len() > before && body_emptied(body, source, names) {
            plan.fillers.push(plan.rows[before].0);
        }
    }
}

fn body_emptied(body: Node<'_>, source: &str, names: &HashSet<&str>) -> bool {
    (0..body.named_child_count())
        .filter_map(|i| body.named_child(i))
        .filter(|child| child.kind() != "comment")
        .all(|child| {
            definition_of(child)
                .and_then(|d| name_of(d, source))
                .is_some_and(|name| names.contains(name))
        })
}

/// Remove the named definitions, keeping every untouched byte as it was.
pub fn remove_definitions(source: &str, names: &[String]) -> SpliceResult<String> {
    if names.is_empty() {
        return Ok(source.to_string());
    }
    let tree = parse_python(source)?;
    let root = tree.root_node();
    if root.has_error() {
        return Err(SpliceError::StructuralTransform(
            "source does not parse; refusing lossless removal".to_string(),
        ));
    }

    let wanted: HashSet<&str> = names.iter().map(String::as_str).collect();
    let mut plan = RemovalPlan { rows: Vec::new(), fillers: Vec::new() };
    plan_block(root, source, &wanted, &mut plan);
    if plan.rows.is_empty() {
        return Ok(source.to_string());
    }

    let lines = split_lines_keep(source);
    let mut keep = vec![true; lines.len()];
    for &(start, end) in &plan.rows {
        for flag in keep.iter_mut().take(end + 1).skip(start) {
            *flag = false;
        }
    }
    for &(start, end) in &plan.rows {
        absorb_separating_blanks(&lines, &mut keep, start, end);
    }

    let mut out = String::with_capacity(source.len());
    for (row, line) in lines.iter().enumerate() {
        if plan.fillers.contains(&row) {
            let indent: String = line.chars().take_while(|c| *c == ' ' || *c == '\t').collect();
            out.push_str(&indent);
            out.push_str("pass\n");
        }
        if keep[row] {
            out.push_str(line);
        }
    }

    let check = parse_python(&out)?;
    if check.root_node().has_error() {
        return Err(SpliceError::StructuralTransform(
            "removal produced a module that no longer parses".to_string(),
        ));
    }
    Ok(out)
}

/// Drop the comment lines attached directly above a removed span and the
/// blank run before them. Comments indented deeper than the definition belong
/// to the body above and stay. At the top of the file, where nothing precedes
/// it, drop the blank run below instead.
fn absorb_separating_blanks(lines: &[&str], keep: &mut [bool], start: usize, end: usize) {
    let depth = indent_width(lines[start]);
    let mut row = start;
    while row > 0 && is_attached_comment(lines[row - 1]) && indent_width(lines[row - 1]) <= depth {
        row -= 1;
    }
    while row > 0 && is_blank(lines[row - 1]) {
        row -= 1;
    }
    for flag in keep.iter_mut().take(start).skip(row) {
        *flag = false;
    }
    if (0..row).any(|r| keep[r]) {
        return;
    }
    let mut after = end + 1;
    while after < lines.len() && is_blank(lines[after]) {
        keep[after] = false;
        after += 1;
    }
}

fn indent_width(line: &str) -> usize {
    line.len() - line.trim_start_matches([' ', '\t']).len()
}

fn is_attached_comment(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with('#') && !trimmed.starts_with("#!")
}

/// Lossless backend for [`DefinitionRemover`].
#[derive(Debug, Default, Clone, Copy)]
pub struct ConcreteTreeRemover;

impl DefinitionRemover for ConcreteTreeRemover {
    fn backend_name(&self) -> &'static str {
        "concrete"
    }

    fn remove_definitions(&self, source: &str, names: &[String]) -> SpliceResult<String> {
        remove_definitions(source, names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use similar_asserts::assert_eq;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn drops_attached_comment_and_keeps_survivors_verbatim() {
        let src = "import os  # os!\n\n\n# helper for foo\ndef foo():\n    return 1\n\n\n\ndef   bar( a ):\n    # odd spacing kept\n    return a\n";
        let out = remove_definitions(src, &names(&["foo"])).expect("remove");
        assert_eq!(
            out,
            "import os  # os!\n\n\n\ndef   bar( a ):\n    # odd spacing kept\n    return a\n"
        );
    }

    #[test]
    fn removes_decorated_definition_with_decorators() {
        let src = "x = 1\n\n@app.route('/')\n@login\ndef index():\n    pass\n\ny = 2\n";
        let out = remove_definitions(src, &names(&["index"])).expect("remove");
        assert_eq!(out, "x = 1\n\ny = 2\n");
    }

    #[test]
    fn removes_method_and_fills_empty_class() {
        let src = "class Keep:\n    def go(self):\n        return 1\n\n    def drop(self):\n        return 2\n\n\nclass Gone:\n    def only(self):\n        pass\n";
        let out = remove_definitions(src, &names(&["drop", "only"])).expect("remove");
        assert_eq!(
            out,
            "class Keep:\n    def go(self):\n        return 1\n\n\nclass Gone:\n    pass\n"
        );
    }

    #[test]
    fn absent_names_leave_source_identical() {
        let src = "def a():\n    pass\n";
        assert_eq!(remove_definitions(src, &names(&["zzz"])).expect("noop"), src);
        assert_eq!(remove_definitions(src, &[]).expect("noop"), src);
    }

    #[test]
    fn trailing_body_comment_of_previous_function_survives() {
        let source = "def a():\n    return 1\n    # note\ndef b():\n    return 2\n";
        let out = remove_definitions(source, &names(&["b"])).expect("remove");
        assert_eq!(out, "def a():\n    return 1\n    # note\n");

        let spaced = "def a():\n    return 1\n    # note\n\n# about b\ndef b():\n    return 2\n";
        let out = remove_definitions(spaced, &names(&["b"])).expect("remove");
        assert_eq!(out, "def a():\n    return 1\n    # note\n");
    }

    #[test]
    fn broken_input_is_an_error() {
        let err = remove_definitions("def a(:\n    pass\n", &names(&["a"]));
        assert!(matches!(err, Err(SpliceError::StructuralTransform(_))));
    }
}
