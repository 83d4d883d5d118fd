//! Structural definition engine over the Python abstract syntax tree.
//!
//! Definitions are located through `rustpython-parser` and edited by line span.
//! Deletion re-renders the file with normalized blank-line spacing, so it is
//! robust but not byte-for-byte faithful outside the kept definitions.

use std::collections::{BTreeSet, HashSet};

use rustpython_parser::ast::{self, Ranged};
use rustpython_parser::Parse;

use crate::domain::{ImportRecord, Symbol, SymbolKind};
use crate::error::{SpliceError, SpliceResult};
use crate::syntax::lines::{indent_width, is_blank, split_lines_keep, LineIndex};
use crate::syntax::{DefinitionRemover, DefinitionSpan};

const SOURCE_PATH: &str = "<splice>";

fn parse_suite(source: &str) -> SpliceResult<ast::Suite> {
    ast::Suite::parse(source, SOURCE_PATH)
        .map_err(|e| SpliceError::StructuralTransform(format!("python parse error: {e}")))
}

/// Borrowed view of a function or class definition statement.
struct DefNode<'a> {
    name: &'a str,
    is_class: bool,
    body: &'a [ast::Stmt],
    decorators: &'a [ast::Expr],
    start: usize,
    end: usize,
}

fn as_definition(stmt: &ast::Stmt) -> Option<DefNode<'_>> {
    match stmt {
        ast::Stmt::FunctionDef(def) => Some(DefNode {
            name: def.name.as_str(),
            is_class: false,
            body: &def.body,
            decorators: &def.decorator_list,
            start: usize::from(def.range.start()),
            end: usize::from(def.range.end()),
        }),
        ast::Stmt::AsyncFunctionDef(def) => Some(DefNode {
            name: def.name.as_str(),
            is_class: false,
            body: &def.body,
            decorators: &def.decorator_list,
            start: usize::from(def.range.start()),
            end: usize::from(def.range.end()),
        }),
        ast::Stmt::ClassDef(def) => Some(DefNode {
            name: def.name.as_str(),
            is_class: true,
            body: &def.body,
            decorators: &def.decorator_list,
            start: usize::from(def.range.start()),
            end: usize::from(def.range.end()),
        }),
        _ => None,
    }
}

impl DefNode<'_> {
    /// Inclusive 1-based line span, starting at the first decorator.
    fn line_span(&self, index: &LineIndex) -> (usize, usize) {
        let first = self
            .decorators
            .iter()
            .map(|d| usize::from(d.start()))
            .chain(std::iter::once(self.start))
            .min()
            .unwrap_or(self.start);
        (index.line_of(first), index.line_of(self.end.saturating_sub(1).max(self.start)))
    }
}

fn walk_definitions(
    body: &[ast::Stmt],
    index: &LineIndex,
    parent: Option<&str>,
    out: &mut Vec<DefinitionSpan>,
) {
    for stmt in body {
        let Some(def) = as_definition(stmt) else {
            continue;
        };
        let (start_line, end_line) = def.line_span(index);
        let kind = match (def.is_class, parent) {
            (true, _) => SymbolKind::Class,
            (false, Some(_)) => SymbolKind::Method,
            (false, None) => SymbolKind::Function,
        };
        out.push(DefinitionSpan {
            name: def.name.to_string(),
            kind,
            parent: parent.map(str::to_string),
            start_line,
            end_line,
        });
        if def.is_class {
            walk_definitions(def.body, index, Some(def.name), out);
        }
    }
}

/// Every top-level and class-nested function/class definition, in source order.
pub fn enumerate_definitions(source: &str) -> SpliceResult<Vec<DefinitionSpan>> {
    let suite = parse_suite(source)?;
    let index = LineIndex::new(source);
    let mut out = Vec::new();
    walk_definitions(&suite, &index, None, &mut out);
    Ok(out)
}

/// Names of every definition [`enumerate_definitions`] finds.
pub fn collect_definitions(source: &str) -> SpliceResult<BTreeSet<String>> {
    Ok(enumerate_definitions(source)?.into_iter().map(|d| d.name).collect())
}

/// Exact source text of a top-level definition, decorators included.
pub fn extract_definition_source(source: &str, name: &str) -> Option<String> {
    let suite = parse_suite(source).ok()?;
    let index = LineIndex::new(source);
    let def = suite.iter().filter_map(as_definition).find(|d| d.name == name)?;
    let (start, end) = def.line_span(&index);
    Some(source[index.line_start(start)..index.line_end(end)].to_string())
}

/// Only the top-level import statements, one per line.
pub fn extract_imports_source(source: &str) -> String {
    let Ok(suite) = parse_suite(source) else {
        return String::new();
    };
    suite
        .iter()
        .filter(|stmt| matches!(stmt, ast::Stmt::Import(_) | ast::Stmt::ImportFrom(_)))
        .map(|stmt| source[usize::from(stmt.start())..usize::from(stmt.end())].to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

fn is_docstring(stmt: &ast::Stmt) -> bool {
    match stmt {
        ast::Stmt::Expr(expr) => matches!(
            expr.value.as_ref(),
            ast::Expr::Constant(ast::ExprConstant { value: ast::Constant::Str(_), .. })
        ),
        _ => false,
    }
}

fn docstring_of(body: &[ast::Stmt]) -> String {
    match body.first() {
        Some(ast::Stmt::Expr(expr)) => match expr.value.as_ref() {
            ast::Expr::Constant(ast::ExprConstant { value: ast::Constant::Str(text), .. }) => {
                clean_docstring(text)
            }
            _ => String::new(),
        },
        _ => String::new(),
    }
}

fn clean_docstring(text: &str) -> String {
    let mut lines = text.trim().lines();
    let first = lines.next().unwrap_or("").trim().to_string();
    let rest: Vec<&str> = lines.collect();
    let margin = rest.iter().filter(|l| !is_blank(l)).map(|l| indent_width(l)).min().unwrap_or(0);
    std::iter::once(first)
        .chain(rest.iter().map(|l| l.chars().skip(margin).collect::<String>()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Insert `new_import` right after the last top-level import, or before the
/// first real code line when the file has no imports yet.
pub fn inject_import(source: &str, new_import: &str) -> String {
    let addition = new_import.trim();
    if addition.is_empty() {
        return source.to_string();
    }

    let Ok(suite) = parse_suite(source) else {
        return format!("{addition}\n{source}");
    };
    let index = LineIndex::new(source);

    let mut last_import_line = 0usize;
    let mut docstring_end = 0usize;
    for (position, stmt) in suite.iter().enumerate() {
        if position == 0 && is_docstring(stmt) {
            docstring_end = index.line_of(usize::from(stmt.end()).saturating_sub(1));
            continue;
        }
        match stmt {
            ast::Stmt::Import(_) | ast::Stmt::ImportFrom(_) => {
                let end = index.line_of(usize::from(stmt.end()).saturating_sub(1));
                last_import_line = last_import_line.max(end);
            }
            _ if last_import_line > 0 => break,
            _ => {}
        }
    }

    let lines: Vec<&str> = source.lines().collect();
    let insert_at = if last_import_line > 0 {
        last_import_line
    } else {
        lines
            .iter()
            .enumerate()
            .find(|(i, line)| {
                let trimmed = line.trim();
                *i >= docstring_end && !trimmed.is_empty() && !trimmed.starts_with('#')
            })
            .map(|(i, _)| i)
            .unwrap_or(lines.len())
    };

    let mut out: Vec<&str> = Vec::with_capacity(lines.len() + 1);
    out.extend_from_slice(&lines[..insert_at]);
    out.extend(addition.lines());
    out.extend_from_slice(&lines[insert_at..]);
    let mut rendered = out.join("\n");
    if source.ends_with('\n') || source.is_empty() {
        rendered.push('\n');
    }
    rendered
}

/// Imports of a module, made absolute. `from m import X` yields `m.X`;
/// relative forms are anchored at the importer's package.
pub fn import_records(source: &str, importer_path: &str) -> SpliceResult<Vec<ImportRecord>> {
    let suite = parse_suite(source)?;
    let mut out = Vec::new();
    for stmt in &suite {
        match stmt {
            ast::Stmt::Import(import) => {
                for alias in &import.names {
                    out.push(ImportRecord {
                        module: alias.name.to_string(),
                        alias: alias.asname.as_ref().map(|a| a.to_string()),
                    });
                }
            }
            ast::Stmt::ImportFrom(import) => {
                let level = import.level.as_ref().map(|l| l.to_u32() as usize).unwrap_or(0);
                let module = import.module.as_ref().map(|m| m.as_str()).unwrap_or("");
                let base = absolutize(module, level, importer_path);
                for alias in &import.names {
                    let name = alias.name.as_str();
                    let full = if name == "*" {
                        base.clone()
                    } else if base.is_empty() {
                        name.to_string()
                    } else {
                        format!("{base}.{name}")
                    };
                    if full.is_empty() {
                        continue;
                    }
                    out.push(ImportRecord {
                        module: full,
                        alias: alias.asname.as_ref().map(|a| a.to_string()),
                    });
                }
            }
            _ => {}
        }
    }
    Ok(out)
}

fn absolutize(module: &str, level: usize, importer_path: &str) -> String {
    if level == 0 {
        return module.to_string();
    }
    let mut package: Vec<&str> = importer_path.split('/').collect();
    package.pop();
    for _ in 1..level {
        package.pop();
    }
    let mut parts: Vec<&str> = package.into_iter().filter(|p| !p.is_empty()).collect();
    if !module.is_empty() {
        parts.push(module);
    }
    parts.join(".")
}

/// Symbols and module docstring for the source index.
pub fn index_symbols(source: &str) -> SpliceResult<(Vec<Symbol>, String)> {
    let suite = parse_suite(source)?;
    let index = LineIndex::new(source);
    let mut symbols = Vec::new();

    for stmt in &suite {
        if let Some(def) = as_definition(stmt) {
            let (line_start, line_end) = def.line_span(&index);
            symbols.push(Symbol {
                name: def.name.to_string(),
                kind: if def.is_class { SymbolKind::Class } else { SymbolKind::Function },
                line_start,
                line_end,
                doc: docstring_of(def.body),
            });
            if def.is_class {
                for method in def.body.iter().filter_map(as_definition).filter(|d| !d.is_class) {
                    let (line_start, line_end) = method.line_span(&index);
                    symbols.push(Symbol {
                        name: method.name.to_string(),
                        kind: SymbolKind::Method,
                        line_start,
                        line_end,
                        doc: docstring_of(method.body),
                    });
                }
            }
            continue;
        }

        let targets: Vec<&ast::Expr> = match stmt {
            ast::Stmt::Assign(assign) => assign.targets.iter().collect(),
            ast::Stmt::AnnAssign(assign) => vec![assign.target.as_ref()],
            _ => continue,
        };
        let line_start = index.line_of(usize::from(stmt.start()));
        let line_end = index.line_of(usize::from(stmt.end()).saturating_sub(1));
        for target in targets {
            if let ast::Expr::Name(name) = target {
                symbols.push(Symbol {
                    name: name.id.to_string(),
                    kind: SymbolKind::Variable,
                    line_start,
                    line_end,
                    doc: String::new(),
                });
            }
        }
    }

    Ok((symbols, docstring_of(&suite)))
}

/// Line spans (inclusive) to drop, plus `pass` insertions for class bodies
/// that would otherwise end up empty.
fn plan_removals(
    body: &[ast::Stmt],
    names: &HashSet<&str>,
    index: &LineIndex,
    removed: &mut Vec<(usize, usize)>,
    fillers: &mut Vec<usize>,
) {
    for stmt in body {
        let Some(def) = as_definition(stmt) else {
            continue;
        };
        if names.contains(def.name) {
            removed.push(def.line_span(index));
            continue;
        }
        if !def.is_class {
            continue;
        }
        let before = removed.len();
        plan_removals(def.body, names, index, removed, fillers);
        let emptied = removed.len() > before
            && def.body.iter().all(|s| as_definition(s).is_some_and(|d| names.contains(d.name)));
        if emptied {
            fillers.push(removed[before].0);
        }
    }
}

/// Remove the named definitions and re-render. Absent names and an empty name
/// set leave the source untouched.
pub fn delete_definitions(source: &str, names: &[String]) -> SpliceResult<String> {
    if names.is_empty() {
        return Ok(source.to_string());
    }
    let suite = parse_suite(source)?;
    let index = LineIndex::new(source);
    let wanted: HashSet<&str> = names.iter().map(String::as_str).collect();

    let mut removed = Vec::new();
    let mut fillers = Vec::new();
    plan_removals(&suite, &wanted, &index, &mut removed, &mut fillers);
    if removed.is_empty() {
        return Ok(source.to_string());
    }

    let lines = split_lines_keep(source);
    let mut keep = vec![true; lines.len()];
    for (start, end) in &removed {
        for flag in keep.iter_mut().take(*end).skip(start - 1) {
            *flag = false;
        }
    }

    let mut rendered: Vec<String> = Vec::with_capacity(lines.len());
    for (idx, line) in lines.iter().enumerate() {
        if fillers.contains(&(idx + 1)) {
            let indent: String =
                line.chars().take_while(|c| *c == ' ' || *c == '\t').collect();
            rendered.push(format!("{indent}pass\n"));
        }
        if keep[idx] {
            rendered.push(line.to_string());
        }
    }

    Ok(normalize_spacing(&rendered))
}

/// Collapse runs of blank lines to at most two, drop leading blank lines, and
/// end with exactly one newline.
fn normalize_spacing(lines: &[String]) -> String {
    let mut out = String::new();
    let mut blank_run = 0usize;
    let mut seen_content = false;
    for line in lines {
        if is_blank(line) {
            blank_run += 1;
            if !seen_content || blank_run > 2 {
                continue;
            }
            out.push('\n');
            continue;
        }
        blank_run = 0;
        seen_content = true;
        out.push_str(line);
        if !line.ends_with('\n') {
            out.push('\n');
        }
    }
    while out.ends_with("\n\n") {
        out.pop();
    }
    out
}

/// Lossy backend for [`DefinitionRemover`].
#[derive(Debug, Default, Clone, Copy)]
pub struct AbstractTreeRemover;

impl DefinitionRemover for AbstractTreeRemover {
    fn backend_name(&self) -> &'static str {
        "abstract"
    }

    fn remove_definitions(&self, source: &str, names: &[String]) -> SpliceResult<String> {
        delete_definitions(source, names)
    }
}
