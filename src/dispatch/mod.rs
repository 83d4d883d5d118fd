//! Strategy dispatch for planned change steps.
//!
//! Each [`ChangeStep`] is routed to exactly one strategy, in priority order:
//!
//! 1. `CREATE` with a source file: surgical create from extracted definitions.
//! 2. `MODIFY` with removal intent and known names: tree-based removal.
//! 3. `EXTRACT_AND_MODIFY`: one compound generator call for both files.
//! 4. Plain `CREATE`: full content generation.
//! 5. `MOVE` and whole-file `DELETE`: deterministic file operations.
//! 6. Other deletions: the generator picks names, the structural engine removes them.
//! 7. Large files: search/replace patches, regenerated if the patch breaks syntax.
//! 8. Everything else: full content regeneration.
//!
//! The dispatcher carries the run's [`ExtractionMap`] and [`TaskHistory`], so
//! steps must be fed in plan order.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use regex::Regex;
use serde::Serialize;

use crate::domain::{ActionType, ChangeStep, Config};
use crate::error::{SpliceError, SpliceResult};
use crate::generate::{call_with_retry, GenerationCall, Generator};
use crate::patch::{PatchEngine, PatchReport};
use crate::prompts;
use crate::syntax::structural::{
    collect_definitions, delete_definitions, extract_definition_source, extract_imports_source, inject_import,
};
use crate::syntax::{remover_for, DefinitionRemover, ParserRegistry};
use crate::utils::is_contained_path;

pub mod compound;
pub mod extraction;
pub mod heuristics;
pub mod imports;
pub mod json_list;

pub use compound::{split_compound, CompoundOutput};
pub use extraction::{ExtractionEntry, ExtractionMap, TaskHistory, TaskRecord};
pub use heuristics::{has_removal_intent, is_file_delete, looks_like_delete, SuspicionCheck};
pub use imports::build_import_statement;
pub use json_list::parse_json_list;

const FULL_SOURCE_OPEN: &str = "# --- FULL SOURCE CODE REFERENCE (EXTRACT NEEDED PARTS FROM HERE) ---";
const FULL_SOURCE_CLOSE: &str = "# --- END SOURCE REFERENCE ---";

/// Read access to the current content of project files.
pub trait FileSource {
    /// `None` when the file does not exist yet.
    fn current(&mut self, path: &str) -> SpliceResult<Option<String>>;
}

impl FileSource for BTreeMap<String, String> {
    fn current(&mut self, path: &str) -> SpliceResult<Option<String>> {
        Ok(self.get(path).cloned())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    SurgicalCreate,
    DefinitionRemoval,
    ExtractAndModify,
    Generate,
    Move,
    FileDelete,
    SemanticDelete,
    Patch,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::SurgicalCreate => "surgical_create",
            StrategyKind::DefinitionRemoval => "definition_removal",
            StrategyKind::ExtractAndModify => "extract_and_modify",
            StrategyKind::Generate => "generate",
            StrategyKind::Move => "move",
            StrategyKind::FileDelete => "file_delete",
            StrategyKind::SemanticDelete => "semantic_delete",
            StrategyKind::Patch => "patch",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    Suspicious,
    TruncatedOutput,
    PartialPatch,
    ExtractionFailed,
    InvalidSyntax,
    Fallback,
    MissingSource,
}

/// A non-blocking finding attached to a step for human review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Warning {
    pub kind: WarningKind,
    pub path: String,
    pub message: String,
}

impl Warning {
    fn new(kind: WarningKind, path: &str, message: impl Into<String>) -> Self {
        Self { kind, path: path.to_string(), message: message.into() }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileChange {
    Write(String),
    Delete,
}

/// Everything one step produced. Files are keyed by project-relative path.
#[derive(Debug, Clone)]
pub struct StepResult {
    pub strategy: StrategyKind,
    pub changes: BTreeMap<String, FileChange>,
    pub warnings: Vec<Warning>,
    /// Declared names the surgical create could not find in its source.
    pub failed_extractions: Vec<String>,
    pub patch: Option<PatchReport>,
}

impl StepResult {
    fn new(strategy: StrategyKind) -> Self {
        Self {
            strategy,
            changes: BTreeMap::new(),
            warnings: Vec::new(),
            failed_extractions: Vec::new(),
            patch: None,
        }
    }

    fn write(mut self, path: &str, content: String) -> Self {
        self.changes.insert(path.to_string(), FileChange::Write(content));
        self
    }

    pub fn content_of(&self, path: &str) -> Option<&str> {
        match self.changes.get(path) {
            Some(FileChange::Write(content)) => Some(content),
            _ => None,
        }
    }
}

pub struct Dispatcher<'a> {
    generator: Arc<dyn Generator>,
    parsers: &'a ParserRegistry,
    patcher: PatchEngine,
    remover: Box<dyn DefinitionRemover>,
    suspicion: SuspicionCheck,
    rewrite_line_threshold: usize,
    max_attempts: usize,
    temperature: f64,
    extraction: ExtractionMap,
    history: TaskHistory,
}

impl<'a> Dispatcher<'a> {
    pub fn new(generator: Arc<dyn Generator>, parsers: &'a ParserRegistry, config: &Config) -> Self {
        Self {
            generator,
            parsers,
            patcher: PatchEngine::new(config.patch_policy),
            remover: remover_for(config.removal_backend),
            suspicion: SuspicionCheck::from_config(config),
            rewrite_line_threshold: config.rewrite_line_threshold,
            max_attempts: config.max_syntax_retries,
            temperature: config.temperature,
            extraction: ExtractionMap::new(),
            history: TaskHistory::new(),
        }
    }

    pub fn extraction_map(&self) -> &ExtractionMap {
        &self.extraction
    }

    pub fn history(&self) -> &TaskHistory {
        &self.history
    }

    /// Run one step against the current file contents. Successful steps are
    /// appended to the task history; failed ones leave it untouched.
    pub fn dispatch(&mut self, step: &ChangeStep, files: &mut dyn FileSource) -> SpliceResult<StepResult> {
        let target = step.target_file.as_str();
        tracing::info!("Dispatching {} on {}", step.action, target);
        for path in std::iter::once(target).chain(step.source_file.as_deref()) {
            if !is_contained_path(path) {
                return Err(SpliceError::UnsafePath(path.to_string()));
            }
        }

        let original = files.current(target)?.unwrap_or_default();
        let mut result = self.route(step, &original, files)?;
        tracing::debug!("{} handled by {}", target, result.strategy);

        for (path, change) in &result.changes {
            let FileChange::Write(content) = change else {
                continue;
            };
            let before = if path == target { Some(original.clone()) } else { files.current(path)? };
            if let Some(reason) = self.suspicion.inspect(before.as_deref().unwrap_or(""), content) {
                tracing::warn!("Suspicious content generated for {}: {}", path, reason);
                result.warnings.push(Warning::new(WarningKind::Suspicious, path, reason));
            }
        }

        self.history.push(step.action, target, &step.description);
        Ok(result)
    }

    fn route(
        &mut self,
        step: &ChangeStep,
        original: &str,
        files: &mut dyn FileSource,
    ) -> SpliceResult<StepResult> {
        let target = step.target_file.as_str();

        if step.action == ActionType::Create {
            if let Some(source) = step.source_file.as_deref() {
                return self.surgical_create(step, source, files);
            }
        }

        let mapped = self.extraction.symbols_for(target);
        if has_removal_intent(step, !mapped.is_empty()) {
            let names =
                if step.detected_entities.is_empty() { mapped.to_vec() } else { step.detected_entities.clone() };
            if !names.is_empty() {
                tracing::info!("Removing {:?} from {} ({})", names, target, self.remover.backend_name());
                let content = self.remover.remove_definitions(original, &names)?;
                let content = self.reimport_moved(target, content, &names, files)?;
                return Ok(StepResult::new(StrategyKind::DefinitionRemoval).write(target, content));
            }
        }

        match step.action {
            ActionType::ExtractAndModify => return self.extract_and_modify(step, files),
            ActionType::Create => return self.full_rewrite(step, original, StrategyKind::Generate),
            ActionType::Move => return self.move_file(step, files),
            ActionType::Delete if is_file_delete(step) => {
                let mut result = StepResult::new(StrategyKind::FileDelete);
                result.changes.insert(target.to_string(), FileChange::Delete);
                return Ok(result);
            }
            _ => {}
        }

        if looks_like_delete(step) {
            return self.semantic_delete(step, original);
        }

        let line_count = original.lines().count();
        if line_count > self.rewrite_line_threshold {
            tracing::info!("Large file ({} lines), using patch strategy", line_count);
            return self.patch_large_file(step, original);
        }
        self.full_rewrite(step, original, StrategyKind::Generate)
    }

    /// Import moved names back into `source` when what is left of it still
    /// refers to them, pointing at the file that now defines each one.
    fn reimport_moved(
        &self,
        source: &str,
        content: String,
        removed: &[String],
        files: &mut dyn FileSource,
    ) -> SpliceResult<String> {
        let Some(entry) = self.extraction.get(source) else {
            return Ok(content);
        };
        if !source.ends_with(".py") {
            return Ok(content);
        }
        let mut out = content;
        for moved_to in &entry.moved_to {
            let Some(moved_content) = files.current(moved_to)? else {
                continue;
            };
            let Ok(defined) = collect_definitions(&moved_content) else {
                continue;
            };
            let still_used: Vec<String> = removed
                .iter()
                .filter(|name| defined.contains(name.as_str()) && references(&out, name))
                .cloned()
                .collect();
            if still_used.is_empty() {
                continue;
            }
            tracing::info!("Re-importing {:?} into {} from {}", still_used, source, moved_to);
            out = inject_import(&out, &build_import_statement(&still_used, source, moved_to));
        }
        Ok(out)
    }

    fn generate_checked(
        &self,
        prompt: String,
        system: &str,
        path: &str,
        original: &str,
        validate: bool,
    ) -> SpliceResult<String> {
        let call = GenerationCall { prompt, system: Some(system), target_path: path, original, validate };
        call_with_retry(self.generator.as_ref(), self.parsers, call, self.temperature, self.max_attempts)
    }

    fn full_rewrite(&self, step: &ChangeStep, original: &str, strategy: StrategyKind) -> SpliceResult<StepResult> {
        let target = step.target_file.as_str();
        let prompt = if original.is_empty() {
            prompts::create_prompt(step, self.history.records())
        } else {
            prompts::rewrite_prompt(original, step, self.history.records())
        };
        let content = self.generate_checked(prompt, prompts::SYSTEM_PROMPT, target, original, true)?;
        Ok(StepResult::new(strategy).write(target, with_trailing_newline(content)))
    }

    fn surgical_create(
        &mut self,
        step: &ChangeStep,
        source: &str,
        files: &mut dyn FileSource,
    ) -> SpliceResult<StepResult> {
        let target = step.target_file.as_str();
        let mut result = StepResult::new(StrategyKind::SurgicalCreate);

        let source_content = match files.current(source)? {
            Some(content) => content,
            None => {
                tracing::warn!("Source file {} not found", source);
                result.warnings.push(Warning::new(WarningKind::MissingSource, source, "source file not found"));
                String::new()
            }
        };

        let mut snippets = Vec::new();
        for name in &step.detected_entities {
            match extract_definition_source(&source_content, name) {
                Some(snippet) => snippets.push(snippet),
                None => {
                    tracing::warn!("Could not extract '{}' from {}", name, source);
                    result.failed_extractions.push(name.clone());
                    result.warnings.push(Warning::new(
                        WarningKind::ExtractionFailed,
                        source,
                        format!("definition '{}' not found", name),
                    ));
                }
            }
        }

        let body = if snippets.is_empty() {
            tracing::debug!("No definitions extracted, passing the full source as context");
            format!("{}\n{}\n{}", FULL_SOURCE_OPEN, source_content, FULL_SOURCE_CLOSE)
        } else {
            snippets.join("\n\n")
        };
        let imports = extract_imports_source(&source_content);

        let prompt = prompts::surgical_create_prompt(
            prompts::SurgicalCreate {
                source_file: source,
                target_file: target,
                source_imports: &imports,
                body: &body,
                description: &step.description,
            },
            self.history.records(),
        );
        let content = self.generate_checked(prompt, prompts::SYSTEM_PROMPT, target, &source_content, true)?;

        // Record what the output really defines, not what the plan declared.
        let discovered: Vec<String> = if self.parsers.for_path(target).map(|c| c.language()) == Some("python") {
            match collect_definitions(&content) {
                Ok(names) => names.into_iter().collect(),
                Err(e) => {
                    tracing::warn!("Could not parse {} for symbols: {}", target, e);
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };
        tracing::info!("Mapped {} -> {} ({} symbols)", source, target, discovered.len());
        self.extraction.record(source, target, discovered);

        Ok(result.write(target, with_trailing_newline(content)))
    }

    fn extract_and_modify(&self, step: &ChangeStep, files: &mut dyn FileSource) -> SpliceResult<StepResult> {
        let target = step.target_file.as_str();
        let source = step
            .source_file
            .as_deref()
            .ok_or_else(|| SpliceError::Unsupported("EXTRACT_AND_MODIFY needs a source file".into()))?;
        let source_content = files.current(source)?.ok_or_else(|| {
            SpliceError::Unsupported(format!("source file {} not found for extraction", source))
        })?;

        let prompt = prompts::extract_and_modify_prompt(
            &source_content,
            source,
            target,
            &step.description,
            self.history.records(),
        );
        let response = self.generate_checked(prompt, prompts::SYSTEM_PROMPT, target, &source_content, false)?;
        let output = split_compound(&response)?;

        let mut result = StepResult::new(StrategyKind::ExtractAndModify);
        if output.truncated {
            tracing::warn!("Extract-and-modify output for {} was truncated", source);
            result.warnings.push(Warning::new(
                WarningKind::TruncatedOutput,
                source,
                "END marker missing, source section taken to end of output",
            ));
        }
        if let Err(issue) = self.parsers.validate(source, &output.source) {
            tracing::warn!("Modified source {} does not parse: {}", source, issue);
            result.warnings.push(Warning::new(WarningKind::InvalidSyntax, source, issue.to_string()));
        }

        Ok(result
            .write(target, with_trailing_newline(output.target))
            .write(source, with_trailing_newline(output.source)))
    }

    fn move_file(&self, step: &ChangeStep, files: &mut dyn FileSource) -> SpliceResult<StepResult> {
        let target = step.target_file.as_str();
        let source = step
            .source_file
            .as_deref()
            .ok_or_else(|| SpliceError::Unsupported("MOVE needs a source file".into()))?;
        if source == target {
            return Err(SpliceError::Unsupported(format!("MOVE of {} onto itself", source)));
        }
        let content = files
            .current(source)?
            .ok_or_else(|| SpliceError::Unsupported(format!("source file {} not found for move", source)))?;

        let mut result = StepResult::new(StrategyKind::Move).write(target, content);
        result.changes.insert(source.to_string(), FileChange::Delete);
        Ok(result)
    }

    fn semantic_delete(&self, step: &ChangeStep, original: &str) -> SpliceResult<StepResult> {
        let target = step.target_file.as_str();
        let unchanged = || Ok(StepResult::new(StrategyKind::SemanticDelete).write(target, original.to_string()));

        if original.trim().is_empty() {
            return unchanged();
        }

        let entities: Vec<String> = match collect_definitions(original) {
            Ok(names) => names.into_iter().collect(),
            Err(e) => return self.rewrite_after(step, original, format!("cannot parse for deletion: {}", e)),
        };
        if entities.is_empty() {
            tracing::info!("No definitions in {}, nothing to delete", target);
            return unchanged();
        }

        let moved = self.extraction.symbols_for(target);
        let prompt = prompts::semantic_delete_prompt(step, &entities, moved, self.history.records());
        let raw = self.generator.generate(&prompt, Some(prompts::JSON_LIST_SYSTEM_PROMPT), self.temperature)?;

        let chosen: Vec<String> =
            parse_json_list(&raw).into_iter().filter(|name| entities.contains(name)).collect();
        if chosen.is_empty() {
            tracing::info!("No valid definitions selected for deletion in {}", target);
            return unchanged();
        }

        tracing::info!("Deleting {:?} from {}", chosen, target);
        match delete_definitions(original, &chosen) {
            Ok(content) if content.trim() != original.trim() => {
                Ok(StepResult::new(StrategyKind::SemanticDelete).write(target, content))
            }
            Ok(_) => self.rewrite_after(step, original, "structural delete changed nothing".into()),
            Err(e) => self.rewrite_after(step, original, format!("structural delete failed: {}", e)),
        }
    }

    fn patch_large_file(&self, step: &ChangeStep, original: &str) -> SpliceResult<StepResult> {
        let target = step.target_file.as_str();
        let prompt = prompts::patch_prompt(original, step, self.history.records());
        let response = self.generator.generate(&prompt, Some(prompts::PATCH_SYSTEM_PROMPT), self.temperature)?;
        let report = self.patcher.apply(original, &response)?;

        let mut warnings: Vec<Warning> = report
            .failed
            .iter()
            .map(|f| Warning::new(WarningKind::PartialPatch, target, format!("block {}: {}", f.index + 1, f.reason)))
            .collect();

        let mut result = match self.parsers.validate(target, &report.content) {
            Ok(()) => StepResult::new(StrategyKind::Patch).write(target, report.content.clone()),
            Err(issue) => {
                tracing::warn!("Patching {} produced invalid syntax, regenerating", target);
                let mut fallback =
                    self.rewrite_after(step, original, format!("patched output does not parse: {}", issue))?;
                fallback.strategy = StrategyKind::Patch;
                fallback
            }
        };
        warnings.append(&mut result.warnings);
        result.warnings = warnings;
        result.patch = Some(report);
        Ok(result)
    }

    /// Full regeneration as a safety net, with the reason recorded.
    fn rewrite_after(&self, step: &ChangeStep, original: &str, reason: String) -> SpliceResult<StepResult> {
        tracing::warn!("Falling back to full rewrite of {}: {}", step.target_file, reason);
        let strategy = if looks_like_delete(step) { StrategyKind::SemanticDelete } else { StrategyKind::Generate };
        let mut result = self.full_rewrite(step, original, strategy)?;
        result.warnings.push(Warning::new(WarningKind::Fallback, &step.target_file, reason));
        Ok(result)
    }
}

/// Whole-word occurrence of `name` anywhere in `content`.
fn references(content: &str, name: &str) -> bool {
    Regex::new(&format!(r"\b{}\b", regex::escape(name))).is_ok_and(|re| re.is_match(content))
}

fn with_trailing_newline(mut content: String) -> String {
    if !content.is_empty() && !content.ends_with('\n') {
        content.push('\n');
    }
    content
}
