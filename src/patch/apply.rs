//! Three-tier patch application: structural delete, exact replace, soft match.

use serde::Serialize;

use crate::domain::{PatchBlock, PatchPolicy};
use crate::error::{SpliceError, SpliceResult};
use crate::patch::wire::{self, ParsedPatch, ELISION_MARKER};
use crate::syntax::lines::{indent_width, is_blank, split_lines_keep};

/// Result of one strategy on one block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Applied(String),
    /// Not this strategy's case; the next one gets a turn.
    Recoverable(String),
    /// The block cannot apply at all; remaining strategies are skipped.
    Fatal(String),
}

pub trait BlockStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn apply(&self, text: &str, block: &PatchBlock) -> Outcome;
}

/// Signature line located verbatim, span closed by the first following line
/// indented no deeper than it.
pub struct StructuralDelete;

impl BlockStrategy for StructuralDelete {
    fn name(&self) -> &'static str {
        "structural-delete"
    }

    fn apply(&self, text: &str, block: &PatchBlock) -> Outcome {
        if !block.elided {
            return Outcome::Recoverable("no elision marker".to_string());
        }
        let signature = block.search.replace(ELISION_MARKER, "");
        let signature = signature.trim();
        if signature.is_empty() {
            return Outcome::Fatal("elision marker without a signature".to_string());
        }
        let Some(found) = text.find(signature) else {
            return Outcome::Fatal(format!("signature not found: '{}'", preview(signature)));
        };

        let line_start = text[..found].rfind('\n').map(|i| i + 1).unwrap_or(0);
        let target_indent = indent_width(&text[line_start..found]);
        let first_line_end = text[found..].find('\n').map(|i| found + i + 1).unwrap_or(text.len());

        let mut span_end = first_line_end;
        let mut cursor = first_line_end;
        while cursor < text.len() {
            let next = text[cursor..].find('\n').map(|i| cursor + i + 1).unwrap_or(text.len());
            let line = &text[cursor..next];
            if !is_blank(line) {
                if indent_width(line) <= target_indent {
                    break;
                }
                span_end = next;
            }
            cursor = next;
        }

        let mut replacement = block.replace.clone();
        if !replacement.is_empty() && !replacement.ends_with('\n') && text[..span_end].ends_with('\n') {
            replacement.push('\n');
        }
        Outcome::Applied(format!("{}{}{}", &text[..line_start], replacement, &text[span_end..]))
    }
}

/// First verbatim occurrence.
pub struct ExactReplace;

impl BlockStrategy for ExactReplace {
    fn name(&self) -> &'static str {
        "exact"
    }

    fn apply(&self, text: &str, block: &PatchBlock) -> Outcome {
        if block.search.is_empty() || !text.contains(&block.search) {
            return Outcome::Recoverable("no verbatim occurrence".to_string());
        }
        Outcome::Applied(text.replacen(&block.search, &block.replace, 1))
    }
}

/// Line-by-line comparison after trimming each line.
pub struct SoftLineMatch;

impl BlockStrategy for SoftLineMatch {
    fn name(&self) -> &'static str {
        "soft"
    }

    fn apply(&self, text: &str, block: &PatchBlock) -> Outcome {
        let wanted: Vec<&str> =
            block.search.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
        if wanted.is_empty() {
            return Outcome::Recoverable("search fragment is blank".to_string());
        }
        let lines = split_lines_keep(text);
        if lines.len() < wanted.len() {
            return Outcome::Recoverable("no whitespace-insensitive match".to_string());
        }

        let hit = (0..=lines.len() - wanted.len())
            .find(|&i| wanted.iter().enumerate().all(|(j, w)| lines[i + j].trim() == *w));
        let Some(start) = hit else {
            return Outcome::Recoverable("no whitespace-insensitive match".to_string());
        };

        let end = start + wanted.len();
        let mut out = lines[..start].concat();
        out.push_str(&block.replace);
        if !block.replace.is_empty() && lines[end - 1].ends_with('\n') {
            out.push('\n');
        }
        out.push_str(&lines[end..].concat());
        Outcome::Applied(out)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedBlock {
    pub index: usize,
    pub strategy: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedBlock {
    pub index: usize,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatchReport {
    #[serde(skip)]
    pub content: String,
    pub attempted: usize,
    pub applied: Vec<AppliedBlock>,
    pub failed: Vec<FailedBlock>,
}

impl PatchReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct PatchEngine {
    strategies: Vec<Box<dyn BlockStrategy>>,
    policy: PatchPolicy,
}

impl Default for PatchEngine {
    fn default() -> Self {
        Self::new(PatchPolicy::default())
    }
}

impl PatchEngine {
    pub fn new(policy: PatchPolicy) -> Self {
        Self {
            strategies: vec![Box::new(StructuralDelete), Box::new(ExactReplace), Box::new(SoftLineMatch)],
            policy,
        }
    }

    pub fn policy(&self) -> PatchPolicy {
        self.policy
    }

    /// Parse a generator response and apply its blocks to `original`.
    pub fn apply(&self, original: &str, response: &str) -> SpliceResult<PatchReport> {
        self.apply_parsed(original, &wire::parse_blocks(response))
    }

    /// Blocks apply in order, each against the output of the previous ones.
    pub fn apply_parsed(&self, original: &str, parsed: &ParsedPatch) -> SpliceResult<PatchReport> {
        let mut content = original.to_string();
        let mut applied = Vec::new();
        let mut failed: Vec<FailedBlock> = Vec::new();

        for (index, block) in parsed.blocks.iter().enumerate() {
            match self.apply_block(&content, block) {
                Ok((next, strategy)) => {
                    tracing::debug!("Patch block {} applied via {}", index + 1, strategy);
                    content = next;
                    applied.push(AppliedBlock { index, strategy });
                }
                Err(reason) => {
                    tracing::warn!("Patch block {} failed: {}", index + 1, reason);
                    failed.push(FailedBlock { index, reason });
                }
            }
        }
        for offset in 0..parsed.malformed {
            failed.push(FailedBlock {
                index: parsed.blocks.len() + offset,
                reason: "malformed block".to_string(),
            });
        }

        let attempted = parsed.attempted();
        if attempted > 0 && applied.is_empty() {
            return Err(SpliceError::PatchApplication {
                attempted,
                failures: failed.into_iter().map(|f| f.reason).collect(),
            });
        }
        if self.policy == PatchPolicy::Atomic && !failed.is_empty() {
            return Err(SpliceError::PatchRejected { attempted, failed: failed.len() });
        }
        Ok(PatchReport { content, attempted, applied, failed })
    }

    fn apply_block(&self, text: &str, block: &PatchBlock) -> Result<(String, &'static str), String> {
        let mut reasons = Vec::new();
        for strategy in &self.strategies {
            match strategy.apply(text, block) {
                Outcome::Applied(next) => return Ok((next, strategy.name())),
                Outcome::Recoverable(reason) => reasons.push(format!("{}: {}", strategy.name(), reason)),
                Outcome::Fatal(reason) => return Err(format!("{}: {}", strategy.name(), reason)),
            }
        }
        Err(format!("no match for '{}' ({})", preview(&block.search), reasons.join("; ")))
    }
}

fn preview(text: &str) -> String {
    let first: String = text.chars().take(50).collect();
    if first.len() < text.len() {
        format!("{first}...")
    } else {
        first
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use similar_asserts::assert_eq;

    fn block(search: &str, replace: &str) -> PatchBlock {
        PatchBlock {
            search: search.to_string(),
            replace: replace.to_string(),
            elided: search.contains(ELISION_MARKER),
        }
    }

    fn parsed(blocks: Vec<PatchBlock>) -> ParsedPatch {
        ParsedPatch { blocks, malformed: 0 }
    }

    const SERVICE: &str = "class Service:\n    def stale(self):\n        a = 1\n        b = 2\n        if a:\n            b += a\n        return b\n    def keep(self):\n        return 2\n";

    #[test]
    fn elision_removes_exactly_the_indented_body() {
        let engine = PatchEngine::default();
        let report = engine
            .apply_parsed(SERVICE, &parsed(vec![block("    def stale(self):<ELLIPSIS>", "")]))
            .expect("apply");
        assert_eq!(report.content, "class Service:\n    def keep(self):\n        return 2\n");
        assert_eq!(report.applied[0].strategy, "structural-delete");
    }

    #[test]
    fn elision_replacement_keeps_sibling_on_its_own_line() {
        let engine = PatchEngine::default();
        let report = engine
            .apply_parsed(
                SERVICE,
                &parsed(vec![block("def stale(self):<ELLIPSIS>", "    def fresh(self):\n        return 0")]),
            )
            .expect("apply");
        assert_eq!(
            report.content,
            "class Service:\n    def fresh(self):\n        return 0\n    def keep(self):\n        return 2\n"
        );
    }

    #[test]
    fn elision_keeps_blank_lines_before_the_sibling() {
        let text = "def a():\n    x = 1\n\n    y = 2\n\n\ndef b():\n    pass\n";
        let report = PatchEngine::default()
            .apply_parsed(text, &parsed(vec![block("def a():<ELLIPSIS>", "")]))
            .expect("apply");
        assert_eq!(report.content, "\n\ndef b():\n    pass\n");
    }

    #[test]
    fn missing_signature_fails_without_falling_through() {
        let strategy = StructuralDelete;
        let outcome = strategy.apply("x = 1\n", &block("def nope():<ELLIPSIS>", ""));
        assert!(matches!(outcome, Outcome::Fatal(_)));
    }

    #[test]
    fn exact_replaces_first_occurrence_only() {
        let report = PatchEngine::default()
            .apply_parsed("a = 1\na = 1\n", &parsed(vec![block("a = 1", "a = 2")]))
            .expect("apply");
        assert_eq!(report.content, "a = 2\na = 1\n");
        assert_eq!(report.applied[0].strategy, "exact");
    }

    #[test]
    fn soft_match_tolerates_indentation_drift() {
        let text = "def f():\n    if x:\n        return 1\n    return 2\n";
        let report = PatchEngine::default()
            .apply_parsed(text, &parsed(vec![block("if x:\n  return 1", "    if y:\n        return 3")]))
            .expect("apply");
        assert_eq!(report.content, "def f():\n    if y:\n        return 3\n    return 2\n");
        assert_eq!(report.applied[0].strategy, "soft");
    }

    #[test]
    fn partial_success_is_reported() {
        let report = PatchEngine::new(PatchPolicy::Partial)
            .apply_parsed("x = 1\n", &parsed(vec![block("x = 1", "x = 2"), block("zzz", "q")]))
            .expect("partial");
        assert_eq!(report.content, "x = 2\n");
        assert_eq!(report.applied.len(), 1);
        assert_eq!(report.failed.len(), 1);
        assert!(!report.is_complete());
    }

    #[test]
    fn atomic_policy_rejects_partial_success() {
        let err = PatchEngine::new(PatchPolicy::Atomic)
            .apply_parsed("x = 1\n", &parsed(vec![block("x = 1", "x = 2"), block("zzz", "q")]))
            .expect_err("atomic");
        assert!(matches!(err, SpliceError::PatchRejected { attempted: 2, failed: 1 }));
    }

    #[test]
    fn zero_matches_is_a_failure() {
        let err = PatchEngine::default()
            .apply("x = 1\n", "<<<<<<< SEARCH\nnope\n=======\nyes\n>>>>>>> REPLACE\n")
            .expect_err("none matched");
        assert!(matches!(err, SpliceError::PatchApplication { attempted: 1, .. }));
    }

    #[test]
    fn no_blocks_leaves_text_untouched() {
        let report = PatchEngine::default().apply("x = 1\n", "nothing to do").expect("ok");
        assert_eq!(report.content, "x = 1\n");
        assert_eq!(report.attempted, 0);
    }

    #[test]
    fn later_blocks_see_earlier_edits() {
        let report = PatchEngine::default()
            .apply_parsed("a\n", &parsed(vec![block("a", "b"), block("b", "c")]))
            .expect("apply");
        assert_eq!(report.content, "c\n");
    }
}
