//! Keyword and size heuristics over step descriptions and generated output.

use crate::domain::{ActionType, ChangeStep, Config};

const FILE_DELETE_PHRASES: &[&str] = &["delete file", "remove file", "drop file"];
const DELETE_WORDS: &[&str] = &["delete", "drop", "eliminate"];
const REMOVAL_WORDS: &[&str] = &["remove", "delete", "cleanup", "drop", "eliminate"];
const DEFINITION_NOUNS: &[&str] = &["function", "class", "method"];
const REFUSALS: &[&str] = &["As an AI", "I cannot"];

fn contains_any(text: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| text.contains(n))
}

/// The step asks for the whole file to go away.
pub fn is_file_delete(step: &ChangeStep) -> bool {
    if step.action != ActionType::Delete {
        return false;
    }
    let desc = step.description.to_lowercase();
    desc.trim().is_empty() || contains_any(&desc, FILE_DELETE_PHRASES)
}

/// A MODIFY that removes named definitions. Removal words alone are too
/// loose ("remove the unused import"), so a definition noun must appear too,
/// unless earlier steps already moved symbols out of this file.
pub fn has_removal_intent(step: &ChangeStep, has_moved_symbols: bool) -> bool {
    if step.action != ActionType::Modify {
        return false;
    }
    let desc = step.description.to_lowercase();
    contains_any(&desc, REMOVAL_WORDS) && (contains_any(&desc, DEFINITION_NOUNS) || has_moved_symbols)
}

/// Broader deletion check used to pick the semantic delete path.
pub fn looks_like_delete(step: &ChangeStep) -> bool {
    match step.action {
        ActionType::Delete => return true,
        ActionType::Create => return false,
        _ => {}
    }
    let desc = step.description.to_lowercase();
    if contains_any(&desc, FILE_DELETE_PHRASES) || contains_any(&desc, DELETE_WORDS) {
        return true;
    }
    desc.contains("remove") && contains_any(&desc, DEFINITION_NOUNS)
}

/// Flags output that collapsed in size or reads like a refusal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SuspicionCheck {
    pub ratio: f64,
    pub min_len: usize,
}

impl SuspicionCheck {
    pub fn from_config(config: &Config) -> Self {
        Self { ratio: config.suspicious_ratio, min_len: config.suspicious_min_len }
    }

    /// Reason the output looks wrong, if it does.
    pub fn inspect(&self, original: &str, proposed: &str) -> Option<String> {
        if original.len() > self.min_len && (proposed.len() as f64) < original.len() as f64 * self.ratio {
            return Some(format!(
                "output shrank from {} to {} bytes",
                original.len(),
                proposed.len()
            ));
        }
        REFUSALS
            .iter()
            .find(|phrase| proposed.contains(*phrase))
            .map(|phrase| format!("output contains refusal phrasing ('{}')", phrase))
    }
}

impl Default for SuspicionCheck {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(action: ActionType, desc: &str) -> ChangeStep {
        ChangeStep::new(action, "a.py").with_description(desc)
    }

    #[test]
    fn removal_intent_needs_a_definition_noun() {
        assert!(has_removal_intent(&step(ActionType::Modify, "Remove the parse_date function"), false));
        assert!(!has_removal_intent(&step(ActionType::Modify, "Remove unused imports"), false));
        assert!(has_removal_intent(&step(ActionType::Modify, "Cleanup moved helpers"), true));
        assert!(!has_removal_intent(&step(ActionType::Create, "delete class Foo"), true));
    }

    #[test]
    fn delete_detection() {
        assert!(looks_like_delete(&step(ActionType::Delete, "")));
        assert!(!looks_like_delete(&step(ActionType::Create, "delete everything")));
        assert!(looks_like_delete(&step(ActionType::Modify, "drop legacy helpers")));
        assert!(looks_like_delete(&step(ActionType::Modify, "remove the Old class")));
        assert!(!looks_like_delete(&step(ActionType::Modify, "remove a log line")));
        assert!(!looks_like_delete(&step(ActionType::Modify, "move logic to service")));
    }

    #[test]
    fn file_delete_detection() {
        assert!(is_file_delete(&step(ActionType::Delete, "")));
        assert!(is_file_delete(&step(ActionType::Delete, "Delete file, obsolete")));
        assert!(!is_file_delete(&step(ActionType::Delete, "delete the helper function")));
        assert!(!is_file_delete(&step(ActionType::Modify, "delete file")));
    }

    #[test]
    fn suspicion_by_size_and_phrasing() {
        let check = SuspicionCheck::default();
        let original = "x".repeat(1000);
        assert!(check.inspect(&original, &"x".repeat(100)).is_some());
        assert!(check.inspect(&original, &"x".repeat(400)).is_none());
        // Short originals are never judged by length.
        assert!(check.inspect("tiny", "").is_none());
        assert!(check.inspect("", "As an AI, I cannot do that").is_some());

        let lenient = SuspicionCheck { ratio: 0.05, min_len: 10 };
        assert!(lenient.inspect(&original, &"x".repeat(100)).is_none());
    }
}
