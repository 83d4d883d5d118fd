//! Prompt text sent to the generator, one builder per dispatch strategy.
//!
//! Every builder prepends the run's task history so later steps see what
//! earlier steps already did.

use std::path::Path;

use crate::dispatch::TaskRecord;
use crate::domain::ChangeStep;
use crate::patch::wire::ELISION_MARKER;

pub const SYSTEM_PROMPT: &str = "You are a precise code transformation engine. \
Follow the output format exactly and never add commentary.";

pub const PATCH_SYSTEM_PROMPT: &str = "Output ONLY SEARCH/REPLACE blocks.";
pub const JSON_LIST_SYSTEM_PROMPT: &str = "Return ONLY a JSON list.";

const HISTORY_DESC_CHARS: usize = 100;

const CODE_EXTENSIONS: &[&str] = &["py", "js", "ts", "go", "rs", "c", "cpp", "java"];

fn render_history(history: &[TaskRecord]) -> String {
    if history.is_empty() {
        return String::new();
    }
    let mut out = String::from("\nCONTEXT - PREVIOUSLY COMPLETED TASKS:\n");
    for task in history {
        let first_line = task.description.lines().next().unwrap_or("");
        let desc: String = first_line.chars().take(HISTORY_DESC_CHARS).collect();
        out.push_str(&format!("- [{}] {}: {}\n", task.action, task.file, desc));
    }
    out
}

fn render_step(step: &ChangeStep) -> String {
    serde_json::to_string_pretty(step).unwrap_or_else(|_| step.description.clone())
}

fn extension_of(path: &str) -> String {
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_else(|| "txt".to_string())
}

pub fn rewrite_prompt(original: &str, step: &ChangeStep, history: &[TaskRecord]) -> String {
    format!(
        "{history}\nApply the following change to the code.\n\n\
ORIGINAL CODE:\n{original}\n\n\
CHANGE INSTRUCTION:\n{instruction}\n\n\
RULES:\n\
- Return ONLY the full modified file content\n\
- No markdown fences\n\
- No explanations\n\
- Preserve style and formatting\n",
        history = render_history(history),
        instruction = render_step(step),
    )
}

pub fn patch_prompt(original: &str, step: &ChangeStep, history: &[TaskRecord]) -> String {
    format!(
        "{history}\nReturn ONLY SEARCH/REPLACE blocks for changes.\n\n\
FORMAT:\n\
<<<<<<< SEARCH\n(exact lines to match)\n=======\n(replacement lines)\n>>>>>>> REPLACE\n\n\
To remove a whole indented block, put its first line followed by {marker} in SEARCH \
and leave the replacement empty.\n\n\
ORIGINAL CODE:\n{original}\n\n\
CHANGE INSTRUCTION:\n{instruction}\n",
        history = render_history(history),
        marker = ELISION_MARKER,
        instruction = render_step(step),
    )
}

/// Inputs for building a new file from parts of an existing one.
#[derive(Debug, Clone, Copy)]
pub struct SurgicalCreate<'a> {
    pub source_file: &'a str,
    pub target_file: &'a str,
    pub source_imports: &'a str,
    pub body: &'a str,
    pub description: &'a str,
}

pub fn surgical_create_prompt(input: SurgicalCreate<'_>, history: &[TaskRecord]) -> String {
    let source_ext = extension_of(input.source_file);
    let target_ext = extension_of(input.target_file);
    let target_upper = target_ext.to_ascii_uppercase();

    let format_rule = if CODE_EXTENSIONS.contains(&target_ext.as_str()) {
        format!(
            "Output VALID {} code. Include necessary imports for the snippet to be functional.",
            target_upper
        )
    } else {
        format!(
            "Output RAW {} content. Do NOT include any wrapper syntax from the source format \
(no quotes, no variable assignments, no escape characters).",
            target_upper
        )
    };

    let imports_block = if input.source_imports.is_empty() {
        String::new()
    } else {
        format!("SOURCE IMPORTS/HEADERS (Reference):\n{}\n", input.source_imports)
    };

    format!(
        "### ROLE\nYou move information from a SOURCE file into a new TARGET file.\n\n\
### CONTEXT\n{history}\n\
- SOURCE FILE: {source} (Format: .{source_ext})\n\
- TARGET FILE: {target} (Format: .{target_ext})\n\n\
### SOURCE CONTENT REFERENCE\n---\n{body}\n---\n{imports_block}\n\
### TASK\n{description}\n\n\
### EXTRACTION RULES\n\
1. Unwrap content: drop source-only delimiters such as string quotes or template wrappers.\n\
2. Follow .{target_ext} syntax strictly.\n\
3. {format_rule}\n\
4. Return ONLY the file content. No markdown fences, no explanations.\n\n\
Generate the FULL content for {target}:\n",
        history = render_history(history),
        source = input.source_file,
        target = input.target_file,
        body = input.body,
        description = input.description,
    )
}

/// Ask for the names to delete, chosen from `entities` only.
pub fn semantic_delete_prompt(
    step: &ChangeStep,
    entities: &[String],
    recently_moved: &[String],
    history: &[TaskRecord],
) -> String {
    let mut sorted = entities.to_vec();
    sorted.sort();
    let available = serde_json::to_string(&sorted).unwrap_or_else(|_| "[]".into());

    let moved_block = if recently_moved.is_empty() {
        String::new()
    } else {
        format!(
            "SYMBOLS ALREADY MOVED OUT OF THIS FILE:\n{}\n\n",
            serde_json::to_string(recently_moved).unwrap_or_else(|_| "[]".into())
        )
    };

    format!(
        "TASK:\n{instruction}\n{history}\n\
{moved_block}\
AVAILABLE ENTITIES (functions/classes in this file):\n{available}\n\n\
Return ONLY a JSON list of names to DELETE from the available list.\n\
Return [] if none should be deleted.\n\
Example: [\"parse_iso8601\", \"OldClass\"]\n",
        instruction = render_step(step),
        history = render_history(history),
    )
}

pub fn extract_and_modify_prompt(
    source_content: &str,
    source_file: &str,
    target_file: &str,
    description: &str,
    history: &[TaskRecord],
) -> String {
    format!(
        "{history}\n### TASK: EXTRACT AND MODIFY\n\
Extract code from a source file into a new target file, and update the source file \
to use the extracted code.\n\n\
SOURCE FILE: {source_file}\nTARGET FILE: {target_file}\n\n\
DESCRIPTION:\n{description}\n\n\
### SOURCE CONTENT:\n{source_content}\n\n\
### OUTPUT FORMAT\nDo NOT return JSON. Use exactly this delimiter format:\n\n\
{target_marker}\n[FULL content of the NEW target file]\n{separator}\n\
{source_marker}\n[FULL content of the MODIFIED source file]\n{end_marker}\n\n\
### RULES:\n\
1. The target file contains ONLY the extracted logic.\n\
2. The source file is the FULL file content (imports + remaining code), not a diff.\n\
3. Keep template syntax consistent between the two files.\n\
4. The delimiters must appear exactly as shown.\n",
        history = render_history(history),
        target_marker = crate::dispatch::compound::TARGET_MARKER,
        separator = crate::dispatch::compound::SEPARATOR,
        source_marker = crate::dispatch::compound::SOURCE_MARKER,
        end_marker = crate::dispatch::compound::END_MARKER,
    )
}

/// Full-content generation for a brand-new file.
pub fn create_prompt(step: &ChangeStep, history: &[TaskRecord]) -> String {
    rewrite_prompt("", step, history)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ActionType;

    fn history() -> Vec<TaskRecord> {
        vec![TaskRecord {
            action: ActionType::Create,
            file: "pkg/dates.py".into(),
            description: format!("{}\nsecond line", "x".repeat(150)),
        }]
    }

    #[test]
    fn history_is_first_line_truncated() {
        let text = render_history(&history());
        assert!(text.contains("- [CREATE] pkg/dates.py: "));
        assert!(text.contains(&"x".repeat(100)));
        assert!(!text.contains(&"x".repeat(101)));
        assert!(!text.contains("second line"));
        assert_eq!(render_history(&[]), "");
    }

    #[test]
    fn rewrite_prompt_carries_original_and_instruction() {
        let step = ChangeStep::new(ActionType::Modify, "a.py").with_description("rename f");
        let prompt = rewrite_prompt("def f(): pass", &step, &history());
        assert!(prompt.contains("ORIGINAL CODE:\ndef f(): pass"));
        assert!(prompt.contains("\"description\": \"rename f\""));
        assert!(prompt.contains("PREVIOUSLY COMPLETED TASKS"));
    }

    #[test]
    fn surgical_prompt_adapts_to_target_format() {
        let input = SurgicalCreate {
            source_file: "app.py",
            target_file: "templates/page.html",
            source_imports: "",
            body: "PAGE = '<p>'",
            description: "move the template",
        };
        let prompt = surgical_create_prompt(input, &[]);
        assert!(prompt.contains("Output RAW HTML content"));
        assert!(!prompt.contains("SOURCE IMPORTS"));

        let input = SurgicalCreate { target_file: "dates.py", source_imports: "import re", ..input };
        let prompt = surgical_create_prompt(input, &[]);
        assert!(prompt.contains("Output VALID PY code"));
        assert!(prompt.contains("SOURCE IMPORTS/HEADERS (Reference):\nimport re"));
    }

    #[test]
    fn semantic_delete_lists_sorted_entities_and_moves() {
        let step = ChangeStep::new(ActionType::Modify, "u.py").with_description("drop date helpers");
        let prompt = semantic_delete_prompt(
            &step,
            &["zeta".into(), "alpha".into()],
            &["parse_date".into()],
            &[],
        );
        assert!(prompt.contains("[\"alpha\",\"zeta\"]"));
        assert!(prompt.contains("ALREADY MOVED OUT OF THIS FILE:\n[\"parse_date\"]"));
    }

    #[test]
    fn extract_prompt_spells_out_markers() {
        let prompt = extract_and_modify_prompt("x = 1", "a.py", "b.py", "split", &[]);
        assert!(prompt.contains("<<<<<<< TARGET_CONTENT"));
        assert!(prompt.contains("<<<<<<< SOURCE_CONTENT"));
        assert!(prompt.contains("\n>>>>>>>\n"));
    }
}
