//! Bounded, syntax-checked generation loop.

use super::Generator;
use crate::error::{SpliceError, SpliceResult};
use crate::syntax::registry::ParserRegistry;

/// Conflict-style delimiters mean the output is a wire format, not source.
const DELIMITER: &str = "<<<<<<<";

/// Everything one generator round trip needs besides the generator itself.
#[derive(Debug, Clone)]
pub struct GenerationCall<'a> {
    pub prompt: String,
    pub system: Option<&'a str>,
    /// File the output is destined for; picks the syntax check.
    pub target_path: &'a str,
    /// Current content of the target, empty for new files.
    pub original: &'a str,
    pub validate: bool,
}

/// Strip surrounding whitespace and one layer of markdown fence.
pub fn clean_code(raw: &str) -> String {
    let text = raw.trim();
    if !text.starts_with("```") {
        return text.to_string();
    }
    let mut lines: Vec<&str> = text.lines().skip(1).collect();
    if lines.last().is_some_and(|l| l.trim_start().starts_with("```")) {
        lines.pop();
    }
    lines.join("\n").trim().to_string()
}

/// Whether `output` should be held to the target language's grammar.
pub fn looks_like_source(registry: &ParserRegistry, call: &GenerationCall<'_>, output: &str) -> bool {
    let Some(check) = registry.for_path(call.target_path) else {
        return false;
    };
    if output.contains(DELIMITER) {
        return false;
    }
    match check.language() {
        "python" => {
            call.original.contains("def ")
                || output.starts_with("import ")
                || output.starts_with("from ")
        }
        _ => !call.original.trim().is_empty(),
    }
}

/// Call the generator, clean its output, and re-prompt with the parse error
/// while the result does not parse. Gives up after `max_attempts`.
pub fn call_with_retry(
    generator: &dyn Generator,
    registry: &ParserRegistry,
    call: GenerationCall<'_>,
    temperature: f64,
    max_attempts: usize,
) -> SpliceResult<String> {
    let attempts = max_attempts.max(1);
    let mut prompt = call.prompt.clone();
    let mut last_issue = String::new();

    for attempt in 1..=attempts {
        let raw = generator.generate(&prompt, call.system, temperature)?;
        let output = clean_code(&raw);

        if !call.validate || !looks_like_source(registry, &call, &output) {
            return Ok(output);
        }

        match registry.validate(call.target_path, &output) {
            Ok(()) => return Ok(output),
            Err(issue) => {
                tracing::warn!(
                    "Syntax error in generated draft for {} (attempt {}): {}",
                    call.target_path,
                    attempt,
                    issue
                );
                prompt.push_str(&format!(
                    "\n\nERROR: Your previous code had a SyntaxError: {}\nFix it and return the full valid code.",
                    issue
                ));
                last_issue = issue.to_string();
            }
        }
    }

    Err(SpliceError::SyntaxRegression { attempts, message: last_issue })
}
