//! Lenient parsing of a JSON string list out of generator chatter.

use once_cell::sync::Lazy;
use regex::Regex;

static FENCED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)```(?:json)?\s*(.*?)\s*```").expect("valid fenced block regex")
});

static INLINE_LIST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)\[\s*(?:"[^"]*"(?:\s*,\s*"[^"]*")*)?\s*\]"#).expect("valid inline list regex")
});

/// Return the first candidate that parses as a list of strings: fenced
/// blocks first, then bracketed lists inside prose, then the raw text.
/// Anything unparseable yields an empty list.
pub fn parse_json_list(raw: &str) -> Vec<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Vec::new();
    }

    let fenced = FENCED.captures_iter(raw).filter_map(|c| c.get(1)).map(|m| m.as_str());
    let inline = INLINE_LIST.find_iter(raw).map(|m| m.as_str());

    fenced
        .chain(inline)
        .chain(std::iter::once(raw))
        .find_map(|candidate| serde_json::from_str::<Vec<String>>(candidate.trim()).ok())
        .unwrap_or_default()
}
