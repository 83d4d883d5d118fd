//! Splitting of the single extract-and-modify response into its two files.

use crate::error::{SpliceError, SpliceResult};
use crate::generate::clean_code;

pub const TARGET_MARKER: &str = "<<<<<<< TARGET_CONTENT";
pub const SEPARATOR: &str = "=======";
pub const SOURCE_MARKER: &str = "<<<<<<< SOURCE_CONTENT";
pub const END_MARKER: &str = ">>>>>>>";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompoundOutput {
    pub target: String,
    pub source: String,
    /// The END marker was missing and the source section ran to end of text.
    pub truncated: bool,
}

pub fn split_compound(response: &str) -> SpliceResult<CompoundOutput> {
    let text = response.replace("\r\n", "\n");

    let start = text
        .find(TARGET_MARKER)
        .ok_or_else(|| SpliceError::WireFormat("missing TARGET_CONTENT marker".into()))?;
    let after_target = &text[start + TARGET_MARKER.len()..];

    let separator = after_target
        .find(SEPARATOR)
        .ok_or_else(|| SpliceError::WireFormat("missing separator after target content".into()))?;
    let target = &after_target[..separator];
    let rest = &after_target[separator + SEPARATOR.len()..];

    let source_start = rest
        .find(SOURCE_MARKER)
        .ok_or_else(|| SpliceError::WireFormat("missing SOURCE_CONTENT marker".into()))?;
    let source_body = &rest[source_start + SOURCE_MARKER.len()..];

    let (source, truncated) = match source_body.rfind(END_MARKER) {
        Some(end) => (&source_body[..end], false),
        None => (source_body, true),
    };

    Ok(CompoundOutput { target: clean_code(target), source: clean_code(source), truncated })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_well_formed_response() {
        let response = "noise\n<<<<<<< TARGET_CONTENT\ndef moved():\n    return 1\n=======\n<<<<<<< SOURCE_CONTENT\nfrom .t import moved\n>>>>>>>\n";
        let out = split_compound(response).expect("split");
        assert_eq!(out.target, "def moved():\n    return 1");
        assert_eq!(out.source, "from .t import moved");
        assert!(!out.truncated);
    }

    #[test]
    fn missing_end_marker_takes_the_remainder() {
        let response = "<<<<<<< TARGET_CONTENT\nA = 1\n=======\n<<<<<<< SOURCE_CONTENT\nfrom .t import A\nprint(A)\n";
        let out = split_compound(response).expect("split");
        assert!(out.truncated);
        assert_eq!(out.target, "A = 1");
        assert_eq!(out.source, "from .t import A\nprint(A)");
    }

    #[test]
    fn missing_structure_is_a_wire_error() {
        assert!(matches!(split_compound("just code"), Err(SpliceError::WireFormat(_))));
        assert!(matches!(
            split_compound("<<<<<<< TARGET_CONTENT\nA = 1\n"),
            Err(SpliceError::WireFormat(_))
        ));
        assert!(matches!(
            split_compound("<<<<<<< TARGET_CONTENT\nA = 1\n=======\nB = 2\n"),
            Err(SpliceError::WireFormat(_))
        ));
    }

    #[test]
    fn fenced_sections_are_cleaned() {
        let response = "<<<<<<< TARGET_CONTENT\n```python\nA = 1\n```\n=======\n<<<<<<< SOURCE_CONTENT\n```\nB = 2\n```\n>>>>>>>";
        let out = split_compound(response).expect("split");
        assert_eq!(out.target, "A = 1");
        assert_eq!(out.source, "B = 2");
    }
}
