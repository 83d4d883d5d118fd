//! SEARCH/REPLACE wire format.
//!
//! ```text
//! <<<<<<< SEARCH
//! old text
//! =======
//! new text
//! >>>>>>> REPLACE
//! ```
//!
//! A search fragment containing [`ELISION_MARKER`] asks for an indentation
//! bounded delete starting at the text before the marker.

use crate::domain::PatchBlock;

pub const SEARCH_MARKER: &str = "<<<<<<< SEARCH\n";
pub const SEPARATOR: &str = "\n=======\n";
pub const END_MARKER: &str = "\n>>>>>>>";
pub const ELISION_MARKER: &str = "<ELLIPSIS>";

/// Blocks parsed from one generator response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedPatch {
    pub blocks: Vec<PatchBlock>,
    /// Sections that opened with a SEARCH marker but never closed properly.
    pub malformed: usize,
}

impl ParsedPatch {
    /// Every block the response tried to express, well-formed or not.
    pub fn attempted(&self) -> usize {
        self.blocks.len() + self.malformed
    }
}

/// Keep only the body of the first fenced code section, if there is one.
pub fn strip_fence(text: &str) -> &str {
    let mut parts = text.splitn(3, "```");
    match (parts.next(), parts.next()) {
        (Some(_), Some(inner)) => inner,
        _ => text,
    }
}

pub fn parse_blocks(response: &str) -> ParsedPatch {
    let normalized = response.replace("\r\n", "\n");
    let body = strip_fence(&normalized);

    let mut parsed = ParsedPatch::default();
    for section in body.split(SEARCH_MARKER).skip(1) {
        match parse_section(section) {
            Some(block) => parsed.blocks.push(block),
            None => {
                tracing::debug!("Skipping malformed patch block");
                parsed.malformed += 1;
            }
        }
    }
    parsed
}

fn parse_section(section: &str) -> Option<PatchBlock> {
    let (search, rest) = section.split_once(SEPARATOR)?;
    let (replace, _) = rest.split_once(END_MARKER)?;
    let search = search.trim_matches('\n');
    Some(PatchBlock {
        elided: search.contains(ELISION_MARKER),
        search: search.to_string(),
        replace: replace.trim_matches('\n').to_string(),
    })
}

/// Render blocks back into the wire format.
pub fn render_blocks(blocks: &[PatchBlock]) -> String {
    let mut out = String::new();
    for block in blocks {
        out.push_str(SEARCH_MARKER);
        out.push_str(&block.search);
        out.push_str(SEPARATOR);
        out.push_str(&block.replace);
        out.push_str(END_MARKER);
        out.push_str(" REPLACE\n");
    }
    out
}
