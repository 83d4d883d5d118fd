//! Byte-offset ↔ line-number bookkeeping shared by both tree engines.

/// Start offsets of every line in a source string. Lines are 1-based.
#[derive(Debug, Clone)]
pub struct LineIndex {
    starts: Vec<usize>,
    len: usize,
}

impl LineIndex {
    pub fn new(source: &str) -> Self {
        let mut starts = vec![0usize];
        for (idx, byte) in source.bytes().enumerate() {
            if byte == b'\n' && idx + 1 < source.len() {
                starts.push(idx + 1);
            }
        }
        Self { starts, len: source.len() }
    }

    pub fn line_count(&self) -> usize {
        if self.len == 0 {
            0
        } else {
            self.starts.len()
        }
    }

    /// 1-based line containing byte `offset`.
    pub fn line_of(&self, offset: usize) -> usize {
        match self.starts.binary_search(&offset) {
            Ok(idx) => idx + 1,
            Err(idx) => idx,
        }
    }

    /// Byte offset where 1-based `line` begins.
    pub fn line_start(&self, line: usize) -> usize {
        self.starts.get(line.saturating_sub(1)).copied().unwrap_or(self.len)
    }

    /// Byte offset just past 1-based `line`, including its line terminator.
    pub fn line_end(&self, line: usize) -> usize {
        self.starts.get(line).copied().unwrap_or(self.len)
    }
}

/// Lines with their terminators preserved, so joining them reproduces the input.
pub fn split_lines_keep(source: &str) -> Vec<&str> {
    source.split_inclusive('\n').collect()
}

/// Leading whitespace width, counting a tab as four columns.
pub fn indent_width(line: &str) -> usize {
    let mut width = 0;
    for ch in line.chars() {
        match ch {
            ' ' => width += 1,
            '\t' => width += 4,
            _ => break,
        }
    }
    width
}

pub fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_offsets_to_lines() {
        let src = "a\nbc\n\nd";
        let index = LineIndex::new(src);
        assert_eq!(index.line_count(), 4);
        assert_eq!(index.line_of(0), 1);
        assert_eq!(index.line_of(2), 2);
        assert_eq!(index.line_of(4), 2);
        assert_eq!(index.line_of(5), 3);
        assert_eq!(index.line_of(6), 4);
        assert_eq!(index.line_start(2), 2);
        assert_eq!(index.line_end(2), 5);
        assert_eq!(index.line_end(4), src.len());
    }

    #[test]
    fn trailing_newline_does_not_add_a_line() {
        let index = LineIndex::new("x = 1\n");
        assert_eq!(index.line_count(), 1);
        assert_eq!(index.line_end(1), 6);
    }

    #[test]
    fn indent_counts_tabs_as_four() {
        assert_eq!(indent_width("\t  x"), 6);
        assert_eq!(indent_width("x"), 0);
    }
}
