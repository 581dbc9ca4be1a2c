//! Source spans and line/column lookup.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A span in source code, represented as byte offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Span {
    /// Start byte offset (inclusive).
    pub start: u32,
    /// End byte offset (exclusive).
    pub end: u32,
}

impl Span {
    /// Creates a new span.
    #[must_use]
    #[inline]
    pub const fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// Returns the length of this span in bytes.
    #[must_use]
    #[inline]
    pub const fn len(&self) -> u32 {
        self.end - self.start
    }

    /// Returns true if this span is empty.
    #[must_use]
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Returns a span that covers both spans.
    #[must_use]
    #[inline]
    pub fn merge(self, other: Self) -> Self {
        Self {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

impl From<Span> for std::ops::Range<usize> {
    fn from(span: Span) -> Self {
        span.start as usize..span.end as usize
    }
}

impl From<Span> for miette::SourceSpan {
    fn from(span: Span) -> Self {
        miette::SourceSpan::new(
            miette::SourceOffset::from(span.start as usize),
            span.len() as usize,
        )
    }
}

/// A 1-based line and column pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LineCol {
    pub line: u32,
    pub column: u32,
}

/// Maps byte offsets of one source text to line/column positions.
#[derive(Debug, Clone, Default)]
pub struct LineIndex {
    /// Byte offset at which each line starts. Always begins with 0.
    line_starts: Vec<u32>,
    /// Per-line text, kept so columns count characters rather than bytes.
    lines: Vec<String>,
}

impl LineIndex {
    /// Builds an index over `source`.
    #[must_use]
    pub fn new(source: &str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(memchr::memchr_iter(b'\n', source.as_bytes()).map(|i| i as u32 + 1));
        let lines = source.split('\n').map(str::to_string).collect();
        Self { line_starts, lines }
    }

    /// Returns the 1-based line and column of a byte offset.
    ///
    /// Offsets past the end of the source clamp to the last line.
    #[must_use]
    pub fn line_col(&self, offset: u32) -> LineCol {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(next) => next.saturating_sub(1),
        };
        let line_start = self.line_starts.get(line).copied().unwrap_or(0);
        let byte_column = (offset - line_start) as usize;
        let column = self
            .lines
            .get(line)
            .map(|text| {
                let mut end = byte_column.min(text.len());
                while !text.is_char_boundary(end) {
                    end -= 1;
                }
                text[..end].chars().count()
            })
            .unwrap_or(byte_column);

        LineCol {
            line: line as u32 + 1,
            column: column as u32 + 1,
        }
    }

    /// Returns the number of lines in the source.
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_new() {
        let span = Span::new(10, 20);
        assert_eq!(span.start, 10);
        assert_eq!(span.end, 20);
        assert_eq!(span.len(), 10);
    }

    #[test]
    fn test_span_merge() {
        let a = Span::new(10, 20);
        let b = Span::new(15, 30);
        let merged = a.merge(b);
        assert_eq!(merged.start, 10);
        assert_eq!(merged.end, 30);
    }

    #[test]
    fn test_line_col_first_line() {
        let index = LineIndex::new("{ hello }");
        assert_eq!(index.line_col(0), LineCol { line: 1, column: 1 });
        assert_eq!(index.line_col(2), LineCol { line: 1, column: 3 });
    }

    #[test]
    fn test_line_col_multiline() {
        let source = "query {\n  user {\n    name\n  }\n}";
        let index = LineIndex::new(source);
        let offset = source.find("name").unwrap() as u32;
        assert_eq!(index.line_col(offset), LineCol { line: 3, column: 5 });
        assert_eq!(index.line_count(), 5);
    }

    #[test]
    fn test_line_col_counts_characters() {
        let source = "# héllo\n{ a }";
        let index = LineIndex::new(source);
        let offset = source.find('{').unwrap() as u32;
        assert_eq!(index.line_col(offset), LineCol { line: 2, column: 1 });

        let offset = source.find('l').unwrap() as u32;
        assert_eq!(index.line_col(offset), LineCol { line: 1, column: 5 });
    }
}
