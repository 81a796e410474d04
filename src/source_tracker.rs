//! Source tracker — byte offset to line/column mapping
//!
//! The tracker owns the source as a shared slice and exposes the current
//! position as `(byte_offset, line, column)`, both 1-based for line and
//! column. Advancing recognises CR, LF, and CRLF uniformly; a CRLF pair
//! counts as a single newline even when the pair is split across two
//! `advance` calls.

use std::rc::Rc;

use serde::Serialize;

/// A structured position inside the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SourceLocation {
    pub offset: usize,
    pub line: u32,
    pub column: u32,
}

impl std::fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Debug, Clone)]
pub struct SourceTracker {
    source: Rc<str>,
    offset: usize,
    line: u32,
    column: u32,
    pending_lf: bool,
}

impl SourceTracker {
    pub fn new(source: Rc<str>) -> Self {
        SourceTracker {
            source,
            offset: 0,
            line: 1,
            column: 1,
            pending_lf: false,
        }
    }

    pub fn source(&self) -> &Rc<str> {
        &self.source
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn location(&self) -> SourceLocation {
        SourceLocation {
            offset: self.offset,
            line: self.line,
            column: self.column,
        }
    }

    pub fn at_eof(&self) -> bool {
        self.offset >= self.source.len()
    }

    /// Advance by `n` bytes, clamped at EOF (idempotent there).
    pub fn advance(&mut self, n: usize) {
        let bytes = self.source.as_bytes();
        let end = (self.offset + n).min(bytes.len());
        while self.offset < end {
            let b = bytes[self.offset];
            self.offset += 1;
            match b {
                b'\n' => {
                    if self.pending_lf {
                        // second half of a CRLF already counted
                        self.pending_lf = false;
                    } else {
                        self.line += 1;
                        self.column = 1;
                    }
                }
                b'\r' => {
                    self.line += 1;
                    self.column = 1;
                    self.pending_lf = true;
                }
                _ => {
                    self.pending_lf = false;
                    self.column += 1;
                }
            }
        }
    }

    /// The 1-based source line, without its terminating newline.
    pub fn line_text(&self, line: u32) -> Option<&str> {
        if line == 0 {
            return None;
        }
        self.source
            .split_inclusive('\n')
            .nth(line as usize - 1)
            .map(|l| l.trim_end_matches('\n').trim_end_matches('\r'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker(src: &str) -> SourceTracker {
        SourceTracker::new(Rc::from(src))
    }

    #[test]
    fn starts_at_line_one_column_one() {
        let t = tracker("abc");
        assert_eq!(t.location().line, 1);
        assert_eq!(t.location().column, 1);
    }

    #[test]
    fn lf_resets_column() {
        let mut t = tracker("ab\ncd");
        t.advance(3);
        assert_eq!(t.location().line, 2);
        assert_eq!(t.location().column, 1);
        t.advance(2);
        assert_eq!(t.location().column, 3);
    }

    #[test]
    fn crlf_counts_one_newline() {
        let mut t = tracker("a\r\nb");
        t.advance(4);
        assert_eq!(t.location().line, 2);
        assert_eq!(t.location().column, 2);
    }

    #[test]
    fn crlf_split_across_advances() {
        let mut t = tracker("a\r\nb");
        t.advance(2); // "a\r"
        assert_eq!(t.location().line, 2);
        t.advance(1); // "\n" completing the pair
        assert_eq!(t.location().line, 2);
        assert_eq!(t.location().column, 1);
    }

    #[test]
    fn lone_cr_is_a_newline() {
        let mut t = tracker("a\rb");
        t.advance(3);
        assert_eq!(t.location().line, 2);
        assert_eq!(t.location().column, 2);
    }

    #[test]
    fn advance_is_idempotent_at_eof() {
        let mut t = tracker("xy");
        t.advance(10);
        let at_end = t.location();
        t.advance(5);
        assert_eq!(t.location(), at_end);
        assert!(t.at_eof());
    }

    #[test]
    fn line_extraction_strips_terminator() {
        let t = tracker("first\r\nsecond\nthird");
        assert_eq!(t.line_text(1), Some("first"));
        assert_eq!(t.line_text(2), Some("second"));
        assert_eq!(t.line_text(3), Some("third"));
        assert_eq!(t.line_text(4), None);
        assert_eq!(t.line_text(0), None);
    }
}
