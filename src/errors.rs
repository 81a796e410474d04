//! Error collector — severity- and location-tagged diagnostics
//!
//! Parsers and the validator push diagnostics here instead of aborting. The
//! list caps the number of hard errors it will accept; every recovery loop
//! consults [`ParseErrorList::should_stop`] so a pathological input cannot
//! spin forever producing diagnostics nobody will read.

use std::fmt::Write as _;
use std::io::Write as _;

use serde::Serialize;
use termcolor::{Color, ColorSpec, WriteColor};

use crate::source_tracker::SourceLocation;

pub const DEFAULT_MAX_ERRORS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    Note,
    Warning,
    Error,
}

impl Severity {
    pub fn label(self) -> &'static str {
        match self {
            Severity::Note => "note",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

/// One collected diagnostic.
#[derive(Debug, Clone, Serialize)]
pub struct ParseError {
    pub severity: Severity,
    pub location: SourceLocation,
    pub message: String,
    pub source_line: Option<String>,
    pub hint: Option<String>,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}: {}", self.severity.label(), self.message)?;
        writeln!(f, "  --> {}", self.location)?;
        if let Some(line) = &self.source_line {
            writeln!(f, "   | {}", line)?;
        }
        if let Some(hint) = &self.hint {
            writeln!(f, "   = hint: {}", hint)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ParseErrorList {
    errors: Vec<ParseError>,
    max_errors: usize,
}

impl Default for ParseErrorList {
    fn default() -> Self {
        ParseErrorList::new(DEFAULT_MAX_ERRORS)
    }
}

impl ParseErrorList {
    pub fn new(max_errors: usize) -> Self {
        ParseErrorList {
            errors: Vec::new(),
            max_errors,
        }
    }

    pub fn add(&mut self, error: ParseError) {
        if self.errors.len() < self.max_errors.saturating_mul(4) {
            self.errors.push(error);
        }
    }

    pub fn add_error(&mut self, location: SourceLocation, message: impl Into<String>) {
        self.push(Severity::Error, location, message.into(), None, None);
    }

    pub fn add_warning(&mut self, location: SourceLocation, message: impl Into<String>) {
        self.push(Severity::Warning, location, message.into(), None, None);
    }

    pub fn add_note(&mut self, location: SourceLocation, message: impl Into<String>) {
        self.push(Severity::Note, location, message.into(), None, None);
    }

    pub fn push(
        &mut self,
        severity: Severity,
        location: SourceLocation,
        message: String,
        source_line: Option<String>,
        hint: Option<String>,
    ) {
        self.add(ParseError {
            severity,
            location,
            message,
            source_line,
            hint,
        });
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ParseError> {
        self.errors.iter()
    }

    pub fn total_count(&self) -> usize {
        self.errors.len()
    }

    pub fn error_count(&self) -> usize {
        self.errors
            .iter()
            .filter(|e| e.severity == Severity::Error)
            .count()
    }

    pub fn warning_count(&self) -> usize {
        self.errors
            .iter()
            .filter(|e| e.severity == Severity::Warning)
            .count()
    }

    pub fn has_errors(&self) -> bool {
        self.errors.iter().any(|e| e.severity == Severity::Error)
    }

    pub fn has_warnings(&self) -> bool {
        self.errors.iter().any(|e| e.severity == Severity::Warning)
    }

    /// True once the hard-error cap is reached; recovery loops must bail.
    pub fn should_stop(&self) -> bool {
        self.error_count() >= self.max_errors
    }

    pub fn max_errors(&self) -> usize {
        self.max_errors
    }

    pub fn set_max_errors(&mut self, max: usize) {
        self.max_errors = max;
    }

    /// All diagnostics as one human-readable string, one block each.
    pub fn format_errors(&self) -> String {
        let mut out = String::new();
        for error in &self.errors {
            let _ = write!(out, "{}", error);
        }
        out
    }

    /// Colored rendering for terminals.
    pub fn write_colored(&self, w: &mut dyn WriteColor) -> std::io::Result<()> {
        for error in &self.errors {
            let color = match error.severity {
                Severity::Error => Color::Red,
                Severity::Warning => Color::Yellow,
                Severity::Note => Color::Cyan,
            };
            w.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(true))?;
            write!(w, "{}", error.severity.label())?;
            w.reset()?;
            writeln!(w, ": {}", error.message)?;
            writeln!(w, "  --> {}", error.location)?;
            if let Some(line) = &error.source_line {
                writeln!(w, "   | {}", line)?;
            }
            if let Some(hint) = &error.hint {
                writeln!(w, "   = hint: {}", hint)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(line: u32, column: u32) -> SourceLocation {
        SourceLocation {
            offset: 0,
            line,
            column,
        }
    }

    #[test]
    fn counts_by_severity() {
        let mut list = ParseErrorList::default();
        list.add_error(loc(1, 1), "bad token");
        list.add_warning(loc(2, 3), "suspicious");
        list.add_note(loc(2, 3), "context");
        assert_eq!(list.total_count(), 3);
        assert_eq!(list.error_count(), 1);
        assert_eq!(list.warning_count(), 1);
        assert!(list.has_errors());
    }

    #[test]
    fn should_stop_at_cap() {
        let mut list = ParseErrorList::new(2);
        list.add_error(loc(1, 1), "one");
        assert!(!list.should_stop());
        list.add_error(loc(1, 2), "two");
        assert!(list.should_stop());
    }

    #[test]
    fn warnings_do_not_trigger_stop() {
        let mut list = ParseErrorList::new(1);
        list.add_warning(loc(1, 1), "w");
        list.add_warning(loc(1, 2), "w");
        assert!(!list.should_stop());
    }

    #[test]
    fn format_renders_one_block_per_diagnostic() {
        let mut list = ParseErrorList::default();
        list.push(
            Severity::Error,
            loc(3, 7),
            "unterminated string".to_string(),
            Some("\"oops".to_string()),
            Some("add a closing quote".to_string()),
        );
        let rendered = list.format_errors();
        insta::assert_snapshot!(rendered, @r###"
        error: unterminated string
          --> 3:7
           | "oops
           = hint: add a closing quote
        "###);
    }
}
