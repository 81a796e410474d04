//! Input context and the format dispatcher
//!
//! An [`InputContext`] binds one parse invocation to its source buffer,
//! source tracker, error collector, and builder. The tracker doubles as the
//! byte cursor, so position reporting can never drift from consumption.
//!
//! The recursion-depth counter lives here rather than in each parser:
//! mixed-format nesting (JSX inside MDX inside Markdown) shares one counter
//! and cannot bypass a per-parser limit.

use std::path::PathBuf;
use std::rc::Rc;

use crate::builder::MarkBuilder;
use crate::errors::{ParseErrorList, Severity};
use crate::item::Item;
use crate::name_pool::NamePool;
use crate::shape::ShapePool;
use crate::source_tracker::{SourceLocation, SourceTracker};

pub mod csv;
pub mod dir;
pub mod eml;
pub mod html;
pub mod ics;
pub mod json;
pub mod jsx;
pub mod latex;
pub mod markdown;
pub mod mdx;
pub mod toml;
pub mod vcf;
pub mod xml;
pub mod yaml;

/// One parsed document: pools, diagnostics, and the root item.
#[derive(Debug)]
pub struct Input {
    pub url: Option<String>,
    pub path: Option<PathBuf>,
    pub root: Item,
    pub name_pool: Rc<NamePool>,
    pub shape_pool: Rc<ShapePool>,
    pub errors: ParseErrorList,
}

impl Input {
    pub fn has_errors(&self) -> bool {
        self.errors.has_errors()
    }
}

/// Everything one parser invocation owns.
#[derive(Debug)]
pub struct InputContext {
    pub tracker: SourceTracker,
    pub errors: ParseErrorList,
    pub builder: MarkBuilder,
    pub scratch: String,
    depth: u32,
    depth_reported: bool,
}

impl InputContext {
    /// Binds the context to `source`; a leading BOM is discarded.
    pub fn new(source: &str, builder: MarkBuilder) -> Self {
        let source = source.strip_prefix('\u{feff}').unwrap_or(source);
        InputContext {
            tracker: SourceTracker::new(Rc::from(source)),
            errors: ParseErrorList::default(),
            builder,
            scratch: String::new(),
            depth: 0,
            depth_reported: false,
        }
    }

    pub fn source(&self) -> Rc<str> {
        self.tracker.source().clone()
    }

    // -- cursor ----------------------------------------------------------

    pub fn offset(&self) -> usize {
        self.tracker.offset()
    }

    pub fn at_eof(&self) -> bool {
        self.tracker.at_eof()
    }

    pub fn rest(&self) -> &str {
        &self.tracker.source()[self.tracker.offset()..]
    }

    pub fn peek_byte(&self) -> Option<u8> {
        self.tracker
            .source()
            .as_bytes()
            .get(self.tracker.offset())
            .copied()
    }

    pub fn peek_char(&self) -> Option<char> {
        self.rest().chars().next()
    }

    pub fn starts_with(&self, prefix: &str) -> bool {
        self.rest().starts_with(prefix)
    }

    pub fn advance(&mut self, n: usize) {
        self.tracker.advance(n);
    }

    /// Consume and return one char.
    pub fn advance_char(&mut self) -> Option<char> {
        let c = self.peek_char()?;
        self.tracker.advance(c.len_utf8());
        Some(c)
    }

    /// Consume ASCII spaces, tabs, and newlines.
    pub fn skip_whitespace(&mut self) {
        while let Some(b) = self.peek_byte() {
            if b == b' ' || b == b'\t' || b == b'\r' || b == b'\n' {
                self.tracker.advance(1);
            } else {
                break;
            }
        }
    }

    /// Consume spaces and tabs only.
    pub fn skip_inline_whitespace(&mut self) {
        while let Some(b) = self.peek_byte() {
            if b == b' ' || b == b'\t' {
                self.tracker.advance(1);
            } else {
                break;
            }
        }
    }

    /// Consume the rest of the current line including its terminator,
    /// returning the line without the terminator.
    pub fn take_line(&mut self) -> String {
        let rest = self.rest();
        let end = rest.find(['\r', '\n']).unwrap_or(rest.len());
        let line = rest[..end].to_string();
        let mut consume = end;
        let bytes = rest.as_bytes();
        if bytes.get(end) == Some(&b'\r') {
            consume += 1;
            if bytes.get(end + 1) == Some(&b'\n') {
                consume += 1;
            }
        } else if bytes.get(end) == Some(&b'\n') {
            consume += 1;
        }
        self.tracker.advance(consume);
        line
    }

    // -- shared recursion depth ------------------------------------------

    /// Enter one nesting level; false once `max` is exceeded.
    pub fn enter_depth(&mut self, max: u32) -> bool {
        self.depth += 1;
        self.depth <= max
    }

    pub fn leave_depth(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    /// Report the depth error once per parse, no matter how many frames
    /// trip the bound.
    pub fn report_depth_exceeded(&mut self, max: u32) {
        if !self.depth_reported {
            self.depth_reported = true;
            self.add_error(format!("nesting too deep (max {max} levels)"));
        }
    }

    // -- diagnostics -----------------------------------------------------

    fn push_diag(
        &mut self,
        severity: Severity,
        location: SourceLocation,
        message: String,
        hint: Option<String>,
    ) {
        let snippet = self.tracker.line_text(location.line).map(str::to_string);
        self.errors.push(severity, location, message, snippet, hint);
    }

    pub fn add_error(&mut self, message: impl Into<String>) {
        let loc = self.tracker.location();
        self.push_diag(Severity::Error, loc, message.into(), None);
    }

    pub fn add_error_at(&mut self, location: SourceLocation, message: impl Into<String>) {
        self.push_diag(Severity::Error, location, message.into(), None);
    }

    pub fn add_error_with_hint(&mut self, message: impl Into<String>, hint: impl Into<String>) {
        let loc = self.tracker.location();
        self.push_diag(Severity::Error, loc, message.into(), Some(hint.into()));
    }

    pub fn add_warning(&mut self, message: impl Into<String>) {
        let loc = self.tracker.location();
        self.push_diag(Severity::Warning, loc, message.into(), None);
    }

    pub fn add_warning_at(&mut self, location: SourceLocation, message: impl Into<String>) {
        self.push_diag(Severity::Warning, location, message.into(), None);
    }

    pub fn add_note(&mut self, message: impl Into<String>) {
        let loc = self.tracker.location();
        self.push_diag(Severity::Note, loc, message.into(), None);
    }

    pub fn add_note_at(&mut self, location: SourceLocation, message: impl Into<String>) {
        self.push_diag(Severity::Note, location, message.into(), None);
    }

    pub fn has_errors(&self) -> bool {
        self.errors.has_errors()
    }

    pub fn error_count(&self) -> usize {
        self.errors.error_count()
    }

    /// Checked at every recovery loop head.
    pub fn should_stop_parsing(&self) -> bool {
        self.errors.should_stop()
    }

    pub fn format_errors(&self) -> String {
        self.errors.format_errors()
    }

    pub fn log_errors(&self) {
        for error in self.errors.iter() {
            match error.severity {
                Severity::Error => tracing::warn!(location = %error.location, "{}", error.message),
                Severity::Warning => {
                    tracing::debug!(location = %error.location, "{}", error.message)
                }
                Severity::Note => tracing::trace!(location = %error.location, "{}", error.message),
            }
        }
    }

    pub fn set_max_errors(&mut self, max: usize) {
        self.errors.set_max_errors(max);
    }
}

/// Recognised format identifiers, lower-case.
pub const KNOWN_FORMATS: [&str; 16] = [
    "json", "csv", "tsv", "xml", "html", "yaml", "toml", "jsx", "mdx", "markup", "markdown",
    "vcf", "eml", "ics", "latex", "dir",
];

/// Parse `source` as `format` and return a fully populated [`Input`].
/// Unknown formats produce a null root plus one error diagnostic.
pub fn input_from_source(
    source: &str,
    base_url: Option<&str>,
    format: &str,
    flavor: Option<&str>,
) -> Input {
    let name_pool = NamePool::new();
    let shape_pool = ShapePool::new();
    let builder = MarkBuilder::new(name_pool.clone(), shape_pool.clone());
    let mut ctx = InputContext::new(source, builder);

    let root = match format {
        "json" => json::parse(&mut ctx),
        "csv" => csv::parse(&mut ctx, csv::Separator::Auto),
        "tsv" => csv::parse(&mut ctx, csv::Separator::Tab),
        "xml" => xml::parse(&mut ctx),
        "html" => html::parse(&mut ctx),
        "yaml" => yaml::parse(&mut ctx),
        "toml" => toml::parse(&mut ctx),
        "jsx" => jsx::parse(&mut ctx),
        "mdx" => mdx::parse(&mut ctx),
        "markup" | "markdown" => {
            if let Some(flavor) = flavor {
                if flavor != "commonmark" && flavor != "markdown" {
                    ctx.add_warning(format!("unknown markup flavor '{flavor}', using commonmark"));
                }
            }
            markdown::parse(&mut ctx)
        }
        "vcf" => vcf::parse(&mut ctx),
        "eml" => eml::parse(&mut ctx),
        "ics" => ics::parse(&mut ctx),
        "latex" => {
            // the tree-sitter flavor accepts the same surface; one descent
            // covers both dialects here
            latex::parse(&mut ctx)
        }
        "dir" => dir::parse(&mut ctx, base_url),
        other => {
            ctx.add_error(format!("unknown input format '{other}'"));
            Item::Null
        }
    };

    if ctx.has_errors() {
        ctx.log_errors();
    }

    Input {
        url: base_url.map(str::to_string),
        path: None,
        root,
        name_pool,
        shape_pool,
        errors: ctx.errors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_format_yields_null_root_and_error() {
        let input = input_from_source("data", None, "wat", None);
        assert!(input.root.is_null());
        assert_eq!(input.errors.error_count(), 1);
    }

    #[test]
    fn bom_is_discarded() {
        let input = input_from_source("\u{feff}{\"a\": 1}", None, "json", None);
        assert!(!input.has_errors());
        assert_eq!(input.root.type_id(), crate::item::TypeId::Map);
    }

    #[test]
    fn take_line_handles_crlf() {
        let builder = MarkBuilder::new(NamePool::new(), ShapePool::new());
        let mut ctx = InputContext::new("one\r\ntwo\nthree", builder);
        assert_eq!(ctx.take_line(), "one");
        assert_eq!(ctx.take_line(), "two");
        assert_eq!(ctx.take_line(), "three");
        assert!(ctx.at_eof());
    }
}
