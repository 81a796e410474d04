//! CSV/TSV parser
//!
//! The separator is auto-detected from the first line (majority vote, comma
//! by default) and applies to the whole document. A header is assumed when
//! the first record contains anything that does not look numeric. With a
//! header, rows become maps keyed by the header names — the shape pool makes
//! every row share one layout; without one, rows stay arrays of strings.

use crate::input::InputContext;
use crate::item::Item;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Separator {
    Auto,
    Comma,
    Tab,
}

pub fn parse(ctx: &mut InputContext, separator: Separator) -> Item {
    if ctx.at_eof() {
        return Item::Null;
    }

    let sep = match separator {
        Separator::Comma => b',',
        Separator::Tab => b'\t',
        Separator::Auto => detect_separator(ctx.rest()),
    };

    let mut records: Vec<Vec<String>> = Vec::new();
    while !ctx.at_eof() && !ctx.should_stop_parsing() {
        if let Some(record) = read_record(ctx, sep) {
            records.push(record);
        }
    }
    if records.is_empty() {
        return Item::Null;
    }

    let has_header = looks_like_header(&records[0]);
    let mut arr = ctx.builder.array();

    if has_header {
        let header = build_header(ctx, &records[0]);
        for (line_no, record) in records.iter().enumerate().skip(1) {
            if record.len() != header.len() {
                ctx.add_warning(format!(
                    "row {} has {} fields, header has {}",
                    line_no + 1,
                    record.len(),
                    header.len()
                ));
            }
            let mut row = ctx.builder.map();
            for (i, key) in header.iter().enumerate() {
                let value = match record.get(i) {
                    Some(text) => ctx.builder.create_string(text),
                    None => Item::Null,
                };
                row.put(key.clone(), value);
            }
            arr.append(row.finish());
        }
    } else {
        let width = records[0].len();
        for (line_no, record) in records.iter().enumerate() {
            if record.len() != width {
                ctx.add_warning(format!(
                    "row {} has {} fields, first row has {}",
                    line_no + 1,
                    record.len(),
                    width
                ));
            }
            let mut row = ctx.builder.array();
            for field in record {
                row.append(ctx.builder.create_string(field));
            }
            arr.append(row.finish());
        }
    }

    arr.finish()
}

/// Majority vote over the first line; comma wins ties.
fn detect_separator(source: &str) -> u8 {
    let first_line = source.lines().next().unwrap_or("");
    let tabs = first_line.bytes().filter(|b| *b == b'\t').count();
    let commas = first_line.bytes().filter(|b| *b == b',').count();
    if tabs > commas {
        b'\t'
    } else {
        b','
    }
}

/// A field is data-like when every character could belong to a number; any
/// alpha or other stray character makes the first record a header.
fn looks_like_header(record: &[String]) -> bool {
    record.iter().any(|field| {
        !field.is_empty()
            && field
                .bytes()
                .any(|b| !(b.is_ascii_digit() || b == b'.' || b == b'-' || b == b'+'))
    })
}

fn build_header(ctx: &mut InputContext, record: &[String]) -> Vec<std::rc::Rc<str>> {
    let mut seen: Vec<&str> = Vec::new();
    let mut header = Vec::with_capacity(record.len());
    for name in record {
        if name.is_empty() {
            ctx.add_warning("empty header name");
            header.push(ctx.builder.create_name("''"));
            continue;
        }
        if seen.contains(&name.as_str()) {
            ctx.add_warning(format!("duplicate header name '{name}'"));
        }
        seen.push(name);
        header.push(ctx.builder.create_name(name));
    }
    header
}

/// Read one record; `None` for a blank line. Quoted fields may contain the
/// separator, newlines, and doubled quotes as escapes.
fn read_record(ctx: &mut InputContext, sep: u8) -> Option<Vec<String>> {
    // blank line: skip and report no record
    if matches!(ctx.peek_byte(), Some(b'\r') | Some(b'\n')) {
        ctx.take_line();
        return None;
    }
    if ctx.at_eof() {
        return None;
    }

    let mut fields = Vec::new();
    let mut field = String::new();
    loop {
        match ctx.peek_byte() {
            None => break,
            Some(b'\r') | Some(b'\n') => {
                ctx.take_line();
                break;
            }
            Some(b'"') if field.is_empty() => {
                read_quoted_field(ctx, &mut field);
            }
            Some(b) if b == sep => {
                ctx.advance(1);
                fields.push(std::mem::take(&mut field));
            }
            Some(_) => {
                let c = ctx.advance_char().unwrap_or('\0');
                field.push(c);
            }
        }
    }
    fields.push(field);
    Some(fields)
}

fn read_quoted_field(ctx: &mut InputContext, out: &mut String) {
    ctx.advance(1); // opening quote
    loop {
        let Some(c) = ctx.peek_char() else {
            ctx.add_error("unterminated quoted field");
            return;
        };
        if c == '"' {
            ctx.advance(1);
            if ctx.peek_byte() == Some(b'"') {
                out.push('"');
                ctx.advance(1);
            } else {
                return;
            }
        } else {
            out.push(c);
            ctx.advance(c.len_utf8());
        }
    }
}
