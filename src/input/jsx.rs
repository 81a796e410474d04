//! JSX parser
//!
//! Tags beginning with an uppercase letter are marked as components
//! (`component` attribute); lowercase tags are plain elements. Dotted
//! component names (`A.B.C`) are kept whole. Expressions `{…}` are scanned
//! with brace-depth awareness that respects string, template, and escape
//! context, and land as `jsx-expr` elements holding the raw source. Text
//! children get the HTML entity treatment (ASCII escapes decoded, named
//! entities as Symbols).

use crate::entities::{push_codepoint, resolve_entity, Entity};
use crate::input::InputContext;
use crate::item::Item;

const MAX_DEPTH: u32 = 512;

pub fn parse(ctx: &mut InputContext) -> Item {
    ctx.skip_whitespace();
    if ctx.at_eof() {
        return Item::Null;
    }
    let mut doc = ctx.builder.element("document");
    while !ctx.at_eof() && !ctx.should_stop_parsing() {
        ctx.skip_whitespace();
        if ctx.at_eof() {
            break;
        }
        match parse_one(ctx) {
            Some(item) => {
                doc.child(item);
            }
            None => {
                // not a tag at all; treat the rest of the line as text
                let line = ctx.take_line();
                if !line.trim().is_empty() {
                    doc.child(ctx.builder.create_string(line.trim()));
                }
            }
        }
    }
    doc.finish()
}

/// One `<…>` subtree (element or fragment) at the cursor; `None` when the
/// cursor is not on a tag open.
pub(crate) fn parse_one(ctx: &mut InputContext) -> Option<Item> {
    if ctx.peek_byte() != Some(b'<') {
        return None;
    }
    if !ctx.enter_depth(MAX_DEPTH) {
        ctx.report_depth_exceeded(MAX_DEPTH);
        skip_balanced_tag(ctx);
        ctx.leave_depth();
        return None;
    }
    let out = parse_tag(ctx);
    ctx.leave_depth();
    out
}

fn parse_tag(ctx: &mut InputContext) -> Option<Item> {
    ctx.advance(1); // <

    // fragment <>…</>
    if ctx.peek_byte() == Some(b'>') {
        ctx.advance(1);
        let mut fragment = ctx.builder.element("fragment");
        parse_children(ctx, "", &mut fragment);
        return Some(fragment.finish());
    }

    let name = read_jsx_name(ctx);
    if name.is_empty() {
        ctx.add_error("expected tag name after '<'");
        return None;
    }
    let is_component = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_uppercase());

    let mut element = ctx.builder.element(&name);
    if is_component {
        element.attr("component", ctx.builder.create_bool(true));
    }

    // attributes
    loop {
        ctx.skip_whitespace();
        match ctx.peek_byte() {
            None => {
                ctx.add_error(format!("unterminated JSX tag <{name}>"));
                return Some(element.finish());
            }
            Some(b'>') => {
                ctx.advance(1);
                break;
            }
            Some(b'/') => {
                ctx.advance(1);
                if ctx.peek_byte() == Some(b'>') {
                    ctx.advance(1);
                } else {
                    ctx.add_error("expected '>' after '/'");
                }
                return Some(element.finish());
            }
            Some(b'{') => {
                // spread attribute {...props}
                let expr = read_expression(ctx);
                let mut spread = ctx.builder.element("jsx-spread");
                spread.child(ctx.builder.create_string(expr.trim()));
                element.child(spread.finish());
            }
            Some(_) => {
                let attr_name = read_jsx_name(ctx);
                if attr_name.is_empty() {
                    ctx.add_error(format!("bad attribute in <{name}>"));
                    ctx.advance(1);
                    continue;
                }
                ctx.skip_whitespace();
                if ctx.peek_byte() == Some(b'=') {
                    ctx.advance(1);
                    ctx.skip_whitespace();
                    match ctx.peek_byte() {
                        Some(b'"') | Some(b'\'') => {
                            let value = read_quoted(ctx);
                            element.attr_str(&attr_name, &value);
                        }
                        Some(b'{') => {
                            let expr = read_expression(ctx);
                            let mut holder = ctx.builder.element("jsx-expr");
                            holder.child(ctx.builder.create_string(expr.trim()));
                            element.attr(&attr_name, holder.finish());
                        }
                        _ => {
                            ctx.add_error(format!("bad value for attribute '{attr_name}'"));
                        }
                    }
                } else {
                    // bare attribute is shorthand for true
                    element.attr(&attr_name, ctx.builder.create_bool(true));
                }
            }
        }
    }

    parse_children(ctx, &name, &mut element);
    Some(element.finish())
}

fn parse_children(ctx: &mut InputContext, tag_name: &str, element: &mut crate::builder::ElementBuilder) {
    loop {
        if ctx.at_eof() || ctx.should_stop_parsing() {
            if tag_name.is_empty() {
                ctx.add_error("missing closing tag for fragment");
            } else {
                ctx.add_error(format!("missing closing tag for <{tag_name}>"));
            }
            return;
        }
        if ctx.starts_with("</") {
            let mark = ctx.tracker.location();
            ctx.advance(2);
            let close_name = read_jsx_name(ctx);
            ctx.skip_whitespace();
            if ctx.peek_byte() == Some(b'>') {
                ctx.advance(1);
            }
            if close_name != tag_name {
                ctx.add_error_at(
                    mark,
                    format!("mismatched closing tag: expected </{tag_name}>, got </{close_name}>"),
                );
            }
            return;
        }
        match ctx.peek_byte() {
            Some(b'<') => {
                if let Some(child) = parse_one(ctx) {
                    element.child(child);
                }
            }
            Some(b'{') => {
                let expr = read_expression(ctx);
                let trimmed = expr.trim();
                if !trimmed.is_empty() {
                    let mut holder = ctx.builder.element("jsx-expr");
                    holder.child(ctx.builder.create_string(trimmed));
                    element.child(holder.finish());
                }
            }
            _ => {
                for item in parse_text(ctx) {
                    element.child(item);
                }
            }
        }
    }
}

/// Text run until `<` or `{`, with HTML entity passthrough.
fn parse_text(ctx: &mut InputContext) -> Vec<Item> {
    let mut items = Vec::new();
    let mut buffer = String::new();
    while let Some(c) = ctx.peek_char() {
        if c == '<' || c == '{' {
            break;
        }
        if c == '&' {
            ctx.advance(1);
            resolve_text_entity(ctx, &mut buffer, &mut items);
            continue;
        }
        buffer.push(c);
        ctx.advance(c.len_utf8());
    }
    if !buffer.is_empty() && !buffer.chars().all(char::is_whitespace) {
        items.push(ctx.builder.create_string(buffer.trim()));
    } else if !buffer.is_empty() && !items.is_empty() {
        // interior whitespace between entities stays
        items.push(ctx.builder.create_string(&buffer));
    }
    items
}

fn resolve_text_entity(ctx: &mut InputContext, buffer: &mut String, items: &mut Vec<Item>) {
    if ctx.peek_byte() == Some(b'#') {
        ctx.advance(1);
        let hex = matches!(ctx.peek_byte(), Some(b'x') | Some(b'X'));
        if hex {
            ctx.advance(1);
        }
        let mut digits = String::new();
        while let Some(b) = ctx.peek_byte() {
            let ok = if hex {
                b.is_ascii_hexdigit()
            } else {
                b.is_ascii_digit()
            };
            if !ok || digits.len() >= 8 {
                break;
            }
            digits.push(b as char);
            ctx.advance(1);
        }
        if ctx.peek_byte() == Some(b';') {
            ctx.advance(1);
        }
        let radix = if hex { 16 } else { 10 };
        if let Ok(cp) = u32::from_str_radix(&digits, radix) {
            if push_codepoint(buffer, cp) {
                return;
            }
        }
        buffer.push('\u{fffd}');
        return;
    }
    let mut name = String::new();
    while let Some(b) = ctx.peek_byte() {
        if b.is_ascii_alphanumeric() && name.len() < 32 {
            name.push(b as char);
            ctx.advance(1);
        } else {
            break;
        }
    }
    if ctx.peek_byte() != Some(b';') {
        buffer.push('&');
        buffer.push_str(&name);
        return;
    }
    ctx.advance(1);
    match resolve_entity(&name) {
        Some(Entity::AsciiEscape(s)) | Some(Entity::UnicodeSpace(s)) | Some(Entity::Multi(s)) => {
            buffer.push_str(s);
        }
        Some(Entity::Named { .. }) => {
            if !buffer.is_empty() {
                let text = if items.is_empty() {
                    buffer.trim_start().to_string()
                } else {
                    buffer.clone()
                };
                if !text.is_empty() {
                    items.push(ctx.builder.create_string(&text));
                }
                buffer.clear();
            }
            items.push(ctx.builder.create_symbol(&name));
        }
        None => {
            buffer.push('&');
            buffer.push_str(&name);
            buffer.push(';');
        }
    }
}

/// Identifier with `$`, `_`, digits, dots (component paths), and dashes.
fn read_jsx_name(ctx: &mut InputContext) -> String {
    let mut name = String::new();
    if let Some(c) = ctx.peek_char() {
        if !(c.is_ascii_alphabetic() || c == '_' || c == '$') {
            return name;
        }
    }
    while let Some(c) = ctx.peek_char() {
        if c.is_ascii_alphanumeric() || c == '_' || c == '$' || c == '.' || c == '-' {
            name.push(c);
            ctx.advance(1);
        } else {
            break;
        }
    }
    name
}

fn read_quoted(ctx: &mut InputContext) -> String {
    let quote = ctx.advance_char().unwrap_or('"');
    let mut out = String::new();
    while let Some(c) = ctx.peek_char() {
        if c == quote {
            ctx.advance(1);
            return out;
        }
        out.push(c);
        ctx.advance(c.len_utf8());
    }
    ctx.add_error("unterminated attribute string");
    out
}

/// Consume `{…}` and return the inner source. Brace depth tracking is
/// aware of single/double-quoted strings, template literals with `${}`
/// interpolation, and backslash escapes.
fn read_expression(ctx: &mut InputContext) -> String {
    ctx.advance(1); // {
    let mut out = String::new();
    let mut depth: i32 = 1;
    let mut mode: Vec<char> = Vec::new(); // active string delimiters

    while let Some(c) = ctx.peek_char() {
        match mode.last().copied() {
            Some(q) if q == '"' || q == '\'' => {
                ctx.advance(c.len_utf8());
                if c == '\\' {
                    out.push(c);
                    if let Some(escaped) = ctx.peek_char() {
                        out.push(escaped);
                        ctx.advance(escaped.len_utf8());
                    }
                    continue;
                }
                out.push(c);
                if c == q {
                    mode.pop();
                }
            }
            Some('`') => {
                ctx.advance(c.len_utf8());
                if c == '\\' {
                    out.push(c);
                    if let Some(escaped) = ctx.peek_char() {
                        out.push(escaped);
                        ctx.advance(escaped.len_utf8());
                    }
                    continue;
                }
                out.push(c);
                if c == '`' {
                    mode.pop();
                } else if c == '$' && ctx.peek_byte() == Some(b'{') {
                    out.push('{');
                    ctx.advance(1);
                    mode.push('{');
                }
            }
            Some('{') => {
                // inside a template interpolation
                ctx.advance(c.len_utf8());
                out.push(c);
                match c {
                    '}' => {
                        mode.pop();
                    }
                    '"' | '\'' | '`' => mode.push(c),
                    _ => {}
                }
            }
            _ => {
                match c {
                    '{' => {
                        depth += 1;
                        out.push(c);
                        ctx.advance(1);
                    }
                    '}' => {
                        depth -= 1;
                        ctx.advance(1);
                        if depth == 0 {
                            return out;
                        }
                        out.push(c);
                    }
                    '"' | '\'' | '`' => {
                        mode.push(c);
                        out.push(c);
                        ctx.advance(1);
                    }
                    other => {
                        out.push(other);
                        ctx.advance(other.len_utf8());
                    }
                }
            }
        }
    }
    ctx.add_error("unterminated JSX expression");
    out
}

/// Skip one balanced tag subtree without building anything.
fn skip_balanced_tag(ctx: &mut InputContext) {
    let mut depth: i64 = 0;
    while let Some(b) = ctx.peek_byte() {
        match b {
            b'<' => {
                let closing = ctx.starts_with("</");
                let mut self_closing = false;
                let mut prev = b'<';
                ctx.advance(1);
                while let Some(b) = ctx.peek_byte() {
                    ctx.advance(1);
                    if b == b'>' {
                        self_closing = prev == b'/';
                        break;
                    }
                    prev = b;
                }
                if closing {
                    depth -= 1;
                    if depth <= 0 {
                        return;
                    }
                } else if !self_closing {
                    depth += 1;
                } else if depth == 0 {
                    return;
                }
            }
            b'{' => {
                let _ = read_expression(ctx);
            }
            _ => {
                ctx.advance(1);
            }
        }
    }
}
