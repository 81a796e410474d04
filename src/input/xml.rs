//! XML parser (recursive descent, recovery at tag boundaries)
//!
//! The document is always wrapped in a synthetic `document` element holding
//! every top-level node. Comments become elements named `!--`, CDATA becomes
//! a raw string, processing instructions become `?target` elements, and the
//! DOCTYPE declarations (`!ENTITY`, `!ELEMENT`, `!ATTLIST`, `!NOTATION`)
//! are preserved as children of a `!DOCTYPE` element.
//!
//! Entity references flow through the shared resolver: ASCII escapes decode
//! inline, named entities become Symbol items so round-trip keeps the
//! symbolic form, and unknown entities stay verbatim. The same descent also
//! serves the HTML dialect (void elements, raw-text elements, `nbsp` kept
//! symbolic).

use crate::entities::{push_codepoint, resolve_entity, Entity};
use crate::input::InputContext;
use crate::item::Item;

const MAX_DEPTH: u32 = 512;

/// Which markup dialect drives the descent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Dialect {
    Xml,
    Html,
}

const HTML_VOID_ELEMENTS: [&str; 14] = [
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

const HTML_RAW_TEXT_ELEMENTS: [&str; 2] = ["script", "style"];

pub fn parse(ctx: &mut InputContext) -> Item {
    parse_with_dialect(ctx, Dialect::Xml)
}

pub(crate) fn parse_with_dialect(ctx: &mut InputContext, dialect: Dialect) -> Item {
    ctx.skip_whitespace();
    if ctx.at_eof() {
        return Item::Null;
    }

    let mut doc = ctx.builder.element("document");
    while !ctx.at_eof() && !ctx.should_stop_parsing() {
        for node in parse_node(ctx, dialect) {
            doc.child(node);
        }
    }
    doc.finish()
}

/// One construct at the cursor; text runs may produce several items
/// (literal chunks interleaved with entity symbols).
fn parse_node(ctx: &mut InputContext, dialect: Dialect) -> Vec<Item> {
    if ctx.starts_with("<!--") {
        return parse_comment(ctx).into_iter().collect();
    }
    if ctx.starts_with("<![CDATA[") {
        return parse_cdata(ctx).into_iter().collect();
    }
    if ctx.starts_with("<!DOCTYPE") || ctx.starts_with("<!doctype") {
        return parse_doctype(ctx).into_iter().collect();
    }
    if ctx.starts_with("<?") {
        return parse_processing_instruction(ctx).into_iter().collect();
    }
    if ctx.starts_with("</") {
        ctx.add_error("unexpected closing tag");
        skip_past(ctx, ">");
        return Vec::new();
    }
    if ctx.peek_byte() == Some(b'<') {
        return parse_element(ctx, dialect).into_iter().collect();
    }
    parse_text_run(ctx, dialect)
}

fn parse_comment(ctx: &mut InputContext) -> Option<Item> {
    ctx.advance(4); // <!--
    let text = take_until(ctx, "-->");
    let mut comment = ctx.builder.element("!--");
    comment.child(ctx.builder.create_string(&text));
    Some(comment.finish())
}

fn parse_cdata(ctx: &mut InputContext) -> Option<Item> {
    ctx.advance(9); // <![CDATA[
    let text = take_until(ctx, "]]>");
    Some(ctx.builder.create_string(&text))
}

fn parse_processing_instruction(ctx: &mut InputContext) -> Option<Item> {
    ctx.advance(2); // <?
    let target = read_name(ctx);
    if target.is_empty() {
        ctx.add_error("processing instruction without a target");
        skip_past(ctx, ">");
        return None;
    }
    ctx.skip_whitespace();
    let content = take_until(ctx, "?>");
    let mut pi = ctx.builder.element(&format!("?{target}"));
    let trimmed = content.trim_end();
    if !trimmed.is_empty() {
        pi.child(ctx.builder.create_string(trimmed));
    }
    Some(pi.finish())
}

fn parse_doctype(ctx: &mut InputContext) -> Option<Item> {
    ctx.advance(9); // <!DOCTYPE
    ctx.skip_whitespace();
    let name = read_name(ctx);
    let mut doctype = ctx.builder.element("!DOCTYPE");
    if !name.is_empty() {
        doctype.attr_str("name", &name);
    }
    ctx.skip_whitespace();

    // external identifier, kept verbatim
    let mut external = String::new();
    while let Some(b) = ctx.peek_byte() {
        if b == b'[' || b == b'>' {
            break;
        }
        external.push(ctx.advance_char().unwrap_or('\0'));
    }
    let external = external.trim();
    if !external.is_empty() {
        doctype.attr_str("external", external);
    }

    if ctx.peek_byte() == Some(b'[') {
        ctx.advance(1);
        loop {
            ctx.skip_whitespace();
            match ctx.peek_byte() {
                None => {
                    ctx.add_error("unterminated DOCTYPE internal subset");
                    break;
                }
                Some(b']') => {
                    ctx.advance(1);
                    break;
                }
                Some(b'<') => {
                    if let Some(decl) = parse_markup_declaration(ctx) {
                        doctype.child(decl);
                    }
                }
                Some(_) => {
                    ctx.advance(1);
                }
            }
        }
        ctx.skip_whitespace();
    }
    if ctx.peek_byte() == Some(b'>') {
        ctx.advance(1);
    } else {
        ctx.add_error("expected '>' to close DOCTYPE");
        skip_past(ctx, ">");
    }
    Some(doctype.finish())
}

/// `<!ENTITY …>`, `<!ELEMENT …>`, `<!ATTLIST …>`, `<!NOTATION …>` inside the
/// internal subset; the declared name becomes an attribute, the remainder a
/// text child.
fn parse_markup_declaration(ctx: &mut InputContext) -> Option<Item> {
    let keyword = ["!ENTITY", "!ELEMENT", "!ATTLIST", "!NOTATION"]
        .iter()
        .find(|k| ctx.rest()[1..].starts_with(**k))?
        .to_string();
    ctx.advance(1 + keyword.len());
    ctx.skip_whitespace();
    let name = read_name(ctx);
    ctx.skip_whitespace();
    let body = take_until(ctx, ">");
    let mut decl = ctx.builder.element(&keyword);
    if !name.is_empty() {
        decl.attr_str("name", &name);
    }
    let body = body.trim();
    if !body.is_empty() {
        decl.child(ctx.builder.create_string(body));
    }
    Some(decl.finish())
}

/// One element subtree at the cursor, for embedding hosts (MDX).
pub(crate) fn parse_element_at(ctx: &mut InputContext, dialect: Dialect) -> Option<Item> {
    parse_element(ctx, dialect)
}

fn parse_element(ctx: &mut InputContext, dialect: Dialect) -> Option<Item> {
    if !ctx.enter_depth(MAX_DEPTH) {
        ctx.report_depth_exceeded(MAX_DEPTH);
        skip_balanced_element(ctx);
        ctx.leave_depth();
        return None;
    }
    let out = parse_element_inner(ctx, dialect);
    ctx.leave_depth();
    out
}

fn parse_element_inner(ctx: &mut InputContext, dialect: Dialect) -> Option<Item> {
    ctx.advance(1); // <
    let name = read_name(ctx);
    if name.is_empty() {
        ctx.add_error("expected element name after '<'");
        skip_past(ctx, ">");
        return None;
    }
    let tag_name = match dialect {
        Dialect::Html => name.to_ascii_lowercase(),
        Dialect::Xml => name,
    };

    let mut element = ctx.builder.element(&tag_name);

    // attributes
    loop {
        ctx.skip_whitespace();
        match ctx.peek_byte() {
            None => {
                ctx.add_error(format!("unterminated start tag <{tag_name}>"));
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
                    skip_past(ctx, ">");
                }
                return Some(element.finish());
            }
            Some(_) => {
                let attr_name = read_name(ctx);
                if attr_name.is_empty() {
                    ctx.add_error(format!("bad attribute in <{tag_name}>"));
                    skip_past(ctx, ">");
                    return Some(element.finish());
                }
                ctx.skip_whitespace();
                if ctx.peek_byte() == Some(b'=') {
                    ctx.advance(1);
                    ctx.skip_whitespace();
                    let value = read_attr_value(ctx, dialect);
                    element.attr_str(&attr_name, &value);
                } else {
                    // bare attribute (HTML), present with empty value
                    element.attr_str(&attr_name, "");
                }
            }
        }
    }

    if dialect == Dialect::Html && HTML_VOID_ELEMENTS.contains(&tag_name.as_str()) {
        return Some(element.finish());
    }
    if dialect == Dialect::Html && HTML_RAW_TEXT_ELEMENTS.contains(&tag_name.as_str()) {
        let close = format!("</{tag_name}");
        let raw = take_until_ci(ctx, &close);
        skip_past(ctx, ">");
        if !raw.trim().is_empty() {
            element.child(ctx.builder.create_string(&raw));
        }
        return Some(element.finish());
    }

    // children until the matching close tag
    loop {
        if ctx.at_eof() || ctx.should_stop_parsing() {
            ctx.add_error(format!("missing closing tag for <{tag_name}>"));
            break;
        }
        if ctx.starts_with("</") {
            let mark = ctx.tracker.location();
            ctx.advance(2);
            let close_name = read_name(ctx);
            ctx.skip_whitespace();
            if ctx.peek_byte() == Some(b'>') {
                ctx.advance(1);
            }
            let matches = match dialect {
                Dialect::Xml => close_name == tag_name,
                Dialect::Html => close_name.eq_ignore_ascii_case(&tag_name),
            };
            if !matches {
                ctx.add_error_at(
                    mark,
                    format!("mismatched closing tag: expected </{tag_name}>, got </{close_name}>"),
                );
            }
            break;
        }
        for node in parse_node(ctx, dialect) {
            element.child(node);
        }
    }

    Some(element.finish())
}

/// Text up to the next `<`, split into literal chunks and entity symbols.
/// Whitespace-only runs produce nothing.
fn parse_text_run(ctx: &mut InputContext, dialect: Dialect) -> Vec<Item> {
    let mut items = Vec::new();
    let mut buffer = String::new();

    while let Some(c) = ctx.peek_char() {
        if c == '<' {
            break;
        }
        if c == '&' {
            resolve_reference(ctx, dialect, &mut buffer, &mut items);
            continue;
        }
        buffer.push(c);
        ctx.advance(c.len_utf8());
    }

    let at_edge = items.is_empty();
    flush_text(ctx, &mut buffer, &mut items, at_edge);
    items
}

fn flush_text(ctx: &mut InputContext, buffer: &mut String, items: &mut Vec<Item>, at_edge: bool) {
    if buffer.is_empty() {
        return;
    }
    // whitespace-only runs at element boundaries are formatting noise
    if at_edge && buffer.chars().all(char::is_whitespace) {
        buffer.clear();
        return;
    }
    items.push(ctx.builder.create_string(buffer));
    buffer.clear();
}

/// Decode one `&…;` reference into the current buffer or an entity symbol.
fn resolve_reference(
    ctx: &mut InputContext,
    dialect: Dialect,
    buffer: &mut String,
    items: &mut Vec<Item>,
) {
    ctx.advance(1); // &
    if ctx.peek_byte() == Some(b'#') {
        ctx.advance(1);
        decode_numeric_reference(ctx, buffer);
        return;
    }

    let name = read_entity_name(ctx);
    if name.is_empty() || ctx.peek_byte() != Some(b';') {
        // not a reference after all; keep what we consumed verbatim
        buffer.push('&');
        buffer.push_str(&name);
        return;
    }
    ctx.advance(1); // ;

    match resolve_entity(&name) {
        Some(Entity::AsciiEscape(decoded)) | Some(Entity::Multi(decoded)) => {
            buffer.push_str(decoded);
        }
        Some(Entity::UnicodeSpace(decoded)) => {
            // HTML keeps nbsp symbolic for round-trip; the rest decode
            if dialect == Dialect::Html && name == "nbsp" {
                let at_edge = items.is_empty();
                flush_text(ctx, buffer, items, at_edge);
                items.push(ctx.builder.create_symbol(&name));
            } else {
                buffer.push_str(decoded);
            }
        }
        Some(Entity::Named { .. }) => {
            let at_edge = items.is_empty();
            flush_text(ctx, buffer, items, at_edge);
            items.push(ctx.builder.create_symbol(&name));
        }
        None => {
            ctx.add_warning(format!("unknown entity '&{name};' preserved verbatim"));
            buffer.push('&');
            buffer.push_str(&name);
            buffer.push(';');
        }
    }
}

fn decode_numeric_reference(ctx: &mut InputContext, buffer: &mut String) {
    let hex = ctx.peek_byte() == Some(b'x') || ctx.peek_byte() == Some(b'X');
    if hex {
        ctx.advance(1);
    }
    let mut digits = String::new();
    while let Some(b) = ctx.peek_byte() {
        let is_digit = if hex {
            b.is_ascii_hexdigit()
        } else {
            b.is_ascii_digit()
        };
        if !is_digit || digits.len() >= 8 {
            break;
        }
        digits.push(b as char);
        ctx.advance(1);
    }
    if ctx.peek_byte() == Some(b';') {
        ctx.advance(1);
    }
    let radix = if hex { 16 } else { 10 };
    match u32::from_str_radix(&digits, radix) {
        Ok(cp) if push_codepoint(buffer, cp) => {}
        _ => {
            ctx.add_warning(format!("invalid numeric character reference '&#{digits};'"));
            buffer.push('\u{fffd}');
        }
    }
}

fn read_entity_name(ctx: &mut InputContext) -> String {
    let mut name = String::new();
    while let Some(b) = ctx.peek_byte() {
        if b.is_ascii_alphanumeric() && name.len() < 32 {
            name.push(b as char);
            ctx.advance(1);
        } else {
            break;
        }
    }
    name
}

/// XML name: alphanumerics plus `: _ - .`; must not start with a digit or
/// punctuation other than `_` or `:`.
fn read_name(ctx: &mut InputContext) -> String {
    let mut name = String::new();
    if let Some(c) = ctx.peek_char() {
        if !(c.is_alphabetic() || c == '_' || c == ':') {
            return name;
        }
    }
    while let Some(c) = ctx.peek_char() {
        if c.is_alphanumeric() || c == '_' || c == ':' || c == '-' || c == '.' {
            name.push(c);
            ctx.advance(c.len_utf8());
        } else {
            break;
        }
    }
    name
}

/// Attribute value: quoted with either quote kind, entities decoded to
/// their characters (a string cannot hold a symbol), unknown references
/// kept verbatim.
fn read_attr_value(ctx: &mut InputContext, _dialect: Dialect) -> String {
    let quote = match ctx.peek_byte() {
        Some(b'"') => Some(b'"'),
        Some(b'\'') => Some(b'\''),
        _ => None,
    };
    let mut out = String::new();
    match quote {
        Some(q) => {
            ctx.advance(1);
            while let Some(c) = ctx.peek_char() {
                if c as u32 == q as u32 {
                    ctx.advance(1);
                    return out;
                }
                if c == '&' {
                    decode_attr_reference(ctx, &mut out);
                    continue;
                }
                out.push(c);
                ctx.advance(c.len_utf8());
            }
            ctx.add_error("unterminated attribute value");
            out
        }
        None => {
            while let Some(c) = ctx.peek_char() {
                if c.is_whitespace() || c == '>' || c == '/' {
                    break;
                }
                out.push(c);
                ctx.advance(c.len_utf8());
            }
            out
        }
    }
}

fn decode_attr_reference(ctx: &mut InputContext, out: &mut String) {
    ctx.advance(1); // &
    if ctx.peek_byte() == Some(b'#') {
        ctx.advance(1);
        decode_numeric_reference(ctx, out);
        return;
    }
    let name = read_entity_name(ctx);
    if name.is_empty() || ctx.peek_byte() != Some(b';') {
        out.push('&');
        out.push_str(&name);
        return;
    }
    ctx.advance(1);
    match resolve_entity(&name) {
        Some(Entity::AsciiEscape(s)) | Some(Entity::UnicodeSpace(s)) | Some(Entity::Multi(s)) => {
            out.push_str(s)
        }
        Some(Entity::Named { codepoint, .. }) => {
            if !push_codepoint(out, codepoint) {
                out.push('\u{fffd}');
            }
        }
        None => {
            out.push('&');
            out.push_str(&name);
            out.push(';');
        }
    }
}

/// Consume through the delimiter, returning what preceded it.
fn take_until(ctx: &mut InputContext, delimiter: &str) -> String {
    let rest = ctx.rest();
    match rest.find(delimiter) {
        Some(at) => {
            let out = rest[..at].to_string();
            ctx.advance(at + delimiter.len());
            out
        }
        None => {
            let out = rest.to_string();
            ctx.add_error(format!("expected '{delimiter}'"));
            let len = out.len();
            ctx.advance(len);
            out
        }
    }
}

fn take_until_ci(ctx: &mut InputContext, delimiter: &str) -> String {
    let rest = ctx.rest();
    let lower = rest.to_ascii_lowercase();
    match lower.find(&delimiter.to_ascii_lowercase()) {
        Some(at) => {
            let out = rest[..at].to_string();
            ctx.advance(at + delimiter.len());
            out
        }
        None => {
            let out = rest.to_string();
            let len = out.len();
            ctx.advance(len);
            out
        }
    }
}

fn skip_past(ctx: &mut InputContext, delimiter: &str) {
    let rest = ctx.rest();
    match rest.find(delimiter) {
        Some(at) => ctx.advance(at + delimiter.len()),
        None => {
            let len = rest.len();
            ctx.advance(len);
        }
    }
}

/// Consume a balanced element without building it; used past the depth
/// bound so recovery does not double-report.
fn skip_balanced_element(ctx: &mut InputContext) {
    let mut depth: i64 = 0;
    while let Some(b) = ctx.peek_byte() {
        if b == b'<' {
            if ctx.starts_with("</") {
                skip_past(ctx, ">");
                depth -= 1;
                if depth <= 0 {
                    return;
                }
            } else if ctx.starts_with("<!--") {
                ctx.advance(4);
                skip_past(ctx, "-->");
            } else {
                skip_past(ctx, ">");
                let before = ctx.offset();
                // a self-closing tag does not deepen
                let rest = ctx.tracker.source();
                let slice = &rest[..before];
                if !slice.trim_end().ends_with("/>") {
                    depth += 1;
                }
            }
        } else {
            ctx.advance(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::MarkBuilder;
    use crate::item::TypeId;
    use crate::name_pool::NamePool;
    use crate::reader::ItemReader;
    use crate::shape::ShapePool;

    fn parse_text(text: &str) -> (Item, InputContext) {
        let builder = MarkBuilder::new(NamePool::new(), ShapePool::new());
        let mut ctx = InputContext::new(text, builder);
        let item = parse(&mut ctx);
        (item, ctx)
    }

    #[test]
    fn wraps_in_synthetic_document() {
        let (item, ctx) = parse_text("<a/><b/>");
        assert!(!ctx.has_errors());
        let doc = ItemReader::new(item).as_element();
        assert!(doc.has_tag("document"));
        assert_eq!(doc.child_count(), 2);
    }

    #[test]
    fn attributes_and_nesting() {
        let (item, ctx) = parse_text(r#"<a href="x.html" title='t'><b>bold</b></a>"#);
        assert!(!ctx.has_errors());
        let a = ItemReader::new(item).as_element().child_at(0).as_element();
        assert_eq!(&*a.get_string_attr("href"), "x.html");
        assert_eq!(&*a.get_string_attr("title"), "t");
        let b = a.child_at(0).as_element();
        assert!(b.has_tag("b"));
        assert_eq!(&*b.child_at(0).as_str(), "bold");
    }

    #[test]
    fn entity_handling_matches_roundtrip_policy() {
        let (item, _) = parse_text("<p>&copy; 2024 &mdash; &lt;ok&gt;</p>");
        let p = ItemReader::new(item).as_element().child_at(0).as_element();
        let kinds: Vec<TypeId> = p.children().map(|c| c.type_id()).collect();
        assert_eq!(
            kinds,
            vec![
                TypeId::Symbol,
                TypeId::String,
                TypeId::Symbol,
                TypeId::String
            ]
        );
        assert_eq!(&*p.child_at(0).as_symbol().unwrap().name, "copy");
        assert_eq!(&*p.child_at(1).as_str(), " 2024 ");
        assert_eq!(&*p.child_at(2).as_symbol().unwrap().name, "mdash");
        assert_eq!(&*p.child_at(3).as_str(), " <ok>");
    }

    #[test]
    fn numeric_references_decode() {
        let (item, _) = parse_text("<p>&#65;&#x42;</p>");
        let p = ItemReader::new(item).as_element().child_at(0).as_element();
        assert_eq!(&*p.child_at(0).as_str(), "AB");
    }

    #[test]
    fn unknown_entities_stay_verbatim() {
        let (item, ctx) = parse_text("<p>&zzz; text</p>");
        let p = ItemReader::new(item).as_element().child_at(0).as_element();
        assert_eq!(&*p.child_at(0).as_str(), "&zzz; text");
        assert_eq!(ctx.errors.warning_count(), 1);
    }

    #[test]
    fn comments_cdata_and_pi() {
        let (item, _) = parse_text("<!-- note --><?xml version=\"1.0\"?><r><![CDATA[<raw>]]></r>");
        let doc = ItemReader::new(item).as_element();
        let comment = doc.child_at(0).as_element();
        assert!(comment.has_tag("!--"));
        assert_eq!(&*comment.child_at(0).as_str(), " note ");
        let pi = doc.child_at(1).as_element();
        assert!(pi.has_tag("?xml"));
        let r = doc.child_at(2).as_element();
        assert_eq!(&*r.child_at(0).as_str(), "<raw>");
    }

    #[test]
    fn doctype_with_internal_subset() {
        let (item, ctx) =
            parse_text("<!DOCTYPE note [ <!ENTITY writer \"me\"> <!ELEMENT note (#PCDATA)> ]><note/>");
        assert!(!ctx.has_errors());
        let doc = ItemReader::new(item).as_element();
        let doctype = doc.child_at(0).as_element();
        assert!(doctype.has_tag("!DOCTYPE"));
        assert_eq!(&*doctype.get_string_attr("name"), "note");
        assert_eq!(doctype.child_count(), 2);
        assert!(doctype.child_at(0).as_element().has_tag("!ENTITY"));
        assert!(doctype.child_at(1).as_element().has_tag("!ELEMENT"));
    }

    #[test]
    fn whitespace_only_text_is_dropped() {
        let (item, _) = parse_text("<r>\n  <a/>\n  <b/>\n</r>");
        let r = ItemReader::new(item).as_element().child_at(0).as_element();
        assert_eq!(r.child_count(), 2);
    }

    #[test]
    fn mismatched_close_tag_reports() {
        let (_, ctx) = parse_text("<a><b></a>");
        assert!(ctx.has_errors());
    }

    #[test]
    fn depth_bound_reports_exactly_one_error() {
        let mut text = String::new();
        for i in 0..600 {
            text.push_str(&format!("<e{i}>"));
        }
        for i in (0..600).rev() {
            text.push_str(&format!("</e{i}>"));
        }
        let (_, ctx) = parse_text(&text);
        assert_eq!(ctx.error_count(), 1);
    }
}
