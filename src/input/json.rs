//! JSON parser (ECMA-404 with recovery)
//!
//! Policies beyond the grammar:
//! - numbers parse as doubles and demote to int when the value equals its
//!   integer cast
//! - `\u` escapes understand surrogate pairs; lone halves become U+FFFD
//!   with a warning
//! - the empty object key is normalised to the internal name `''`
//! - on a syntactic error the parser scans forward to the next `,`, `]`,
//!   or `}` and resumes

use crate::entities::decode_surrogate_pair;
use crate::input::InputContext;
use crate::item::Item;

const MAX_DEPTH: u32 = 64;

pub fn parse(ctx: &mut InputContext) -> Item {
    ctx.skip_whitespace();
    if ctx.at_eof() {
        return Item::Null;
    }
    parse_value(ctx)
}

fn parse_value(ctx: &mut InputContext) -> Item {
    if !ctx.enter_depth(MAX_DEPTH) {
        ctx.report_depth_exceeded(MAX_DEPTH);
        skip_balanced_value(ctx);
        ctx.leave_depth();
        return Item::Null;
    }
    let value = parse_value_inner(ctx);
    ctx.leave_depth();
    value
}

fn parse_value_inner(ctx: &mut InputContext) -> Item {
    ctx.skip_whitespace();

    let Some(b) = ctx.peek_byte() else {
        ctx.add_error("unexpected end of JSON");
        return Item::Null;
    };

    match b {
        b'{' => parse_object(ctx),
        b'[' => parse_array(ctx),
        b'"' => match parse_string(ctx) {
            Some(text) => ctx.builder.create_string(&text),
            None => Item::Null,
        },
        b't' => {
            if ctx.starts_with("true") {
                ctx.advance(4);
                ctx.builder.create_bool(true)
            } else {
                ctx.add_error("invalid value, expected 'true'");
                Item::Null
            }
        }
        b'f' => {
            if ctx.starts_with("false") {
                ctx.advance(5);
                ctx.builder.create_bool(false)
            } else {
                ctx.add_error("invalid value, expected 'false'");
                Item::Null
            }
        }
        b'n' => {
            if ctx.starts_with("null") {
                ctx.advance(4);
                Item::Null
            } else {
                ctx.add_error("invalid value, expected 'null'");
                Item::Null
            }
        }
        b'0'..=b'9' | b'-' => parse_number(ctx),
        other => {
            ctx.add_error(format!("unexpected character: '{}'", other as char));
            Item::Null
        }
    }
}

fn parse_number(ctx: &mut InputContext) -> Item {
    let rest = ctx.rest();
    let mut len = 0;
    for (i, b) in rest.bytes().enumerate() {
        match b {
            b'0'..=b'9' | b'-' | b'+' | b'.' | b'e' | b'E' => len = i + 1,
            _ => break,
        }
    }
    let token = &rest[..len];
    match token.parse::<f64>() {
        Ok(value) => {
            ctx.advance(len);
            if value == value as i64 as f64 && value.is_finite() {
                ctx.builder.create_int(value as i64)
            } else {
                ctx.builder.create_float(value)
            }
        }
        Err(_) => {
            ctx.add_error("invalid number format");
            ctx.advance(len.max(1));
            Item::Null
        }
    }
}

fn parse_string(ctx: &mut InputContext) -> Option<String> {
    if ctx.peek_byte() != Some(b'"') {
        ctx.add_error("expected '\"' to start string");
        return None;
    }
    ctx.advance(1);

    let mut out = String::new();
    loop {
        let Some(c) = ctx.peek_char() else {
            ctx.add_error("unterminated string");
            return None;
        };
        match c {
            '"' => {
                ctx.advance(1);
                return Some(out);
            }
            '\\' => {
                ctx.advance(1);
                let Some(esc) = ctx.peek_char() else {
                    ctx.add_error("unexpected end of string after escape");
                    return None;
                };
                match esc {
                    '"' => out.push('"'),
                    '\\' => out.push('\\'),
                    '/' => out.push('/'),
                    'b' => out.push('\u{0008}'),
                    'f' => out.push('\u{000c}'),
                    'n' => out.push('\n'),
                    'r' => out.push('\r'),
                    't' => out.push('\t'),
                    'u' => {
                        ctx.advance(1);
                        decode_unicode_escape(ctx, &mut out)?;
                        continue;
                    }
                    other => {
                        ctx.add_warning(format!("invalid escape sequence: \\{other}"));
                    }
                }
                ctx.advance(esc.len_utf8());
            }
            other => {
                out.push(other);
                ctx.advance(other.len_utf8());
            }
        }
    }
}

/// Decode the four hex digits after `\u`, combining surrogate pairs. Lone
/// halves become U+FFFD with a warning.
fn decode_unicode_escape(ctx: &mut InputContext, out: &mut String) -> Option<()> {
    let first = read_hex4(ctx)?;

    if (0xd800..=0xdbff).contains(&first) {
        if ctx.starts_with("\\u") {
            ctx.advance(2);
            let low = read_hex4(ctx)?;
            match decode_surrogate_pair(first, low) {
                Some(combined) => {
                    if let Some(c) = char::from_u32(combined) {
                        out.push(c);
                    }
                }
                None => {
                    ctx.add_warning(
                        "invalid surrogate pair: high surrogate not followed by low surrogate",
                    );
                    out.push('\u{fffd}');
                    if let Some(c) = char::from_u32(low as u32) {
                        out.push(c);
                    }
                }
            }
        } else {
            ctx.add_warning("lone high surrogate in unicode escape");
            out.push('\u{fffd}');
        }
        return Some(());
    }
    if (0xdc00..=0xdfff).contains(&first) {
        ctx.add_warning("lone low surrogate in unicode escape");
        out.push('\u{fffd}');
        return Some(());
    }
    match char::from_u32(first as u32) {
        Some(c) => out.push(c),
        None => out.push('\u{fffd}'),
    }
    Some(())
}

fn read_hex4(ctx: &mut InputContext) -> Option<u16> {
    let rest = ctx.rest();
    if rest.len() < 4 || !rest.bytes().take(4).all(|b| b.is_ascii_hexdigit()) {
        ctx.add_error("invalid unicode escape: need 4 hex digits");
        return None;
    }
    let value = u16::from_str_radix(&rest[..4], 16).ok()?;
    ctx.advance(4);
    Some(value)
}

fn parse_array(ctx: &mut InputContext) -> Item {
    let mut arr = ctx.builder.array();

    ctx.advance(1); // [
    ctx.skip_whitespace();

    if ctx.peek_byte() == Some(b']') {
        ctx.advance(1);
        return arr.finish();
    }

    while !ctx.at_eof() && !ctx.should_stop_parsing() {
        let item = parse_value(ctx);
        arr.append(item);

        ctx.skip_whitespace();
        match ctx.peek_byte() {
            Some(b']') => {
                ctx.advance(1);
                break;
            }
            Some(b',') => {
                ctx.advance(1);
                ctx.skip_whitespace();
            }
            _ => {
                ctx.add_error("expected ',' or ']' in array");
                recover_to(ctx, b']');
                if ctx.peek_byte() == Some(b',') {
                    ctx.advance(1);
                    continue;
                }
                if ctx.peek_byte() == Some(b']') {
                    ctx.advance(1);
                }
                break;
            }
        }
    }

    arr.finish()
}

fn parse_object(ctx: &mut InputContext) -> Item {
    let mut map = ctx.builder.map();

    ctx.advance(1); // {
    ctx.skip_whitespace();

    if ctx.peek_byte() == Some(b'}') {
        ctx.advance(1);
        return map.finish();
    }

    while !ctx.at_eof() && !ctx.should_stop_parsing() {
        if ctx.peek_byte() != Some(b'"') {
            ctx.add_error("expected '\"' for object key");
            break;
        }

        let raw_key = parse_raw_key(ctx);

        // the empty JSON key maps to the literal name '' so identifier
        // equality downstream cannot conflate it with "missing"
        let key = if raw_key.is_empty() {
            ctx.builder.create_name("''")
        } else {
            ctx.builder.create_name(&raw_key)
        };

        ctx.skip_whitespace();
        if ctx.peek_byte() != Some(b':') {
            ctx.add_error("expected ':' after object key");
            recover_to(ctx, b'}');
            if ctx.peek_byte() == Some(b',') {
                ctx.advance(1);
                ctx.skip_whitespace();
                continue;
            }
            break;
        }
        ctx.advance(1);
        ctx.skip_whitespace();

        let value = parse_value(ctx);
        map.put(key, value);

        ctx.skip_whitespace();
        match ctx.peek_byte() {
            Some(b'}') => {
                ctx.advance(1);
                break;
            }
            Some(b',') => {
                ctx.advance(1);
                ctx.skip_whitespace();
            }
            _ => {
                ctx.add_error("expected ',' or '}' in object");
                recover_to(ctx, b'}');
                if ctx.peek_byte() == Some(b',') {
                    ctx.advance(1);
                    ctx.skip_whitespace();
                    continue;
                }
                if ctx.peek_byte() == Some(b'}') {
                    ctx.advance(1);
                }
                break;
            }
        }
    }

    map.finish()
}

/// Object keys are read without escape decoding beyond skipping the
/// escaped character.
fn parse_raw_key(ctx: &mut InputContext) -> String {
    let mut out = String::new();
    ctx.advance(1); // opening quote
    while let Some(c) = ctx.peek_char() {
        match c {
            '"' => {
                ctx.advance(1);
                break;
            }
            '\\' => {
                ctx.advance(1);
                if let Some(escaped) = ctx.peek_char() {
                    out.push(escaped);
                    ctx.advance(escaped.len_utf8());
                }
            }
            other => {
                out.push(other);
                ctx.advance(other.len_utf8());
            }
        }
    }
    out
}

/// Scan forward to the next `,` or the closing byte, honouring strings.
fn recover_to(ctx: &mut InputContext, close: u8) {
    while let Some(b) = ctx.peek_byte() {
        if b == b',' || b == close {
            return;
        }
        if b == b'"' {
            let _ = parse_raw_key(ctx);
            continue;
        }
        ctx.advance(1);
    }
}

/// Consume one balanced JSON value without building anything. Used when the
/// depth bound trips so recovery does not double-report.
fn skip_balanced_value(ctx: &mut InputContext) {
    ctx.skip_whitespace();
    let mut depth: i64 = 0;
    loop {
        let Some(b) = ctx.peek_byte() else { return };
        match b {
            b'{' | b'[' => {
                depth += 1;
                ctx.advance(1);
            }
            b'}' | b']' => {
                if depth == 0 {
                    return;
                }
                depth -= 1;
                ctx.advance(1);
                if depth == 0 {
                    return;
                }
            }
            b'"' => {
                let _ = parse_raw_key(ctx);
            }
            b',' if depth == 0 => return,
            _ => {
                ctx.advance(1);
                if depth == 0 && ctx.peek_byte().map_or(true, |b| b == b',') {
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::MarkBuilder;
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
    fn scalars() {
        assert_eq!(parse_text("true").0, Item::Bool(true));
        assert_eq!(parse_text("null").0, Item::Null);
        assert_eq!(parse_text("42").0, Item::Int(42));
        assert_eq!(parse_text("-3.5").0, Item::Float(-3.5));
        assert_eq!(parse_text("1e2").0, Item::Int(100));
    }

    #[test]
    fn empty_input_is_null_without_errors() {
        let (item, ctx) = parse_text("   ");
        assert!(item.is_null());
        assert!(!ctx.has_errors());
    }

    #[test]
    fn integral_double_demotes_to_int() {
        let (item, _) = parse_text("{\"n\": 9007199254740992}");
        let map = ItemReader::new(item).as_map();
        assert_eq!(map.get("n").as_int64(), 9007199254740992);
        assert!(map.get("n").type_id().is_numeric());
    }

    #[test]
    fn nested_structures() {
        let (item, ctx) = parse_text(r#"{"a": [1, 2, {"b": "x"}], "c": {"d": null}}"#);
        assert!(!ctx.has_errors());
        let map = ItemReader::new(item).as_map();
        let arr = map.get("a").as_array();
        assert_eq!(arr.length(), 3);
        assert_eq!(&*arr.get(2).as_map().get("b").as_str(), "x");
        assert!(map.get("c").as_map().get("d").is_null());
    }

    #[test]
    fn string_escapes() {
        let (item, _) = parse_text(r#""a\nb\t\"c\" é""#);
        assert_eq!(&*item.text().unwrap(), "a\nb\t\"c\" \u{e9}");
    }

    #[test]
    fn surrogate_pair_decodes() {
        let (item, ctx) = parse_text(r#""😀""#);
        assert_eq!(&*item.text().unwrap(), "\u{1f600}");
        assert!(!ctx.has_errors());
    }

    #[test]
    fn lone_surrogate_becomes_replacement_with_warning() {
        let (item, ctx) = parse_text(r#""\ud83d oops""#);
        assert_eq!(&*item.text().unwrap(), "\u{fffd} oops");
        assert_eq!(ctx.errors.warning_count(), 1);
        assert!(!ctx.has_errors());
    }

    #[test]
    fn empty_key_is_remapped() {
        let (item, _) = parse_text(r#"{"": 1}"#);
        let map = ItemReader::new(item).as_map();
        assert!(map.has("''"));
        assert_eq!(map.get("''").as_int64(), 1);
    }

    #[test]
    fn recovery_continues_past_bad_element() {
        let (item, ctx) = parse_text(r#"[1, oops, 3]"#);
        assert!(ctx.has_errors());
        let arr = ItemReader::new(item).as_array();
        // bad element became null, good ones survive
        assert!(arr.length() >= 2);
        assert_eq!(arr.get(0).as_int64(), 1);
    }

    #[test]
    fn depth_bound_reports_exactly_one_error() {
        let mut nested = String::new();
        for _ in 0..80 {
            nested.push('[');
        }
        nested.push('1');
        for _ in 0..80 {
            nested.push(']');
        }
        let (_, ctx) = parse_text(&nested);
        assert_eq!(ctx.error_count(), 1);
    }
}
