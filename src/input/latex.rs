//! LaTeX parser
//!
//! Commands with `[opt]`/`{arg}` groups become elements named after the
//! command, environments become elements named after the environment, and
//! inline/display math lands as a raw `math` element. Comments are
//! stripped; escaped specials (`\%`, `\&`, …) decode to their characters.

use crate::input::InputContext;
use crate::item::Item;

const MAX_DEPTH: u32 = 512;

pub fn parse(ctx: &mut InputContext) -> Item {
    if ctx.at_eof() {
        return Item::Null;
    }
    let mut doc = ctx.builder.element("latex_document");
    let items = parse_content(ctx, None);
    if items.is_empty() && !ctx.has_errors() {
        return Item::Null;
    }
    for item in items {
        doc.child(item);
    }
    doc.finish()
}

/// Parse until EOF, a closing `}`, or the `\end{…}` of `until_env`.
fn parse_content(ctx: &mut InputContext, until_env: Option<&str>) -> Vec<Item> {
    let mut items = Vec::new();
    let mut text = String::new();

    loop {
        if ctx.should_stop_parsing() {
            break;
        }
        let Some(c) = ctx.peek_char() else {
            if let Some(env) = until_env {
                ctx.add_error(format!("missing \\end{{{env}}}"));
            }
            break;
        };
        match c {
            '%' => {
                ctx.take_line();
            }
            '}' => break,
            '\\' => {
                if let Some(env) = until_env {
                    if ctx.starts_with("\\end") {
                        ctx.advance(4);
                        let name = read_group(ctx).unwrap_or_default();
                        if name == env {
                            flush(ctx, &mut text, &mut items);
                            return items;
                        }
                        ctx.add_error(format!(
                            "\\end{{{name}}} does not close environment '{env}'"
                        ));
                        continue;
                    }
                }
                ctx.advance(1);
                match ctx.peek_char() {
                    Some(esc) if !esc.is_ascii_alphabetic() => {
                        // escaped special character
                        text.push(esc);
                        ctx.advance(esc.len_utf8());
                    }
                    Some(_) => {
                        flush(ctx, &mut text, &mut items);
                        if let Some(item) = parse_command(ctx) {
                            items.push(item);
                        }
                    }
                    None => text.push('\\'),
                }
            }
            '$' => {
                flush(ctx, &mut text, &mut items);
                items.push(parse_math(ctx));
            }
            '{' => {
                // bare group is transparent
                flush(ctx, &mut text, &mut items);
                ctx.advance(1);
                items.extend(parse_content(ctx, None));
                if ctx.peek_byte() == Some(b'}') {
                    ctx.advance(1);
                } else {
                    ctx.add_error("unbalanced '{'");
                }
            }
            other => {
                text.push(other);
                ctx.advance(other.len_utf8());
            }
        }
    }

    flush(ctx, &mut text, &mut items);
    items
}

fn flush(ctx: &mut InputContext, text: &mut String, items: &mut Vec<Item>) {
    if !text.trim().is_empty() {
        items.push(ctx.builder.create_string(text.trim()));
    }
    text.clear();
}

/// Cursor sits after the backslash, on the command name.
fn parse_command(ctx: &mut InputContext) -> Option<Item> {
    if !ctx.enter_depth(MAX_DEPTH) {
        ctx.report_depth_exceeded(MAX_DEPTH);
        ctx.leave_depth();
        return None;
    }
    let out = parse_command_inner(ctx);
    ctx.leave_depth();
    out
}

fn parse_command_inner(ctx: &mut InputContext) -> Option<Item> {
    let mut name = String::new();
    while let Some(c) = ctx.peek_char() {
        if c.is_ascii_alphabetic() || c == '*' {
            name.push(c);
            ctx.advance(1);
        } else {
            break;
        }
    }
    if name.is_empty() {
        return None;
    }

    if name == "begin" {
        let env = read_group(ctx)?;
        let mut element = ctx.builder.element(&env);
        for item in parse_content(ctx, Some(&env)) {
            element.child(item);
        }
        return Some(element.finish());
    }
    if name == "end" {
        let env = read_group(ctx).unwrap_or_default();
        ctx.add_error(format!("\\end{{{env}}} without matching \\begin"));
        return None;
    }

    let mut element = ctx.builder.element(&name);
    if let Some(opt) = read_optional(ctx) {
        element.attr_str("opt", &opt);
    }
    while ctx.peek_byte() == Some(b'{') {
        ctx.advance(1);
        for item in parse_content(ctx, None) {
            element.child(item);
        }
        if ctx.peek_byte() == Some(b'}') {
            ctx.advance(1);
        } else {
            ctx.add_error(format!("unterminated argument of \\{name}"));
            break;
        }
    }
    Some(element.finish())
}

fn parse_math(ctx: &mut InputContext) -> Item {
    ctx.advance(1); // $
    let display = ctx.peek_byte() == Some(b'$');
    if display {
        ctx.advance(1);
    }
    let delimiter = if display { "$$" } else { "$" };
    let rest = ctx.rest();
    let (content, consumed) = match rest.find(delimiter) {
        Some(at) => (rest[..at].to_string(), at + delimiter.len()),
        None => {
            let all = rest.to_string();
            let len = all.len();
            ctx.add_error("unterminated math");
            (all, len)
        }
    };
    ctx.advance(consumed);

    let mut math = ctx.builder.element("math");
    if display {
        math.attr("display", ctx.builder.create_bool(true));
    }
    math.child(ctx.builder.create_string(&content));
    math.finish()
}

/// `{name}` immediately at the cursor.
fn read_group(ctx: &mut InputContext) -> Option<String> {
    if ctx.peek_byte() != Some(b'{') {
        return None;
    }
    ctx.advance(1);
    let rest = ctx.rest();
    let end = rest.find('}')?;
    let name = rest[..end].to_string();
    ctx.advance(end + 1);
    Some(name)
}

fn read_optional(ctx: &mut InputContext) -> Option<String> {
    if ctx.peek_byte() != Some(b'[') {
        return None;
    }
    ctx.advance(1);
    let rest = ctx.rest();
    let end = rest.find(']')?;
    let opt = rest[..end].to_string();
    ctx.advance(end + 1);
    Some(opt)
}
