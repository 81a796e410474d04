//! YAML parser (block-style subset)
//!
//! Per-line lexer over an indentation stack: block mappings, block
//! sequences, quoted and plain scalars with type inference, literal (`|`)
//! blocks, small flow collections, comments, and the `---` document marker.
//! Structures build through an intermediate node so maps finalise bottom-up
//! with their full field set.

use crate::input::InputContext;
use crate::item::Item;

#[derive(Debug)]
enum Node {
    Scalar(String, bool), // raw text, was_quoted
    Literal(String),
    Map(Vec<(String, Node)>),
    List(Vec<Node>),
    Null,
}

#[derive(Debug)]
struct Line {
    indent: usize,
    content: String,
}

pub fn parse(ctx: &mut InputContext) -> Item {
    if ctx.at_eof() {
        return Item::Null;
    }

    let mut lines = Vec::new();
    while !ctx.at_eof() {
        let raw = ctx.take_line();
        let without_comment = strip_comment(&raw);
        let trimmed = without_comment.trim_end();
        if trimmed.trim().is_empty() {
            continue;
        }
        let stripped = trimmed.trim_start();
        if stripped == "---" || stripped == "..." {
            continue;
        }
        let indent = trimmed.len() - stripped.len();
        lines.push(Line {
            indent,
            content: trimmed.to_string(),
        });
    }
    if lines.is_empty() {
        return Item::Null;
    }

    let mut idx = 0;
    let node = parse_block(ctx, &lines, &mut idx, lines[0].indent);
    while idx < lines.len() {
        ctx.add_warning(format!(
            "trailing content ignored: '{}'",
            lines[idx].content.trim()
        ));
        idx += 1;
    }
    materialize(ctx, node)
}

/// Strip an unquoted trailing comment.
fn strip_comment(line: &str) -> String {
    let mut out = String::new();
    let mut quote: Option<char> = None;
    let mut prev_space = true;
    for c in line.chars() {
        match quote {
            Some(q) => {
                out.push(c);
                if c == q {
                    quote = None;
                }
            }
            None => {
                if c == '#' && prev_space {
                    break;
                }
                if c == '\'' || c == '"' {
                    quote = Some(c);
                }
                out.push(c);
            }
        }
        prev_space = c.is_whitespace();
    }
    out
}

fn parse_block(ctx: &mut InputContext, lines: &[Line], idx: &mut usize, indent: usize) -> Node {
    let Some(line) = lines.get(*idx) else {
        return Node::Null;
    };
    let content = line.content.trim_start();
    if content == "-" || content.starts_with("- ") {
        parse_sequence(ctx, lines, idx, indent)
    } else if split_key(content).is_some() {
        parse_mapping(ctx, lines, idx, indent)
    } else {
        *idx += 1;
        parse_scalar_text(content)
    }
}

fn parse_sequence(ctx: &mut InputContext, lines: &[Line], idx: &mut usize, indent: usize) -> Node {
    let mut items = Vec::new();
    while let Some(line) = lines.get(*idx) {
        if line.indent != indent {
            break;
        }
        let content = line.content.trim_start();
        if content == "-" {
            *idx += 1;
            if lines.get(*idx).is_some_and(|next| next.indent > indent) {
                let next_indent = lines[*idx].indent;
                items.push(parse_block(ctx, lines, idx, next_indent));
            } else {
                items.push(Node::Null);
            }
        } else if let Some(rest) = content.strip_prefix("- ") {
            items.push(parse_sequence_entry(ctx, lines, idx, indent, rest.trim_start()));
        } else {
            break;
        }
    }
    Node::List(items)
}

/// One `- …` entry; an inline `key: value` opens a map that may continue on
/// deeper-indented lines.
fn parse_sequence_entry(
    ctx: &mut InputContext,
    lines: &[Line],
    idx: &mut usize,
    indent: usize,
    inline: &str,
) -> Node {
    if let Some((key, value)) = split_key(inline) {
        let mut fields = Vec::new();
        *idx += 1;
        let first = parse_mapping_value(ctx, lines, idx, indent, value);
        fields.push((key, first));
        // further keys of the same entry sit deeper than the dash
        while let Some(line) = lines.get(*idx) {
            if line.indent <= indent {
                break;
            }
            let content = line.content.trim_start();
            let Some((key, value)) = split_key(content) else {
                break;
            };
            *idx += 1;
            let node = parse_mapping_value(ctx, lines, idx, line.indent, value);
            fields.push((key, node));
        }
        Node::Map(fields)
    } else {
        *idx += 1;
        parse_scalar_text(inline)
    }
}

fn parse_mapping(ctx: &mut InputContext, lines: &[Line], idx: &mut usize, indent: usize) -> Node {
    let mut fields = Vec::new();
    while let Some(line) = lines.get(*idx) {
        if line.indent != indent {
            break;
        }
        let content = line.content.trim_start();
        let Some((key, value)) = split_key(content) else {
            ctx.add_warning(format!("expected 'key: value', got '{content}'"));
            *idx += 1;
            continue;
        };
        if fields.iter().any(|(k, _)| *k == key) {
            ctx.add_warning(format!("duplicate mapping key '{key}'"));
        }
        *idx += 1;
        let node = parse_mapping_value(ctx, lines, idx, indent, value);
        fields.push((key, node));
    }
    Node::Map(fields)
}

fn parse_mapping_value(
    ctx: &mut InputContext,
    lines: &[Line],
    idx: &mut usize,
    indent: usize,
    inline: &str,
) -> Node {
    let inline = inline.trim();
    if inline.is_empty() {
        // nested block below, or null
        if lines.get(*idx).is_some_and(|next| next.indent > indent) {
            let next_indent = lines[*idx].indent;
            return parse_block(ctx, lines, idx, next_indent);
        }
        // a sequence may sit at the same indent as its key
        if lines
            .get(*idx)
            .is_some_and(|next| next.indent == indent && next.content.trim_start().starts_with('-'))
        {
            return parse_sequence(ctx, lines, idx, indent);
        }
        return Node::Null;
    }
    if inline == "|" {
        let mut text = String::new();
        let block_indent = match lines.get(*idx) {
            Some(next) if next.indent > indent => next.indent,
            _ => return Node::Literal(text),
        };
        while let Some(line) = lines.get(*idx) {
            if line.indent < block_indent {
                break;
            }
            text.push_str(&line.content[block_indent.min(line.content.len())..]);
            text.push('\n');
            *idx += 1;
        }
        return Node::Literal(text);
    }
    parse_scalar_text(inline)
}

/// Split `key: value` respecting quoted keys; `None` when the line has no
/// mapping separator.
fn split_key(content: &str) -> Option<(String, &str)> {
    if let Some(rest) = content.strip_prefix('"') {
        let end = rest.find('"')?;
        let after = rest[end + 1..].trim_start();
        let value = after.strip_prefix(':')?;
        return Some((rest[..end].to_string(), value));
    }
    let mut quote: Option<char> = None;
    for (i, c) in content.char_indices() {
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                }
            }
            None => match c {
                '\'' => quote = Some('\''),
                ':' => {
                    let after = &content[i + 1..];
                    if after.is_empty() || after.starts_with(' ') {
                        let key = content[..i].trim().trim_matches('\'').to_string();
                        if key.is_empty() {
                            return None;
                        }
                        return Some((key, after));
                    }
                }
                _ => {}
            },
        }
    }
    None
}

fn parse_scalar_text(text: &str) -> Node {
    let trimmed = text.trim();
    if let Some(inner) = quoted(trimmed) {
        return Node::Scalar(inner, true);
    }
    if trimmed.starts_with('[') && trimmed.ends_with(']') {
        let inner = &trimmed[1..trimmed.len() - 1];
        let items = split_flow(inner)
            .into_iter()
            .map(|part| parse_scalar_text(&part))
            .collect();
        return Node::List(items);
    }
    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        let inner = &trimmed[1..trimmed.len() - 1];
        let mut fields = Vec::new();
        for part in split_flow(inner) {
            if let Some((key, value)) = split_key(part.trim()) {
                fields.push((key, parse_scalar_text(value)));
            }
        }
        return Node::Map(fields);
    }
    Node::Scalar(trimmed.to_string(), false)
}

fn quoted(text: &str) -> Option<String> {
    for q in ['"', '\''] {
        if text.len() >= 2 && text.starts_with(q) && text.ends_with(q) {
            return Some(text[1..text.len() - 1].to_string());
        }
    }
    None
}

/// Split a flow collection body at top-level commas.
fn split_flow(inner: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut depth = 0;
    let mut quote: Option<char> = None;
    let mut current = String::new();
    for c in inner.chars() {
        match quote {
            Some(q) => {
                current.push(c);
                if c == q {
                    quote = None;
                }
            }
            None => match c {
                '"' | '\'' => {
                    quote = Some(c);
                    current.push(c);
                }
                '[' | '{' => {
                    depth += 1;
                    current.push(c);
                }
                ']' | '}' => {
                    depth -= 1;
                    current.push(c);
                }
                ',' if depth == 0 => {
                    parts.push(std::mem::take(&mut current));
                }
                _ => current.push(c),
            },
        }
    }
    if !current.trim().is_empty() {
        parts.push(current);
    }
    parts
}

fn materialize(ctx: &mut InputContext, node: Node) -> Item {
    match node {
        Node::Null => Item::Null,
        Node::Literal(text) => ctx.builder.create_string(&text),
        Node::Scalar(text, was_quoted) => {
            if was_quoted {
                return ctx.builder.create_string(&text);
            }
            infer_scalar(ctx, &text)
        }
        Node::List(nodes) => {
            let mut arr = ctx.builder.array();
            for node in nodes {
                let item = materialize(ctx, node);
                arr.append(item);
            }
            arr.finish()
        }
        Node::Map(fields) => {
            let mut map = ctx.builder.map();
            for (key, node) in fields {
                let value = materialize(ctx, node);
                let key = ctx.builder.create_name(&key);
                map.put(key, value);
            }
            map.finish()
        }
    }
}

fn infer_scalar(ctx: &mut InputContext, text: &str) -> Item {
    match text {
        "" | "~" | "null" | "Null" | "NULL" => return Item::Null,
        "true" | "True" | "TRUE" => return ctx.builder.create_bool(true),
        "false" | "False" | "FALSE" => return ctx.builder.create_bool(false),
        _ => {}
    }
    if let Ok(v) = text.parse::<i64>() {
        return ctx.builder.create_int(v);
    }
    if let Ok(v) = text.parse::<f64>() {
        if text.bytes().any(|b| b == b'.' || b == b'e' || b == b'E') {
            return ctx.builder.create_float(v);
        }
    }
    ctx.builder.create_string(text)
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
    fn block_mapping_with_inference() {
        let (item, ctx) = parse_text("name: server\nport: 8080\nratio: 0.5\nactive: true\nnote: ~\n");
        assert!(!ctx.has_errors());
        let map = ItemReader::new(item).as_map();
        assert_eq!(&*map.get("name").as_str(), "server");
        assert_eq!(map.get("port").as_int64(), 8080);
        assert_eq!(map.get("ratio").as_float(), 0.5);
        assert!(map.get("active").as_bool());
        assert!(map.get("note").is_null());
    }

    #[test]
    fn nested_mapping_and_sequence() {
        let src = "server:\n  host: local\n  ports:\n    - 80\n    - 443\nusers:\n  - name: a\n    admin: true\n  - name: b\n";
        let (item, ctx) = parse_text(src);
        assert!(!ctx.has_errors());
        let map = ItemReader::new(item).as_map();
        let server = map.get("server").as_map();
        assert_eq!(&*server.get("host").as_str(), "local");
        let ports = server.get("ports").as_array();
        assert_eq!(ports.length(), 2);
        assert_eq!(ports.get(1).as_int64(), 443);
        let users = map.get("users").as_array();
        assert_eq!(users.length(), 2);
        assert!(users.get(0).as_map().get("admin").as_bool());
        assert_eq!(&*users.get(1).as_map().get("name").as_str(), "b");
    }

    #[test]
    fn comments_and_document_markers() {
        let (item, _) = parse_text("---\n# top comment\nkey: value # tail\n...\n");
        let map = ItemReader::new(item).as_map();
        assert_eq!(&*map.get("key").as_str(), "value");
    }

    #[test]
    fn quoted_scalars_stay_strings() {
        let (item, _) = parse_text("a: \"123\"\nb: '  spaced  '\n");
        let map = ItemReader::new(item).as_map();
        assert_eq!(&*map.get("a").as_str(), "123");
        assert_eq!(&*map.get("b").as_str(), "  spaced  ");
    }

    #[test]
    fn flow_collections() {
        let (item, _) = parse_text("nums: [1, 2, 3]\npair: {x: 1, y: 2}\n");
        let map = ItemReader::new(item).as_map();
        assert_eq!(map.get("nums").as_array().length(), 3);
        assert_eq!(map.get("pair").as_map().get("y").as_int64(), 2);
    }

    #[test]
    fn literal_block() {
        let (item, _) = parse_text("text: |\n  line one\n  line two\n");
        let map = ItemReader::new(item).as_map();
        assert_eq!(&*map.get("text").as_str(), "line one\nline two\n");
    }

    #[test]
    fn duplicate_keys_warn() {
        let (_, ctx) = parse_text("a: 1\na: 2\n");
        assert_eq!(ctx.errors.warning_count(), 1);
    }

    #[test]
    fn empty_input_is_null() {
        let (item, _) = parse_text("\n\n");
        assert!(item.is_null());
    }
}
