//! Markdown parser (CommonMark-family grammar)
//!
//! Produces the element vocabulary shared with the markup formatter: `doc`,
//! `h1`..`h6`, `p`, `pre`, `code`, `blockquote`, `ul`, `ol`, `li`, `hr`,
//! `em`, `strong`, `a`, `img`, `br`, `softbreak`, `html-block`, `raw-html`.
//! Headings carry `level`; links carry `href`/`title`; images `src`/`alt`/
//! `title`; ordered lists `start`; code blocks `info`/`language` and a
//! `type` of `inline` or `block`.
//!
//! Emoji shortcodes (`:smile:`) become Symbol items; unknown shortcodes
//! stay literal text. Setext headings are not recognised; `---` always
//! reads as a thematic break.

use crate::input::InputContext;
use crate::item::Item;

const KNOWN_EMOJI: [&str; 36] = [
    "smile", "grin", "laughing", "wink", "cry", "heart", "thumbsup", "thumbsdown", "+1", "-1",
    "fire", "rocket", "star", "tada", "eyes", "warning", "check", "x", "clap", "wave", "ok_hand",
    "pray", "sparkles", "sunny", "zap", "bug", "book", "memo", "bulb", "lock", "key", "bell",
    "gift", "pizza", "coffee", "dog",
];

pub fn parse(ctx: &mut InputContext) -> Item {
    if ctx.at_eof() {
        return Item::Null;
    }
    let mut lines = Vec::new();
    while !ctx.at_eof() {
        lines.push(ctx.take_line());
    }
    let mut doc = ctx.builder.element("doc");
    for block in parse_blocks(ctx, &lines) {
        doc.child(block);
    }
    doc.finish()
}

/// Parse a run of lines into block items. Used for the document body and,
/// recursively, for blockquote and list-item content.
pub(crate) fn parse_blocks(ctx: &mut InputContext, lines: &[String]) -> Vec<Item> {
    let mut blocks = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        if ctx.should_stop_parsing() {
            break;
        }
        let line = lines[i].as_str();
        let trimmed = line.trim_start();

        if trimmed.is_empty() {
            i += 1;
            continue;
        }

        if let Some((level, rest)) = atx_heading(trimmed) {
            let mut heading = ctx.builder.element(&format!("h{level}"));
            heading.attr("level", ctx.builder.create_int(level as i64));
            for item in parse_inline(ctx, rest) {
                heading.child(item);
            }
            blocks.push(heading.finish());
            i += 1;
            continue;
        }

        if let Some(fence) = fence_open(trimmed) {
            i = parse_fenced_code(ctx, lines, i, fence, &mut blocks);
            continue;
        }

        if is_thematic_break(trimmed) {
            blocks.push(ctx.builder.element("hr").finish());
            i += 1;
            continue;
        }

        if trimmed.starts_with('>') {
            i = parse_blockquote(ctx, lines, i, &mut blocks);
            continue;
        }

        if list_marker(trimmed).is_some() {
            i = parse_list(ctx, lines, i, &mut blocks);
            continue;
        }

        if line.starts_with("    ") && !line.trim().is_empty() {
            i = parse_indented_code(ctx, lines, i, &mut blocks);
            continue;
        }

        if trimmed.starts_with('<') && html_block_open(trimmed) {
            i = parse_html_block(ctx, lines, i, &mut blocks);
            continue;
        }

        i = parse_paragraph(ctx, lines, i, &mut blocks);
    }

    blocks
}

fn atx_heading(line: &str) -> Option<(usize, &str)> {
    let hashes = line.bytes().take_while(|b| *b == b'#').count();
    if hashes == 0 || hashes > 6 {
        return None;
    }
    let rest = &line[hashes..];
    if rest.is_empty() {
        return Some((hashes, ""));
    }
    if !rest.starts_with(' ') && !rest.starts_with('\t') {
        return None;
    }
    Some((hashes, rest.trim().trim_end_matches('#').trim_end()))
}

struct Fence {
    marker: char,
    len: usize,
    info: String,
}

fn fence_open(line: &str) -> Option<Fence> {
    for marker in ['`', '~'] {
        let len = line.chars().take_while(|c| *c == marker).count();
        if len >= 3 {
            return Some(Fence {
                marker,
                len,
                info: line[len..].trim().to_string(),
            });
        }
    }
    None
}

fn parse_fenced_code(
    ctx: &mut InputContext,
    lines: &[String],
    start: usize,
    fence: Fence,
    blocks: &mut Vec<Item>,
) -> usize {
    let mut content = String::new();
    let mut i = start + 1;
    while i < lines.len() {
        let trimmed = lines[i].trim_start();
        let close_len = trimmed.chars().take_while(|c| *c == fence.marker).count();
        if close_len >= fence.len && trimmed[close_len..].trim().is_empty() {
            i += 1;
            break;
        }
        content.push_str(&lines[i]);
        content.push('\n');
        i += 1;
    }

    let mut code = ctx.builder.element("code");
    if !fence.info.is_empty() {
        code.attr_str("info", &fence.info);
        if let Some(language) = fence.info.split_whitespace().next() {
            code.attr_str("language", language);
        }
    }
    code.attr_str("type", "block");
    code.child(ctx.builder.create_string(&content));

    let mut pre = ctx.builder.element("pre");
    pre.child(code.finish());
    blocks.push(pre.finish());
    i
}

fn parse_indented_code(
    ctx: &mut InputContext,
    lines: &[String],
    start: usize,
    blocks: &mut Vec<Item>,
) -> usize {
    let mut content = String::new();
    let mut i = start;
    while i < lines.len() {
        let line = lines[i].as_str();
        if line.trim().is_empty() {
            // blank line inside the block is fine if more indented code follows
            if lines.get(i + 1).is_some_and(|next| next.starts_with("    ")) {
                content.push('\n');
                i += 1;
                continue;
            }
            break;
        }
        let Some(stripped) = line.strip_prefix("    ") else {
            break;
        };
        content.push_str(stripped);
        content.push('\n');
        i += 1;
    }

    let mut code = ctx.builder.element("code");
    code.attr_str("type", "block");
    code.child(ctx.builder.create_string(&content));
    let mut pre = ctx.builder.element("pre");
    pre.child(code.finish());
    blocks.push(pre.finish());
    i
}

fn is_thematic_break(line: &str) -> bool {
    for marker in ['-', '*', '_'] {
        let significant: Vec<char> = line.chars().filter(|c| !c.is_whitespace()).collect();
        if significant.len() >= 3 && significant.iter().all(|c| *c == marker) {
            return true;
        }
    }
    false
}

fn parse_blockquote(
    ctx: &mut InputContext,
    lines: &[String],
    start: usize,
    blocks: &mut Vec<Item>,
) -> usize {
    let mut inner = Vec::new();
    let mut i = start;
    while i < lines.len() {
        let trimmed = lines[i].trim_start();
        if let Some(rest) = trimmed.strip_prefix('>') {
            inner.push(rest.strip_prefix(' ').unwrap_or(rest).to_string());
            i += 1;
        } else if !trimmed.is_empty() && !inner.is_empty() {
            // lazy continuation
            inner.push(trimmed.to_string());
            i += 1;
        } else {
            break;
        }
    }
    let mut quote = ctx.builder.element("blockquote");
    for block in parse_blocks(ctx, &inner) {
        quote.child(block);
    }
    blocks.push(quote.finish());
    i
}

enum ListKind {
    Unordered,
    Ordered(i64),
}

/// Marker at the start of a trimmed line: `(kind, content_after_marker)`.
fn list_marker(line: &str) -> Option<(ListKind, &str)> {
    let bytes = line.as_bytes();
    match bytes.first()? {
        b'-' | b'*' | b'+' => {
            let rest = &line[1..];
            if rest.starts_with(' ') {
                Some((ListKind::Unordered, &rest[1..]))
            } else {
                None
            }
        }
        b'0'..=b'9' => {
            let digits = line.bytes().take_while(u8::is_ascii_digit).count();
            if digits > 9 {
                return None;
            }
            let after = &line[digits..];
            let delim = after.bytes().next()?;
            if delim != b'.' && delim != b')' {
                return None;
            }
            let rest = &after[1..];
            if rest.starts_with(' ') {
                let start: i64 = line[..digits].parse().ok()?;
                Some((ListKind::Ordered(start), &rest[1..]))
            } else {
                None
            }
        }
        _ => None,
    }
}

fn parse_list(
    ctx: &mut InputContext,
    lines: &[String],
    start: usize,
    blocks: &mut Vec<Item>,
) -> usize {
    let first_indent = indent_width(&lines[start]);
    let Some((first_kind, _)) = list_marker(lines[start].trim_start()) else {
        return start + 1;
    };

    let mut items: Vec<Vec<String>> = Vec::new();
    let mut i = start;
    while i < lines.len() {
        let line = lines[i].as_str();
        let trimmed = line.trim_start();
        if trimmed.is_empty() {
            // a blank line ends the list unless the next line continues it
            let continues = lines.get(i + 1).is_some_and(|next| {
                indent_width(next) > first_indent
                    || (indent_width(next) == first_indent
                        && list_marker(next.trim_start()).is_some())
            });
            if !continues {
                break;
            }
            if let Some(current) = items.last_mut() {
                current.push(String::new());
            }
            i += 1;
            continue;
        }
        let indent = indent_width(line);
        if indent == first_indent {
            match (list_marker(trimmed), &first_kind) {
                (Some((ListKind::Unordered, rest)), ListKind::Unordered)
                | (Some((ListKind::Ordered(_), rest)), ListKind::Ordered(_)) => {
                    items.push(vec![rest.to_string()]);
                    i += 1;
                    continue;
                }
                _ => break,
            }
        }
        if indent > first_indent {
            // continuation of the current item, dedented by the marker width
            if let Some(current) = items.last_mut() {
                let strip = (first_indent + 2).min(indent);
                current.push(line[strip..].to_string());
                i += 1;
                continue;
            }
        }
        break;
    }

    let (tag, start_attr) = match first_kind {
        ListKind::Unordered => ("ul", None),
        ListKind::Ordered(n) => ("ol", Some(n)),
    };
    let mut list = ctx.builder.element(tag);
    if let Some(n) = start_attr {
        list.attr("start", ctx.builder.create_int(n));
    }
    for item_lines in items {
        let mut li = ctx.builder.element("li");
        let children = parse_blocks(ctx, &item_lines);
        // a single paragraph in a tight item is inlined
        if children.len() == 1 {
            if let Item::Element(e) = &children[0] {
                if &*e.borrow().name == "p" {
                    for child in e.borrow().children.iter() {
                        li.child(child.clone());
                    }
                    blocks_push_li(&mut list, li);
                    continue;
                }
            }
        }
        for child in children {
            li.child(child);
        }
        blocks_push_li(&mut list, li);
    }
    blocks.push(list.finish());
    i
}

fn blocks_push_li(list: &mut crate::builder::ElementBuilder, li: crate::builder::ElementBuilder) {
    list.child(li.finish());
}

fn indent_width(line: &str) -> usize {
    line.bytes()
        .take_while(|b| *b == b' ')
        .count()
}

fn html_block_open(line: &str) -> bool {
    let rest = &line[1..];
    rest.starts_with('!')
        || rest.starts_with('/')
        || rest
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic())
}

fn parse_html_block(
    ctx: &mut InputContext,
    lines: &[String],
    start: usize,
    blocks: &mut Vec<Item>,
) -> usize {
    let mut content = String::new();
    let mut i = start;
    while i < lines.len() && !lines[i].trim().is_empty() {
        content.push_str(&lines[i]);
        content.push('\n');
        i += 1;
    }
    let mut block = ctx.builder.element("html-block");
    block.child(ctx.builder.create_string(&content));
    blocks.push(block.finish());
    i
}

fn parse_paragraph(
    ctx: &mut InputContext,
    lines: &[String],
    start: usize,
    blocks: &mut Vec<Item>,
) -> usize {
    let mut i = start;
    let mut para = ctx.builder.element("p");
    let mut first = true;
    while i < lines.len() {
        let line = lines[i].as_str();
        let trimmed = line.trim_start();
        if trimmed.is_empty()
            || atx_heading(trimmed).is_some()
            || fence_open(trimmed).is_some()
            || is_thematic_break(trimmed)
            || trimmed.starts_with('>')
            || list_marker(trimmed).is_some()
        {
            break;
        }
        if !first {
            para.child(ctx.builder.element("softbreak").finish());
        }
        let hard_break = line.ends_with("  ");
        for item in parse_inline(ctx, trimmed.trim_end()) {
            para.child(item);
        }
        if hard_break && lines.get(i + 1).is_some_and(|l| !l.trim().is_empty()) {
            para.child(ctx.builder.element("br").finish());
        }
        first = false;
        i += 1;
    }
    blocks.push(para.finish());
    i
}

// ---------------------------------------------------------------------------
// inline grammar
// ---------------------------------------------------------------------------

/// Parse inline markup into a sequence of items.
pub(crate) fn parse_inline(ctx: &mut InputContext, text: &str) -> Vec<Item> {
    let chars: Vec<char> = text.chars().collect();
    let mut items = Vec::new();
    let mut buffer = String::new();
    let mut pos = 0;

    while pos < chars.len() {
        let c = chars[pos];
        match c {
            '\\' if pos + 1 < chars.len() && chars[pos + 1].is_ascii_punctuation() => {
                buffer.push(chars[pos + 1]);
                pos += 2;
            }
            '*' | '_' => {
                let double = chars.get(pos + 1) == Some(&c);
                let delim_len = if double { 2 } else { 1 };
                match find_delimiter_close(&chars, pos + delim_len, c, delim_len) {
                    Some(close) => {
                        flush(ctx, &mut buffer, &mut items);
                        let inner: String = chars[pos + delim_len..close].iter().collect();
                        let tag = if double { "strong" } else { "em" };
                        let mut span = ctx.builder.element(tag);
                        for item in parse_inline(ctx, &inner) {
                            span.child(item);
                        }
                        items.push(span.finish());
                        pos = close + delim_len;
                    }
                    None => {
                        buffer.push(c);
                        pos += 1;
                    }
                }
            }
            '`' => {
                let open_len = chars[pos..].iter().take_while(|&&ch| ch == '`').count();
                match find_backtick_close(&chars, pos + open_len, open_len) {
                    Some(close) => {
                        flush(ctx, &mut buffer, &mut items);
                        let inner: String = chars[pos + open_len..close].iter().collect();
                        let mut code = ctx.builder.element("code");
                        code.attr_str("type", "inline");
                        code.child(ctx.builder.create_string(inner.trim()));
                        items.push(code.finish());
                        pos = close + open_len;
                    }
                    None => {
                        buffer.push('`');
                        pos += 1;
                    }
                }
            }
            '!' if chars.get(pos + 1) == Some(&'[') => {
                match parse_link_parts(&chars, pos + 1) {
                    Some((label, dest, title, end)) => {
                        flush(ctx, &mut buffer, &mut items);
                        let mut img = ctx.builder.element("img");
                        img.attr_str("src", &dest);
                        img.attr_str("alt", &label);
                        if let Some(title) = title {
                            img.attr_str("title", &title);
                        }
                        items.push(img.finish());
                        pos = end;
                    }
                    None => {
                        buffer.push('!');
                        pos += 1;
                    }
                }
            }
            '[' => match parse_link_parts(&chars, pos) {
                Some((label, dest, title, end)) => {
                    flush(ctx, &mut buffer, &mut items);
                    let mut link = ctx.builder.element("a");
                    link.attr_str("href", &dest);
                    if let Some(title) = title {
                        link.attr_str("title", &title);
                    }
                    for item in parse_inline(ctx, &label) {
                        link.child(item);
                    }
                    items.push(link.finish());
                    pos = end;
                }
                None => {
                    buffer.push('[');
                    pos += 1;
                }
            },
            '<' => match parse_angle_construct(ctx, &chars, pos) {
                Some((item, end)) => {
                    flush(ctx, &mut buffer, &mut items);
                    items.push(item);
                    pos = end;
                }
                None => {
                    buffer.push('<');
                    pos += 1;
                }
            },
            ':' => match parse_emoji(&chars, pos) {
                Some((name, end)) => {
                    flush(ctx, &mut buffer, &mut items);
                    items.push(ctx.builder.create_symbol(&name));
                    pos = end;
                }
                None => {
                    buffer.push(':');
                    pos += 1;
                }
            },
            other => {
                buffer.push(other);
                pos += 1;
            }
        }
    }

    flush(ctx, &mut buffer, &mut items);
    items
}

fn flush(ctx: &mut InputContext, buffer: &mut String, items: &mut Vec<Item>) {
    if !buffer.is_empty() {
        items.push(ctx.builder.create_string(buffer));
        buffer.clear();
    }
}

fn find_delimiter_close(chars: &[char], from: usize, marker: char, len: usize) -> Option<usize> {
    if chars.get(from).map_or(true, |c| c.is_whitespace()) {
        return None;
    }
    let mut i = from;
    while i + len <= chars.len() {
        if chars[i..i + len].iter().all(|&c| c == marker)
            && i > from
            && !chars[i - 1].is_whitespace()
        {
            return Some(i);
        }
        i += 1;
    }
    None
}

fn find_backtick_close(chars: &[char], from: usize, len: usize) -> Option<usize> {
    let mut i = from;
    while i < chars.len() {
        if chars[i] == '`' {
            let run = chars[i..].iter().take_while(|&&c| c == '`').count();
            if run == len {
                return Some(i);
            }
            i += run;
        } else {
            i += 1;
        }
    }
    None
}

/// `[label](dest "title")` starting at the `[`. Returns
/// `(label, dest, title, index_after)`.
fn parse_link_parts(chars: &[char], open: usize) -> Option<(String, String, Option<String>, usize)> {
    let mut depth = 0;
    let mut close = None;
    for (i, &c) in chars.iter().enumerate().skip(open) {
        match c {
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    close = Some(i);
                    break;
                }
            }
            _ => {}
        }
    }
    let close = close?;
    if chars.get(close + 1) != Some(&'(') {
        return None;
    }
    let mut end = None;
    for (i, &c) in chars.iter().enumerate().skip(close + 2) {
        if c == ')' {
            end = Some(i);
            break;
        }
    }
    let end = end?;
    let label: String = chars[open + 1..close].iter().collect();
    let inside: String = chars[close + 2..end].iter().collect();
    let inside = inside.trim();
    let (dest, title) = match inside.split_once(' ') {
        Some((dest, rest)) => {
            let rest = rest.trim();
            let title = rest
                .strip_prefix('"')
                .and_then(|r| r.strip_suffix('"'))
                .map(str::to_string);
            (dest.to_string(), title)
        }
        None => (inside.to_string(), None),
    };
    Some((label, dest, title, end + 1))
}

/// `<http://…>` autolink or a raw inline tag.
fn parse_angle_construct(
    ctx: &mut InputContext,
    chars: &[char],
    open: usize,
) -> Option<(Item, usize)> {
    let close = chars.iter().skip(open).position(|&c| c == '>')? + open;
    let inner: String = chars[open + 1..close].iter().collect();
    if inner.starts_with("http://") || inner.starts_with("https://") || inner.starts_with("mailto:")
    {
        let mut link = ctx.builder.element("a");
        link.attr_str("href", &inner);
        link.child(ctx.builder.create_string(&inner));
        return Some((link.finish(), close + 1));
    }
    let tag_like = inner
        .strip_prefix('/')
        .unwrap_or(&inner)
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic());
    if tag_like && !inner.contains(char::is_whitespace) || inner.contains('=') {
        let raw: String = chars[open..=close].iter().collect();
        let mut html = ctx.builder.element("raw-html");
        html.child(ctx.builder.create_string(&raw));
        return Some((html.finish(), close + 1));
    }
    None
}

fn parse_emoji(chars: &[char], open: usize) -> Option<(String, usize)> {
    let mut name = String::new();
    let mut i = open + 1;
    while i < chars.len() {
        let c = chars[i];
        if c == ':' {
            if name.is_empty() || !KNOWN_EMOJI.contains(&name.as_str()) {
                return None;
            }
            return Some((name, i + 1));
        }
        if c.is_ascii_alphanumeric() || c == '_' || c == '+' || c == '-' {
            name.push(c);
            i += 1;
        } else {
            return None;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::MarkBuilder;
    use crate::item::TypeId;
    use crate::name_pool::NamePool;
    use crate::reader::{ElementReader, ItemReader};
    use crate::shape::ShapePool;

    fn parse_text(text: &str) -> (Item, InputContext) {
        let builder = MarkBuilder::new(NamePool::new(), ShapePool::new());
        let mut ctx = InputContext::new(text, builder);
        let item = parse(&mut ctx);
        (item, ctx)
    }

    fn doc(item: &Item) -> ElementReader {
        ItemReader::new(item.clone()).as_element()
    }

    #[test]
    fn headings_carry_level() {
        let (item, _) = parse_text("# Title\n\n### Sub ###\n");
        let d = doc(&item);
        let h1 = d.child_at(0).as_element();
        assert!(h1.has_tag("h1"));
        assert_eq!(h1.get_attr("level").as_int64(), 1);
        assert_eq!(&*h1.child_at(0).as_str(), "Title");
        let h3 = d.child_at(1).as_element();
        assert!(h3.has_tag("h3"));
        assert_eq!(&*h3.child_at(0).as_str(), "Sub");
    }

    #[test]
    fn paragraph_with_emphasis() {
        let (item, _) = parse_text("plain *em* and **strong** text\n");
        let p = doc(&item).child_at(0).as_element();
        assert!(p.has_tag("p"));
        let kinds: Vec<TypeId> = p.children().map(|c| c.type_id()).collect();
        assert_eq!(
            kinds,
            vec![
                TypeId::String,
                TypeId::Element,
                TypeId::String,
                TypeId::Element,
                TypeId::String
            ]
        );
        assert!(p.child_at(1).as_element().has_tag("em"));
        assert!(p.child_at(3).as_element().has_tag("strong"));
    }

    #[test]
    fn emoji_shortcodes_become_symbols() {
        let (item, _) = parse_text("Hello :smile: world\n");
        let p = doc(&item).child_at(0).as_element();
        assert_eq!(&*p.child_at(0).as_str(), "Hello ");
        assert_eq!(&*p.child_at(1).as_symbol().unwrap().name, "smile");
        assert_eq!(&*p.child_at(2).as_str(), " world");
    }

    #[test]
    fn unknown_shortcode_stays_literal() {
        let (item, _) = parse_text("a :notanemoji: b\n");
        let p = doc(&item).child_at(0).as_element();
        assert_eq!(p.child_count(), 1);
        assert_eq!(&*p.child_at(0).as_str(), "a :notanemoji: b");
    }

    #[test]
    fn links_and_images() {
        let (item, _) = parse_text("[site](http://x.dev \"Home\") ![logo](img.png)\n");
        let p = doc(&item).child_at(0).as_element();
        let a = p.child_at(0).as_element();
        assert!(a.has_tag("a"));
        assert_eq!(&*a.get_string_attr("href"), "http://x.dev");
        assert_eq!(&*a.get_string_attr("title"), "Home");
        assert_eq!(&*a.child_at(0).as_str(), "site");
        let img = p.child_at(2).as_element();
        assert!(img.has_tag("img"));
        assert_eq!(&*img.get_string_attr("src"), "img.png");
        assert_eq!(&*img.get_string_attr("alt"), "logo");
    }

    #[test]
    fn fenced_code_with_language() {
        let (item, _) = parse_text("```rust ignore\nfn main() {}\n```\n");
        let pre = doc(&item).child_at(0).as_element();
        assert!(pre.has_tag("pre"));
        let code = pre.child_at(0).as_element();
        assert_eq!(&*code.get_string_attr("language"), "rust");
        assert_eq!(&*code.get_string_attr("info"), "rust ignore");
        assert_eq!(&*code.get_string_attr("type"), "block");
        assert_eq!(&*code.child_at(0).as_str(), "fn main() {}\n");
    }

    #[test]
    fn inline_code() {
        let (item, _) = parse_text("use `let x` here\n");
        let p = doc(&item).child_at(0).as_element();
        let code = p.child_at(1).as_element();
        assert!(code.has_tag("code"));
        assert_eq!(&*code.get_string_attr("type"), "inline");
        assert_eq!(&*code.child_at(0).as_str(), "let x");
    }

    #[test]
    fn unordered_and_ordered_lists() {
        let (item, _) = parse_text("- one\n- two\n\n3. three\n4. four\n");
        let d = doc(&item);
        let ul = d.child_at(0).as_element();
        assert!(ul.has_tag("ul"));
        assert_eq!(ul.child_count(), 2);
        assert_eq!(&*ul.child_at(0).as_element().child_at(0).as_str(), "one");
        let ol = d.child_at(1).as_element();
        assert!(ol.has_tag("ol"));
        assert_eq!(ol.get_attr("start").as_int64(), 3);
    }

    #[test]
    fn blockquote_recurses() {
        let (item, _) = parse_text("> # Quoted\n> text\n");
        let quote = doc(&item).child_at(0).as_element();
        assert!(quote.has_tag("blockquote"));
        assert!(quote.child_at(0).as_element().has_tag("h1"));
    }

    #[test]
    fn thematic_break_and_html_block() {
        let (item, _) = parse_text("---\n\n<div class=\"x\">\nraw\n</div>\n");
        let d = doc(&item);
        assert!(d.child_at(0).as_element().has_tag("hr"));
        let html = d.child_at(1).as_element();
        assert!(html.has_tag("html-block"));
        assert!(html.child_at(0).as_str().contains("<div class=\"x\">"));
    }

    #[test]
    fn softbreak_between_lines() {
        let (item, _) = parse_text("line one\nline two\n");
        let p = doc(&item).child_at(0).as_element();
        let kinds: Vec<String> = p
            .children()
            .map(|c| {
                if c.is_element() {
                    c.as_element().tag_name().to_string()
                } else {
                    "text".to_string()
                }
            })
            .collect();
        assert_eq!(kinds, vec!["text", "softbreak", "text"]);
    }

    #[test]
    fn empty_input_is_null() {
        let (item, _) = parse_text("");
        assert!(item.is_null());
    }
}
