//! MDX parser
//!
//! Dispatches each `<…>` block to JSX (uppercase tag) or HTML (lowercase
//! tag) and feeds the surrounding text through the Markdown parser. The
//! result is an `mdx_document > body` element tree whose children
//! interleave markdown blocks with embedded elements.

use crate::input::xml::{parse_element_at, Dialect};
use crate::input::{jsx, markdown, InputContext};
use crate::item::Item;

pub fn parse(ctx: &mut InputContext) -> Item {
    if ctx.at_eof() {
        return Item::Null;
    }

    let mut body = ctx.builder.element("body");
    let mut md_lines: Vec<String> = Vec::new();

    while !ctx.at_eof() && !ctx.should_stop_parsing() {
        if let Some(first_tag_char) = embedded_tag_start(ctx.rest()) {
            for block in markdown::parse_blocks(ctx, &md_lines) {
                body.child(block);
            }
            md_lines.clear();

            ctx.skip_inline_whitespace();
            let parsed = if first_tag_char.is_ascii_uppercase() {
                jsx::parse_one(ctx)
            } else {
                parse_element_at(ctx, Dialect::Html)
            };
            match parsed {
                Some(item) => {
                    body.child(item);
                }
                None => {
                    // defensive: step past the '<' so the loop advances
                    ctx.advance(1);
                }
            }
            // the rest of the line after the block is markdown again
            if matches!(ctx.peek_byte(), Some(b'\r') | Some(b'\n')) {
                ctx.take_line();
            }
        } else {
            md_lines.push(ctx.take_line());
        }
    }

    for block in markdown::parse_blocks(ctx, &md_lines) {
        body.child(block);
    }

    let mut doc = ctx.builder.element("mdx_document");
    doc.child(body.finish());
    doc.finish()
}

/// When the cursor sits on a line whose first content is a tag open,
/// returns the tag's first name character.
fn embedded_tag_start(rest: &str) -> Option<char> {
    let line_end = rest.find(['\r', '\n']).unwrap_or(rest.len());
    let line = rest[..line_end].trim_start();
    let mut chars = line.chars();
    if chars.next()? != '<' {
        return None;
    }
    let first = chars.next()?;
    if first.is_ascii_alphabetic() {
        Some(first)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::MarkBuilder;
    use crate::name_pool::NamePool;
    use crate::reader::{ElementReader, ItemReader};
    use crate::shape::ShapePool;

    fn parse_text(text: &str) -> (Item, InputContext) {
        let builder = MarkBuilder::new(NamePool::new(), ShapePool::new());
        let mut ctx = InputContext::new(text, builder);
        let item = parse(&mut ctx);
        (item, ctx)
    }

    fn body(item: &Item) -> ElementReader {
        let doc = ItemReader::new(item.clone()).as_element();
        assert!(doc.has_tag("mdx_document"));
        doc.child_at(0).as_element()
    }

    #[test]
    fn markdown_between_components() {
        let (item, ctx) = parse_text("# Hello\n\n<Counter start={1} />\n\nworld *x*\n");
        assert!(!ctx.has_errors());
        let b = body(&item);
        assert!(b.has_tag("body"));
        assert!(b.child_at(0).as_element().has_tag("h1"));
        let counter = b.child_at(1).as_element();
        assert!(counter.has_tag("Counter"));
        assert!(counter.get_attr("component").as_bool());
        assert!(b.child_at(2).as_element().has_tag("p"));
    }

    #[test]
    fn lowercase_tags_go_through_html() {
        let (item, ctx) = parse_text("text\n\n<div class=\"wrap\">inner</div>\n");
        assert!(!ctx.has_errors());
        let b = body(&item);
        let div = b.child_at(1).as_element();
        assert!(div.has_tag("div"));
        assert!(!div.has_attr("component"));
        assert_eq!(&*div.get_string_attr("class"), "wrap");
    }

    #[test]
    fn empty_input_is_null() {
        let (item, _) = parse_text("");
        assert!(item.is_null());
    }
}
