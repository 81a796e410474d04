//! HTML parser
//!
//! The same markup descent as XML, configured for the HTML dialect:
//! case-insensitive tag matching, void elements, raw-text `script`/`style`,
//! bare attributes, and the HTML entity policy — ASCII escapes decode
//! inline, Unicode-space entities decode inline except `nbsp`, named
//! entities are preserved as Symbol items for round-trip.

use crate::input::xml::{parse_with_dialect, Dialect};
use crate::input::InputContext;
use crate::item::Item;

pub fn parse(ctx: &mut InputContext) -> Item {
    parse_with_dialect(ctx, Dialect::Html)
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
    fn void_elements_need_no_close() {
        let (item, ctx) = parse_text("<p>a<br>b<img src=\"x.png\"></p>");
        assert!(!ctx.has_errors());
        let p = ItemReader::new(item).as_element().child_at(0).as_element();
        assert_eq!(p.child_count(), 4);
        assert!(p.child_at(1).as_element().has_tag("br"));
        assert!(p.child_at(3).as_element().has_tag("img"));
    }

    #[test]
    fn tags_are_lowercased_and_close_case_insensitively() {
        let (item, ctx) = parse_text("<DIV>x</div>");
        assert!(!ctx.has_errors());
        let div = ItemReader::new(item).as_element().child_at(0).as_element();
        assert!(div.has_tag("div"));
    }

    #[test]
    fn nbsp_stays_symbolic_other_spaces_decode() {
        let (item, _) = parse_text("<p>a&nbsp;b&ensp;c</p>");
        let p = ItemReader::new(item).as_element().child_at(0).as_element();
        let kinds: Vec<TypeId> = p.children().map(|c| c.type_id()).collect();
        assert_eq!(kinds, vec![TypeId::String, TypeId::Symbol, TypeId::String]);
        assert_eq!(&*p.child_at(1).as_symbol().unwrap().name, "nbsp");
        assert_eq!(&*p.child_at(2).as_str(), "b\u{2002}c");
    }

    #[test]
    fn ascii_escapes_decode_named_stay_symbolic() {
        let (item, _) = parse_text("<p>&lt;tag&gt; &copy;</p>");
        let p = ItemReader::new(item).as_element().child_at(0).as_element();
        assert_eq!(&*p.child_at(0).as_str(), "<tag> ");
        assert_eq!(&*p.child_at(1).as_symbol().unwrap().name, "copy");
    }

    #[test]
    fn script_content_is_raw() {
        let (item, _) = parse_text("<script>if (a < b) { go(); }</script>");
        let script = ItemReader::new(item).as_element().child_at(0).as_element();
        assert_eq!(&*script.child_at(0).as_str(), "if (a < b) { go(); }");
    }

    #[test]
    fn bare_attributes_parse() {
        let (item, _) = parse_text("<input disabled type=\"text\">");
        let input = ItemReader::new(item).as_element().child_at(0).as_element();
        assert!(input.has_attr("disabled"));
        assert_eq!(&*input.get_string_attr("type"), "text");
    }
}
