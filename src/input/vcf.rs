//! vCard parser
//!
//! Folded property lines (`NAME;PARAM=V:value`), one map per card. The
//! structured `N` and `ADR` properties split into component arrays,
//! properties with parameters become `{value, <param>…}` maps, and a
//! property that repeats accumulates into an array. Multi-card inputs
//! produce an array root.

use crate::input::InputContext;
use crate::item::Item;

pub fn parse(ctx: &mut InputContext) -> Item {
    if ctx.at_eof() {
        return Item::Null;
    }
    let lines = unfold_lines(ctx);
    if lines.is_empty() {
        return Item::Null;
    }

    let mut cards: Vec<Item> = Vec::new();
    let mut current: Option<Vec<(String, Vec<Item>)>> = None;

    for line in &lines {
        if ctx.should_stop_parsing() {
            break;
        }
        let upper = line.to_ascii_uppercase();
        if upper == "BEGIN:VCARD" {
            if current.is_some() {
                ctx.add_warning("BEGIN:VCARD inside an open card");
            }
            current = Some(Vec::new());
            continue;
        }
        if upper == "END:VCARD" {
            match current.take() {
                Some(props) => cards.push(finish_card(ctx, props)),
                None => ctx.add_warning("END:VCARD without matching BEGIN"),
            }
            continue;
        }
        let Some(card) = current.as_mut() else {
            ctx.add_warning(format!("property outside a card: '{line}'"));
            continue;
        };
        let Some((name, params, value)) = split_property(line) else {
            ctx.add_error(format!("malformed property line: '{line}'"));
            continue;
        };
        let item = property_item(ctx, &name, &params, &value);
        match card.iter_mut().find(|(k, _)| *k == name) {
            Some((_, values)) => values.push(item),
            None => card.push((name, vec![item])),
        }
    }

    if let Some(props) = current {
        ctx.add_error("unterminated vCard: missing END:VCARD");
        cards.push(finish_card(ctx, props));
    }

    match cards.len() {
        0 => Item::Null,
        1 => cards.pop().unwrap(),
        _ => {
            let mut arr = ctx.builder.array();
            for card in cards {
                arr.append(card);
            }
            arr.finish()
        }
    }
}

/// Read every line, joining folded continuations (leading space or tab).
pub(crate) fn unfold_lines(ctx: &mut InputContext) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    while !ctx.at_eof() {
        let raw = ctx.take_line();
        if raw.starts_with(' ') || raw.starts_with('\t') {
            match lines.last_mut() {
                Some(prev) => prev.push_str(&raw[1..]),
                None => lines.push(raw.trim_start().to_string()),
            }
        } else if !raw.trim().is_empty() {
            lines.push(raw);
        }
    }
    lines
}

/// `NAME;P1=V1;P2=V2:value` → (lowercased name, params, value). The group
/// prefix (`item1.TEL`) is dropped from the name.
pub(crate) fn split_property(line: &str) -> Option<(String, Vec<(String, String)>, String)> {
    let colon = find_unquoted_colon(line)?;
    let (head, value) = (&line[..colon], &line[colon + 1..]);
    let mut parts = head.split(';');
    let raw_name = parts.next()?.trim();
    let name = raw_name
        .rsplit('.')
        .next()
        .unwrap_or(raw_name)
        .to_ascii_lowercase();
    if name.is_empty() {
        return None;
    }
    let mut params = Vec::new();
    for part in parts {
        match part.split_once('=') {
            Some((k, v)) => params.push((k.trim().to_ascii_lowercase(), v.trim().to_string())),
            None => params.push(("type".to_string(), part.trim().to_string())),
        }
    }
    Some((name, params, value.to_string()))
}

fn find_unquoted_colon(line: &str) -> Option<usize> {
    let mut in_quotes = false;
    for (i, c) in line.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            ':' if !in_quotes => return Some(i),
            _ => {}
        }
    }
    None
}

fn property_item(
    ctx: &mut InputContext,
    name: &str,
    params: &[(String, String)],
    value: &str,
) -> Item {
    // structured properties split into their components
    let base = if name == "n" || name == "adr" {
        let mut arr = ctx.builder.array();
        for component in value.split(';') {
            arr.append(ctx.builder.create_string(component));
        }
        arr.finish()
    } else {
        ctx.builder.create_string(&unescape(value))
    };

    if params.is_empty() {
        return base;
    }
    let mut map = ctx.builder.map();
    map.put_str("value", base);
    for (key, val) in params {
        map.put_str(key, ctx.builder.create_string(val));
    }
    map.finish()
}

fn unescape(value: &str) -> String {
    let mut out = String::new();
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') | Some('N') => out.push('\n'),
            Some(',') => out.push(','),
            Some(';') => out.push(';'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

fn finish_card(ctx: &mut InputContext, props: Vec<(String, Vec<Item>)>) -> Item {
    let mut map = ctx.builder.map();
    for (name, mut values) in props {
        let value = if values.len() == 1 {
            values.pop().unwrap()
        } else {
            let mut arr = ctx.builder.array();
            for value in values {
                arr.append(value);
            }
            arr.finish()
        };
        let key = ctx.builder.create_name(&name);
        map.put(key, value);
    }
    map.finish()
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

    const CARD: &str = "BEGIN:VCARD\r\nVERSION:4.0\r\nFN:Jane Doe\r\nN:Doe;Jane;;;\r\nEMAIL;TYPE=work:jane@corp.example\r\nEMAIL;TYPE=home:jane@home.example\r\nNOTE:line one\\nline two\r\nEND:VCARD\r\n";

    #[test]
    fn single_card_becomes_map() {
        let (item, ctx) = parse_text(CARD);
        assert!(!ctx.has_errors());
        let card = ItemReader::new(item).as_map();
        assert_eq!(&*card.get("fn").as_str(), "Jane Doe");
        assert_eq!(&*card.get("version").as_str(), "4.0");
        let n = card.get("n").as_array();
        assert_eq!(&*n.get(0).as_str(), "Doe");
        assert_eq!(&*n.get(1).as_str(), "Jane");
    }

    #[test]
    fn repeated_properties_accumulate() {
        let (item, _) = parse_text(CARD);
        let emails = ItemReader::new(item).as_map().get("email").as_array();
        assert_eq!(emails.length(), 2);
        let work = emails.get(0).as_map();
        assert_eq!(&*work.get("value").as_str(), "jane@corp.example");
        assert_eq!(&*work.get("type").as_str(), "work");
    }

    #[test]
    fn escaped_newlines_decode() {
        let (item, _) = parse_text(CARD);
        let note = ItemReader::new(item).as_map().get("note").as_str();
        assert_eq!(&*note, "line one\nline two");
    }

    #[test]
    fn folded_lines_join() {
        let src = "BEGIN:VCARD\r\nFN:A very\r\n  long name\r\nEND:VCARD\r\n";
        let (item, _) = parse_text(src);
        let card = ItemReader::new(item).as_map();
        assert_eq!(&*card.get("fn").as_str(), "A very long name");
    }

    #[test]
    fn two_cards_become_array() {
        let src = "BEGIN:VCARD\nFN:A\nEND:VCARD\nBEGIN:VCARD\nFN:B\nEND:VCARD\n";
        let (item, _) = parse_text(src);
        let cards = ItemReader::new(item).as_array();
        assert_eq!(cards.length(), 2);
        assert_eq!(&*cards.get(1).as_map().get("fn").as_str(), "B");
    }

    #[test]
    fn missing_end_reports() {
        let (_, ctx) = parse_text("BEGIN:VCARD\nFN:X\n");
        assert!(ctx.has_errors());
    }
}
