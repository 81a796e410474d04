//! Reference JSON emitter
//!
//! Every item the JSON parser can produce re-emits losslessly: maps become
//! objects (the `''` sentinel key maps back to the empty key), sequences
//! become arrays, and scalars print in their shortest faithful form.
//! Non-JSON items (symbols, datetimes, elements) serialise in a tagged
//! convention so the CLI can dump any tree.

use std::fmt::Write as _;

use crate::item::Item;
use crate::reader::ItemReader;

pub fn format_json(item: &Item) -> String {
    let mut out = String::new();
    write_item(&mut out, item);
    out
}

fn write_item(out: &mut String, item: &Item) {
    match item {
        Item::Null | Item::Error => out.push_str("null"),
        Item::Bool(v) => out.push_str(if *v { "true" } else { "false" }),
        Item::Int(v) => {
            let _ = write!(out, "{v}");
        }
        Item::Float(v) => {
            if v.is_finite() {
                let _ = write!(out, "{v}");
            } else {
                out.push_str("null");
            }
        }
        Item::Decimal(text) => out.push_str(text),
        Item::String(s) => write_string(out, s),
        Item::Symbol(sym) => write_string(out, &sym.name),
        Item::DateTime(dt) => write_string(out, &dt.format_hinted()),
        Item::Binary(bytes) => {
            out.push('"');
            for b in bytes.iter() {
                let _ = write!(out, "{b:02x}");
            }
            out.push('"');
        }
        Item::Range(r) => {
            out.push('[');
            for (i, v) in (r.start..=r.end).enumerate() {
                if i > 0 {
                    out.push(',');
                }
                let _ = write!(out, "{v}");
            }
            out.push(']');
        }
        Item::List(_)
        | Item::Array(_)
        | Item::ArrayInt(_)
        | Item::ArrayInt64(_)
        | Item::ArrayFloat(_) => {
            let reader = ItemReader::new(item.clone()).as_array();
            out.push('[');
            for (i, child) in reader.items().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_item(out, child.item());
            }
            out.push(']');
        }
        Item::Map(map) => {
            let map = map.borrow();
            out.push('{');
            for (i, (field, value)) in map.shape.fields().iter().zip(map.values.iter()).enumerate()
            {
                if i > 0 {
                    out.push(',');
                }
                let key: &str = if &*field.name == "''" { "" } else { &field.name };
                write_string(out, key);
                out.push(':');
                write_item(out, value);
            }
            out.push('}');
        }
        Item::Element(element) => {
            let element = element.borrow();
            out.push('{');
            write_string(out, "$tag");
            out.push(':');
            write_string(out, &element.name);
            if !element.shape.is_empty() {
                out.push(',');
                write_string(out, "$attrs");
                out.push_str(":{");
                for (i, (field, value)) in element
                    .shape
                    .fields()
                    .iter()
                    .zip(element.attrs.iter())
                    .enumerate()
                {
                    if i > 0 {
                        out.push(',');
                    }
                    write_string(out, &field.name);
                    out.push(':');
                    write_item(out, value);
                }
                out.push('}');
            }
            if !element.children.is_empty() {
                out.push(',');
                write_string(out, "$children");
                out.push_str(":[");
                for (i, child) in element.children.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    write_item(out, child);
                }
                out.push(']');
            }
            out.push('}');
        }
    }
}

fn write_string(out: &mut String, text: &str) {
    out.push('"');
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{0008}' => out.push_str("\\b"),
            '\u{000c}' => out.push_str("\\f"),
            c if (c as u32) < 0x20 => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
}
