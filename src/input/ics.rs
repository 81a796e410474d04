//! iCalendar parser
//!
//! Nested `BEGIN`/`END` components become elements named after the
//! component (`vcalendar`, `vevent`, `vtodo`, …); properties become
//! attributes with lowercased names. `DT*`-style values parse through the
//! ICS datetime dialect and land as DateTime items, so re-serialisation
//! keeps the compact form.

use crate::datetime::DateTime;
use crate::input::vcf::{split_property, unfold_lines};
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

    let mut stack: Vec<crate::builder::ElementBuilder> = Vec::new();
    let mut roots: Vec<Item> = Vec::new();

    for line in &lines {
        if ctx.should_stop_parsing() {
            break;
        }
        let Some((name, params, value)) = split_property(line) else {
            ctx.add_error(format!("malformed content line: '{line}'"));
            continue;
        };
        match name.as_str() {
            "begin" => {
                stack.push(ctx.builder.element(&value.trim().to_ascii_lowercase()));
            }
            "end" => {
                let closing = value.trim().to_ascii_lowercase();
                match stack.pop() {
                    Some(done) => {
                        if &**done.tag_name() != closing {
                            ctx.add_warning(format!(
                                "END:{} closes component '{}'",
                                value.trim(),
                                done.tag_name()
                            ));
                        }
                        let item = done.finish();
                        match stack.last_mut() {
                            Some(parent) => {
                                parent.child(item);
                            }
                            None => roots.push(item),
                        }
                    }
                    None => ctx.add_warning(format!("END:{} without matching BEGIN", value.trim())),
                }
            }
            _ => {
                let Some(component) = stack.last_mut() else {
                    ctx.add_warning(format!("property outside a component: '{line}'"));
                    continue;
                };
                let item = property_value(ctx, &name, &params, &value);
                component.attr(&name, item);
            }
        }
    }

    while let Some(open) = stack.pop() {
        ctx.add_error(format!("unterminated component '{}'", open.tag_name()));
        let item = open.finish();
        match stack.last_mut() {
            Some(parent) => {
                parent.child(item);
            }
            None => roots.push(item),
        }
    }

    match roots.len() {
        0 => Item::Null,
        1 => roots.pop().unwrap(),
        _ => {
            let mut doc = ctx.builder.element("document");
            for root in roots {
                doc.child(root);
            }
            doc.finish()
        }
    }
}

fn property_value(
    ctx: &mut InputContext,
    name: &str,
    params: &[(String, String)],
    value: &str,
) -> Item {
    let is_date_valued = name.starts_with("dt")
        || matches!(name, "created" | "last-modified" | "completed" | "due" | "exdate" | "rdate")
        || params
            .iter()
            .any(|(k, v)| k == "value" && v.eq_ignore_ascii_case("date"));
    if is_date_valued {
        if let Some(dt) = DateTime::parse_ics(value.trim()) {
            return ctx.builder.create_datetime(dt);
        }
        ctx.add_warning(format!("'{name}' value '{value}' is not an ICS datetime"));
    }
    ctx.builder.create_string(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::MarkBuilder;
    use crate::datetime::DateTimeFormat;
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

    const CALENDAR: &str = "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nPRODID:-//test//EN\r\nBEGIN:VEVENT\r\nUID:ev-1\r\nDTSTART:20240115T103000Z\r\nDTEND:20240115T113000Z\r\nSUMMARY:Standup\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n";

    #[test]
    fn components_nest_as_elements() {
        let (item, ctx) = parse_text(CALENDAR);
        assert!(!ctx.has_errors());
        let cal = ItemReader::new(item).as_element();
        assert!(cal.has_tag("vcalendar"));
        assert_eq!(&*cal.get_string_attr("version"), "2.0");
        assert_eq!(cal.child_count(), 1);
        let event = cal.child_at(0).as_element();
        assert!(event.has_tag("vevent"));
        assert_eq!(&*event.get_string_attr("summary"), "Standup");
    }

    #[test]
    fn dt_properties_become_datetimes() {
        let (item, _) = parse_text(CALENDAR);
        let event = ItemReader::new(item)
            .as_element()
            .child_at(0)
            .as_element();
        let start = event.get_attr("dtstart");
        assert_eq!(start.type_id(), TypeId::DateTime);
        let dt = start.as_datetime().unwrap();
        assert_eq!(dt.hour, 10);
        assert!(dt.is_utc);
        assert_eq!(dt.format_hint, DateTimeFormat::Ics);
    }

    #[test]
    fn unterminated_component_reports() {
        let (_, ctx) = parse_text("BEGIN:VCALENDAR\nBEGIN:VEVENT\nUID:x\n");
        assert!(ctx.has_errors());
    }

    #[test]
    fn empty_input_is_null() {
        let (item, _) = parse_text("");
        assert!(item.is_null());
    }
}
