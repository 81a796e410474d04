//! TOML parser
//!
//! Line-oriented: `[table]` headers (dotted paths), `[[array-of-tables]]`,
//! dotted keys, basic and literal strings, integers with underscores,
//! floats, booleans, arrays, inline tables, and ISO-8601 datetimes (stored
//! as DateTime items). Tables accumulate in an intermediate tree so each
//! map finalises once with its complete field set.

use crate::datetime::DateTime;
use crate::input::InputContext;
use crate::item::Item;

#[derive(Debug, Default)]
struct Table {
    entries: Vec<(String, Entry)>,
}

#[derive(Debug)]
enum Entry {
    Value(Item),
    Table(Table),
    ArrayOfTables(Vec<Table>),
}

pub fn parse(ctx: &mut InputContext) -> Item {
    if ctx.at_eof() {
        return Item::Null;
    }

    let mut root = Table::default();
    let mut current_path: Vec<String> = Vec::new();

    let mut any_content = false;
    while !ctx.at_eof() && !ctx.should_stop_parsing() {
        let location = ctx.tracker.location();
        let raw = ctx.take_line();
        let line = strip_comment(&raw);
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        any_content = true;

        if let Some(header) = line.strip_prefix("[[").and_then(|l| l.strip_suffix("]]")) {
            let path = parse_path(header);
            if path.is_empty() {
                ctx.add_error_at(location, "empty table-array header");
                continue;
            }
            push_array_table(ctx, &mut root, &path, location);
            current_path = path;
            continue;
        }
        if let Some(header) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            let path = parse_path(header);
            if path.is_empty() {
                ctx.add_error_at(location, "empty table header");
                continue;
            }
            open_table(ctx, &mut root, &path, location);
            current_path = path;
            continue;
        }

        let Some(eq) = find_unquoted(line, '=') else {
            ctx.add_error_at(location, format!("expected 'key = value', got '{line}'"));
            continue;
        };
        let key_part = line[..eq].trim();
        let value_part = line[eq + 1..].trim();
        if key_part.is_empty() {
            ctx.add_error_at(location, "empty key");
            continue;
        }
        let mut path = current_path.clone();
        path.extend(parse_path(key_part));
        let value = parse_value(ctx, value_part, location);
        insert_value(ctx, &mut root, &path, value, location);
    }

    if !any_content {
        return Item::Null;
    }
    materialize_table(ctx, root)
}

/// Strip a `#` comment that is not inside a string.
fn strip_comment(line: &str) -> String {
    let mut out = String::new();
    let mut quote: Option<char> = None;
    for c in line.chars() {
        match quote {
            Some(q) => {
                out.push(c);
                if c == q {
                    quote = None;
                }
            }
            None => {
                if c == '#' {
                    break;
                }
                if c == '"' || c == '\'' {
                    quote = Some(c);
                }
                out.push(c);
            }
        }
    }
    out
}

/// Dotted path with optionally quoted segments.
fn parse_path(text: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    for c in text.chars() {
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                } else {
                    current.push(c);
                }
            }
            None => match c {
                '"' | '\'' => quote = Some(c),
                '.' => {
                    let seg = current.trim().to_string();
                    if !seg.is_empty() {
                        segments.push(seg);
                    }
                    current.clear();
                }
                _ => current.push(c),
            },
        }
    }
    let seg = current.trim().to_string();
    if !seg.is_empty() {
        segments.push(seg);
    }
    segments
}

fn find_unquoted(line: &str, needle: char) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (i, c) in line.char_indices() {
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                }
            }
            None => {
                if c == needle {
                    return Some(i);
                }
                if c == '"' || c == '\'' {
                    quote = Some(c);
                }
            }
        }
    }
    None
}

fn open_table(
    ctx: &mut InputContext,
    root: &mut Table,
    path: &[String],
    location: crate::source_tracker::SourceLocation,
) {
    let mut table = root;
    for segment in path {
        table = match descend(table, segment) {
            Ok(t) => t,
            Err(()) => {
                ctx.add_error_at(location, format!("'{segment}' is already a value"));
                return;
            }
        };
    }
}

fn push_array_table(
    ctx: &mut InputContext,
    root: &mut Table,
    path: &[String],
    location: crate::source_tracker::SourceLocation,
) {
    let (last, parents) = path.split_last().expect("non-empty path");
    let mut table = root;
    for segment in parents {
        table = match descend(table, segment) {
            Ok(t) => t,
            Err(()) => {
                ctx.add_error_at(location, format!("'{segment}' is already a value"));
                return;
            }
        };
    }
    match table.entries.iter_mut().find(|(k, _)| k == last) {
        Some((_, Entry::ArrayOfTables(tables))) => tables.push(Table::default()),
        Some(_) => {
            ctx.add_error_at(location, format!("'{last}' is not an array of tables"));
        }
        None => {
            table
                .entries
                .push((last.clone(), Entry::ArrayOfTables(vec![Table::default()])));
        }
    }
}

/// Walk into (or create) a subtable; an array of tables descends into its
/// newest element.
fn descend<'a>(table: &'a mut Table, segment: &str) -> Result<&'a mut Table, ()> {
    let exists = table.entries.iter().position(|(k, _)| k == segment);
    let at = match exists {
        Some(at) => at,
        None => {
            table
                .entries
                .push((segment.to_string(), Entry::Table(Table::default())));
            table.entries.len() - 1
        }
    };
    match &mut table.entries[at].1 {
        Entry::Table(t) => Ok(t),
        Entry::ArrayOfTables(tables) => Ok(tables.last_mut().expect("array table has an element")),
        Entry::Value(_) => Err(()),
    }
}

fn insert_value(
    ctx: &mut InputContext,
    root: &mut Table,
    path: &[String],
    value: Item,
    location: crate::source_tracker::SourceLocation,
) {
    let (last, parents) = match path.split_last() {
        Some(split) => split,
        None => return,
    };
    let mut table = root;
    for segment in parents {
        table = match descend(table, segment) {
            Ok(t) => t,
            Err(()) => {
                ctx.add_error_at(location, format!("'{segment}' is already a value"));
                return;
            }
        };
    }
    if table.entries.iter().any(|(k, _)| k == last) {
        ctx.add_warning_at(location, format!("duplicate key '{last}' replaces earlier value"));
        table.entries.retain(|(k, _)| k != last);
    }
    table.entries.push((last.clone(), Entry::Value(value)));
}

fn parse_value(
    ctx: &mut InputContext,
    text: &str,
    location: crate::source_tracker::SourceLocation,
) -> Item {
    let text = text.trim();
    if text.is_empty() {
        ctx.add_error_at(location, "missing value");
        return Item::Null;
    }

    if let Some(inner) = text.strip_prefix('"').and_then(|t| t.strip_suffix('"')) {
        if !text.starts_with("\"\"\"") {
            return ctx.builder.create_string(&unescape_basic(inner));
        }
    }
    if let Some(inner) = text
        .strip_prefix("\"\"\"")
        .and_then(|t| t.strip_suffix("\"\"\""))
    {
        return ctx.builder.create_string(&unescape_basic(inner));
    }
    if let Some(inner) = text.strip_prefix('\'').and_then(|t| t.strip_suffix('\'')) {
        return ctx.builder.create_string(inner);
    }
    match text {
        "true" => return ctx.builder.create_bool(true),
        "false" => return ctx.builder.create_bool(false),
        _ => {}
    }
    if text.starts_with('[') && text.ends_with(']') {
        let inner = &text[1..text.len() - 1];
        let mut arr = ctx.builder.array();
        for part in split_top_level(inner) {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let item = parse_value(ctx, part, location);
            arr.append(item);
        }
        return arr.finish();
    }
    if text.starts_with('{') && text.ends_with('}') {
        let inner = &text[1..text.len() - 1];
        let mut map = ctx.builder.map();
        for part in split_top_level(inner) {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            match find_unquoted(part, '=') {
                Some(eq) => {
                    let key = part[..eq].trim().trim_matches('"').trim_matches('\'');
                    let value = parse_value(ctx, part[eq + 1..].trim(), location);
                    let key = ctx.builder.create_name(key);
                    map.put(key, value);
                }
                None => {
                    ctx.add_error_at(location, format!("bad inline table entry '{part}'"));
                }
            }
        }
        return map.finish();
    }

    // datetimes look like 1979-05-27 or 1979-05-27T07:32:00Z
    if text.len() >= 8 && text.as_bytes()[4] == b'-' {
        if let Some(dt) = DateTime::parse_iso8601(text) {
            return ctx.builder.create_datetime(dt);
        }
    }

    let plain = text.replace('_', "");
    if let Ok(v) = plain.parse::<i64>() {
        return ctx.builder.create_int(v);
    }
    if let Some(hex) = plain.strip_prefix("0x") {
        if let Ok(v) = i64::from_str_radix(hex, 16) {
            return ctx.builder.create_int(v);
        }
    }
    if let Ok(v) = plain.parse::<f64>() {
        return ctx.builder.create_float(v);
    }

    ctx.add_error_at(location, format!("cannot parse value '{text}'"));
    Item::Null
}

fn unescape_basic(text: &str) -> String {
    let mut out = String::new();
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some('u') => {
                let digits: String = chars.by_ref().take(4).collect();
                match u32::from_str_radix(&digits, 16).ok().and_then(char::from_u32) {
                    Some(decoded) => out.push(decoded),
                    None => out.push('\u{fffd}'),
                }
            }
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

fn split_top_level(inner: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0;
    let mut quote: Option<char> = None;
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
                ',' if depth == 0 => parts.push(std::mem::take(&mut current)),
                _ => current.push(c),
            },
        }
    }
    if !current.trim().is_empty() {
        parts.push(current);
    }
    parts
}

fn materialize_table(ctx: &mut InputContext, table: Table) -> Item {
    let mut map = ctx.builder.map();
    for (key, entry) in table.entries {
        let value = match entry {
            Entry::Value(item) => item,
            Entry::Table(inner) => materialize_table(ctx, inner),
            Entry::ArrayOfTables(tables) => {
                let mut arr = ctx.builder.array();
                for inner in tables {
                    let item = materialize_table(ctx, inner);
                    arr.append(item);
                }
                arr.finish()
            }
        };
        let key = ctx.builder.create_name(&key);
        map.put(key, value);
    }
    map.finish()
}
