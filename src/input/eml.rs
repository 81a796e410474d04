//! EML (RFC-5322 mail) parser
//!
//! Folded headers, a `headers` map with lowercased names, the addressing
//! and subject headers lifted to the top level, `Date` parsed as an
//! RFC-2822 datetime, and the body either a plain string or — for
//! multipart messages — an array of part maps split on the boundary.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::datetime::DateTime;
use crate::input::InputContext;
use crate::item::Item;

static HEADER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([!-9;-~]+):\s*(.*)$").expect("header pattern"));

static BOUNDARY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"boundary\s*=\s*"?([^";]+)"?"#).expect("boundary pattern"));

pub fn parse(ctx: &mut InputContext) -> Item {
    if ctx.at_eof() {
        return Item::Null;
    }

    let headers = parse_headers(ctx);
    let mut body = String::new();
    while !ctx.at_eof() {
        body.push_str(&ctx.take_line());
        body.push('\n');
    }

    build_message(ctx, headers, &body)
}

/// Headers up to the first blank line, unfolding continuations.
fn parse_headers(ctx: &mut InputContext) -> Vec<(String, String)> {
    let mut headers: Vec<(String, String)> = Vec::new();
    while !ctx.at_eof() {
        let location = ctx.tracker.location();
        let line = ctx.take_line();
        if line.trim().is_empty() {
            break;
        }
        if line.starts_with(' ') || line.starts_with('\t') {
            match headers.last_mut() {
                Some((_, value)) => {
                    value.push(' ');
                    value.push_str(line.trim());
                }
                None => ctx.add_warning_at(location, "continuation line before any header"),
            }
            continue;
        }
        match HEADER_RE.captures(&line) {
            Some(caps) => {
                headers.push((caps[1].to_ascii_lowercase(), caps[2].trim().to_string()));
            }
            None => {
                ctx.add_error_at(location, format!("malformed header line: '{line}'"));
            }
        }
    }
    headers
}

fn build_message(ctx: &mut InputContext, headers: Vec<(String, String)>, body: &str) -> Item {
    let mut message = ctx.builder.map();

    let mut header_map = ctx.builder.map();
    let mut content_type = None;
    for (name, value) in &headers {
        if name == "content-type" {
            content_type = Some(value.clone());
        }
        header_map.put_str(name, ctx.builder.create_string(value));
    }

    for (name, value) in &headers {
        match name.as_str() {
            "from" | "to" | "cc" | "bcc" | "subject" | "message-id" => {
                message.put_str(name, ctx.builder.create_string(value));
            }
            "date" => match DateTime::parse_rfc2822(value) {
                Some(dt) => {
                    message.put_str("date", ctx.builder.create_datetime(dt));
                }
                None => {
                    ctx.add_warning(format!("unparseable Date header: '{value}'"));
                    message.put_str("date", ctx.builder.create_string(value));
                }
            },
            _ => {}
        }
    }
    message.put_str("headers", header_map.finish());

    let body_item = match content_type
        .as_deref()
        .filter(|ct| ct.to_ascii_lowercase().contains("multipart/"))
        .and_then(|ct| BOUNDARY_RE.captures(ct))
    {
        Some(caps) => split_multipart(ctx, body, &caps[1]),
        None => ctx.builder.create_string(body.trim_end_matches('\n')),
    };
    message.put_str("body", body_item);

    message.finish()
}

/// Split the body at `--boundary` markers; each part re-parses as headers
/// plus content.
fn split_multipart(ctx: &mut InputContext, body: &str, boundary: &str) -> Item {
    let open_marker = format!("--{boundary}");
    let close_marker = format!("--{boundary}--");

    let mut parts = ctx.builder.array();
    let mut current: Option<Vec<String>> = None;

    for line in body.lines() {
        if line.trim_end() == close_marker {
            if let Some(lines) = current.take() {
                let part = build_part(ctx, &lines);
                parts.append(part);
            }
            break;
        }
        if line.trim_end() == open_marker {
            if let Some(lines) = current.take() {
                let part = build_part(ctx, &lines);
                parts.append(part);
            }
            current = Some(Vec::new());
            continue;
        }
        if let Some(lines) = current.as_mut() {
            lines.push(line.to_string());
        }
    }
    if let Some(lines) = current.take() {
        ctx.add_warning("multipart body not closed by final boundary");
        let part = build_part(ctx, &lines);
        parts.append(part);
    }
    parts.finish()
}

fn build_part(ctx: &mut InputContext, lines: &[String]) -> Item {
    let mut headers: Vec<(String, String)> = Vec::new();
    let mut at = 0;
    while at < lines.len() {
        let line = &lines[at];
        if line.trim().is_empty() {
            at += 1;
            break;
        }
        if line.starts_with(' ') || line.starts_with('\t') {
            if let Some((_, value)) = headers.last_mut() {
                value.push(' ');
                value.push_str(line.trim());
            }
            at += 1;
            continue;
        }
        match HEADER_RE.captures(line) {
            Some(caps) => {
                headers.push((caps[1].to_ascii_lowercase(), caps[2].trim().to_string()));
                at += 1;
            }
            None => break,
        }
    }
    let content = lines[at..].join("\n");

    let mut part = ctx.builder.map();
    let mut header_map = ctx.builder.map();
    for (name, value) in &headers {
        header_map.put_str(name, ctx.builder.create_string(value));
    }
    part.put_str("headers", header_map.finish());
    part.put_str("body", ctx.builder.create_string(content.trim_end()));
    part.finish()
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

    const SIMPLE: &str = "From: a@example.com\r\nTo: b@example.com\r\nSubject: Greetings\r\n and salutations\r\nDate: Mon, 15 Jan 2024 10:30:00 +0000\r\n\r\nHello there.\r\nBye.\r\n";

    #[test]
    fn headers_and_body() {
        let (item, ctx) = parse_text(SIMPLE);
        assert!(!ctx.has_errors());
        let msg = ItemReader::new(item).as_map();
        assert_eq!(&*msg.get("from").as_str(), "a@example.com");
        assert_eq!(
            &*msg.get("subject").as_str(),
            "Greetings and salutations"
        );
        assert_eq!(&*msg.get("body").as_str(), "Hello there.\nBye.");
        let headers = msg.get("headers").as_map();
        assert!(headers.has("date"));
    }

    #[test]
    fn date_parses_as_datetime() {
        let (item, _) = parse_text(SIMPLE);
        let date = ItemReader::new(item).as_map().get("date");
        assert_eq!(date.type_id(), TypeId::DateTime);
        let dt = date.as_datetime().unwrap();
        assert_eq!(dt.day, 15);
        assert_eq!(dt.hour, 10);
    }

    #[test]
    fn multipart_splits_into_parts() {
        let src = "From: x@example.com\nContent-Type: multipart/mixed; boundary=\"sep\"\n\npreamble\n--sep\nContent-Type: text/plain\n\npart one\n--sep\nContent-Type: text/html\n\n<p>two</p>\n--sep--\nepilogue\n";
        let (item, ctx) = parse_text(src);
        assert!(!ctx.has_errors());
        let parts = ItemReader::new(item).as_map().get("body").as_array();
        assert_eq!(parts.length(), 2);
        let one = parts.get(0).as_map();
        assert_eq!(
            &*one.get("headers").as_map().get("content-type").as_str(),
            "text/plain"
        );
        assert_eq!(&*one.get("body").as_str(), "part one");
        assert_eq!(&*parts.get(1).as_map().get("body").as_str(), "<p>two</p>");
    }

    #[test]
    fn malformed_header_reports_and_continues() {
        let (item, ctx) = parse_text("Good: yes\nbad header line\nAlso: fine\n\nbody\n");
        assert!(ctx.has_errors());
        let headers = ItemReader::new(item).as_map().get("headers").as_map();
        assert!(headers.has("good"));
        assert!(headers.has("also"));
    }
}
