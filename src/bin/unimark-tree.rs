//! Document Tree Inspection CLI
//!
//! Parses a document in any supported input format and prints the uniform
//! tree, with diagnostics and optional schema validation.
//!
//! Usage:
//!   unimark-tree `<input-file>` [options]
//!
//! Options:
//!   --format `<name>`     Input format (inferred from the extension by default)
//!   --flavor `<name>`     Format dialect (e.g. commonmark)
//!   --json                Dump the tree as JSON instead of the tree view
//!   --schema `<file>`     Validate against a schema file
//!   --type `<name>`       Root type name for validation (default: Root)
//!   --ascii               Use ASCII branch characters

use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::ExitCode;

use clap::{Arg, Command};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use unimark::input::input_from_source;
use unimark::item::Item;
use unimark::reader::ItemReader;
use unimark::validator::SchemaValidator;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let matches = Command::new("unimark-tree")
        .version("0.1.0")
        .about("Uniform document tree inspection tool")
        .arg(Arg::new("input").help("Input file").required(true).index(1))
        .arg(
            Arg::new("format")
                .long("format")
                .value_name("NAME")
                .help("Input format (json, csv, xml, html, yaml, toml, jsx, mdx, markup, vcf, eml, ics, latex, dir)"),
        )
        .arg(
            Arg::new("flavor")
                .long("flavor")
                .value_name("NAME")
                .help("Format dialect, e.g. commonmark"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("Dump the tree as JSON")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("schema")
                .long("schema")
                .value_name("FILE")
                .help("Validate against a schema file"),
        )
        .arg(
            Arg::new("type")
                .long("type")
                .value_name("NAME")
                .help("Root type name for validation")
                .default_value("Root"),
        )
        .arg(
            Arg::new("ascii")
                .long("ascii")
                .help("Use ASCII branch characters")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    let input_path = matches.get_one::<String>("input").expect("required arg");
    let format = match matches.get_one::<String>("format") {
        Some(format) => format.clone(),
        None => match infer_format(input_path) {
            Some(format) => format.to_string(),
            None => {
                eprintln!("cannot infer format for '{input_path}'; pass --format");
                return ExitCode::FAILURE;
            }
        },
    };

    let source = if format == "dir" {
        input_path.clone()
    } else {
        match fs::read_to_string(input_path) {
            Ok(source) => source,
            Err(err) => {
                eprintln!("cannot read '{input_path}': {err}");
                return ExitCode::FAILURE;
            }
        }
    };

    let flavor = matches.get_one::<String>("flavor").map(String::as_str);
    let input = input_from_source(&source, None, &format, flavor);

    let color_choice = if atty::is(atty::Stream::Stdout) {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    };
    let mut stdout = StandardStream::stdout(color_choice);

    if matches.get_flag("json") {
        match unimark::format::format_data(&input.root, "json", None) {
            Ok(text) => println!("{text}"),
            Err(err) => {
                eprintln!("{err}");
                return ExitCode::FAILURE;
            }
        }
    } else {
        let ascii = matches.get_flag("ascii");
        let width = terminal_size::terminal_size()
            .map(|(terminal_size::Width(w), _)| w as usize)
            .unwrap_or(120);
        print_tree(&mut stdout, &input.root, "", true, true, ascii, width);
    }

    if input.errors.total_count() > 0 {
        let mut stderr = StandardStream::stderr(if atty::is(atty::Stream::Stderr) {
            ColorChoice::Auto
        } else {
            ColorChoice::Never
        });
        let _ = input.errors.write_colored(&mut stderr);
    }

    if let Some(schema_path) = matches.get_one::<String>("schema") {
        let type_name = matches.get_one::<String>("type").expect("has default");
        return run_validation(&input.root, schema_path, type_name, &format);
    }

    if input.errors.has_errors() {
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn infer_format(path: &str) -> Option<&'static str> {
    if Path::new(path).is_dir() {
        return Some("dir");
    }
    let extension = Path::new(path).extension()?.to_str()?;
    Some(match extension.to_ascii_lowercase().as_str() {
        "json" => "json",
        "csv" => "csv",
        "tsv" => "tsv",
        "xml" => "xml",
        "html" | "htm" => "html",
        "yaml" | "yml" => "yaml",
        "toml" => "toml",
        "jsx" => "jsx",
        "mdx" => "mdx",
        "md" | "markdown" => "markup",
        "vcf" => "vcf",
        "eml" => "eml",
        "ics" => "ics",
        "tex" => "latex",
        _ => return None,
    })
}

fn run_validation(root: &Item, schema_path: &str, type_name: &str, format: &str) -> ExitCode {
    let schema_text = match fs::read_to_string(schema_path) {
        Ok(text) => text,
        Err(err) => {
            eprintln!("cannot read schema '{schema_path}': {err}");
            return ExitCode::FAILURE;
        }
    };
    let mut validator = SchemaValidator::new();
    if let Err(err) = validator.load_schema(&schema_text, type_name) {
        eprintln!("schema error: {err}");
        return ExitCode::FAILURE;
    }
    let result = validator.validate_with_format(root, type_name, Some(format));
    if result.valid {
        println!("valid: 0 errors");
        ExitCode::SUCCESS
    } else {
        for error in &result.errors {
            if error.path.is_empty() {
                eprintln!("validation error: {}", error.message);
            } else {
                eprintln!("validation error at {}: {}", error.path, error.message);
            }
        }
        ExitCode::FAILURE
    }
}

#[allow(clippy::too_many_arguments)]
fn print_tree(
    out: &mut StandardStream,
    item: &Item,
    prefix: &str,
    is_last: bool,
    is_root: bool,
    ascii: bool,
    width: usize,
) {
    let (branch, continuation) = if is_root {
        ("", "")
    } else if ascii {
        if is_last {
            ("`-- ", "    ")
        } else {
            ("|-- ", "|   ")
        }
    } else if is_last {
        ("└── ", "    ")
    } else {
        ("├── ", "│   ")
    };

    let _ = write!(out, "{prefix}{branch}");
    let label = describe_item(item);
    let color = match item {
        Item::Element(_) => Some(Color::Cyan),
        Item::Map(_) => Some(Color::Green),
        Item::Symbol(_) => Some(Color::Magenta),
        Item::String(_) => None,
        _ => Some(Color::Yellow),
    };
    if let Some(color) = color {
        let _ = out.set_color(ColorSpec::new().set_fg(Some(color)));
    }
    let max = width.saturating_sub(prefix.len() + branch.len()).max(16);
    let clipped: String = if label.chars().count() > max {
        let mut s: String = label.chars().take(max - 1).collect();
        s.push('…');
        s
    } else {
        label
    };
    let _ = writeln!(out, "{clipped}");
    let _ = out.reset();

    let child_prefix = format!("{prefix}{continuation}");
    let children: Vec<Item> = match item {
        Item::Element(e) => e.borrow().children.clone(),
        Item::List(_) | Item::Array(_) => {
            let reader = ItemReader::new(item.clone()).as_array();
            reader.items().map(|r| r.into_item()).collect()
        }
        Item::Map(m) => m.borrow().values.clone(),
        _ => Vec::new(),
    };
    let count = children.len();
    for (i, child) in children.into_iter().enumerate() {
        print_tree(
            out,
            &child,
            &child_prefix,
            i + 1 == count,
            false,
            ascii,
            width,
        );
    }
}

fn describe_item(item: &Item) -> String {
    match item {
        Item::Null => "null".to_string(),
        Item::Error => "error".to_string(),
        Item::Bool(v) => format!("bool {v}"),
        Item::Int(v) => format!("int {v}"),
        Item::Float(v) => format!("float {v}"),
        Item::Decimal(d) => format!("decimal {d}"),
        Item::DateTime(dt) => format!("datetime {}", dt.format_iso8601()),
        Item::String(s) => format!("{:?}", s.as_ref()),
        Item::Symbol(sym) => format!(":{}", sym.name),
        Item::Binary(b) => format!("binary ({} bytes)", b.len()),
        Item::Range(r) => format!("range {}..{}", r.start, r.end),
        Item::ArrayInt(a) => format!("int32-array ({})", a.borrow().len()),
        Item::ArrayInt64(a) => format!("int64-array ({})", a.borrow().len()),
        Item::ArrayFloat(a) => format!("float-array ({})", a.borrow().len()),
        Item::List(l) => format!("list ({})", l.borrow().items.len()),
        Item::Array(a) => format!("array ({})", a.borrow().items.len()),
        Item::Map(m) => {
            let m = m.borrow();
            let keys: Vec<String> = m
                .shape
                .fields()
                .iter()
                .map(|f| f.name.to_string())
                .collect();
            format!("map {{{}}}", keys.join(", "))
        }
        Item::Element(e) => {
            let e = e.borrow();
            let mut label = format!("<{}", e.name);
            for field in e.shape.fields() {
                label.push(' ');
                label.push_str(&field.name);
            }
            label.push('>');
            label
        }
    }
}
