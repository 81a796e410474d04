//! Directory listing input
//!
//! The "source" of this format is a directory path. Non-dot entries of that
//! directory become `path` elements carrying `name`, `url` (joined to the
//! base URL when one is given), `size`, `mtime` as a DateTime, `is_dir`,
//! `is_link`, and the Unix permission `mode`. The listing shares the
//! Input/tracker plumbing so diagnostics land in the same collector as
//! every other format.

use std::time::UNIX_EPOCH;

use walkdir::WalkDir;

use crate::datetime::DateTime;
use crate::input::InputContext;
use crate::item::Item;

pub fn parse(ctx: &mut InputContext, base_url: Option<&str>) -> Item {
    let path = ctx.source().trim().to_string();
    if path.is_empty() {
        return Item::Null;
    }

    let mut entries = ctx.builder.array();
    let walker = WalkDir::new(&path)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name();

    let mut found_any = false;
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                ctx.add_error(format!("cannot read directory '{path}': {err}"));
                continue;
            }
        };
        found_any = true;
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with('.') {
            continue;
        }

        let mut element = ctx.builder.element("path");
        element.attr_str("name", &name);
        if let Some(base) = base_url {
            let joined = if base.ends_with('/') {
                format!("{base}{name}")
            } else {
                format!("{base}/{name}")
            };
            element.attr_str("url", &joined);
        }

        match entry.metadata() {
            Ok(meta) => {
                element.attr("size", ctx.builder.create_int(meta.len() as i64));
                element.attr("is_dir", ctx.builder.create_bool(meta.is_dir()));
                element.attr(
                    "is_link",
                    ctx.builder.create_bool(entry.path_is_symlink()),
                );
                if let Ok(mtime) = meta.modified() {
                    if let Ok(elapsed) = mtime.duration_since(UNIX_EPOCH) {
                        if let Some(dt) = DateTime::from_unix(elapsed.as_secs() as i64) {
                            element.attr("mtime", ctx.builder.create_datetime(dt));
                        }
                    }
                }
                #[cfg(unix)]
                {
                    use std::os::unix::fs::PermissionsExt;
                    element.attr(
                        "mode",
                        ctx.builder
                            .create_int((meta.permissions().mode() & 0o7777) as i64),
                    );
                }
            }
            Err(err) => {
                ctx.add_warning(format!("no metadata for '{name}': {err}"));
            }
        }

        entries.append(element.finish());
    }

    if !found_any && ctx.has_errors() {
        return Item::Null;
    }
    entries.finish_list()
}
