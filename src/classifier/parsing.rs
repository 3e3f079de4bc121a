//! Line-oriented capability map parsing.
//!
//! Each non-blank, non-comment line is `keyword args...`. Errors carry
//! `source:line` context and are never recovered; a map either parses
//! completely or not at all.

use crate::error::Error;
use crate::types::Capability;

use super::Classifier;

/// Parse one capability map source into a classifier. Duplicate keys within
/// a single source are errors; merging across sources is `Classifier::load`'s
/// job.
pub(super) fn parse_capability_map(source_name: &str, text: &str) -> Result<Classifier, Error> {
    let mut out = Classifier::empty();
    for (idx, raw_line) in text.lines().enumerate() {
        let line = idx + 1;
        // Strip comments before tokenization; a line with only a comment is
        // ignored.
        let content = raw_line.split('#').next().unwrap_or("");
        let args: Vec<&str> = content.split_whitespace().collect();
        if args.is_empty() {
            continue;
        }
        if args.len() < 2 {
            return Err(Error::map_format(source_name, line, "invalid format"));
        }
        match args[0] {
            "cgo_suffix" => {
                out.cgo_suffixes.push(args[1].to_string());
            }
            "func" => {
                if args.len() < 3 {
                    return Err(Error::map_format(source_name, line, "invalid func format"));
                }
                if out.function_category.contains_key(args[1]) {
                    return Err(Error::map_format(source_name, line, "duplicate func key"));
                }
                let cap = parse_capability_token(source_name, line, args[2])?;
                out.function_category.insert(args[1].to_string(), cap);
            }
            "package" => {
                if args.len() < 3 {
                    return Err(Error::map_format(source_name, line, "invalid package format"));
                }
                if out.package_category.contains_key(args[1]) {
                    return Err(Error::map_format(source_name, line, "duplicate package key"));
                }
                let cap = parse_capability_token(source_name, line, args[2])?;
                out.package_category.insert(args[1].to_string(), cap);
            }
            "unanalyzed" => {
                if !out.unanalyzed_category.insert(args[1].to_string()) {
                    return Err(Error::map_format(source_name, line, "duplicate unanalyzed key"));
                }
            }
            "ignore_edge" => {
                if args.len() < 3 {
                    return Err(Error::map_format(
                        source_name,
                        line,
                        "invalid ignore_edge format",
                    ));
                }
                let key = (args[1].to_string(), args[2].to_string());
                if !out.ignored_edges.insert(key) {
                    return Err(Error::map_format(
                        source_name,
                        line,
                        "duplicate ignore_edge key",
                    ));
                }
            }
            other => {
                return Err(Error::map_format(
                    source_name,
                    line,
                    format!("unsupported keyword {other:?}"),
                ));
            }
        }
    }
    Ok(out)
}

fn parse_capability_token(source_name: &str, line: usize, token: &str) -> Result<Capability, Error> {
    Capability::parse(token).ok_or_else(|| {
        Error::map_format(source_name, line, format!("unsupported capability {token:?}"))
    })
}
