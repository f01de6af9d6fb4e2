//! Frontmatter extraction and formatting.
//!
//! Notes may open with a YAML metadata block delimited by `---` lines.
//! [`split_frontmatter`] separates that block from the body,
//! [`parse_frontmatter`] turns it into an order-preserving mapping
//! (malformed YAML is treated as no frontmatter, never an error), and
//! [`format_frontmatter`] flattens the mapping into a searchable text blob
//! with presentation-only fields removed and wikilink syntax stripped.

use serde_yaml::{Mapping, Value};

/// Frontmatter fields that only affect rendering; never indexed.
/// Matched case-insensitively.
const EXCLUDED_FIELDS: &[&str] = &[
    "cssclass",
    "cssclasses",
    "css-class",
    "alias",
    "aliases",
    "publish",
    "permalink",
];

/// Split raw note text into its frontmatter block and body.
///
/// The note must start with a `---` line and the block must be closed by
/// another `---` line; otherwise the whole text is body. The returned
/// frontmatter excludes the delimiters.
pub fn split_frontmatter(raw: &str) -> (Option<&str>, &str) {
    let rest = match raw.strip_prefix("---\n").or_else(|| raw.strip_prefix("---\r\n")) {
        Some(rest) => rest,
        None => return (None, raw),
    };

    // Closing delimiter: a line that is exactly `---`.
    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == "---" {
            let body = &rest[offset + line.len()..];
            return (Some(&rest[..offset]), body);
        }
        offset += line.len();
    }

    // Unclosed block: treat everything as body.
    (None, raw)
}

/// Parse a raw frontmatter block into an ordered key/value mapping.
/// Malformed YAML or a non-mapping document yields an empty mapping.
pub fn parse_frontmatter(raw: &str) -> Mapping {
    match serde_yaml::from_str::<Value>(raw) {
        Ok(Value::Mapping(m)) => m,
        _ => Mapping::new(),
    }
}

/// Flatten a frontmatter mapping into `key: value` lines, in original key
/// order. Returns an empty string when nothing survives filtering.
pub fn format_frontmatter(frontmatter: &Mapping) -> String {
    let mut lines = Vec::new();

    for (key, value) in frontmatter {
        let key = match key.as_str() {
            Some(k) => k,
            None => continue,
        };
        if is_excluded(key) {
            continue;
        }

        let formatted = format_value(value);
        if formatted.trim().is_empty() {
            continue;
        }

        lines.push(format!("{}: {}", key, formatted));
    }

    lines.join("\n")
}

fn is_excluded(key: &str) -> bool {
    let lower = key.to_lowercase();
    EXCLUDED_FIELDS.iter().any(|f| *f == lower)
}

fn format_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => strip_wikilinks(s),
        Value::Sequence(seq) => {
            let parts: Vec<String> = seq
                .iter()
                .map(format_value)
                .filter(|p| !p.trim().is_empty())
                .collect();
            parts.join(", ")
        }
        Value::Mapping(map) => {
            let parts: Vec<String> = map
                .iter()
                .filter_map(|(k, v)| {
                    let key = k.as_str()?;
                    let val = format_value(v);
                    if val.trim().is_empty() {
                        None
                    } else {
                        Some(format!("{}: {}", key, val))
                    }
                })
                .collect();
            parts.join("; ")
        }
        Value::Tagged(tagged) => format_value(&tagged.value),
    }
}

/// Reduce `[[Name]]` and `[[Name|Alias]]` to the bare display name (the
/// alias when present) so linked entities stay searchable as plain text.
pub fn strip_wikilinks(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find("[[") {
        let after = &rest[start + 2..];
        match after.find("]]") {
            Some(end) => {
                out.push_str(&rest[..start]);
                let inner = &after[..end];
                let display = match inner.split_once('|') {
                    Some((_, alias)) => alias,
                    None => inner,
                };
                out.push_str(display);
                rest = &after[end + 2..];
            }
            None => break,
        }
    }

    out.push_str(rest);
    out
}
