// purpose-atlas/src/util.rs

use std::{
    cmp::Ordering,
    path::Path,
};

const TRUTHY: [&str; 4] = ["1", "true", "yes", "on"];

/// UTC generation stamp used in the snapshot header, e.g. `2025-08-10T14:03:59Z`.
pub fn now_utc_stamp() -> String {
    use chrono::{
        SecondsFormat,
        Utc,
    };
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// `1`, `true`, `yes`, `on` (any case, surrounding whitespace ignored).
pub fn is_truthy(value: Option<&str>) -> bool {
    match value {
        Some(v) => {
            let v = v.trim().to_ascii_lowercase();
            TRUTHY.contains(&v.as_str())
        }
        None => false,
    }
}

/// Relative, `/`-separated path; the root itself becomes `.`.
pub fn normalize_rel(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    if rel.as_os_str().is_empty() {
        return ".".to_string();
    }
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Order relative paths segment by segment, root first, so every folder is
/// followed directly by its own subtree (`src`, `src/a`, `src-x`).
pub fn cmp_rel_paths(a: &str, b: &str) -> Ordering {
    match (a == ".", b == ".") {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => a.split('/').cmp(b.split('/')),
    }
}

/// True when `rel` equals a prefix or sits below one (`prefix/...`).
pub fn is_under_prefix<'a, I>(rel: &str, prefixes: I) -> bool
where
    I: IntoIterator<Item = &'a String>,
{
    prefixes.into_iter().any(|p| {
        let p = p.trim_end_matches('/');
        !p.is_empty()
            && (rel == p || rel.strip_prefix(p).is_some_and(|rest| rest.starts_with('/')))
    })
}

/// Extension as `.ext`, lower-cased. Compound extensions listed in `known`
/// (e.g. `.d.ts`) win over the plain suffix.
pub fn file_extension<'a, I>(name: &str, known: I) -> String
where
    I: IntoIterator<Item = &'a String>,
{
    let lower = name.to_ascii_lowercase();
    let mut best: Option<&str> = None;
    for ext in known {
        // only compound ones need the special case
        if ext.matches('.').count() > 1 && lower.ends_with(ext.as_str()) && lower.len() > ext.len() {
            if best.map_or(true, |b| ext.len() > b.len()) {
                best = Some(ext.as_str());
            }
        }
    }
    if let Some(b) = best {
        return b.to_string();
    }
    match lower.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => format!(".{ext}"),
        _ => String::new(),
    }
}

/// Collapse all whitespace runs to single spaces and trim.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// One table field: quoted with `""` escaping when it holds a comma or a quote.
pub fn quote_field(s: &str) -> String {
    if s.contains(',') || s.contains('"') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

/// Split a table row into at most `max` fields. The last field keeps any
/// remaining commas. Quoted fields are unescaped. `None` for an unterminated quote.
pub fn split_row(line: &str, max: usize) -> Option<Vec<String>> {
    let mut fields = Vec::new();
    let mut rest = line;
    while fields.len() + 1 < max {
        let trimmed = rest.trim_start();
        if let Some(quoted) = trimmed.strip_prefix('"') {
            let (field, after) = take_quoted(quoted)?;
            fields.push(field);
            let after = after.trim_start();
            match after.strip_prefix(',') {
                Some(next) => rest = next,
                None if after.is_empty() => return Some(fields),
                None => return None,
            }
        } else {
            match rest.split_once(',') {
                Some((field, next)) => {
                    fields.push(field.trim().to_string());
                    rest = next;
                }
                None => {
                    fields.push(rest.trim().to_string());
                    return Some(fields);
                }
            }
        }
    }
    let last = rest.trim();
    match last.strip_prefix('"') {
        Some(quoted) => {
            let (field, after) = take_quoted(quoted)?;
            if !after.trim().is_empty() {
                return None;
            }
            fields.push(field);
        }
        None => fields.push(last.to_string()),
    }
    Some(fields)
}

fn take_quoted(s: &str) -> Option<(String, &str)> {
    let mut out = String::new();
    let mut chars = s.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if c != '"' {
            out.push(c);
            continue;
        }
        if let Some((_, '"')) = chars.peek() {
            out.push('"');
            chars.next();
            continue;
        }
        return Some((out, &s[i + 1..]));
    }
    None
}
