// purpose-atlas/src/header.rs
//! Purpose-header extraction for source files.
//!
//! Every style goes through the same two primitives: `scan_block` finds the
//! first delimited block inside the line window, and `first_purpose` pulls the
//! text after the first `Purpose:` label out of a run of lines. The window is
//! capped at `max_scan_lines`; nothing past it is ever read.

use serde::{
    Deserialize,
    Serialize,
};
use std::{
    collections::BTreeMap,
    fmt,
    fs::File,
    io::{
        BufRead,
        BufReader,
        Read,
        Seek,
        SeekFrom,
    },
    path::Path,
};
use tracing::{
    debug,
    warn,
};

use crate::util::collapse_whitespace;

pub const PURPOSE_LABEL: &str = "Purpose:";
const BINARY_SNIFF_BYTES: usize = 4096;

/// How a file of a given extension declares its purpose.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum HeaderStyle {
    /// `/** ... Purpose: ... */`
    Javadoc,
    /// Any block-comment pair for the extension, e.g. `<!-- ... -->`.
    BlockComment,
    /// `# Purpose: ...` or `// Purpose: ...`
    LineComment,
    /// First triple-quoted string literal of the module.
    Docstring,
    /// Javadoc block inside the first `<script>` (else `<style>`) section.
    SfcBlock,
}

impl HeaderStyle {
    pub fn as_str(self) -> &'static str {
        match self {
            HeaderStyle::Javadoc => "javadoc",
            HeaderStyle::BlockComment => "block-comment",
            HeaderStyle::LineComment => "line-comment",
            HeaderStyle::Docstring => "docstring",
            HeaderStyle::SfcBlock => "sfc-block",
        }
    }
}

impl fmt::Display for HeaderStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockDelims {
    pub open: String,
    pub close: String,
}

impl BlockDelims {
    pub fn new(open: &str, close: &str) -> Self {
        Self { open: open.to_string(), close: close.to_string() }
    }
}

/// Style lookup and scan limits for the extractor.
#[derive(Clone, Debug)]
pub struct HeaderRules {
    pub default_style: HeaderStyle,
    pub styles_by_extension: BTreeMap<String, HeaderStyle>,
    pub block_delimiters: BTreeMap<String, BlockDelims>,
    pub line_comment_prefixes: Vec<String>,
    pub max_scan_lines: usize,
}

impl HeaderRules {
    /// Override, then built-in table, then the default style.
    pub fn style_for(&self, ext: &str) -> HeaderStyle {
        if let Some(st) = self.styles_by_extension.get(ext) {
            return *st;
        }
        builtin_style(ext).unwrap_or(self.default_style)
    }

    pub fn delimiters_for(&self, ext: &str) -> BlockDelims {
        if let Some(d) = self.block_delimiters.get(ext) {
            return d.clone();
        }
        builtin_delimiters(ext)
    }
}

impl Default for HeaderRules {
    fn default() -> Self {
        Self {
            default_style: HeaderStyle::Javadoc,
            styles_by_extension: BTreeMap::new(),
            block_delimiters: BTreeMap::new(),
            line_comment_prefixes: vec!["#".to_string(), "//".to_string()],
            max_scan_lines: 80,
        }
    }
}

fn builtin_style(ext: &str) -> Option<HeaderStyle> {
    match ext {
        ".py" | ".pyi" => Some(HeaderStyle::Docstring),
        ".vue" | ".svelte" => Some(HeaderStyle::SfcBlock),
        _ => None,
    }
}

fn builtin_delimiters(ext: &str) -> BlockDelims {
    match ext {
        ".html" | ".htm" | ".xml" | ".xhtml" | ".md" | ".svg" | ".vue" | ".svelte" => {
            BlockDelims::new("<!--", "-->")
        }
        ".lua" => BlockDelims::new("--[[", "]]"),
        ".hs" => BlockDelims::new("{-", "-}"),
        ".ml" | ".mli" => BlockDelims::new("(*", "*)"),
        _ => BlockDelims::new("/*", "*/"),
    }
}

/// Result of looking for a header in one file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HeaderOutcome {
    Found(String),
    /// No header inside the scan window.
    Missing,
    /// A header started but could not be read, e.g. never closed in the window.
    Malformed(String),
}

/* ============================== File entry point ============================== */

/// Read at most `max_scan_lines` lines of `path` and parse its header.
/// I/O failures and binary content come back as `Missing` with a warning.
pub fn extract_header(path: &Path, ext: &str, rules: &HeaderRules) -> HeaderOutcome {
    let lines = match read_window(path, rules.max_scan_lines) {
        Ok(Some(lines)) => lines,
        Ok(None) => {
            warn!(path = %path.display(), "binary content, no purpose header read");
            return HeaderOutcome::Missing;
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "unreadable file, no purpose header read");
            return HeaderOutcome::Missing;
        }
    };
    let style = rules.style_for(ext);
    let outcome = extract_from_lines(&lines, style, ext, rules);
    debug!(path = %path.display(), %style, ?outcome, "header scanned");
    outcome
}

/// `Ok(None)` when the head of the file looks binary.
fn read_window(path: &Path, max_lines: usize) -> std::io::Result<Option<Vec<String>>> {
    let mut f = File::open(path)?;
    let mut head = [0u8; BINARY_SNIFF_BYTES];
    let n = f.read(&mut head)?;
    if memchr::memchr(0, &head[..n]).is_some() {
        return Ok(None);
    }
    f.seek(SeekFrom::Start(0))?;

    let mut rdr = BufReader::new(f);
    let mut lines = Vec::with_capacity(max_lines.min(256));
    let mut buf = Vec::new();
    while lines.len() < max_lines {
        buf.clear();
        if rdr.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        let text = String::from_utf8_lossy(&buf);
        lines.push(text.trim_end_matches(['\n', '\r']).to_string());
    }
    Ok(Some(lines))
}

/// Pure parse of an already windowed set of lines.
pub fn extract_from_lines(lines: &[String], style: HeaderStyle, ext: &str, rules: &HeaderRules) -> HeaderOutcome {
    let window = &lines[..lines.len().min(rules.max_scan_lines)];
    match style {
        HeaderStyle::Javadoc => block_style(window, &BlockDelims::new("/**", "*/")),
        HeaderStyle::BlockComment => block_style(window, &rules.delimiters_for(ext)),
        HeaderStyle::LineComment => line_style(window, &rules.line_comment_prefixes),
        HeaderStyle::Docstring => docstring_style(window),
        HeaderStyle::SfcBlock => sfc_style(window),
    }
}

/* ============================== Shared primitives ============================== */

enum BlockScan<'a> {
    None,
    Unterminated { start: usize },
    Block { body: Vec<&'a str>, next: usize },
}

/// First block opened by `delims.open` (at the start of a trimmed line) at or
/// after `from`. The body holds the text between the delimiters, line by line.
fn scan_block<'a>(lines: &'a [String], from: usize, delims: &BlockDelims) -> BlockScan<'a> {
    let open = delims.open.as_str();
    let close = delims.close.as_str();
    let mut i = from;
    while i < lines.len() {
        let t = lines[i].trim_start();
        if let Some(after_open) = t.strip_prefix(open) {
            let mut body = Vec::new();
            if let Some((inner, _)) = after_open.split_once(close) {
                body.push(inner);
                return BlockScan::Block { body, next: i + 1 };
            }
            body.push(after_open);
            let start = i;
            i += 1;
            while i < lines.len() {
                if let Some((inner, _)) = lines[i].split_once(close) {
                    body.push(inner);
                    return BlockScan::Block { body, next: i + 1 };
                }
                body.push(lines[i].as_str());
                i += 1;
            }
            return BlockScan::Unterminated { start };
        }
        i += 1;
    }
    BlockScan::None
}

/// Text after the first `Purpose:` in the run, decoration stripped.
fn first_purpose<'a, I>(lines: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    lines.into_iter().find_map(purpose_text)
}

fn purpose_text(raw: &str) -> Option<String> {
    let cleaned = raw.trim().trim_start_matches('*').trim();
    let (_, rest) = cleaned.split_once(PURPOSE_LABEL)?;
    let summary = collapse_whitespace(rest);
    if summary.is_empty() { None } else { Some(summary) }
}

/* ================================ Style parsers ================================ */

fn block_style(window: &[String], delims: &BlockDelims) -> HeaderOutcome {
    let mut from = 0;
    let mut saw_block = false;
    loop {
        match scan_block(window, from, delims) {
            BlockScan::None if saw_block => {
                return HeaderOutcome::Malformed(format!("{} block has no {PURPOSE_LABEL} line", delims.open));
            }
            BlockScan::None => return HeaderOutcome::Missing,
            BlockScan::Unterminated { start } => {
                return HeaderOutcome::Malformed(format!(
                    "unterminated {} block starting at line {}",
                    delims.open,
                    start + 1
                ));
            }
            BlockScan::Block { body, next } => {
                if let Some(s) = first_purpose(body) {
                    return HeaderOutcome::Found(s);
                }
                saw_block = true;
                from = next;
            }
        }
    }
}

fn line_style(window: &[String], prefixes: &[String]) -> HeaderOutcome {
    // longest prefix first so `//` is not read as `/`
    let mut prefixes: Vec<&str> = prefixes.iter().map(String::as_str).filter(|p| !p.is_empty()).collect();
    prefixes.sort_by_key(|p| std::cmp::Reverse(p.len()));

    for line in window {
        let t = line.trim_start();
        let Some(prefix) = prefixes.iter().find(|p| t.starts_with(**p)) else {
            continue;
        };
        let rest = t[prefix.len()..]
            .trim_start_matches(|c: char| prefix.contains(c) || c == '!')
            .trim_start();
        if let Some(after) = rest.strip_prefix(PURPOSE_LABEL) {
            let summary = collapse_whitespace(after);
            if !summary.is_empty() {
                return HeaderOutcome::Found(summary);
            }
        }
    }
    HeaderOutcome::Missing
}

fn docstring_style(window: &[String]) -> HeaderOutcome {
    let mut idx = 0;
    while idx < window.len() {
        let t = window[idx].trim();
        if t.is_empty() || t.starts_with('#') {
            // shebang, encoding cookie, plain comments
            idx += 1;
            continue;
        }
        break;
    }
    if idx >= window.len() {
        return HeaderOutcome::Missing;
    }

    let Some((delim, remainder)) = docstring_open(window[idx].trim()) else {
        return HeaderOutcome::Missing;
    };
    if let Some((inner, _)) = remainder.split_once(delim) {
        return docstring_outcome(first_purpose([inner]));
    }

    let start = idx;
    let mut body = vec![remainder];
    idx += 1;
    while idx < window.len() {
        if let Some((inner, _)) = window[idx].split_once(delim) {
            body.push(inner);
            return docstring_outcome(first_purpose(body));
        }
        body.push(window[idx].as_str());
        idx += 1;
    }
    HeaderOutcome::Malformed(format!("unterminated module docstring starting at line {}", start + 1))
}

fn docstring_outcome(summary: Option<String>) -> HeaderOutcome {
    match summary {
        Some(s) => HeaderOutcome::Found(s),
        None => HeaderOutcome::Malformed(format!("module docstring has no {PURPOSE_LABEL} line")),
    }
}

/// `r"""...`, `'''...` and friends; returns the delimiter and what follows it.
fn docstring_open(line: &str) -> Option<(&'static str, &str)> {
    let body = line.trim_start_matches(['r', 'u', 'b', 'f', 'R', 'U', 'B', 'F']);
    for delim in ["\"\"\"", "'''"] {
        if let Some(rest) = body.strip_prefix(delim) {
            return Some((delim, rest));
        }
    }
    None
}

fn sfc_style(window: &[String]) -> HeaderOutcome {
    let javadoc = BlockDelims::new("/**", "*/");
    let mut malformed = None;
    for tag in ["script", "style"] {
        let Some(start) = window.iter().position(|l| opens_tag(l, tag)) else {
            continue;
        };
        let closing = format!("</{tag}>");
        let Some(end) = window[start + 1..].iter().position(|l| l.trim_start().starts_with(&closing)) else {
            if malformed.is_none() {
                malformed = Some(format!("unterminated <{tag}> block in the scan window"));
            }
            continue;
        };
        let section = &window[start + 1..start + 1 + end];
        match block_style(section, &javadoc) {
            HeaderOutcome::Found(s) => return HeaderOutcome::Found(s),
            HeaderOutcome::Malformed(m) if malformed.is_none() => malformed = Some(m),
            HeaderOutcome::Malformed(_) => {}
            HeaderOutcome::Missing => {}
        }
    }
    malformed.map_or(HeaderOutcome::Missing, HeaderOutcome::Malformed)
}

fn opens_tag(line: &str, tag: &str) -> bool {
    let t = line.trim_start();
    t.strip_prefix('<')
        .and_then(|r| r.strip_prefix(tag))
        .is_some_and(|r| r.is_empty() || r.starts_with(|c: char| c == '>' || c.is_whitespace()))
}

/* ==================================== Tests ==================================== */
