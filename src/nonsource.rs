// purpose-atlas/src/nonsource.rs
//! The non-source list: `(path, summary)` rows for files that cannot carry a
//! header of their own (configs, data, docs).

use std::{
    collections::{
        BTreeMap,
        BTreeSet,
    },
    fmt,
    fs,
    path::PathBuf,
};
use tracing::{
    debug,
    warn,
};

use crate::{
    config::ScanConfig,
    entry::{
        EntryRecord,
        Source,
    },
    rules::{
        validate_summary,
        RuleViolation,
    },
    util::{
        cmp_rel_paths,
        collapse_whitespace,
        split_row,
    },
    walker::{
        classify,
        in_excluded_dir,
        FileKind,
    },
};

pub const SECTION: &str = "nonsource_files[";
pub const LEGACY_SECTION: &str = "manual_files[";

/// Starter text written by `init`.
pub const TEMPLATE: &str = "nonsource_files[]:\n  # path,summary\n";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListEntry {
    pub path: String,
    pub summary: String,
    /// 1-based line in the list file.
    pub line: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParsedList {
    pub entries: Vec<ListEntry>,
    /// Rows that could not be split into path and summary, as `(line, text)`.
    pub malformed: Vec<(usize, String)>,
    /// A legacy section was present but a new-style one took precedence.
    pub legacy_ignored: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ListProblem {
    /// Configured list file does not exist.
    ListMissing(PathBuf),
    Unreadable { path: PathBuf, message: String },
    MalformedRow { line: usize, text: String },
    MissingPath { path: String },
    /// The path exists but is a directory or other non-file.
    NotAFile { path: String },
    /// The path is a folder's sidecar purpose file.
    FolderSummary { path: String },
    /// The path sits inside an excluded directory.
    ExcludedPath { path: String },
    /// The path is a tracked source file with its own header slot.
    Conflict { path: String },
    DuplicateEntry { path: String, first_line: usize },
}

impl ListProblem {
    pub fn rule(&self) -> &'static str {
        match self {
            ListProblem::ListMissing(_) => "nonsource-list-missing",
            ListProblem::Unreadable { .. } => "nonsource-list-unreadable",
            ListProblem::MalformedRow { .. } => "nonsource-malformed-row",
            ListProblem::MissingPath { .. } => "nonsource-missing-path",
            ListProblem::NotAFile { .. } => "nonsource-not-a-file",
            ListProblem::FolderSummary { .. } => "nonsource-folder-summary",
            ListProblem::ExcludedPath { .. } => "nonsource-excluded-path",
            ListProblem::Conflict { .. } => "nonsource-conflict",
            ListProblem::DuplicateEntry { .. } => "nonsource-duplicate-entry",
        }
    }

    /// Path the problem is reported against.
    pub fn path(&self) -> String {
        match self {
            ListProblem::ListMissing(p) | ListProblem::Unreadable { path: p, .. } => p.display().to_string(),
            ListProblem::MalformedRow { line, .. } => format!("line {line}"),
            ListProblem::MissingPath { path }
            | ListProblem::NotAFile { path }
            | ListProblem::FolderSummary { path }
            | ListProblem::ExcludedPath { path }
            | ListProblem::Conflict { path }
            | ListProblem::DuplicateEntry { path, .. } => path.clone(),
        }
    }
}

impl fmt::Display for ListProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListProblem::ListMissing(p) => write!(f, "non-source list not found: {}", p.display()),
            ListProblem::Unreadable { path, message } => {
                write!(f, "cannot read non-source list {}: {message}", path.display())
            }
            ListProblem::MalformedRow { text, .. } => write!(f, "expected `path,summary`, got `{text}`"),
            ListProblem::MissingPath { .. } => f.write_str("listed path does not exist"),
            ListProblem::NotAFile { .. } => f.write_str("listed path is not a regular file"),
            ListProblem::FolderSummary { .. } => {
                f.write_str("listed path is a folder purpose file; folders are summarized there already")
            }
            ListProblem::ExcludedPath { .. } => f.write_str("listed path is inside an excluded directory"),
            ListProblem::Conflict { .. } => {
                f.write_str("listed path is a tracked source file; give it a header instead")
            }
            ListProblem::DuplicateEntry { first_line, .. } => {
                write!(f, "path already listed on line {first_line}")
            }
        }
    }
}

/// Result of merging the list into the file records.
#[derive(Clone, Debug, Default)]
pub struct MergeOutcome {
    /// Records to add, valid or invalid, sorted by path.
    pub records: Vec<EntryRecord>,
    pub problems: Vec<ListProblem>,
    pub violations: Vec<(String, Vec<RuleViolation>)>,
    pub legacy_ignored: bool,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    Current,
    Legacy,
    Other,
}

fn is_section_header(line: &str) -> bool {
    let Some((name, _)) = line.split_once('[') else { return false };
    line.ends_with(':') && !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn normalize_list_path(raw: &str) -> String {
    let p = raw.trim().replace('\\', "/");
    let p = p.strip_prefix("./").unwrap_or(&p);
    p.trim_end_matches('/').to_string()
}

pub fn parse_list(text: &str) -> ParsedList {
    let mut current = Vec::new();
    let mut legacy = Vec::new();
    let mut malformed = Vec::new();
    let mut seen_current = false;
    let mut seen_legacy = false;
    let mut section = Section::None;

    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with("//") {
            continue;
        }
        if is_section_header(line) {
            section = if line.starts_with(SECTION) {
                seen_current = true;
                Section::Current
            } else if line.starts_with(LEGACY_SECTION) {
                seen_legacy = true;
                Section::Legacy
            } else {
                Section::Other
            };
            continue;
        }
        let bucket = match section {
            Section::Current => &mut current,
            Section::Legacy => &mut legacy,
            Section::None | Section::Other => continue,
        };
        match split_row(line, 2) {
            Some(fields) if fields.len() == 2 && !fields[0].is_empty() => bucket.push(ListEntry {
                path: normalize_list_path(&fields[0]),
                summary: collapse_whitespace(&fields[1]),
                line: idx + 1,
            }),
            _ => malformed.push((idx + 1, line.to_string())),
        }
    }

    let legacy_ignored = seen_current && seen_legacy;
    ParsedList { entries: if seen_current { current } else { legacy }, malformed, legacy_ignored }
}

/// Read the configured list and check it against the tracked sources.
pub fn load_and_merge(cfg: &ScanConfig, sources: &BTreeSet<&str>) -> MergeOutcome {
    let location = &cfg.nonsource;
    let mut out = MergeOutcome::default();

    if !location.path.exists() {
        if location.required {
            out.problems.push(ListProblem::ListMissing(location.path.clone()));
        }
        return out;
    }
    let text = match fs::read(&location.path) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => {
            warn!(path = %location.path.display(), error = %e, "unreadable non-source list");
            out.problems.push(ListProblem::Unreadable { path: location.path.clone(), message: e.to_string() });
            return out;
        }
    };

    let parsed = parse_list(&text);
    if parsed.legacy_ignored {
        warn!(path = %location.path.display(), "both nonsource_files and manual_files sections present; ignoring manual_files");
    }
    out.legacy_ignored = parsed.legacy_ignored;
    for (line, text) in parsed.malformed {
        out.problems.push(ListProblem::MalformedRow { line, text });
    }

    let mut first_seen: BTreeMap<String, usize> = BTreeMap::new();
    for entry in parsed.entries {
        if let Some(&first_line) = first_seen.get(&entry.path) {
            out.problems.push(ListProblem::DuplicateEntry { path: entry.path, first_line });
            continue;
        }
        first_seen.insert(entry.path.clone(), entry.line);

        // Must be a regular tracked file the walk would reach
        let abs = cfg.root.join(&entry.path);
        if !abs.exists() {
            out.problems.push(ListProblem::MissingPath { path: entry.path });
            continue;
        }
        if !abs.is_file() {
            out.problems.push(ListProblem::NotAFile { path: entry.path });
            continue;
        }
        let name = entry.path.rsplit('/').next().unwrap_or(&entry.path);
        if classify(&entry.path, name, cfg).0 == FileKind::FolderSummary {
            out.problems.push(ListProblem::FolderSummary { path: entry.path });
            continue;
        }
        if in_excluded_dir(&entry.path, cfg) {
            out.problems.push(ListProblem::ExcludedPath { path: entry.path });
            continue;
        }
        if sources.contains(entry.path.as_str()) {
            out.problems.push(ListProblem::Conflict { path: entry.path });
            continue;
        }
        // Bad summaries keep a record, marked invalid
        let violations = validate_summary(&entry.summary, &cfg.summary_rules);
        if violations.is_empty() {
            debug!(path = %entry.path, "non-source entry");
            out.records.push(EntryRecord::new(entry.path, entry.summary, Source::NonsourceList));
        } else {
            out.records.push(EntryRecord::invalid(entry.path.clone()));
            out.violations.push((entry.path, violations));
        }
    }
    out.records.sort_by(|a, b| cmp_rel_paths(&a.path, &b.path));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        ScanConfig,
        DEFAULT_NONSOURCE_PATH,
        TOOL_DIR,
    };
    use tempfile::TempDir;

    #[test]
    fn parses_rows_and_skips_comments() {
        let text = "nonsource_files[3]:\n  # path,summary\n  pyproject.toml,Build metadata.\n\n  .\\docs\\guide.md , Usage guide.\"\n  data.csv,one, two\n";
        let parsed = parse_list(text);
        assert_eq!(
            parsed.entries.iter().map(|e| (e.path.as_str(), e.summary.as_str())).collect::<Vec<_>>(),
            vec![("pyproject.toml", "Build metadata."), ("docs/guide.md", "Usage guide.\""), ("data.csv", "one, two")]
        );
        assert_eq!(parsed.entries[0].line, 3);
        assert!(parsed.malformed.is_empty());
        assert!(!parsed.legacy_ignored);
    }

    #[test]
    fn another_section_ends_the_list() {
        let text = "nonsource_files[1]:\n  a.toml,Config.\nfolders[1]{path,summary,source}:\n  src,Code,purpose\n";
        let parsed = parse_list(text);
        assert_eq!(parsed.entries.len(), 1);
    }

    #[test]
    fn legacy_section_is_read_alone_and_ignored_otherwise() {
        let legacy_only = parse_list("manual_files[1]:\n  a.toml,Config.\n");
        assert_eq!(legacy_only.entries.len(), 1);
        assert!(!legacy_only.legacy_ignored);

        let both = parse_list("manual_files[1]:\n  old.toml,Old.\nnonsource_files[1]:\n  new.toml,New.\n");
        assert_eq!(both.entries.len(), 1);
        assert_eq!(both.entries[0].path, "new.toml");
        assert!(both.legacy_ignored);
    }

    #[test]
    fn rows_without_summary_are_malformed() {
        let parsed = parse_list("nonsource_files[1]:\n  lonely.txt\n");
        assert!(parsed.entries.is_empty());
        assert_eq!(parsed.malformed, vec![(2, "lonely.txt".to_string())]);
    }

    fn setup(list: &str) -> (TempDir, ScanConfig) {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join(TOOL_DIR)).unwrap();
        fs::write(dir.path().join(DEFAULT_NONSOURCE_PATH), list).unwrap();
        fs::write(dir.path().join("pyproject.toml"), "[project]\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "n\n").unwrap();
        fs::write(dir.path().join("main.py"), "\"\"\"Purpose: entry.\"\"\"\n").unwrap();
        let cfg = ScanConfig::defaults(dir.path()).unwrap();
        (dir, cfg)
    }

    #[test]
    fn merge_checks_every_entry() {
        let (_dir, cfg) = setup(
            "nonsource_files[5]:\n  pyproject.toml,Build metadata.\n  gone.toml,Deleted file.\n  main.py,Entry point.\n  pyproject.toml,Again.\n  notes.txt,Notes, with comma.\n",
        );
        let sources = BTreeSet::from(["main.py"]);
        let out = load_and_merge(&cfg, &sources);

        assert_eq!(
            out.records.iter().map(|r| (r.path.as_str(), r.source)).collect::<Vec<_>>(),
            vec![("notes.txt", Source::Invalid), ("pyproject.toml", Source::NonsourceList)]
        );
        let rules: Vec<&str> = out.problems.iter().map(ListProblem::rule).collect();
        assert_eq!(rules, vec!["nonsource-missing-path", "nonsource-conflict", "nonsource-duplicate-entry"]);
        assert_eq!(out.violations.len(), 1);
        assert_eq!(out.violations[0].0, "notes.txt");
        assert_eq!(out.violations[0].1, vec![RuleViolation::Comma]);
    }

    #[test]
    fn only_regular_tracked_files_can_be_listed() {
        let (dir, cfg) = setup(
            "nonsource_files[4]:\n  docs,Documentation folder.\n  docs/.purpose,Folder file.\n  node_modules/pkg/index.js,Vendored code.\n  docs/guide.md,Usage guide.\n",
        );
        fs::create_dir_all(dir.path().join("docs")).unwrap();
        fs::write(dir.path().join("docs/.purpose"), "Docs\n").unwrap();
        fs::write(dir.path().join("docs/guide.md"), "# Guide\n").unwrap();
        fs::create_dir_all(dir.path().join("node_modules/pkg")).unwrap();
        fs::write(dir.path().join("node_modules/pkg/index.js"), "x\n").unwrap();

        let out = load_and_merge(&cfg, &BTreeSet::new());
        let rules: Vec<&str> = out.problems.iter().map(ListProblem::rule).collect();
        assert_eq!(rules, vec!["nonsource-not-a-file", "nonsource-folder-summary", "nonsource-excluded-path"]);
        assert_eq!(out.problems[2].path(), "node_modules/pkg/index.js");
        assert_eq!(
            out.records,
            vec![EntryRecord::new("docs/guide.md", "Usage guide.", Source::NonsourceList)]
        );
    }

    #[test]
    fn absent_default_list_is_fine() {
        let dir = TempDir::new().unwrap();
        let cfg = ScanConfig::defaults(dir.path()).unwrap();
        let out = load_and_merge(&cfg, &BTreeSet::new());
        assert!(out.problems.is_empty());
        assert!(out.records.is_empty());
    }

    #[test]
    fn absent_configured_list_is_an_error() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join(TOOL_DIR)).unwrap();
        fs::write(
            dir.path().join(TOOL_DIR).join("config.toml"),
            "[project]\nnonsource_files_path = \"lists/extra.toon\"\n",
        )
        .unwrap();
        let cfg = ScanConfig::load(&crate::config::Overrides::default(), dir.path()).unwrap();
        let out = load_and_merge(&cfg, &BTreeSet::new());
        assert_eq!(out.problems.len(), 1);
        assert_eq!(out.problems[0].rule(), "nonsource-list-missing");
    }
}
