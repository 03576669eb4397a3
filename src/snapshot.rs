// purpose-atlas/src/snapshot.rs
//! One in-memory build of the atlas: records, duplicate groups, overview,
//! hashes, and every per-entity issue met on the way.

use serde::{
    Deserialize,
    Serialize,
};
use sha2::{
    Digest,
    Sha256,
};
use std::{
    collections::BTreeSet,
    fmt,
};
use tracing::{
    debug,
    info,
};

use crate::{
    config::ScanConfig,
    duplicates::{
        find_duplicates,
        DuplicateGroup,
    },
    entry::{
        sort_records,
        EntryRecord,
        Source,
    },
    folder::{
        read_folder_summary,
        FolderOutcome,
    },
    header::{
        extract_header,
        HeaderOutcome,
    },
    nonsource::{
        load_and_merge,
        ListProblem,
    },
    rules::{
        validate_summary,
        RuleViolation,
    },
    tree_view::folder_tree,
    util::now_utc_stamp,
    walker::{
        walk,
        RepoPaths,
    },
};

pub const SNAPSHOT_VERSION: u32 = 1;

/// Keys of the overview line, in written order.
pub const OVERVIEW_KEYS: [&str; 7] = [
    "tracked_source_files",
    "tracked_nonsource_files",
    "tracked_files_total",
    "tracked_folders",
    "source_extensions",
    "exclude_dir_names",
    "exclude_path_prefixes",
];

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Overview {
    pub tracked_source_files: usize,
    pub tracked_nonsource_files: usize,
    pub tracked_files_total: usize,
    pub tracked_folders: usize,
    pub source_extensions: usize,
    pub exclude_dir_names: usize,
    pub exclude_path_prefixes: usize,
}

impl Overview {
    fn values(&self) -> [usize; 7] {
        [
            self.tracked_source_files,
            self.tracked_nonsource_files,
            self.tracked_files_total,
            self.tracked_folders,
            self.source_extensions,
            self.exclude_dir_names,
            self.exclude_path_prefixes,
        ]
    }

    /// `key=N` pairs separated by spaces.
    pub fn render(&self) -> String {
        OVERVIEW_KEYS
            .iter()
            .zip(self.values())
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Parse the payload of an `overview:` line. Every key is required.
    pub fn parse(payload: &str) -> Result<Self, String> {
        let payload = payload.trim();
        if payload.is_empty() {
            return Err("overview line is empty".into());
        }
        let mut values: [Option<usize>; 7] = [None; 7];
        for token in payload.split_whitespace() {
            let (key, value) = token.split_once('=').ok_or_else(|| format!("malformed overview token `{token}`"))?;
            let idx = OVERVIEW_KEYS
                .iter()
                .position(|k| *k == key)
                .ok_or_else(|| format!("unknown overview key `{key}`"))?;
            let n = value.parse::<usize>().map_err(|_| format!("overview value for `{key}` is not a count"))?;
            values[idx] = Some(n);
        }
        if let Some(idx) = values.iter().position(Option::is_none) {
            return Err(format!("overview is missing `{}`", OVERVIEW_KEYS[idx]));
        }
        let v = values.map(|v| v.unwrap_or_default());
        Ok(Self {
            tracked_source_files: v[0],
            tracked_nonsource_files: v[1],
            tracked_files_total: v[2],
            tracked_folders: v[3],
            source_extensions: v[4],
            exclude_dir_names: v[5],
            exclude_path_prefixes: v[6],
        })
    }
}

/// The persisted artifact. Field order is the written order.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct Snapshot {
    pub version: u32,
    pub generated_at: String,
    pub file_hash: String,
    pub folder_hash: String,
    pub root: String,
    pub overview: Overview,
    pub source_extensions: Vec<String>,
    pub exclude_dir_names: Vec<String>,
    pub exclude_path_prefixes: Vec<String>,
    pub folders: Vec<EntryRecord>,
    pub files: Vec<EntryRecord>,
    pub folder_summary_duplicates: Vec<DuplicateGroup>,
    pub file_summary_duplicates: Vec<DuplicateGroup>,
    pub folder_tree: Vec<String>,
}

/// Something wrong with one path.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct Issue {
    pub path: String,
    pub rule: &'static str,
    pub detail: String,
}

impl Issue {
    pub fn new(path: impl Into<String>, rule: &'static str, detail: impl Into<String>) -> Self {
        Self { path: path.into(), rule, detail: detail.into() }
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}] {}", self.path, self.rule, self.detail)
    }
}

/// Issues collected during one build, grouped by kind.
#[derive(Clone, Debug, Default)]
pub struct Diagnostics {
    pub missing_headers: Vec<Issue>,
    pub malformed_headers: Vec<Issue>,
    pub rule_violations: Vec<Issue>,
    pub missing_folders: Vec<Issue>,
    pub invalid_folders: Vec<Issue>,
    /// Non-source list problems, header/list conflicts included.
    pub nonsource: Vec<Issue>,
    /// Unreadable subtrees and other non-fatal notices.
    pub warnings: Vec<Issue>,
}

impl Diagnostics {
    fn push_violations(&mut self, path: &str, violations: &[RuleViolation]) {
        for v in violations {
            self.rule_violations.push(Issue::new(path, v.rule(), v.to_string()));
        }
    }

    fn push_list_problem(&mut self, p: &ListProblem) {
        self.nonsource.push(Issue::new(p.path(), p.rule(), p.to_string()));
    }
}

/// A build plus what it was built from.
#[derive(Clone, Debug)]
pub struct Built {
    pub snapshot: Snapshot,
    pub diagnostics: Diagnostics,
    pub paths: RepoPaths,
    /// Paths merged from the non-source list, valid summary or not.
    pub nonsource_paths: BTreeSet<String>,
}

/// SHA-256 hex over `path|summary` lines joined by `\n`.
pub fn records_hash(records: &[EntryRecord]) -> String {
    let payload = records
        .iter()
        .map(|r| format!("{}|{}", r.path, r.display_summary()))
        .collect::<Vec<_>>()
        .join("\n");
    hex::encode(Sha256::digest(payload.as_bytes()))
}

pub fn build_snapshot(cfg: &ScanConfig) -> Built {
    build_snapshot_at(cfg, now_utc_stamp())
}

/// Build with a caller-chosen timestamp.
pub fn build_snapshot_at(cfg: &ScanConfig, generated_at: String) -> Built {
    let paths = walk(cfg);
    let mut diag = Diagnostics::default();
    for w in &paths.warnings {
        diag.warnings.push(Issue::new(&w.path, "unreadable-path", &w.message));
    }

    // Headers first, then the hand-kept list
    let mut files = file_records(cfg, &paths, &mut diag);
    let tracked_source_files = files.len();

    let merged = load_and_merge(cfg, &paths.source_paths());
    for p in &merged.problems {
        diag.push_list_problem(p);
    }
    for (path, violations) in &merged.violations {
        diag.push_violations(path, violations);
    }
    if merged.legacy_ignored {
        diag.warnings.push(Issue::new(
            cfg.nonsource.path.display().to_string(),
            "nonsource-legacy-section-ignored",
            "both nonsource_files and manual_files sections present; manual_files ignored",
        ));
    }
    // Invalid list rows still count as tracked
    let nonsource_paths: BTreeSet<String> = merged.records.iter().map(|r| r.path.clone()).collect();
    files.extend(merged.records);
    sort_records(&mut files);

    let folders = folder_records(cfg, &paths, &mut diag);

    // Counts and hashes over the sorted records
    let overview = Overview {
        tracked_source_files,
        tracked_nonsource_files: nonsource_paths.len(),
        tracked_files_total: files.len(),
        tracked_folders: folders.len(),
        source_extensions: cfg.source_extensions.len(),
        exclude_dir_names: cfg.exclude_dir_names.len(),
        exclude_path_prefixes: cfg.exclude_path_prefixes.len(),
    };

    let snapshot = Snapshot {
        version: SNAPSHOT_VERSION,
        generated_at,
        file_hash: records_hash(&files),
        folder_hash: records_hash(&folders),
        root: ".".to_string(),
        overview,
        source_extensions: cfg.source_extensions.iter().cloned().collect(),
        exclude_dir_names: cfg.exclude_dir_names.iter().cloned().collect(),
        exclude_path_prefixes: cfg.exclude_path_prefixes.iter().cloned().collect(),
        folder_summary_duplicates: find_duplicates(&folders),
        file_summary_duplicates: find_duplicates(&files),
        folder_tree: folder_tree(&folders),
        folders,
        files,
    };
    info!(
        files = snapshot.files.len(),
        folders = snapshot.folders.len(),
        "snapshot built"
    );
    Built { snapshot, diagnostics: diag, paths, nonsource_paths }
}

fn file_records(cfg: &ScanConfig, paths: &RepoPaths, diag: &mut Diagnostics) -> Vec<EntryRecord> {
    let mut out = Vec::new();
    for f in paths.sources() {
        let rec = match extract_header(&f.abs, &f.ext, &cfg.header) {
            HeaderOutcome::Found(summary) => {
                let violations = validate_summary(&summary, &cfg.summary_rules);
                if violations.is_empty() {
                    EntryRecord::new(&f.rel, summary, Source::Header)
                } else {
                    diag.push_violations(&f.rel, &violations);
                    EntryRecord::invalid(&f.rel)
                }
            }
            HeaderOutcome::Missing => {
                diag.missing_headers.push(Issue::new(
                    &f.rel,
                    "missing-header",
                    format!("no purpose header in the first {} lines", cfg.max_scan_lines()),
                ));
                EntryRecord::missing(&f.rel)
            }
            HeaderOutcome::Malformed(reason) => {
                diag.malformed_headers.push(Issue::new(&f.rel, "malformed-header", reason));
                EntryRecord::invalid(&f.rel)
            }
        };
        out.push(rec);
    }
    out
}

fn folder_records(cfg: &ScanConfig, paths: &RepoPaths, diag: &mut Diagnostics) -> Vec<EntryRecord> {
    let mut out = Vec::new();
    for d in &paths.folders {
        let rec = match read_folder_summary(&d.abs, &cfg.purpose_filename) {
            FolderOutcome::Found(summary) => {
                let violations = validate_summary(&summary, &cfg.summary_rules);
                if violations.is_empty() {
                    EntryRecord::new(&d.rel, summary, Source::Purpose)
                } else {
                    diag.push_violations(&d.rel, &violations);
                    EntryRecord::invalid(&d.rel)
                }
            }
            FolderOutcome::Missing => {
                diag.missing_folders.push(Issue::new(
                    &d.rel,
                    "missing-folder-summary",
                    format!("no {} file", cfg.purpose_filename),
                ));
                EntryRecord::missing(&d.rel)
            }
            FolderOutcome::Empty => {
                diag.invalid_folders.push(Issue::new(
                    &d.rel,
                    "empty-folder-summary",
                    format!("{} has no summary line", cfg.purpose_filename),
                ));
                EntryRecord::invalid(&d.rel)
            }
        };
        debug!(path = %rec.path, source = %rec.source, "folder record");
        out.push(rec);
    }
    out
}

/* ==================================== Tests ==================================== */

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_NONSOURCE_PATH;
    use std::{
        fs,
        path::Path,
    };
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, text: &str) {
        let p = root.join(rel);
        fs::create_dir_all(p.parent().unwrap()).unwrap();
        fs::write(p, text).unwrap();
    }

    fn sample_repo() -> TempDir {
        let dir = TempDir::new().unwrap();
        let r = dir.path();
        write(r, ".purpose", "Project root\n");
        write(r, "src/.purpose", "Library code\n");
        write(r, "src/a.py", "\"\"\"Purpose: loads config.\"\"\"\n");
        write(r, "src/b.ts", "/**\n * Purpose: Renders the page.\n */\nexport {};\n");
        write(r, "src/utils/.purpose", "Shared utils\n");
        write(r, "app/.purpose", "App shell\n");
        write(r, "app/utils/.purpose", "Shared utils\n");
        write(r, "app/utils/x.js", "// nothing here\n");
        write(r, "pyproject.toml", "[project]\n");
        write(r, DEFAULT_NONSOURCE_PATH, "nonsource_files[1]:\n  pyproject.toml,Build metadata.\n");
        dir
    }

    #[test]
    fn docstring_header_becomes_a_file_record() {
        let dir = sample_repo();
        let cfg = ScanConfig::defaults(dir.path()).unwrap();
        let built = build_snapshot(&cfg);
        let rec = built.snapshot.files.iter().find(|r| r.path == "src/a.py").unwrap();
        assert_eq!(rec, &EntryRecord::new("src/a.py", "loads config.", Source::Header));
    }

    #[test]
    fn shared_folder_summary_is_one_duplicate_group() {
        let dir = sample_repo();
        let cfg = ScanConfig::defaults(dir.path()).unwrap();
        let snap = build_snapshot(&cfg).snapshot;
        assert_eq!(snap.folder_summary_duplicates.len(), 1);
        assert_eq!(snap.folder_summary_duplicates[0].key, "shared utils");
        assert_eq!(snap.folder_summary_duplicates[0].paths, vec!["app/utils", "src/utils"]);
        assert!(snap.file_summary_duplicates.is_empty());
    }

    #[test]
    fn records_are_sorted_and_counted() {
        let dir = sample_repo();
        let cfg = ScanConfig::defaults(dir.path()).unwrap();
        let built = build_snapshot(&cfg);
        let snap = &built.snapshot;

        let files: Vec<&str> = snap.files.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(files, vec!["app/utils/x.js", "pyproject.toml", "src/a.py", "src/b.ts"]);
        let folders: Vec<&str> = snap.folders.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(folders, vec![".", "app", "app/utils", "src", "src/utils"]);

        assert_eq!(snap.overview.tracked_source_files, 3);
        assert_eq!(snap.overview.tracked_nonsource_files, 1);
        assert_eq!(snap.overview.tracked_files_total, 4);
        assert_eq!(snap.overview.tracked_folders, 5);
        assert_eq!(snap.folder_tree[0], ". - Project root");
        assert_eq!(snap.folder_tree[2], "  utils/ - Shared utils");

        assert_eq!(built.diagnostics.missing_headers.len(), 1);
        assert_eq!(built.diagnostics.missing_headers[0].path, "app/utils/x.js");
        assert!(built.diagnostics.nonsource.is_empty());
        assert!(built.nonsource_paths.contains("pyproject.toml"));
    }

    #[test]
    fn subtree_comes_before_dashed_sibling() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("src/a")).unwrap();
        fs::create_dir_all(dir.path().join("src-x")).unwrap();
        let cfg = ScanConfig::defaults(dir.path()).unwrap();
        let snap = build_snapshot(&cfg).snapshot;

        let folders: Vec<&str> = snap.folders.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(folders, vec![".", "src", "src/a", "src-x"]);
        assert_eq!(snap.folder_tree, vec![". - MISSING", "src/ - MISSING", "  a/ - MISSING", "src-x/ - MISSING"]);
    }

    #[test]
    fn invalid_list_rows_count_as_nonsource() {
        let dir = sample_repo();
        write(dir.path(), "notes.txt", "n\n");
        write(
            dir.path(),
            DEFAULT_NONSOURCE_PATH,
            "nonsource_files[2]:\n  pyproject.toml,Build metadata.\n  notes.txt,Notes, with comma.\n",
        );
        let cfg = ScanConfig::defaults(dir.path()).unwrap();
        let built = build_snapshot(&cfg);
        let o = built.snapshot.overview;

        assert_eq!(o.tracked_nonsource_files, 2);
        assert_eq!(o.tracked_source_files + o.tracked_nonsource_files, o.tracked_files_total);
        let notes = built.snapshot.files.iter().find(|r| r.path == "notes.txt").unwrap();
        assert_eq!(notes, &EntryRecord::invalid("notes.txt"));
        assert_eq!(built.diagnostics.rule_violations[0].rule, "summary-comma");
    }

    #[test]
    fn rebuild_is_identical_but_for_the_stamp() {
        let dir = sample_repo();
        let cfg = ScanConfig::defaults(dir.path()).unwrap();
        let a = build_snapshot_at(&cfg, "2025-01-01T00:00:00Z".into()).snapshot;
        let b = build_snapshot_at(&cfg, "2026-01-01T00:00:00Z".into()).snapshot;
        assert_ne!(a.generated_at, b.generated_at);
        assert_eq!(Snapshot { generated_at: b.generated_at.clone(), ..a }, b);
    }

    #[test]
    fn hashes_track_summaries() {
        let dir = sample_repo();
        let cfg = ScanConfig::defaults(dir.path()).unwrap();
        let before = build_snapshot(&cfg).snapshot;
        write(dir.path(), "src/.purpose", "Library code v2\n");
        let after = build_snapshot(&cfg).snapshot;
        assert_eq!(before.file_hash, after.file_hash);
        assert_ne!(before.folder_hash, after.folder_hash);
    }

    #[test]
    fn header_past_the_window_is_missing() {
        let dir = TempDir::new().unwrap();
        let mut text = "x = 1\n".repeat(84);
        text.push_str("# Purpose: too late.\n");
        write(dir.path(), "late.py", &text);
        fs::create_dir_all(dir.path().join(".purpose-atlas")).unwrap();
        fs::write(
            dir.path().join(".purpose-atlas/config.toml"),
            "[scan]\nmax_scan_lines = 80\n[purpose.styles_by_extension]\n\".py\" = \"line-comment\"\n",
        )
        .unwrap();
        let cfg = ScanConfig::load(&crate::config::Overrides::default(), dir.path()).unwrap();
        let built = build_snapshot(&cfg);
        assert_eq!(built.snapshot.files, vec![EntryRecord::missing("late.py")]);
        assert_eq!(built.diagnostics.missing_headers.len(), 1);
    }

    #[test]
    fn conflicting_list_entry_keeps_the_header_record() {
        let dir = sample_repo();
        write(
            dir.path(),
            DEFAULT_NONSOURCE_PATH,
            "nonsource_files[2]:\n  pyproject.toml,Build metadata.\n  src/a.py,Listed too.\n",
        );
        let cfg = ScanConfig::defaults(dir.path()).unwrap();
        let built = build_snapshot(&cfg);
        let rec = built.snapshot.files.iter().find(|r| r.path == "src/a.py").unwrap();
        assert_eq!(rec.source, Source::Header);
        assert_eq!(built.diagnostics.nonsource.len(), 1);
        assert_eq!(built.diagnostics.nonsource[0].rule, "nonsource-conflict");
    }

    #[test]
    fn overview_round_trips_and_rejects_junk() {
        let o = Overview { tracked_source_files: 3, tracked_folders: 2, ..Overview::default() };
        assert_eq!(Overview::parse(&o.render()).unwrap(), o);
        assert!(Overview::parse("").is_err());
        assert!(Overview::parse("tracked_source_files=1").is_err());
        assert!(Overview::parse(&format!("{} bogus=1", o.render())).is_err());
        assert!(Overview::parse(&o.render().replace("=3", "=x")).is_err());
    }

    #[test]
    fn records_hash_is_sha256_hex() {
        let recs = vec![EntryRecord::new("a", "b", Source::Header)];
        let h = records_hash(&recs);
        assert_eq!(h.len(), 64);
        assert_eq!(h, hex::encode(Sha256::digest(b"a|b")));
    }
}
