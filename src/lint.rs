// purpose-atlas/src/lint.rs
//! Rebuild the atlas in memory and check it against the written snapshot.
//! Lint never writes.

use serde::Serialize;
use std::{
    collections::BTreeMap,
    fmt,
    io,
    io::Write,
};
use tracing::{
    debug,
    info,
};

use crate::{
    config::{
        RunEnv,
        ScanConfig,
    },
    diff::{
        diff_entries,
        EntryDiff,
    },
    map_view::{
        read_snapshot,
        StoredSnapshot,
    },
    snapshot::{
        build_snapshot,
        Built,
        Issue,
        SNAPSHOT_VERSION,
    },
    util::{
        is_under_prefix,
        normalize_rel,
    },
    walker::existing_prefixes,
};

/// Drift lines shown per table when the map is stale.
const DRIFT_LINE_LIMIT: usize = 20;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LintOptions {
    pub strict_folders: bool,
    pub report_untracked: bool,
    pub strict_untracked: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Pass,
    Fail,
}

/// Candidate files sorted into allowed and disallowed.
#[derive(Serialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct UntrackedReport {
    pub allowed: Vec<String>,
    pub disallowed: Vec<String>,
    pub assets_outside_roots: Vec<String>,
    pub asset_roots_present: Vec<String>,
    pub excluded_present: Vec<String>,
}

impl UntrackedReport {
    pub fn total(&self) -> usize {
        self.allowed.len() + self.disallowed.len()
    }
}

#[derive(Clone, Debug, Default)]
pub struct LintReport {
    pub errors: Vec<Issue>,
    pub warnings: Vec<Issue>,
    pub untracked: Option<UntrackedReport>,
    pub file_drift: Option<EntryDiff>,
    pub folder_drift: Option<EntryDiff>,
}

impl LintReport {
    pub fn outcome(&self) -> Outcome {
        if self.errors.is_empty() {
            Outcome::Pass
        } else {
            Outcome::Fail
        }
    }

    /// Human-readable report: untracked block, warnings, then errors.
    pub fn write_to<W: Write>(&self, out: &mut W) -> io::Result<()> {
        if let Some(u) = &self.untracked {
            write_untracked(out, u)?;
        }
        for w in &self.warnings {
            writeln!(out, "warning: {w}")?;
        }
        for e in &self.errors {
            writeln!(out, "error: {e}")?;
        }
        for (name, drift) in [("files", &self.file_drift), ("folders", &self.folder_drift)] {
            let Some(d) = drift else { continue };
            if d.is_empty() {
                continue;
            }
            writeln!(out, "{name} drift: {d}")?;
            for line in d.lines(DRIFT_LINE_LIMIT) {
                writeln!(out, "  {line}")?;
            }
        }
        match self.outcome() {
            Outcome::Pass => writeln!(out, "lint: PASS ({} warnings)", self.warnings.len()),
            Outcome::Fail => writeln!(
                out,
                "lint: FAIL ({} errors, {} warnings)",
                self.errors.len(),
                self.warnings.len()
            ),
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Outcome::Pass => "PASS",
            Outcome::Fail => "FAIL",
        })
    }
}

fn write_untracked<W: Write>(out: &mut W, u: &UntrackedReport) -> io::Result<()> {
    writeln!(
        out,
        "Untracked files: {} (allowed {}, disallowed {})",
        u.total(),
        u.allowed.len(),
        u.disallowed.len()
    )?;
    write_block(out, "Disallowed untracked files", &u.disallowed)?;
    if !u.disallowed.is_empty() {
        write_block(out, "Disallowed extension counts", &extension_counts(&u.disallowed))?;
    }
    write_block(out, "Allowed extension counts", &extension_counts(&u.allowed))?;
    write_block(out, "Asset roots present", &u.asset_roots_present)?;
    if !u.assets_outside_roots.is_empty() {
        write_block(out, "Asset files outside allowed roots", &u.assets_outside_roots)?;
    }
    write_block(out, "Excluded paths present", &u.excluded_present)
}

fn write_block<W: Write>(out: &mut W, title: &str, items: &[String]) -> io::Result<()> {
    writeln!(out, "{title}: {}", items.len())?;
    for item in items {
        writeln!(out, "  - {item}")?;
    }
    Ok(())
}

/// `.ext=N` per extension, `<no_ext>` for files without one.
fn extension_counts(paths: &[String]) -> Vec<String> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for p in paths {
        let name = p.rsplit('/').next().unwrap_or(p);
        let ext = match name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => format!(".{}", ext.to_ascii_lowercase()),
            _ => "<no_ext>".to_string(),
        };
        *counts.entry(ext).or_insert(0) += 1;
    }
    counts.into_iter().map(|(k, v)| format!("{k}={v}")).collect()
}

/* ================================== Checks ================================== */

pub fn run_lint(cfg: &ScanConfig, opts: &LintOptions, env: &RunEnv) -> LintReport {
    let built = build_snapshot(cfg);
    lint_built(cfg, &built, opts, env)
}

/// Lint an already built snapshot.
pub fn lint_built(cfg: &ScanConfig, built: &Built, opts: &LintOptions, env: &RunEnv) -> LintReport {
    let mut report = LintReport::default();
    let diag = &built.diagnostics;

    // Summary problems from the rebuild
    report.errors.extend(diag.missing_headers.iter().cloned());
    report.errors.extend(diag.malformed_headers.iter().cloned());
    report.errors.extend(diag.rule_violations.iter().cloned());
    report.errors.extend(diag.invalid_folders.iter().cloned());
    if opts.strict_folders {
        report.errors.extend(diag.missing_folders.iter().cloned());
    }
    report.errors.extend(diag.nonsource.iter().cloned());
    report.warnings.extend(diag.warnings.iter().cloned());

    // Duplicates never fail
    for g in &built.snapshot.folder_summary_duplicates {
        report.warnings.push(Issue::new(g.paths.join(" | "), "duplicate-folder-summary", format!("shared summary \"{}\"", g.key)));
    }
    for g in &built.snapshot.file_summary_duplicates {
        report.warnings.push(Issue::new(g.paths.join(" | "), "duplicate-file-summary", format!("shared summary \"{}\"", g.key)));
    }

    if opts.report_untracked || opts.strict_untracked {
        let untracked = untracked_report(cfg, built);
        let enforce = opts.strict_untracked && !env.allow_untracked;
        for path in &untracked.disallowed {
            let issue = Issue::new(path, "untracked-file", "not a source file, not listed, not allowlisted");
            if enforce {
                report.errors.push(issue);
            } else {
                report.warnings.push(issue);
            }
        }
        report.untracked = Some(untracked);
    }

    // Freshness of the written map
    check_against_disk(cfg, built, &mut report);

    info!(
        errors = report.errors.len(),
        warnings = report.warnings.len(),
        outcome = %report.outcome(),
        "lint finished"
    );
    report
}

fn check_against_disk(cfg: &ScanConfig, built: &Built, report: &mut LintReport) {
    let map_rel = normalize_rel(&cfg.root, &cfg.map_path);
    let stored: StoredSnapshot = match read_snapshot(&cfg.map_path) {
        Ok(s) => s,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            report.errors.push(Issue::new(map_rel, "snapshot-missing", "atlas map not found; run `purpose-atlas map`"));
            return;
        }
        Err(e) => {
            report.errors.push(Issue::new(map_rel, "snapshot-unreadable", e.to_string()));
            return;
        }
    };
    debug!(path = %cfg.map_path.display(), problems = stored.problems.len(), "read stored snapshot");

    for p in &stored.problems {
        report.errors.push(Issue::new(&map_rel, "snapshot-format", p));
    }
    match stored.version {
        Some(v) if v != SNAPSHOT_VERSION => report.errors.push(Issue::new(
            &map_rel,
            "snapshot-version",
            format!("snapshot version {v} is not supported (expected {SNAPSHOT_VERSION})"),
        )),
        Some(_) => {}
        None => report.errors.push(Issue::new(&map_rel, "snapshot-format", "version line is missing")),
    }

    // Hashes first, overview second; drift only when stale
    let fresh = &built.snapshot;
    let mut stale = false;
    match (&stored.file_hash, &stored.folder_hash) {
        (Some(file_hash), Some(folder_hash)) => {
            if *file_hash != fresh.file_hash {
                report.errors.push(Issue::new(&map_rel, "stale-file-hash", "file records changed since the last map"));
                stale = true;
            }
            if *folder_hash != fresh.folder_hash {
                report.errors.push(Issue::new(&map_rel, "stale-folder-hash", "folder records changed since the last map"));
                stale = true;
            }
        }
        _ => report.errors.push(Issue::new(&map_rel, "snapshot-missing-hash", "file_hash or folder_hash line is missing")),
    }
    if let Some(overview) = &stored.overview {
        if *overview != fresh.overview {
            report.errors.push(Issue::new(
                &map_rel,
                "stale-overview",
                format!("overview is `{}`, expected `{}`", overview.render(), fresh.overview.render()),
            ));
            stale = true;
        }
    }

    if stale {
        report.file_drift = Some(diff_entries(&stored.files, &fresh.files));
        report.folder_drift = Some(diff_entries(&stored.folders, &fresh.folders));
    }
}

pub fn untracked_report(cfg: &ScanConfig, built: &Built) -> UntrackedReport {
    let rules = &cfg.untracked;
    let mut out = UntrackedReport::default();

    for f in built.paths.candidates() {
        let rel = f.rel.as_str();
        let name = rel.rsplit('/').next().unwrap_or(rel);
        let allowed = built.nonsource_paths.contains(rel)
            || rules.allowed_filenames.contains(name)
            || rules.allowlist_files.contains(rel)
            || is_under_prefix(rel, &rules.allowlist_dir_prefixes);
        if allowed {
            out.allowed.push(f.rel.clone());
            continue;
        }
        if rules.asset_extensions.contains(&f.ext) {
            if is_under_prefix(rel, &rules.asset_allowed_prefixes) {
                out.allowed.push(f.rel.clone());
                continue;
            }
            out.assets_outside_roots.push(f.rel.clone());
        }
        out.disallowed.push(f.rel.clone());
    }
    out.asset_roots_present = existing_prefixes(&cfg.root, &rules.asset_allowed_prefixes);
    out.excluded_present = built.paths.excluded.clone();
    out
}

/* ==================================== Tests ==================================== */
