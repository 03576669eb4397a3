// purpose-atlas/src/walker.rs

use std::{
    collections::BTreeSet,
    path::{
        Path,
        PathBuf,
    },
};
use tracing::{
    debug,
    warn,
};
use walkdir::WalkDir;

use crate::{
    config::ScanConfig,
    util::{
        cmp_rel_paths,
        file_extension,
        is_under_prefix,
        normalize_rel,
    },
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileKind {
    /// Tracked extension; carries a purpose header.
    Source,
    /// A folder's sidecar purpose file.
    FolderSummary,
    /// Anything else: a non-source list entry, an allowlisted file, or untracked.
    Candidate,
}

#[derive(Clone, Debug)]
pub struct WalkedDir {
    pub rel: String,
    pub abs: PathBuf,
}

#[derive(Clone, Debug)]
pub struct WalkedFile {
    pub rel: String,
    pub abs: PathBuf,
    /// Normalized extension (`.py`, `.d.ts`), empty when there is none.
    pub ext: String,
    pub kind: FileKind,
}

/// A subtree or file the walk could not read.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WalkWarning {
    pub path: String,
    pub message: String,
}

/// Everything one walk found, each list sorted by relative path.
#[derive(Clone, Debug, Default)]
pub struct RepoPaths {
    pub folders: Vec<WalkedDir>,
    pub files: Vec<WalkedFile>,
    /// Excluded directories that exist, as relative paths.
    pub excluded: Vec<String>,
    pub warnings: Vec<WalkWarning>,
}

impl RepoPaths {
    pub fn sources(&self) -> impl Iterator<Item = &WalkedFile> {
        self.files.iter().filter(|f| f.kind == FileKind::Source)
    }

    pub fn candidates(&self) -> impl Iterator<Item = &WalkedFile> {
        self.files.iter().filter(|f| f.kind == FileKind::Candidate)
    }

    pub fn source_paths(&self) -> BTreeSet<&str> {
        self.sources().map(|f| f.rel.as_str()).collect()
    }
}

/// True for a directory path (relative, `/`-separated) the walk must skip.
pub fn is_excluded_rel(rel: &str, cfg: &ScanConfig) -> bool {
    if rel == "." || rel.is_empty() {
        return false;
    }
    for part in rel.split('/') {
        if cfg.exclude_dir_names.contains(part) {
            return true;
        }
        if cfg.exclude_dir_suffixes.iter().any(|s| part.ends_with(s.as_str())) {
            return true;
        }
    }
    is_under_prefix(rel, &cfg.exclude_path_prefixes)
}

/// True when the file at `rel` sits inside a directory the walk skips.
pub fn in_excluded_dir(rel: &str, cfg: &ScanConfig) -> bool {
    match rel.rsplit_once('/') {
        Some((dir, _)) => is_excluded_rel(dir, cfg),
        None => false,
    }
}

/// Kind and normalized extension of a file at `rel` named `name`.
pub fn classify(rel: &str, name: &str, cfg: &ScanConfig) -> (FileKind, String) {
    let ext = file_extension(name, &cfg.source_extensions);
    if name == cfg.purpose_filename {
        return (FileKind::FolderSummary, ext);
    }
    if is_under_prefix(rel, &cfg.non_source_path_prefixes) || !cfg.source_extensions.contains(&ext) {
        return (FileKind::Candidate, ext);
    }
    (FileKind::Source, ext)
}

/// Walk `cfg.root`. Unreadable subtrees are skipped and reported, never fatal.
pub fn walk(cfg: &ScanConfig) -> RepoPaths {
    let root = cfg.root.as_path();
    let mut out = RepoPaths::default();

    let mut it = WalkDir::new(root).follow_links(false).sort_by_file_name().into_iter();
    while let Some(next) = it.next() {
        let dent = match next {
            Ok(d) => d,
            Err(e) => {
                let path = e.path().map_or_else(|| ".".to_string(), |p| normalize_rel(root, p));
                warn!(%path, error = %e, "skipping unreadable path");
                out.warnings.push(WalkWarning { path, message: e.to_string() });
                continue;
            }
        };
        let path = dent.path();
        // Relative, `/`-separated
        let rel = normalize_rel(root, path);

        if dent.file_type().is_dir() {
            if dent.depth() > 0 && is_excluded_rel(&rel, cfg) {
                debug!(%rel, "excluded directory");
                out.excluded.push(rel);
                it.skip_current_dir();
                continue;
            }
            out.folders.push(WalkedDir { rel, abs: path.to_path_buf() });
            continue;
        }

        // symlinked files count; symlinked dirs are not followed
        if !(dent.file_type().is_file() || (dent.path_is_symlink() && path.is_file())) {
            continue;
        }
        let name = dent.file_name().to_string_lossy();
        let (kind, ext) = classify(&rel, &name, cfg);
        out.files.push(WalkedFile { rel, abs: path.to_path_buf(), ext, kind });
    }

    // segment order keeps each subtree contiguous
    out.folders.sort_by(|a, b| cmp_rel_paths(&a.rel, &b.rel));
    out.files.sort_by(|a, b| cmp_rel_paths(&a.rel, &b.rel));
    out.excluded.sort_by(|a, b| cmp_rel_paths(a, b));
    debug!(
        folders = out.folders.len(),
        files = out.files.len(),
        excluded = out.excluded.len(),
        "walk complete"
    );
    out
}

/// The prefixes that exist under `root`.
pub fn existing_prefixes<'a, I>(root: &Path, prefixes: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a String>,
{
    prefixes.into_iter().filter(|p| root.join(p.as_str()).exists()).cloned().collect()
}

/* ==================================== Tests ==================================== */
