// purpose-atlas/src/folder.rs
//! Folder summaries live in a sidecar file inside each folder. Only the first
//! usable line counts.

use std::{
    fs,
    io,
    path::Path,
};
use tracing::warn;

use crate::{
    header::PURPOSE_LABEL,
    util::collapse_whitespace,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FolderOutcome {
    Found(String),
    /// No sidecar file in the folder.
    Missing,
    /// The file exists but holds only blanks and comments.
    Empty,
}

pub fn read_folder_summary(dir: &Path, purpose_filename: &str) -> FolderOutcome {
    let path = dir.join(purpose_filename);
    match fs::read(&path) {
        Ok(bytes) => summary_from_text(&String::from_utf8_lossy(&bytes)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => FolderOutcome::Missing,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "unreadable folder summary");
            FolderOutcome::Missing
        }
    }
}

pub fn summary_from_text(text: &str) -> FolderOutcome {
    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with("//") {
            continue;
        }
        let body = line.strip_prefix(PURPOSE_LABEL).unwrap_or(line);
        let summary = collapse_whitespace(body);
        if !summary.is_empty() {
            return FolderOutcome::Found(summary);
        }
    }
    FolderOutcome::Empty
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn first_usable_line_wins() {
        let text = "# comment\n\n// also comment\nShared   helpers\nSecond line\n";
        assert_eq!(summary_from_text(text), FolderOutcome::Found("Shared helpers".into()));
    }

    #[test]
    fn label_is_stripped() {
        assert_eq!(summary_from_text("Purpose: CLI entry points\n"), FolderOutcome::Found("CLI entry points".into()));
        assert_eq!(summary_from_text("Purpose:\nreal line\n"), FolderOutcome::Found("real line".into()));
    }

    #[test]
    fn seeded_placeholder_is_empty() {
        assert_eq!(summary_from_text("# path: src/utils\n"), FolderOutcome::Empty);
        assert_eq!(summary_from_text(""), FolderOutcome::Empty);
    }

    #[test]
    fn reads_from_disk() {
        let dir = TempDir::new().unwrap();
        assert_eq!(read_folder_summary(dir.path(), ".purpose"), FolderOutcome::Missing);
        fs::write(dir.path().join(".purpose"), "Root folder\n").unwrap();
        assert_eq!(read_folder_summary(dir.path(), ".purpose"), FolderOutcome::Found("Root folder".into()));
    }
}
