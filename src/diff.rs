// purpose-atlas/src/diff.rs

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::entry::EntryRecord;

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct ChangedEntry {
    pub path: String,
    pub before: String,
    pub after: String,
}

/// Drift between the records on disk and a fresh build, sorted by path.
#[derive(Serialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct EntryDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub changed: Vec<ChangedEntry>,
    pub unchanged: usize,
}

impl EntryDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }

    /// One line per drifted path, capped at `limit` with a trailing count.
    pub fn lines(&self, limit: usize) -> Vec<String> {
        let mut all: Vec<String> = Vec::new();
        all.extend(self.added.iter().map(|p| format!("+ {p}")));
        all.extend(self.removed.iter().map(|p| format!("- {p}")));
        all.extend(self.changed.iter().map(|c| format!("~ {}: {:?} -> {:?}", c.path, c.before, c.after)));
        if all.len() > limit {
            let more = all.len() - limit;
            all.truncate(limit);
            all.push(format!("... {more} more"));
        }
        all
    }
}

impl fmt::Display for EntryDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} added, {} removed, {} changed",
            self.added.len(),
            self.removed.len(),
            self.changed.len()
        )
    }
}

/// Compare by path; a record changed when its summary text or provenance differs.
pub fn diff_entries(old: &[EntryRecord], new: &[EntryRecord]) -> EntryDiff {
    let old_by_path: BTreeMap<&str, &EntryRecord> = old.iter().map(|e| (e.path.as_str(), e)).collect();
    let new_by_path: BTreeMap<&str, &EntryRecord> = new.iter().map(|e| (e.path.as_str(), e)).collect();

    let mut out = EntryDiff::default();
    for (path, new_e) in &new_by_path {
        match old_by_path.get(path) {
            None => out.added.push((*path).to_string()),
            Some(old_e) => {
                if old_e.display_summary() != new_e.display_summary() || old_e.source != new_e.source {
                    out.changed.push(ChangedEntry {
                        path: (*path).to_string(),
                        before: old_e.display_summary().to_string(),
                        after: new_e.display_summary().to_string(),
                    });
                } else {
                    out.unchanged += 1;
                }
            }
        }
    }
    for path in old_by_path.keys() {
        if !new_by_path.contains_key(path) {
            out.removed.push((*path).to_string());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::Source;

    #[test]
    fn detects_adds_removes_and_changes() {
        let old = vec![
            EntryRecord::new("a.py", "Alpha.", Source::Header),
            EntryRecord::new("b.py", "Beta.", Source::Header),
            EntryRecord::new("c.py", "Gamma.", Source::Header),
        ];
        let new = vec![
            EntryRecord::new("a.py", "Alpha.", Source::Header),
            EntryRecord::new("c.py", "Gamma two.", Source::Header),
            EntryRecord::missing("d.py"),
        ];
        let d = diff_entries(&old, &new);
        assert_eq!(d.added, vec!["d.py"]);
        assert_eq!(d.removed, vec!["b.py"]);
        assert_eq!(d.changed.len(), 1);
        assert_eq!(d.changed[0].before, "Gamma.");
        assert_eq!(d.changed[0].after, "Gamma two.");
        assert_eq!(d.unchanged, 1);
        assert_eq!(d.to_string(), "1 added, 1 removed, 1 changed");
    }

    #[test]
    fn identical_lists_are_empty() {
        let recs = vec![EntryRecord::new("src", "Code.", Source::Purpose)];
        assert!(diff_entries(&recs, &recs).is_empty());
    }

    #[test]
    fn lines_are_capped() {
        let new: Vec<EntryRecord> = (0..5).map(|i| EntryRecord::missing(format!("f{i}.py"))).collect();
        let d = diff_entries(&[], &new);
        let lines = d.lines(3);
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "+ f0.py");
        assert_eq!(lines[3], "... 2 more");
    }
}
