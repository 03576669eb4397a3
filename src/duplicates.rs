// purpose-atlas/src/duplicates.rs
//! Groups records that declare the same summary.

use serde::Serialize;
use std::collections::{
    BTreeMap,
    BTreeSet,
};
use std::fmt;

use crate::entry::EntryRecord;

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct DuplicateGroup {
    /// Normalized summary text shared by every member.
    pub key: String,
    /// Sorted member paths, always two or more.
    pub paths: Vec<String>,
}

impl fmt::Display for DuplicateGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} :: {}", self.key, self.paths.join(" | "))
    }
}

/// Trim, collapse whitespace, lower-case. Punctuation is kept.
pub fn normalize_key(summary: &str) -> String {
    summary.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// Groups sorted by key; records without a usable summary are ignored.
pub fn find_duplicates(records: &[EntryRecord]) -> Vec<DuplicateGroup> {
    let mut grouped: BTreeMap<String, BTreeSet<&str>> = BTreeMap::new();
    for r in records {
        let Some(summary) = r.usable_summary() else { continue };
        let key = normalize_key(summary);
        if key.is_empty() {
            continue;
        }
        grouped.entry(key).or_default().insert(r.path.as_str());
    }
    grouped
        .into_iter()
        .filter(|(_, paths)| paths.len() > 1)
        .map(|(key, paths)| DuplicateGroup { key, paths: paths.into_iter().map(str::to_string).collect() })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::Source;

    fn folder(path: &str, summary: &str) -> EntryRecord {
        EntryRecord::new(path, summary, Source::Purpose)
    }

    #[test]
    fn groups_case_and_whitespace_variants() {
        let recs = vec![
            folder("src/utils", "Shared utils"),
            folder("app/utils", "  shared   UTILS "),
            folder("lib", "Something else"),
        ];
        let groups = find_duplicates(&recs);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].key, "shared utils");
        assert_eq!(groups[0].paths, vec!["app/utils", "src/utils"]);
        assert_eq!(groups[0].to_string(), "shared utils :: app/utils | src/utils");
    }

    #[test]
    fn punctuation_is_significant() {
        let recs = vec![folder("a", "Shared utils."), folder("b", "Shared utils")];
        assert!(find_duplicates(&recs).is_empty());
    }

    #[test]
    fn missing_and_invalid_records_are_skipped() {
        let recs = vec![
            EntryRecord::missing("a"),
            EntryRecord::missing("b"),
            EntryRecord::invalid("c"),
            EntryRecord::invalid("d"),
        ];
        assert!(find_duplicates(&recs).is_empty());
    }

    #[test]
    fn groups_sorted_by_key() {
        let recs = vec![
            folder("z1", "zeta"),
            folder("z2", "zeta"),
            folder("a1", "alpha"),
            folder("a2", "Alpha"),
            folder("a3", "alpha"),
        ];
        let groups = find_duplicates(&recs);
        assert_eq!(groups.iter().map(|g| g.key.as_str()).collect::<Vec<_>>(), vec!["alpha", "zeta"]);
        assert_eq!(groups[0].paths.len(), 3);
    }
}
