// purpose-atlas/src/entry.rs
//! Snapshot row: one folder or file, its declared summary, and where that
//! summary came from.
//!
//! Backward-compat:
//! - `source` accepts the legacy `manual` tag for non-source list rows.
//! - Unknown tags deserialize to `Source::Missing`.

use serde::{
    Deserialize,
    Serialize,
};
use std::fmt;

use crate::util::cmp_rel_paths;

pub const MISSING_TEXT: &str = "MISSING";
pub const INVALID_TEXT: &str = "INVALID";

/// Provenance of a record's summary.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum Source {
    /// Parsed from a purpose header inside the file.
    Header,
    /// Taken from the non-source list.
    #[serde(alias = "manual")]
    NonsourceList,
    /// Read from a folder's sidecar purpose file.
    Purpose,
    /// Summary had rule violations or a malformed header.
    Invalid,
    #[serde(other)]
    Missing,
}

impl Source {
    pub fn from_str_ic<S: AsRef<str>>(s: S) -> Self {
        match s.as_ref().trim().to_ascii_lowercase().as_str() {
            "header" => Source::Header,
            "nonsource-list" | "manual" => Source::NonsourceList,
            "purpose" => Source::Purpose,
            "invalid" => Source::Invalid,
            _ => Source::Missing,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Source::Header => "header",
            Source::NonsourceList => "nonsource-list",
            Source::Purpose => "purpose",
            Source::Invalid => "invalid",
            Source::Missing => "missing",
        }
    }

    /// True for the provenances that carry a usable summary.
    pub fn has_summary(self) -> bool {
        matches!(self, Source::Header | Source::NonsourceList | Source::Purpose)
    }
}

impl From<&str> for Source {
    fn from(s: &str) -> Self {
        Source::from_str_ic(s)
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One folder or file row. Paths are relative, `/`-separated, `.` for root.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct EntryRecord {
    pub path: String,
    pub summary: Option<String>,
    pub source: Source,
}

impl EntryRecord {
    pub fn new(path: impl Into<String>, summary: impl Into<String>, source: Source) -> Self {
        Self { path: path.into(), summary: Some(summary.into()), source }
    }

    pub fn missing(path: impl Into<String>) -> Self {
        Self { path: path.into(), summary: None, source: Source::Missing }
    }

    pub fn invalid(path: impl Into<String>) -> Self {
        Self { path: path.into(), summary: None, source: Source::Invalid }
    }

    /// Summary as written in the snapshot; placeholders for absent ones.
    pub fn display_summary(&self) -> &str {
        match (&self.summary, self.source) {
            (Some(s), _) => s.as_str(),
            (None, Source::Invalid) => INVALID_TEXT,
            (None, _) => MISSING_TEXT,
        }
    }

    /// Usable summary, if the provenance carries one.
    pub fn usable_summary(&self) -> Option<&str> {
        if self.source.has_summary() {
            self.summary.as_deref()
        } else {
            None
        }
    }
}

/// Sort by path segments and keep the first record per path.
pub fn sort_records(records: &mut Vec<EntryRecord>) {
    records.sort_by(|a, b| cmp_rel_paths(&a.path, &b.path));
    records.dedup_by(|b, a| a.path == b.path);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_round_trips_through_text() {
        for s in [Source::Header, Source::NonsourceList, Source::Purpose, Source::Invalid, Source::Missing] {
            assert_eq!(Source::from_str_ic(s.as_str()), s);
        }
        assert_eq!(Source::from("MANUAL"), Source::NonsourceList);
        assert_eq!(Source::from("whatever"), Source::Missing);
    }

    #[test]
    fn legacy_manual_tag_deserializes() {
        let r: EntryRecord =
            serde_json::from_str(r#"{"path":"a.toml","summary":"cfg","source":"manual"}"#).unwrap();
        assert_eq!(r.source, Source::NonsourceList);
        let r: EntryRecord =
            serde_json::from_str(r#"{"path":"a","summary":null,"source":"bogus"}"#).unwrap();
        assert_eq!(r.source, Source::Missing);
    }

    #[test]
    fn placeholders_for_absent_summaries() {
        assert_eq!(EntryRecord::missing("a").display_summary(), MISSING_TEXT);
        assert_eq!(EntryRecord::invalid("a").display_summary(), INVALID_TEXT);
        assert_eq!(EntryRecord::new("a", "Does x.", Source::Header).display_summary(), "Does x.");
        assert_eq!(EntryRecord::invalid("a").usable_summary(), None);
    }

    #[test]
    fn sort_keeps_first_per_path() {
        let mut v = vec![
            EntryRecord::new("b", "two", Source::Header),
            EntryRecord::new("a", "one", Source::Header),
            EntryRecord::new("b", "late", Source::NonsourceList),
        ];
        sort_records(&mut v);
        assert_eq!(v.len(), 2);
        assert_eq!(v[1].summary.as_deref(), Some("two"));
    }
}
