// purpose-atlas/src/map_view.rs

use std::{
    fs::{
        self,
        File,
    },
    io::{
        self,
        BufWriter,
        Write,
    },
    path::{
        Path,
        PathBuf,
    },
};

use crate::{
    entry::{
        EntryRecord,
        Source,
    },
    snapshot::{
        Overview,
        Snapshot,
    },
    util::{
        quote_field,
        split_row,
    },
};

const TABLE_FIELDS: &str = "{path,summary,source}";

/// Write the snapshot as text. Section order is fixed:
///   - header lines (version, stamp, hashes, root, overview)
///   - raw config lists
///   - folder and file tables
///   - duplicate groups, then the folder tree
pub fn write_snapshot<W: Write>(out: &mut W, snap: &Snapshot) -> io::Result<()> {
    writeln!(out, "version: {}", snap.version)?;
    writeln!(out, "generated_at: {}", snap.generated_at)?;
    writeln!(out, "file_hash: \"{}\"", snap.file_hash)?;
    writeln!(out, "folder_hash: \"{}\"", snap.folder_hash)?;
    writeln!(out, "root: {}", snap.root)?;
    writeln!(out, "overview: {}", snap.overview.render())?;

    write_list(out, "source_extensions", &snap.source_extensions)?;
    write_list(out, "exclude_dir_names", &snap.exclude_dir_names)?;
    write_list(out, "exclude_path_prefixes", &snap.exclude_path_prefixes)?;

    write_table(out, "folders", &snap.folders)?;
    write_table(out, "files", &snap.files)?;

    let folder_dups: Vec<String> = snap.folder_summary_duplicates.iter().map(ToString::to_string).collect();
    let file_dups: Vec<String> = snap.file_summary_duplicates.iter().map(ToString::to_string).collect();
    write_list(out, "folder_summary_duplicates", &folder_dups)?;
    write_list(out, "file_summary_duplicates", &file_dups)?;
    write_list(out, "folder_tree", &snap.folder_tree)?;
    Ok(())
}

fn write_list<W: Write>(out: &mut W, name: &str, items: &[String]) -> io::Result<()> {
    writeln!(out, "{}[{}]:", name, items.len())?;
    for item in items {
        writeln!(out, "  - {item}")?;
    }
    Ok(())
}

fn write_table<W: Write>(out: &mut W, name: &str, records: &[EntryRecord]) -> io::Result<()> {
    writeln!(out, "{}[{}]{}:", name, records.len(), TABLE_FIELDS)?;
    for r in records {
        writeln!(out, "  {},{},{}", quote_field(&r.path), quote_field(r.display_summary()), r.source)?;
    }
    Ok(())
}

pub fn render_snapshot(snap: &Snapshot) -> String {
    let mut buf = Vec::new();
    // writing into a Vec cannot fail
    let _ = write_snapshot(&mut buf, snap);
    String::from_utf8_lossy(&buf).into_owned()
}

fn ensure_parent(path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Create parent dirs and overwrite `path`.
pub fn write_snapshot_file(snap: &Snapshot, path: &Path) -> io::Result<()> {
    ensure_parent(path)?;
    let mut out = BufWriter::new(File::create(path)?);
    write_snapshot(&mut out, snap)?;
    out.flush()
}

/// JSON rendition path: the snapshot path with a `.json` extension.
pub fn json_path_for(map_path: &Path) -> PathBuf {
    map_path.with_extension("json")
}

pub fn write_json_file(snap: &Snapshot, path: &Path) -> io::Result<()> {
    ensure_parent(path)?;
    let mut out = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut out, snap)?;
    writeln!(out)?;
    out.flush()
}

/* ================================== Reading ================================== */

/// What lint needs back from a written snapshot. Absent lines stay `None`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StoredSnapshot {
    pub version: Option<u32>,
    pub file_hash: Option<String>,
    pub folder_hash: Option<String>,
    pub overview: Option<Overview>,
    pub folders: Vec<EntryRecord>,
    pub files: Vec<EntryRecord>,
    /// Format problems met while reading.
    pub problems: Vec<String>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Section {
    Folders,
    Files,
    Other,
}

pub fn read_snapshot(path: &Path) -> io::Result<StoredSnapshot> {
    let bytes = fs::read(path)?;
    Ok(parse_snapshot(&String::from_utf8_lossy(&bytes)))
}

pub fn parse_snapshot(text: &str) -> StoredSnapshot {
    let mut out = StoredSnapshot::default();
    let mut section = Section::Other;
    let mut declared: Option<(Section, usize)> = None;
    let mut seen_overview = false;

    for (idx, raw) in text.lines().enumerate() {
        if raw.trim().is_empty() {
            continue;
        }
        if raw.starts_with(char::is_whitespace) {
            if section == Section::Other {
                continue;
            }
            match parse_row(raw.trim()) {
                Some(rec) if section == Section::Folders => out.folders.push(rec),
                Some(rec) => out.files.push(rec),
                None => out.problems.push(format!("line {}: malformed table row", idx + 1)),
            }
            continue;
        }

        check_count(&mut out, declared.take());
        let Some((key, value)) = raw.split_once(':') else {
            out.problems.push(format!("line {}: expected `key: value`", idx + 1));
            continue;
        };
        let value = value.trim();
        section = Section::Other;
        match key {
            "version" => out.version = value.parse().ok(),
            "file_hash" => out.file_hash = Some(value.trim_matches('"').to_string()).filter(|h| !h.is_empty()),
            "folder_hash" => out.folder_hash = Some(value.trim_matches('"').to_string()).filter(|h| !h.is_empty()),
            "overview" => {
                seen_overview = true;
                match Overview::parse(value) {
                    Ok(o) => out.overview = Some(o),
                    Err(e) => out.problems.push(e),
                }
            }
            _ => {
                if let Some((name, count)) = table_header(key) {
                    section = match name {
                        "folders" => Section::Folders,
                        "files" => Section::Files,
                        _ => Section::Other,
                    };
                    if section != Section::Other {
                        declared = Some((section, count));
                    }
                }
            }
        }
    }
    check_count(&mut out, declared);
    if !seen_overview {
        out.problems.push("overview line is missing".into());
    }
    out
}

/// `files[3]{path,summary,source}` -> `("files", 3)`.
fn table_header(key: &str) -> Option<(&str, usize)> {
    let (name, rest) = key.split_once('[')?;
    let (count, _) = rest.split_once(']')?;
    Some((name, count.parse().ok()?))
}

fn check_count(out: &mut StoredSnapshot, declared: Option<(Section, usize)>) {
    let Some((section, count)) = declared else { return };
    let (name, actual) = match section {
        Section::Folders => ("folders", out.folders.len()),
        Section::Files => ("files", out.files.len()),
        Section::Other => return,
    };
    if count != actual {
        out.problems.push(format!("{name} table declares {count} rows but holds {actual}"));
    }
}

fn parse_row(line: &str) -> Option<EntryRecord> {
    let fields = split_row(line, 3)?;
    let [path, summary, source] = <[String; 3]>::try_from(fields).ok()?;
    if path.is_empty() {
        return None;
    }
    let source = Source::from_str_ic(&source);
    let summary = source.has_summary().then_some(summary);
    Some(EntryRecord { path, summary, source })
}

/* ==================================== Tests ==================================== */

#[cfg(test)]
mod tests {
    use super::*;
    use crate::duplicates::DuplicateGroup;
    use tempfile::TempDir;

    fn sample() -> Snapshot {
        let folders = vec![
            EntryRecord::new(".", "Root folder", Source::Purpose),
            EntryRecord::missing("src"),
        ];
        let files = vec![
            EntryRecord::new("src/a.py", "loads config.", Source::Header),
            EntryRecord::new("notes.txt", "Notes, loose", Source::NonsourceList),
            EntryRecord::invalid("src/b.py"),
        ];
        Snapshot {
            version: 1,
            generated_at: "2025-08-10T14:03:59Z".into(),
            file_hash: "ab".repeat(32),
            folder_hash: "cd".repeat(32),
            root: ".".into(),
            overview: Overview { tracked_source_files: 2, tracked_nonsource_files: 1, tracked_files_total: 3, tracked_folders: 2, source_extensions: 1, exclude_dir_names: 1, exclude_path_prefixes: 0 },
            source_extensions: vec![".py".into()],
            exclude_dir_names: vec![".git".into()],
            exclude_path_prefixes: vec![],
            folder_summary_duplicates: vec![DuplicateGroup { key: "shared utils".into(), paths: vec!["app/utils".into(), "src/utils".into()] }],
            file_summary_duplicates: vec![],
            folder_tree: vec![". - Root folder".into(), "src/ - MISSING".into()],
            folders,
            files,
        }
    }

    #[test]
    fn renders_sections_in_order() {
        let text = render_snapshot(&sample());
        let expected = "\
version: 1
generated_at: 2025-08-10T14:03:59Z
file_hash: \"abababababababababababababababababababababababababababababababab\"
folder_hash: \"cdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcd\"
root: .
overview: tracked_source_files=2 tracked_nonsource_files=1 tracked_files_total=3 tracked_folders=2 source_extensions=1 exclude_dir_names=1 exclude_path_prefixes=0
source_extensions[1]:
  - .py
exclude_dir_names[1]:
  - .git
exclude_path_prefixes[0]:
folders[2]{path,summary,source}:
  .,Root folder,purpose
  src,MISSING,missing
files[3]{path,summary,source}:
  src/a.py,loads config.,header
  notes.txt,\"Notes, loose\",nonsource-list
  src/b.py,INVALID,invalid
folder_summary_duplicates[1]:
  - shared utils :: app/utils | src/utils
file_summary_duplicates[0]:
folder_tree[2]:
  - . - Root folder
  - src/ - MISSING
";
        assert_eq!(text, expected);
    }

    #[test]
    fn reads_back_what_it_wrote() {
        let snap = sample();
        let stored = parse_snapshot(&render_snapshot(&snap));
        assert!(stored.problems.is_empty(), "{:?}", stored.problems);
        assert_eq!(stored.version, Some(1));
        assert_eq!(stored.file_hash.as_deref(), Some(snap.file_hash.as_str()));
        assert_eq!(stored.folder_hash.as_deref(), Some(snap.folder_hash.as_str()));
        assert_eq!(stored.overview, Some(snap.overview));
        assert_eq!(stored.folders, snap.folders);
        assert_eq!(stored.files, snap.files);
    }

    #[test]
    fn reports_missing_lines_and_bad_counts() {
        let stored = parse_snapshot("version: 1\nfiles[2]{path,summary,source}:\n  a.py,A.,header\n");
        assert!(stored.file_hash.is_none());
        assert!(stored.overview.is_none());
        assert!(stored.problems.iter().any(|p| p.contains("declares 2 rows")));
        assert!(stored.problems.iter().any(|p| p.contains("overview line is missing")));
    }

    #[test]
    fn legacy_manual_source_is_read() {
        let stored = parse_snapshot("files[1]{path,summary,source}:\n  a.toml,Config.,manual\n");
        assert_eq!(stored.files[0].source, Source::NonsourceList);
    }

    #[test]
    fn files_land_where_asked() {
        let dir = TempDir::new().unwrap();
        let map = dir.path().join(".purpose-atlas").join("atlas.toon");
        write_snapshot_file(&sample(), &map).unwrap();
        assert!(map.is_file());
        let json = json_path_for(&map);
        assert!(json.ends_with("atlas.json"));
        write_json_file(&sample(), &json).unwrap();
        let v: serde_json::Value = serde_json::from_str(&fs::read_to_string(&json).unwrap()).unwrap();
        assert_eq!(v["files"][0]["path"], "src/a.py");
        assert_eq!(v["files"][0]["source"], "header");
        assert_eq!(v["overview"]["tracked_files_total"], 3);
        assert_eq!(read_snapshot(&map).unwrap().files.len(), 3);
    }
}
