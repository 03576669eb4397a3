// purpose-atlas/src/detect.rs

use ignore::WalkBuilder;
use std::{
    collections::{
        BTreeMap,
        BTreeSet,
    },
    path::Path,
};
use tracing::{
    debug,
    warn,
};

use crate::{
    header::HeaderStyle,
    util::file_extension,
};

/// Languages found under a root, ready for the config template.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Detected {
    pub source_extensions: Vec<String>,
    pub styles: BTreeMap<String, HeaderStyle>,
    /// Files seen per extension.
    pub counts: BTreeMap<String, usize>,
}

impl Detected {
    pub fn is_empty(&self) -> bool {
        self.source_extensions.is_empty()
    }
}

const COMPOUND_EXTENSIONS: &[&str] = &[".d.ts"];

/// Header style for a recognized source extension, `None` for anything else.
pub fn ext_to_style(ext: &str) -> Option<HeaderStyle> {
    let style = match ext {
        ".py" | ".pyi" => HeaderStyle::Docstring,
        ".vue" | ".svelte" => HeaderStyle::SfcBlock,
        ".html" | ".htm" => HeaderStyle::BlockComment,
        // `#` or `//` comment languages
        ".rs" | ".go" | ".sh" | ".bash" | ".zsh" | ".rb" | ".pl" | ".r" | ".ex" | ".exs" | ".nim"
        | ".cr" | ".jl" | ".tf" => HeaderStyle::LineComment,
        // C family, JS/TS, styles
        ".c" | ".h" | ".cc" | ".cpp" | ".cxx" | ".hh" | ".hpp" | ".hxx" | ".cs" | ".java" | ".kt"
        | ".kts" | ".scala" | ".swift" | ".dart" | ".php" | ".m" | ".js" | ".jsx" | ".mjs" | ".cjs"
        | ".ts" | ".tsx" | ".d.ts" | ".mts" | ".cts" | ".css" | ".scss" | ".less" => HeaderStyle::Javadoc,
        _ => return None,
    };
    Some(style)
}

/// Walk `root` with gitignore rules and standard filters, skipping
/// `exclude_dir_names`, and collect the recognized source extensions.
pub fn detect_languages(root: &Path, exclude_dir_names: &BTreeSet<String>) -> Detected {
    let excluded = exclude_dir_names.clone();
    let mut builder = WalkBuilder::new(root);
    builder
        .standard_filters(true)
        .require_git(false)
        .filter_entry(move |e| {
            let is_dir = e.file_type().is_some_and(|t| t.is_dir());
            !(is_dir && e.depth() > 0 && excluded.contains(e.file_name().to_string_lossy().as_ref()))
        });

    let known: Vec<String> = COMPOUND_EXTENSIONS.iter().map(|s| s.to_string()).collect();
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for result in builder.build() {
        let dent = match result {
            Ok(d) => d,
            Err(e) => {
                warn!(error = %e, "skipping entry during language detection");
                continue;
            }
        };
        if !dent.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        let ext = file_extension(&dent.file_name().to_string_lossy(), &known);
        if ext_to_style(&ext).is_some() {
            *counts.entry(ext).or_insert(0) += 1;
        }
    }

    let mut out = Detected::default();
    for ext in counts.keys() {
        if let Some(style) = ext_to_style(ext) {
            out.source_extensions.push(ext.clone());
            out.styles.insert(ext.clone(), style);
        }
    }
    debug!(extensions = ?out.source_extensions, "languages detected");
    out.counts = counts;
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) {
        let p = root.join(rel);
        fs::create_dir_all(p.parent().unwrap()).unwrap();
        fs::write(p, "x\n").unwrap();
    }

    #[test]
    fn finds_languages_and_styles() {
        let dir = TempDir::new().unwrap();
        let r = dir.path();
        touch(r, "src/main.rs");
        touch(r, "src/lib.rs");
        touch(r, "web/app.ts");
        touch(r, "web/types.d.ts");
        touch(r, "web/App.vue");
        touch(r, "tools/gen.py");
        touch(r, "README.md");
        touch(r, "node_modules/dep/index.js");
        touch(r, "ignored/skip.go");
        fs::write(r.join(".gitignore"), "ignored/\n").unwrap();

        let excludes = BTreeSet::from(["node_modules".to_string()]);
        let d = detect_languages(r, &excludes);
        assert_eq!(d.source_extensions, vec![".d.ts", ".py", ".rs", ".ts", ".vue"]);
        assert_eq!(d.styles[".rs"], HeaderStyle::LineComment);
        assert_eq!(d.styles[".py"], HeaderStyle::Docstring);
        assert_eq!(d.styles[".vue"], HeaderStyle::SfcBlock);
        assert_eq!(d.styles[".d.ts"], HeaderStyle::Javadoc);
        assert_eq!(d.counts[".rs"], 2);
    }

    #[test]
    fn nothing_recognized_is_empty() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "notes.txt");
        assert!(detect_languages(dir.path(), &BTreeSet::new()).is_empty());
    }

    #[test]
    fn style_table() {
        assert_eq!(ext_to_style(".go"), Some(HeaderStyle::LineComment));
        assert_eq!(ext_to_style(".html"), Some(HeaderStyle::BlockComment));
        assert_eq!(ext_to_style(".cpp"), Some(HeaderStyle::Javadoc));
        assert_eq!(ext_to_style(".md"), None);
    }
}
