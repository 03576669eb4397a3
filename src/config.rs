// purpose-atlas/src/config.rs
//! Configuration: built-in defaults, overlaid by an optional TOML file,
//! overlaid by command-line overrides. The result is an immutable
//! `ScanConfig` handed to every component by reference.

use serde::Deserialize;
use std::{
    collections::{
        BTreeMap,
        BTreeSet,
    },
    fs,
    path::{
        Path,
        PathBuf,
    },
};
use tracing::debug;

use crate::{
    header::{
        BlockDelims,
        HeaderRules,
        HeaderStyle,
    },
    rules::SummaryRules,
    util::is_truthy,
};

pub const TOOL_DIR: &str = ".purpose-atlas";
pub const CONFIG_FILENAME: &str = "config.toml";
pub const ROOT_CONFIG_FILENAME: &str = "purpose-atlas.toml";
pub const DEFAULT_PURPOSE_FILENAME: &str = ".purpose";
pub const DEFAULT_MAP_PATH: &str = ".purpose-atlas/atlas.toon";
pub const DEFAULT_NONSOURCE_PATH: &str = ".purpose-atlas/nonsource-files.toon";
pub const LEGACY_NONSOURCE_PATH: &str = ".purpose-atlas/manual-files.toon";
pub const DEFAULT_MAX_SCAN_LINES: usize = 80;

pub const DEFAULT_SOURCE_EXTENSIONS: &[&str] = &[
    ".cjs", ".css", ".d.ts", ".js", ".jsx", ".mjs", ".py", ".ts", ".tsx", ".vue",
];
pub const ENV_SKIP_UPDATE: &str = "PURPOSE_ATLAS_SKIP_UPDATE";
pub const ENV_ALLOW_UNTRACKED: &str = "PURPOSE_ATLAS_ALLOW_UNTRACKED";
pub const ENV_LOG: &str = "PURPOSE_ATLAS_LOG";
pub const CI_ENV_VARS: &[&str] = &["CI", "GITHUB_ACTIONS", "GITLAB_CI", "BUILDKITE", "CIRCLECI"];

pub const DEFAULT_EXCLUDE_DIR_NAMES: &[&str] = &[
    ".cache", ".egg-info", ".git", ".idea", ".mypy_cache", ".purpose-atlas", ".pytest_cache",
    ".tmp", ".venv", "__pycache__", "artifacts", "build", "coverage", "dist", "node_modules",
    "sandbox", "target", "temp", "test-results", "tmp",
];
pub const DEFAULT_EXCLUDE_DIR_SUFFIXES: &[&str] = &[".egg-info"];
pub const DEFAULT_ASSET_EXTENSIONS: &[&str] = &[
    ".bmp", ".gif", ".ico", ".jpeg", ".jpg", ".pdf", ".png", ".svg", ".ttf", ".webp", ".woff",
    ".woff2",
];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config value `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("scan root does not exist: {0}")]
    RootNotFound(PathBuf),

    #[error("scan root is not a directory: {0}")]
    RootNotDirectory(PathBuf),
}

/* =============================== Raw file layout =============================== */

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawConfig {
    project: RawProject,
    scan: RawScan,
    purpose: RawPurpose,
    summary_rules: RawSummaryRules,
    untracked: RawUntracked,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawProject {
    root: Option<String>,
    map_path: Option<String>,
    nonsource_files_path: Option<String>,
    /// Legacy name of `nonsource_files_path`.
    manual_files_path: Option<String>,
    purpose_filename: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawScan {
    source_extensions: Option<Vec<String>>,
    exclude_dir_names: Option<Vec<String>>,
    exclude_dir_suffixes: Option<Vec<String>>,
    exclude_path_prefixes: Option<Vec<String>>,
    non_source_path_prefixes: Option<Vec<String>>,
    max_scan_lines: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawPurpose {
    default_style: Option<HeaderStyle>,
    line_comment_prefixes: Option<Vec<String>>,
    styles_by_extension: BTreeMap<String, HeaderStyle>,
    block_delimiters: BTreeMap<String, (String, String)>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawSummaryRules {
    ascii_only: Option<bool>,
    no_commas: Option<bool>,
    max_length: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawUntracked {
    allowed_filenames: Option<Vec<String>>,
    allowlist_dir_prefixes: Option<Vec<String>>,
    allowlist_files: Option<Vec<String>>,
    asset_allowed_prefixes: Option<Vec<String>>,
    asset_extensions: Option<Vec<String>>,
}

/* ============================== Normalized config ============================== */

/// Allow rules for candidate files in the untracked report.
#[derive(Clone, Debug, Default)]
pub struct UntrackedRules {
    pub allowed_filenames: BTreeSet<String>,
    pub allowlist_dir_prefixes: BTreeSet<String>,
    pub allowlist_files: BTreeSet<String>,
    pub asset_allowed_prefixes: BTreeSet<String>,
    pub asset_extensions: BTreeSet<String>,
}

/// Where the non-source list lives, and whether its absence is an error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NonsourceLocation {
    pub path: PathBuf,
    /// Set when the path came from the config file rather than the defaults.
    pub required: bool,
}

#[derive(Clone, Debug)]
pub struct ScanConfig {
    pub root: PathBuf,
    /// Config file the values came from, if any.
    pub config_path: Option<PathBuf>,
    pub map_path: PathBuf,
    pub nonsource: NonsourceLocation,
    pub purpose_filename: String,
    pub source_extensions: BTreeSet<String>,
    pub exclude_dir_names: BTreeSet<String>,
    pub exclude_dir_suffixes: BTreeSet<String>,
    pub exclude_path_prefixes: BTreeSet<String>,
    pub non_source_path_prefixes: BTreeSet<String>,
    pub header: HeaderRules,
    pub summary_rules: SummaryRules,
    pub untracked: UntrackedRules,
}

/// Values given on the command line; they beat the file.
#[derive(Clone, Debug, Default)]
pub struct Overrides {
    pub config_path: Option<PathBuf>,
    pub root: Option<PathBuf>,
}

impl ScanConfig {
    /// Built-in defaults rooted at `root`, no file involved.
    pub fn defaults(root: &Path) -> Result<Self, ConfigError> {
        let root = check_root(root)?;
        Self::from_raw(RawConfig::default(), None, &root, Some(root.clone()))
    }

    /// Resolve the config for a run started in `cwd`.
    pub fn load(overrides: &Overrides, cwd: &Path) -> Result<Self, ConfigError> {
        // Explicit --config beats the upward search
        let start = overrides.root.as_ref().map_or_else(|| cwd.to_path_buf(), |r| absolutize(cwd, r));
        let config_file = match &overrides.config_path {
            Some(p) => Some(absolutize(cwd, p)),
            None => find_config_path(&start),
        };

        let Some(file) = config_file else {
            debug!(root = %start.display(), "no config file, using defaults");
            let root = check_root(&start)?;
            return Self::from_raw(RawConfig::default(), None, &root, Some(root.clone()));
        };

        let text = fs::read_to_string(&file).map_err(|e| ConfigError::ReadFile {
            path: file.display().to_string(),
            source: e,
        })?;
        let raw: RawConfig = toml::from_str(&text).map_err(|e| ConfigError::Parse {
            path: file.display().to_string(),
            source: e,
        })?;
        debug!(config = %file.display(), "loaded config file");

        // Relative paths resolve against the project dir, not the cwd
        let base = config_base(&file);
        let base = base.canonicalize().unwrap_or(base);
        let root_override = overrides.root.as_ref().map(|r| absolutize(cwd, r));
        Self::from_raw(raw, Some(file), &base, root_override)
    }

    fn from_raw(
        raw: RawConfig,
        config_path: Option<PathBuf>,
        base: &Path,
        root_override: Option<PathBuf>,
    ) -> Result<Self, ConfigError> {
        let RawConfig { project, scan, purpose, summary_rules, untracked } = raw;

        let root = match (root_override, project.root.as_deref()) {
            (Some(r), _) => r,
            (None, Some(r)) => base.join(r),
            (None, None) => base.to_path_buf(),
        };
        let root = check_root(&root)?;

        let map_path = base.join(project.map_path.as_deref().unwrap_or(DEFAULT_MAP_PATH));
        let nonsource = resolve_nonsource(base, project.nonsource_files_path, project.manual_files_path);

        let purpose_filename = project.purpose_filename.unwrap_or_else(|| DEFAULT_PURPOSE_FILENAME.to_string());
        if purpose_filename.trim().is_empty() || purpose_filename.contains(['/', '\\']) {
            return Err(ConfigError::Invalid {
                field: "project.purpose_filename",
                reason: format!("`{purpose_filename}` must be a plain file name"),
            });
        }

        // Unset lists fall back to the built-in defaults
        let source_extensions = ext_set(scan.source_extensions, DEFAULT_SOURCE_EXTENSIONS);
        if source_extensions.is_empty() {
            return Err(ConfigError::Invalid {
                field: "scan.source_extensions",
                reason: "at least one extension is required".into(),
            });
        }

        let max_scan_lines = scan.max_scan_lines.unwrap_or(DEFAULT_MAX_SCAN_LINES);
        if max_scan_lines == 0 {
            return Err(ConfigError::Invalid { field: "scan.max_scan_lines", reason: "must be at least 1".into() });
        }

        let mut styles_by_extension = BTreeMap::new();
        for (ext, style) in purpose.styles_by_extension {
            styles_by_extension.insert(normalize_ext(&ext), style);
        }
        let mut block_delimiters = BTreeMap::new();
        for (ext, (open, close)) in purpose.block_delimiters {
            if open.is_empty() || close.is_empty() {
                return Err(ConfigError::Invalid {
                    field: "purpose.block_delimiters",
                    reason: format!("delimiters for `{ext}` must not be empty"),
                });
            }
            block_delimiters.insert(normalize_ext(&ext), BlockDelims::new(&open, &close));
        }
        let header_defaults = HeaderRules::default();
        let header = HeaderRules {
            default_style: purpose.default_style.unwrap_or(header_defaults.default_style),
            styles_by_extension,
            block_delimiters,
            line_comment_prefixes: purpose
                .line_comment_prefixes
                .unwrap_or(header_defaults.line_comment_prefixes),
            max_scan_lines,
        };

        let rule_defaults = SummaryRules::default();
        let summary_rules = SummaryRules {
            ascii_only: summary_rules.ascii_only.unwrap_or(rule_defaults.ascii_only),
            no_commas: summary_rules.no_commas.unwrap_or(rule_defaults.no_commas),
            max_length: summary_rules.max_length.unwrap_or(rule_defaults.max_length),
        };
        if summary_rules.max_length == 0 {
            return Err(ConfigError::Invalid { field: "summary_rules.max_length", reason: "must be at least 1".into() });
        }

        let untracked = UntrackedRules {
            allowed_filenames: untracked
                .allowed_filenames
                .map(|v| v.into_iter().map(|s| s.trim().to_string()).collect())
                .unwrap_or_else(|| BTreeSet::from([purpose_filename.clone()])),
            allowlist_dir_prefixes: prefix_set(untracked.allowlist_dir_prefixes),
            allowlist_files: prefix_set(untracked.allowlist_files),
            asset_allowed_prefixes: prefix_set(untracked.asset_allowed_prefixes),
            asset_extensions: ext_set(untracked.asset_extensions, DEFAULT_ASSET_EXTENSIONS),
        };

        Ok(Self {
            root,
            config_path,
            map_path,
            nonsource,
            purpose_filename,
            source_extensions,
            exclude_dir_names: scan
                .exclude_dir_names
                .map(|v| v.iter().map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
                .unwrap_or_else(|| to_set(DEFAULT_EXCLUDE_DIR_NAMES)),
            exclude_dir_suffixes: scan
                .exclude_dir_suffixes
                .map(|v| v.iter().map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
                .unwrap_or_else(|| to_set(DEFAULT_EXCLUDE_DIR_SUFFIXES)),
            exclude_path_prefixes: prefix_set(scan.exclude_path_prefixes),
            non_source_path_prefixes: prefix_set(scan.non_source_path_prefixes),
            header,
            summary_rules,
            untracked,
        })
    }

    pub fn max_scan_lines(&self) -> usize {
        self.header.max_scan_lines
    }
}

/// Environment toggles, read once per run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunEnv {
    pub skip_update: bool,
    pub allow_untracked: bool,
    pub ci: bool,
}

impl RunEnv {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Self {
        let flag = |key: &str| is_truthy(lookup(key).as_deref());
        Self {
            skip_update: flag(ENV_SKIP_UPDATE),
            allow_untracked: flag(ENV_ALLOW_UNTRACKED),
            ci: CI_ENV_VARS.iter().any(|k| flag(k)),
        }
    }
}

/// First config file under `root`: `.purpose-atlas/config.toml`, then `purpose-atlas.toml`.
pub fn find_config_path(root: &Path) -> Option<PathBuf> {
    [root.join(TOOL_DIR).join(CONFIG_FILENAME), root.join(ROOT_CONFIG_FILENAME)]
        .into_iter()
        .find(|p| p.is_file())
}

/// Directory config-relative paths resolve against. A file inside the tool
/// dir belongs to the project one level up.
fn config_base(file: &Path) -> PathBuf {
    let dir = file.parent().unwrap_or_else(|| Path::new("."));
    if dir.file_name().is_some_and(|n| n == TOOL_DIR) {
        dir.parent().unwrap_or(dir).to_path_buf()
    } else {
        dir.to_path_buf()
    }
}

fn resolve_nonsource(base: &Path, new_key: Option<String>, legacy_key: Option<String>) -> NonsourceLocation {
    if let Some(p) = new_key.or(legacy_key) {
        return NonsourceLocation { path: base.join(p), required: true };
    }
    let current = base.join(DEFAULT_NONSOURCE_PATH);
    let legacy = base.join(LEGACY_NONSOURCE_PATH);
    let path = if !current.exists() && legacy.exists() { legacy } else { current };
    NonsourceLocation { path, required: false }
}

fn check_root(root: &Path) -> Result<PathBuf, ConfigError> {
    if !root.exists() {
        return Err(ConfigError::RootNotFound(root.to_path_buf()));
    }
    if !root.is_dir() {
        return Err(ConfigError::RootNotDirectory(root.to_path_buf()));
    }
    Ok(root.canonicalize().unwrap_or_else(|_| root.to_path_buf()))
}

fn absolutize(cwd: &Path, p: &Path) -> PathBuf {
    if p.is_absolute() { p.to_path_buf() } else { cwd.join(p) }
}

/// `.EXT`, `ext`, ` .ext ` all become `.ext`.
pub fn normalize_ext(raw: &str) -> String {
    let t = raw.trim().to_ascii_lowercase();
    if t.is_empty() || t.starts_with('.') { t } else { format!(".{t}") }
}

/// `./a/b/`, `a\b` become `a/b`.
pub fn normalize_prefix(raw: &str) -> String {
    let t = raw.trim().replace('\\', "/");
    let t = t.strip_prefix("./").unwrap_or(&t);
    t.trim_matches('/').to_string()
}

fn ext_set(raw: Option<Vec<String>>, defaults: &[&str]) -> BTreeSet<String> {
    match raw {
        Some(v) => v.iter().map(|s| normalize_ext(s)).filter(|s| !s.is_empty()).collect(),
        None => defaults.iter().map(|s| s.to_string()).collect(),
    }
}

fn prefix_set(raw: Option<Vec<String>>) -> BTreeSet<String> {
    raw.unwrap_or_default()
        .iter()
        .map(|s| normalize_prefix(s))
        .filter(|s| !s.is_empty())
        .collect()
}

fn to_set(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/* ============================= Config file template ============================= */

/// TOML text for `init`. `source_extensions` and `styles` come from language
/// detection when available.
pub fn render_config_text(source_extensions: &[String], styles: &BTreeMap<String, HeaderStyle>) -> String {
    let mut out = String::new();
    out.push_str("[project]\n");
    out.push_str("root = \".\"\n");
    out.push_str(&format!("map_path = {}\n", quote(DEFAULT_MAP_PATH)));
    out.push_str(&format!("nonsource_files_path = {}\n", quote(DEFAULT_NONSOURCE_PATH)));
    out.push_str(&format!("purpose_filename = {}\n", quote(DEFAULT_PURPOSE_FILENAME)));
    out.push('\n');

    out.push_str("[scan]\n");
    out.push_str(&format!("source_extensions = {}\n", toml_list(source_extensions.iter().map(String::as_str))));
    out.push_str(&format!("exclude_dir_names = {}\n", toml_list(DEFAULT_EXCLUDE_DIR_NAMES.iter().copied())));
    out.push_str(&format!("exclude_dir_suffixes = {}\n", toml_list(DEFAULT_EXCLUDE_DIR_SUFFIXES.iter().copied())));
    out.push_str("exclude_path_prefixes = []\n");
    out.push_str("non_source_path_prefixes = []\n");
    out.push_str(&format!("max_scan_lines = {DEFAULT_MAX_SCAN_LINES}\n"));
    out.push('\n');

    out.push_str("[purpose]\n");
    out.push_str(&format!("default_style = {}\n", quote(HeaderStyle::Javadoc.as_str())));
    out.push_str("line_comment_prefixes = [\"#\", \"//\"]\n");
    out.push('\n');
    out.push_str("[purpose.styles_by_extension]\n");
    for (ext, style) in styles {
        out.push_str(&format!("{} = {}\n", quote(ext), quote(style.as_str())));
    }
    out.push('\n');

    let rules = SummaryRules::default();
    out.push_str("[summary_rules]\n");
    out.push_str(&format!("ascii_only = {}\n", rules.ascii_only));
    out.push_str(&format!("no_commas = {}\n", rules.no_commas));
    out.push_str(&format!("max_length = {}\n", rules.max_length));
    out.push('\n');

    out.push_str("[untracked]\n");
    out.push_str(&format!("allowed_filenames = {}\n", toml_list([DEFAULT_PURPOSE_FILENAME])));
    out.push_str("allowlist_dir_prefixes = []\n");
    out.push_str("allowlist_files = []\n");
    out.push_str("asset_allowed_prefixes = []\n");
    out.push_str(&format!("asset_extensions = {}\n", toml_list(DEFAULT_ASSET_EXTENSIONS.iter().copied())));
    out
}

fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

fn toml_list<'a, I: IntoIterator<Item = &'a str>>(items: I) -> String {
    let inner = items.into_iter().map(quote).collect::<Vec<_>>().join(", ");
    format!("[{inner}]")
}

/* ==================================== Tests ==================================== */
