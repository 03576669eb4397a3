// purpose-atlas/src/scaffold.rs

use anyhow::{
    Context,
    Result,
};
use std::{
    collections::BTreeMap,
    fs,
    path::{
        Path,
        PathBuf,
    },
};
use tracing::{
    debug,
    info,
};

use crate::{
    config::{
        render_config_text,
        ScanConfig,
        CONFIG_FILENAME,
        DEFAULT_EXCLUDE_DIR_NAMES,
        DEFAULT_NONSOURCE_PATH,
        DEFAULT_SOURCE_EXTENSIONS,
        TOOL_DIR,
    },
    detect::{
        detect_languages,
        Detected,
    },
    header::HeaderStyle,
    nonsource::TEMPLATE,
    walker::walk,
};

#[derive(Clone, Copy, Debug, Default)]
pub struct InitOptions {
    pub detect: bool,
    pub force: bool,
}

#[derive(Clone, Debug)]
pub struct InitOutcome {
    pub config_path: PathBuf,
    /// False when a config already existed and `force` was not set.
    pub config_written: bool,
    pub nonsource_path: PathBuf,
    pub nonsource_written: bool,
    pub detected: Option<Detected>,
}

/// Write `.purpose-atlas/config.toml` and the non-source template under `root`.
/// An existing list is never overwritten.
pub fn init_project(root: &Path, opts: &InitOptions) -> Result<InitOutcome> {
    let tool_dir = root.join(TOOL_DIR);
    fs::create_dir_all(&tool_dir).with_context(|| format!("creating {}", tool_dir.display()))?;

    let config_path = tool_dir.join(CONFIG_FILENAME);
    let mut detected = None;
    let config_written = if config_path.exists() && !opts.force {
        info!(path = %config_path.display(), "config exists, leaving it alone");
        false
    } else {
        let (extensions, styles) = if opts.detect {
            let excludes = DEFAULT_EXCLUDE_DIR_NAMES.iter().map(|s| s.to_string()).collect();
            let found = detect_languages(root, &excludes);
            let picked = template_inputs(&found);
            detected = Some(found);
            picked
        } else {
            default_template_inputs()
        };
        fs::write(&config_path, render_config_text(&extensions, &styles))
            .with_context(|| format!("writing {}", config_path.display()))?;
        true
    };

    let nonsource_path = root.join(DEFAULT_NONSOURCE_PATH);
    let nonsource_written = if nonsource_path.exists() {
        false
    } else {
        fs::write(&nonsource_path, TEMPLATE).with_context(|| format!("writing {}", nonsource_path.display()))?;
        true
    };

    Ok(InitOutcome { config_path, config_written, nonsource_path, nonsource_written, detected })
}

fn default_template_inputs() -> (Vec<String>, BTreeMap<String, HeaderStyle>) {
    let extensions = DEFAULT_SOURCE_EXTENSIONS.iter().map(|s| s.to_string()).collect();
    let styles = BTreeMap::from([
        (".py".to_string(), HeaderStyle::Docstring),
        (".vue".to_string(), HeaderStyle::SfcBlock),
    ]);
    (extensions, styles)
}

/// Detected languages, or the defaults when nothing was recognized.
fn template_inputs(found: &Detected) -> (Vec<String>, BTreeMap<String, HeaderStyle>) {
    if found.is_empty() {
        return default_template_inputs();
    }
    (found.source_extensions.clone(), found.styles.clone())
}

/// Write a placeholder purpose file into every walked folder that lacks one.
/// Returns how many were created.
pub fn seed_purpose_files(cfg: &ScanConfig) -> Result<usize> {
    let paths = walk(cfg);
    let mut created = 0usize;
    for d in &paths.folders {
        let target = d.abs.join(&cfg.purpose_filename);
        if target.exists() {
            continue;
        }
        fs::write(&target, format!("# path: {}\n", d.rel)).with_context(|| format!("writing {}", target.display()))?;
        debug!(path = %target.display(), "seeded");
        created += 1;
    }
    Ok(created)
}
