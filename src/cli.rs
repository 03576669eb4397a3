// purpose-atlas/src/cli.rs

use clap::{
    Args,
    Parser,
    Subcommand,
};
use std::path::PathBuf;

use crate::{
    config::Overrides,
    lint::LintOptions,
};

#[derive(Parser, Debug)]
#[command(
    name = "purpose-atlas",
    version,
    about = "Map and lint one-line purpose summaries for every file and folder"
)]
pub struct Cli {
    #[arg(long, global = true, value_name = "PATH", help = "Config file (default: .purpose-atlas/config.toml, then purpose-atlas.toml)")]
    pub config: Option<PathBuf>,
    #[arg(long, global = true, value_name = "PATH", help = "Project root to scan")]
    pub root: Option<PathBuf>,
    #[arg(short, long, global = true, help = "Debug logging")]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn overrides(&self) -> Overrides {
        Overrides { config_path: self.config.clone(), root: self.root.clone() }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a starter config and non-source list.
    Init {
        #[arg(long, help = "Fill source extensions from the languages found in the tree")]
        detect: bool,
        #[arg(long, help = "Seed missing folder purpose files afterwards")]
        seed_purpose: bool,
        #[arg(long, help = "Overwrite an existing config")]
        force: bool,
    },
    /// Regenerate the atlas snapshot.
    Map {
        #[arg(long, help = "Write even when a CI environment is detected")]
        force: bool,
        #[arg(long, help = "Also write a JSON rendition next to the snapshot")]
        json: bool,
    },
    /// Check the tree against the written snapshot.
    Lint(LintArgs),
    /// Write placeholder purpose files into folders that lack one.
    SeedPurpose,
}

#[derive(Args, Debug, Clone, Copy)]
pub struct LintArgs {
    #[arg(long, help = "Fail on folders without a purpose file")]
    pub strict_folders: bool,
    #[arg(long, help = "Report untracked files as warnings")]
    pub report_untracked: bool,
    #[arg(long, help = "Fail on disallowed untracked files")]
    pub strict_untracked: bool,
}

impl From<LintArgs> for LintOptions {
    fn from(a: LintArgs) -> Self {
        LintOptions {
            strict_folders: a.strict_folders,
            report_untracked: a.report_untracked,
            strict_untracked: a.strict_untracked,
        }
    }
}
