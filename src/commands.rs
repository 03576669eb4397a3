// purpose-atlas/src/commands.rs

use anyhow::{
    bail,
    Context,
    Result,
};
use clap::Parser;
use std::{
    env,
    io::{
        self,
        Write,
    },
    path::{
        Path,
        PathBuf,
    },
    process::ExitCode,
};
use tracing::info;

use crate::{
    cli::{
        Cli,
        Commands,
    },
    config::{
        Overrides,
        RunEnv,
        ScanConfig,
        ENV_LOG,
    },
    lint::{
        run_lint,
        LintOptions,
        Outcome,
    },
    map_view::{
        json_path_for,
        write_json_file,
        write_snapshot_file,
    },
    scaffold::{
        init_project,
        seed_purpose_files,
        InitOptions,
    },
    snapshot::build_snapshot,
    util::normalize_rel,
};

const EXIT_FAIL: u8 = 1;
const EXIT_FATAL: u8 = 2;

pub fn run_cli() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let env = RunEnv::from_env();
    match dispatch(&cli, &env) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(EXIT_FATAL)
        }
    }
}

/// stderr subscriber; `PURPOSE_ATLAS_LOG` takes an env-filter directive.
pub fn init_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env(ENV_LOG).unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(io::stderr)
        .compact();
    // already set in tests that call this twice
    let _ = subscriber.try_init();
}

fn dispatch(cli: &Cli, env: &RunEnv) -> Result<ExitCode> {
    let cwd = env::current_dir().context("failed to get current_dir")?;
    let overrides = cli.overrides();
    match &cli.command {
        Commands::Init { detect, seed_purpose, force } => {
            init(&cwd, &overrides, InitOptions { detect: *detect, force: *force }, *seed_purpose)
        }
        Commands::Map { force, json } => map(&cwd, &overrides, env, *force, *json),
        Commands::Lint(args) => lint(&cwd, &overrides, env, &LintOptions::from(*args)),
        Commands::SeedPurpose => seed(&cwd, &overrides),
    }
}

fn load_config(cwd: &Path, overrides: &Overrides) -> Result<ScanConfig> {
    let cfg = ScanConfig::load(overrides, cwd).context("loading configuration")?;
    info!(
        root = %cfg.root.display(),
        config = ?cfg.config_path.as_ref().map(|p| p.display().to_string()),
        "configuration resolved"
    );
    Ok(cfg)
}

fn init(cwd: &Path, overrides: &Overrides, opts: InitOptions, seed_after: bool) -> Result<ExitCode> {
    let root: PathBuf = match &overrides.root {
        Some(r) if r.is_absolute() => r.clone(),
        Some(r) => cwd.join(r),
        None => cwd.to_path_buf(),
    };
    if !root.is_dir() {
        bail!("scan root is not a directory: {}", root.display());
    }

    let out = init_project(&root, &opts).with_context(|| format!("initializing {}", root.display()))?;
    let mut err = io::stderr().lock();
    if out.config_written {
        writeln!(err, "Wrote {}", out.config_path.display())?;
    } else {
        writeln!(err, "Config exists, left unchanged: {} (use --force to overwrite)", out.config_path.display())?;
    }
    if let Some(d) = &out.detected {
        if d.is_empty() {
            writeln!(err, "No known languages detected; using default source extensions.")?;
        } else {
            // `.py (3), .rs (12)`
            let listed: Vec<String> = d.counts.iter().map(|(ext, n)| format!("{ext} ({n})")).collect();
            writeln!(err, "Detected source extensions: {}", listed.join(", "))?;
        }
    }
    if out.nonsource_written {
        writeln!(err, "Wrote {}", out.nonsource_path.display())?;
    }
    drop(err);

    if seed_after {
        let seed_overrides = Overrides { config_path: None, root: Some(root) };
        return seed(cwd, &seed_overrides);
    }
    Ok(ExitCode::SUCCESS)
}

fn map(cwd: &Path, overrides: &Overrides, env: &RunEnv, force: bool, json: bool) -> Result<ExitCode> {
    if env.skip_update {
        eprintln!("Skipping purpose-atlas map update (PURPOSE_ATLAS_SKIP_UPDATE is set).");
        return Ok(ExitCode::SUCCESS);
    }
    if env.ci && !force {
        eprintln!("Skipping purpose-atlas map update in CI (use --force to write anyway).");
        return Ok(ExitCode::SUCCESS);
    }

    let cfg = load_config(cwd, overrides)?;
    let built = build_snapshot(&cfg);
    // Problems are recorded in the map, never fatal here
    write_snapshot_file(&built.snapshot, &cfg.map_path)
        .with_context(|| format!("writing {}", cfg.map_path.display()))?;
    eprintln!(
        "Wrote {} ({} files, {} folders)",
        normalize_rel(&cfg.root, &cfg.map_path),
        built.snapshot.files.len(),
        built.snapshot.folders.len()
    );
    if json {
        let json_path = json_path_for(&cfg.map_path);
        write_json_file(&built.snapshot, &json_path)
            .with_context(|| format!("writing {}", json_path.display()))?;
        eprintln!("Wrote {}", normalize_rel(&cfg.root, &json_path));
    }

    // Summary line only; details come from lint
    let d = &built.diagnostics;
    let problems = d.missing_headers.len()
        + d.malformed_headers.len()
        + d.rule_violations.len()
        + d.invalid_folders.len()
        + d.nonsource.len();
    if problems > 0 {
        eprintln!("{problems} summary problems recorded; run `purpose-atlas lint` for details.");
    }
    Ok(ExitCode::SUCCESS)
}

fn lint(cwd: &Path, overrides: &Overrides, env: &RunEnv, opts: &LintOptions) -> Result<ExitCode> {
    let cfg = load_config(cwd, overrides)?;
    let report = run_lint(&cfg, opts, env);
    let mut err = io::stderr().lock();
    report.write_to(&mut err).context("writing lint report")?;
    Ok(match report.outcome() {
        Outcome::Pass => ExitCode::SUCCESS,
        Outcome::Fail => ExitCode::from(EXIT_FAIL),
    })
}

fn seed(cwd: &Path, overrides: &Overrides) -> Result<ExitCode> {
    let cfg = load_config(cwd, overrides)?;
    let created = seed_purpose_files(&cfg).context("seeding folder purpose files")?;
    eprintln!("Seeded {created} {} files.", cfg.purpose_filename);
    Ok(ExitCode::SUCCESS)
}
