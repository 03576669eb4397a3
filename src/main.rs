// src/main.rs

use purpose_atlas::commands;
use std::process::ExitCode;

fn main() -> ExitCode {
    commands::run_cli()
}
