//! `labflow`: drive the lab lifecycle engine from the command line.

use std::io::{self, IsTerminal};
use std::process::ExitCode;

use anyhow::Result;
use clap::{ColorChoice, Parser};
use lab_cli::logging::{LogConfig, init_logging};

mod cli;
mod commands;
mod summary;
mod types;

use crate::cli::{Cli, Command};
use crate::commands::{run_catalog, run_plan, run_validate, run_workflow};
use crate::summary::{print_plan, print_run, print_validation};

fn main() -> ExitCode {
    let cli = Cli::parse();
    cli.color.write_global();
    if let Err(error) = init_logging(&log_config(&cli)) {
        eprintln!("error: failed to initialize logging: {error}");
        return ExitCode::FAILURE;
    }
    match dispatch(cli.command) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(error) => {
            eprintln!("error: {error:#}");
            ExitCode::FAILURE
        }
    }
}

/// Run one subcommand; `Ok(false)` means it ran but found problems.
fn dispatch(command: Command) -> Result<bool> {
    match command {
        Command::Catalog(args) => run_catalog(&args).map(|()| true),
        Command::Validate(args) => {
            let report = run_validate(&args)?;
            print_validation(&report);
            Ok(!report.has_errors())
        }
        Command::Plan(args) => {
            print_plan(&run_plan(&args)?);
            Ok(true)
        }
        Command::Run(args) => {
            let report = run_workflow(&args)?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_run(&report);
            }
            Ok(!report.has_failures())
        }
    }
}

/// Explicit `--log-level` wins over `-v`/`-q`; either disables `RUST_LOG`.
fn log_config(cli: &Cli) -> LogConfig {
    let explicit = cli.verbosity.is_present() || cli.log_level.is_some();
    let to_file = cli.log_file.is_some();
    LogConfig {
        level_filter: cli
            .log_level
            .map_or_else(|| cli.verbosity.tracing_level_filter(), Into::into),
        use_env_filter: !explicit,
        with_ansi: match cli.color.color {
            ColorChoice::Always => true,
            ColorChoice::Never => false,
            ColorChoice::Auto => !to_file && io::stderr().is_terminal(),
        },
        format: cli.log_format.into(),
        log_file: cli.log_file.clone(),
        log_data: cli.log_data,
        ..LogConfig::default()
    }
}
