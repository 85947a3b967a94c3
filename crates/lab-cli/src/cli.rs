//! CLI argument definitions for `labflow`.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;
use lab_cli::logging::LogFormat;
use tracing::level_filters::LevelFilter;

#[derive(Parser)]
#[command(
    name = "labflow",
    version,
    about = "Specimen and result lifecycle engine",
    long_about = "Inspect a reference catalog, score result submissions, plan aliquots\n\
                  and play lab workflows through the lifecycle engine."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Adjust log verbosity (-v for info, -vv for debug, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format (pretty for human, json for machine parsing).
    #[arg(
        long = "log-format",
        value_enum,
        default_value = "pretty",
        global = true
    )]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,

    /// Allow patient result values in trace logs.
    #[arg(long = "log-data", global = true)]
    pub log_data: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// List the tests defined in a catalog.
    Catalog(CatalogArgs),

    /// Score a result submission against the catalog.
    Validate(ValidateArgs),

    /// Compute an aliquot plan for a collected volume.
    Plan(PlanArgs),

    /// Play a workflow scenario through the coordinator.
    Run(RunArgs),
}

#[derive(Parser)]
pub struct CatalogArgs {
    /// Catalog JSON file, or a directory holding tests.csv and parameters.csv.
    #[arg(value_name = "CATALOG")]
    pub catalog: PathBuf,
}

#[derive(Parser)]
pub struct ValidateArgs {
    #[arg(long = "catalog", value_name = "CATALOG")]
    pub catalog: PathBuf,

    /// JSON file with testCode, values and optional demographics/previous.
    #[arg(value_name = "RESULTS")]
    pub results: PathBuf,

    /// Delta-check threshold in percent (default from config).
    #[arg(long = "delta-threshold", value_name = "PERCENT")]
    pub delta_threshold: Option<f64>,

    #[arg(long = "config", value_name = "TOML")]
    pub config: Option<PathBuf>,
}

#[derive(Parser)]
pub struct PlanArgs {
    /// JSON file with collectedVolumeMl and groups.
    #[arg(value_name = "REQUEST")]
    pub request: PathBuf,
}

#[derive(Parser)]
pub struct RunArgs {
    #[arg(long = "catalog", value_name = "CATALOG")]
    pub catalog: PathBuf,

    #[arg(value_name = "SCENARIO")]
    pub scenario: PathBuf,

    #[arg(long = "config", value_name = "TOML")]
    pub config: Option<PathBuf>,

    /// Print the run report as JSON instead of tables.
    #[arg(long = "json")]
    pub json: bool,
}

/// CLI log level choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevelArg> for LevelFilter {
    fn from(level: LogLevelArg) -> Self {
        match level {
            LogLevelArg::Error => LevelFilter::ERROR,
            LogLevelArg::Warn => LevelFilter::WARN,
            LogLevelArg::Info => LevelFilter::INFO,
            LogLevelArg::Debug => LevelFilter::DEBUG,
            LogLevelArg::Trace => LevelFilter::TRACE,
        }
    }
}

/// CLI log format choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(format: LogFormatArg) -> Self {
        match format {
            LogFormatArg::Pretty => LogFormat::Pretty,
            LogFormatArg::Compact => LogFormat::Compact,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}
