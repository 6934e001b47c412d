//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Multi-rate stream processing pipeline
#[derive(Debug, Parser)]
#[command(name = "stream-pipeline", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase log verbosity (-v: debug, -vv: trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogFormat {
    Json,
    Pretty,
    Compact,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run a pipeline from a blueprint file
    Run(RunArgs),
    /// Parse and validate a blueprint file, then exit
    Validate(ValidateArgs),
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Blueprint file (.toml or .json)
    #[arg(env = "PIPELINE_CONFIG")]
    pub config: PathBuf,

    /// Stop after this many seconds (0 = run until Ctrl-C)
    #[arg(long, default_value_t = 0.0)]
    pub duration_s: f64,

    /// Override the blueprint's provider buffer length in seconds
    #[arg(long)]
    pub buffer_size_s: Option<f64>,

    /// Override the blueprint's Prometheus port (0 = disabled)
    #[arg(long)]
    pub metrics_port: Option<u16>,
}

#[derive(Debug, Args)]
pub struct ValidateArgs {
    /// Blueprint file (.toml or .json)
    pub config: PathBuf,

    /// Print the parsed blueprint as JSON
    #[arg(long)]
    pub print: bool,
}
