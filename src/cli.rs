// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::types::RunCategory;

/// Command-line arguments for `runsync`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "runsync",
    version,
    about = "Track, QC, transfer and archive sequencing run directories.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `RUNSYNC_CONFIG` if set, otherwise `runsync.toml` in the
    /// current working directory.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `RUNSYNC_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run one full pass over every configured run directory.
    Process(ProcessArgs),

    /// Only reconcile the status store for a single run.
    UpdateDb {
        /// Full path to the run directory.
        #[arg(long, value_name = "PATH")]
        run: PathBuf,
    },

    /// Print the evaluated state of every run without touching anything.
    Status {
        #[arg(long, value_enum, default_value = "all")]
        category: CategoryArg,
    },
}

#[derive(Debug, Clone, Args)]
pub struct ProcessArgs {
    /// Restrict the pass to one run category.
    #[arg(long, value_enum, default_value = "all")]
    pub category: CategoryArg,

    /// Process only this run directory.
    #[arg(long, value_name = "PATH")]
    pub run: Option<PathBuf>,

    /// Sample sheet to use for QC demultiplexing instead of looking one up.
    #[arg(long, value_name = "PATH")]
    pub samplesheet: Option<PathBuf>,
}

/// Category filter as exposed on the CLI.
#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum CategoryArg {
    User,
    Qc,
    Delivery,
    All,
}

impl CategoryArg {
    pub fn includes(self, category: RunCategory) -> bool {
        match self {
            CategoryArg::All => true,
            CategoryArg::User => category == RunCategory::User,
            CategoryArg::Qc => category == RunCategory::Qc,
            CategoryArg::Delivery => category == RunCategory::Delivery,
        }
    }
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
