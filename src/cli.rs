// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `incbuild`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "incbuild",
    version,
    about = "Incremental build and deployment of compiled sources.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Relative directories in the config are resolved against its parent.
    #[arg(long, value_name = "PATH", default_value = "Incbuild.toml")]
    pub config: String,

    /// TOML file describing the current database tables and sequences.
    ///
    /// Without it, every recorded table or sequence reference counts as changed.
    #[arg(long, value_name = "PATH")]
    pub environment: Option<String>,

    /// Rebuild every source file regardless of history.
    #[arg(long)]
    pub full_rebuild: bool,

    /// Scan and plan, print what would be rebuilt and removed, but don't
    /// execute any task or write history.
    #[arg(long)]
    pub dry_run: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `INCBUILD_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
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
