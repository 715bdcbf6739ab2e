//! CLI argument parsing.

use camino::Utf8PathBuf;
use clap::{Parser, ValueEnum};

/// Inline Flow type errors for JavaScript files.
#[derive(Debug, Parser)]
#[command(name = "flow-lint")]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Files to check (relative paths are resolved against --workspace)
    pub files: Vec<Utf8PathBuf>,

    /// Working directory for relative file paths
    #[arg(long, default_value = ".")]
    pub workspace: Utf8PathBuf,

    /// Output format
    #[arg(long, value_enum, default_value = "human")]
    pub output: OutputFormat,

    /// Minimum severity threshold
    #[arg(long, value_enum, default_value = "warning")]
    pub threshold: Threshold,

    /// Check the unsaved contents of a single file, read from stdin
    #[arg(long)]
    pub stdin: bool,

    /// Watch mode
    #[arg(long, conflicts_with = "stdin")]
    pub watch: bool,

    /// Preserve watch output (don't clear screen)
    #[arg(long = "preserveWatchOutput")]
    pub preserve_watch_output: bool,

    /// Exit with error on warnings
    #[arg(long = "fail-on-warnings")]
    pub fail_on_warnings: bool,

    /// Path to the flow binary (defaults to node_modules/.bin/flow, then PATH)
    #[arg(long = "flow-bin")]
    pub flow_bin: Option<Utf8PathBuf>,

    /// Show flow version and binary path
    #[arg(long = "flow-version")]
    pub flow_version: bool,
}

/// Output format options.
#[derive(Debug, Clone, Copy, ValueEnum, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    #[default]
    Human,
    /// Human-readable with the offending source line
    HumanVerbose,
    /// JSON output
    Json,
    /// Machine-readable (one line per diagnostic)
    Machine,
}

/// Severity threshold.
#[derive(Debug, Clone, Copy, ValueEnum, Default, PartialEq, Eq)]
pub enum Threshold {
    /// Only show errors
    Error,
    /// Show errors and warnings (default)
    #[default]
    Warning,
}
