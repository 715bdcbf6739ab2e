//! flow-lint: Flow type errors for JavaScript files, line by line.

mod cli;
mod config;
mod orchestrator;
mod output;

use clap::Parser;
use cli::Args;
use config::LintConfig;
use flow_runner::FlowRunner;
use miette::{IntoDiagnostic, Result};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Environment variable holding the log filter.
const LOG_ENV: &str = "FLOW_LINT_LOG";

fn init_tracing() {
    let env_filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));

    // Logs go to stderr so they never mix with diagnostics.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    let config = LintConfig::from_args(&args).into_diagnostic()?;

    // Handle flow version command
    if args.flow_version {
        let runner = FlowRunner::new(config.flow_bin.clone());
        match runner.flow_version(&config.workspace).await {
            Ok((version, path)) => {
                println!("flow {}", version);
                println!("path: {}", path);
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    match orchestrator::run(config).await {
        Ok(summary) => {
            if summary.failed() {
                std::process::exit(1);
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
