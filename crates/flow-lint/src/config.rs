//! Configuration loading.

use crate::cli::{Args, OutputFormat, Threshold};
use crate::orchestrator::OrchestratorError;
use camino::{Utf8Path, Utf8PathBuf};

/// Environment variable overriding the flow binary.
pub const FLOW_BIN_ENV: &str = "FLOW_LINT_BIN";
/// Environment variable enabling `--fail-on-warnings`.
pub const FAIL_ON_WARNINGS_ENV: &str = "FLOW_LINT_FAIL_ON_WARNINGS";

/// Resolved settings for one run.
#[derive(Debug, Clone)]
pub struct LintConfig {
    /// Absolute working directory.
    pub workspace: Utf8PathBuf,
    /// Absolute paths of the documents to check.
    pub files: Vec<Utf8PathBuf>,
    pub output: OutputFormat,
    pub threshold: Threshold,
    pub stdin: bool,
    pub watch: bool,
    pub preserve_watch_output: bool,
    pub fail_on_warnings: bool,
    /// Explicit flow binary, from `--flow-bin` or `FLOW_LINT_BIN`.
    pub flow_bin: Option<Utf8PathBuf>,
}

impl LintConfig {
    /// Builds the configuration from CLI arguments and the process
    /// environment.
    pub fn from_args(args: &Args) -> Result<Self, OrchestratorError> {
        Self::from_args_with_env(args, |name| std::env::var(name).ok())
    }

    /// Builds the configuration, reading environment variables through `env`.
    /// Command-line flags take precedence.
    pub fn from_args_with_env(
        args: &Args,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, OrchestratorError> {
        let workspace = if args.workspace.is_relative() {
            let cwd = std::env::current_dir()
                .map_err(|e| OrchestratorError::InvalidPath(e.to_string()))?;
            let cwd = Utf8PathBuf::try_from(cwd)
                .map_err(|e| OrchestratorError::InvalidPath(e.to_string()))?;
            normalize(&cwd.join(&args.workspace))
        } else {
            normalize(&args.workspace)
        };

        if args.stdin && args.files.len() != 1 {
            return Err(OrchestratorError::StdinNeedsOneFile(args.files.len()));
        }

        let files = args
            .files
            .iter()
            .map(|file| normalize(&workspace.join(file)))
            .collect();

        let flow_bin = args
            .flow_bin
            .clone()
            .or_else(|| env(FLOW_BIN_ENV).filter(|v| !v.is_empty()).map(Utf8PathBuf::from));

        let fail_on_warnings = args.fail_on_warnings
            || env(FAIL_ON_WARNINGS_ENV)
                .as_deref()
                .and_then(parse_bool)
                .unwrap_or(false);

        Ok(Self {
            workspace,
            files,
            output: args.output,
            threshold: args.threshold,
            stdin: args.stdin,
            watch: args.watch,
            preserve_watch_output: args.preserve_watch_output,
            fail_on_warnings,
            flow_bin,
        })
    }
}

/// Resolves symlinks when the path exists so it compares equal to the
/// absolute paths flow reports. Paths that don't exist yet are kept as-is.
fn normalize(path: &Utf8Path) -> Utf8PathBuf {
    path.canonicalize_utf8().unwrap_or_else(|_| path.to_owned())
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use pretty_assertions::assert_eq;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_relative_files_resolve_against_workspace() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        std::fs::create_dir_all(root.join("src")).unwrap();
        std::fs::write(root.join("src/app.js"), "// @flow\n").unwrap();

        let args = Args::parse_from(["flow-lint", "--workspace", root.as_str(), "src/app.js"]);
        let config = LintConfig::from_args_with_env(&args, no_env).unwrap();

        let expected = root.canonicalize_utf8().unwrap().join("src/app.js");
        assert_eq!(config.files, vec![expected]);
        assert!(config.workspace.is_absolute());
    }

    #[test]
    fn test_missing_file_is_kept() {
        let args = Args::parse_from(["flow-lint", "--workspace", "/nonexistent-root", "a.js"]);
        let config = LintConfig::from_args_with_env(&args, no_env).unwrap();
        assert_eq!(config.files, vec![Utf8PathBuf::from("/nonexistent-root/a.js")]);
    }

    #[test]
    fn test_stdin_needs_exactly_one_file() {
        let args = Args::parse_from(["flow-lint", "--stdin", "a.js", "b.js"]);
        let err = LintConfig::from_args_with_env(&args, no_env).unwrap_err();
        assert!(matches!(err, OrchestratorError::StdinNeedsOneFile(2)));
    }

    #[test]
    fn test_env_overrides() {
        let args = Args::parse_from(["flow-lint", "a.js"]);
        let config = LintConfig::from_args_with_env(&args, |name| match name {
            FLOW_BIN_ENV => Some("/opt/flow".to_string()),
            FAIL_ON_WARNINGS_ENV => Some("yes".to_string()),
            _ => None,
        })
        .unwrap();

        assert_eq!(config.flow_bin, Some(Utf8PathBuf::from("/opt/flow")));
        assert!(config.fail_on_warnings);
    }

    #[test]
    fn test_flag_beats_env() {
        let args = Args::parse_from(["flow-lint", "--flow-bin", "/usr/bin/flow", "a.js"]);
        let config = LintConfig::from_args_with_env(&args, |name| {
            (name == FLOW_BIN_ENV).then(|| "/opt/flow".to_string())
        })
        .unwrap();

        assert_eq!(config.flow_bin, Some(Utf8PathBuf::from("/usr/bin/flow")));
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("ON"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
